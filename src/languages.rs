//! Language toolchain configuration
//!
//! Commands for each supported language are embedded at build time from
//! `files/languages.toml` and loaded once into process-wide state. Nothing
//! mutates this configuration at runtime.

use std::collections::HashMap;
use std::sync::OnceLock;

use anyhow::Context;
use serde::Deserialize;
use tracing::error;

use crate::trace::Language;

/// Toolchain commands for one supported language
#[derive(Debug, Clone)]
pub struct LanguageConfig {
    /// Name of the source file written into the request's temp dir (e.g. "main.c")
    pub source_file: String,
    /// Compile command (None for interpreted languages)
    pub compile_command: Option<Vec<String>>,
    /// Run command
    pub run_command: Vec<String>,
    /// Syntax-check command; must not execute the submitted program
    pub check_command: Vec<String>,
}

/// Raw TOML configuration for a language
#[derive(Debug, Deserialize)]
struct RawLanguageConfig {
    source_file: String,
    compile_command: Option<String>,
    run_command: String,
    check_command: String,
}

/// Global language configurations
static LANGUAGES: OnceLock<HashMap<Language, LanguageConfig>> = OnceLock::new();

fn parse_languages(content: &str) -> anyhow::Result<HashMap<Language, LanguageConfig>> {
    let raw_configs: HashMap<String, RawLanguageConfig> =
        toml::from_str(content).context("Failed to parse language configuration")?;

    let mut languages = HashMap::new();
    for (name, raw) in raw_configs {
        let language = Language::all()
            .into_iter()
            .find(|l| l.as_str() == name)
            .ok_or_else(|| anyhow::anyhow!("Unknown language in configuration: {}", name))?;
        languages.insert(
            language,
            LanguageConfig {
                source_file: raw.source_file,
                compile_command: raw.compile_command.map(|cmd| into_command(&cmd)),
                run_command: into_command(&raw.run_command),
                check_command: into_command(&raw.check_command),
            },
        );
    }

    for language in Language::all() {
        if !languages.contains_key(&language) {
            anyhow::bail!("Missing configuration for language: {}", language);
        }
    }

    Ok(languages)
}

/// Eagerly load and validate the embedded configuration. Idempotent; call at
/// process start to fail fast on a broken config.
pub fn init_languages() -> anyhow::Result<()> {
    if LANGUAGES.get().is_some() {
        return Ok(());
    }
    let languages = parse_languages(embedded_config())?;
    let _ = LANGUAGES.set(languages);
    Ok(())
}

/// Get toolchain configuration for a language. Loads the embedded config on
/// first use if `init_languages` was not called.
pub fn get_language_config(language: Language) -> Option<LanguageConfig> {
    LANGUAGES
        .get_or_init(|| {
            parse_languages(embedded_config()).unwrap_or_else(|err| {
                error!("Embedded language configuration is invalid: {:#}", err);
                HashMap::new()
            })
        })
        .get(&language)
        .cloned()
}

fn embedded_config() -> &'static str {
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/files/languages.toml"))
}

fn into_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(|s| s.to_string()).collect()
}
