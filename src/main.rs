//! Worker binary: reads one JSON job from stdin and writes the JSON result
//! to stdout. The HTTP layer in front of this engine is a separate service;
//! this driver is what it (and integration tests) talk to.

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tracing::info;

use codetrace::executor::{self, ExecutionRequest, ValidationRequest};
use codetrace::languages;

/// Job enum - the two operations the engine exposes
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
enum Job {
    Execute(ExecutionRequest),
    Validate(ValidationRequest),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("codetrace=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    dotenvy::dotenv().ok();

    languages::init_languages()?;
    info!("Loaded language configurations");

    let mut raw = String::new();
    tokio::io::stdin()
        .read_to_string(&mut raw)
        .await
        .context("Failed to read job from stdin")?;
    let job: Job = serde_json::from_str(&raw).context("Failed to parse job")?;

    let rendered = match job {
        Job::Execute(request) => {
            info!(
                "Executing {} program ({} bytes, timeout {:?})",
                request.language,
                request.code.len(),
                request.effective_timeout()
            );
            let result = executor::executor_for(request.language)
                .execute_with_trace(
                    &request.code,
                    request.input_data.as_deref(),
                    request.effective_timeout(),
                )
                .await;
            info!(
                "Execution finished: status={}, steps={}",
                result.status,
                result.steps.len()
            );
            serde_json::to_string(&result)?
        }
        Job::Validate(request) => {
            info!("Validating {} program", request.language);
            let result = executor::executor_for(request.language)
                .validate_syntax(&request.code)
                .await;
            info!("Validation finished: is_valid={}", result.is_valid);
            serde_json::to_string(&result)?
        }
    };

    println!("{}", rendered);
    Ok(())
}
