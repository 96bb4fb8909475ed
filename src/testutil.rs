//! Shared test helpers

use std::process::Command;

/// Whether an external tool can be invoked. Tests that exercise a real
/// toolchain return early when it is not installed.
pub fn tool_available(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}
