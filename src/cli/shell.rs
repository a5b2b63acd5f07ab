//! Runs one external command as a single attempt.

use eyre::{Result, WrapErr, eyre};
use log::debug;
use tokio::process::Command;

/// Run `command[0]` with the remaining arguments; exit status 0 is success.
///
/// Returns the trimmed stdout on success. A non-zero exit becomes an error
/// carrying the status and trimmed stderr.
pub async fn run_once(command: &[String]) -> Result<String> {
    let (program, args) = command.split_first().ok_or_else(|| eyre!("No command given"))?;
    debug!("Running {} {:?}", program, args);

    let output = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .wrap_err_with(|| format!("Failed to spawn {}", program))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        Err(eyre!(
            "{} exited with {}: {}",
            program,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ))
    }
}
