use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::TransportError;

pub const DEFAULT_BINARY: &str = "msigd";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs the msigd CLI. Every call is a fresh process; msigd keeps no state
/// between invocations.
#[derive(Debug, Clone)]
pub struct MsigdExecutor {
    binary: PathBuf,
    timeout: Duration,
}

impl Default for MsigdExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_BINARY)
    }
}

impl MsigdExecutor {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub async fn execute(&self, args: &[&str]) -> Result<String, TransportError> {
        debug!(binary = %self.binary.display(), ?args, "running msigd");

        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))?
            .map_err(|e| TransportError::Unavailable(format!("{}: {e}", self.binary.display())))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        interpret_output(output.status.success(), stdout, stderr)
    }

    // ==========================================
    // QUERIES
    // ==========================================

    pub async fn list_monitors(&self) -> Result<String, TransportError> {
        self.execute(&["--list"]).await
    }

    pub async fn query_monitor(&self, index: &str) -> Result<String, TransportError> {
        self.execute(&["--monitor", index, "--query", "--numeric"]).await
    }

    // ==========================================
    // SETTERS
    // ==========================================

    pub async fn set_value(
        &self,
        index: &str,
        option: &str,
        value: &str,
    ) -> Result<String, TransportError> {
        let flag = format!("--{option}");
        self.execute(&["--monitor", index, &flag, value]).await
    }

    pub async fn set_mystic_light(&self, index: &str, config: &str) -> Result<String, TransportError> {
        self.execute(&["--monitor", index, "--mystic", config]).await
    }

    /// `--help` may exit non-zero; any answer at all means the binary runs.
    pub async fn check_available(&self) -> bool {
        match self.execute(&["--help"]).await {
            Ok(_) | Err(TransportError::CommandFailed(_)) => true,
            Err(_) => false,
        }
    }
}

/// msigd exits non-zero when some settings cannot be read but still prints
/// the ones it could, as `setting : value` lines. Those runs count as success.
fn interpret_output(success: bool, stdout: String, stderr: String) -> Result<String, TransportError> {
    if !stdout.is_empty() && stdout.contains(':') {
        return Ok(stdout);
    }
    if success {
        return Ok(stdout);
    }

    let message = if !stderr.trim().is_empty() {
        stderr.trim().to_string()
    } else if !stdout.trim().is_empty() {
        stdout.trim().to_string()
    } else {
        "msigd exited with an error and no output".to_string()
    };
    Err(TransportError::CommandFailed(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_query_output_is_accepted_despite_failure() {
        let out = interpret_output(false, "brightness : 70\n".into(), "cannot read kvm".into());
        assert_eq!(out.unwrap(), "brightness : 70\n");
    }

    #[test]
    fn failure_prefers_stderr_text() {
        let err = interpret_output(false, String::new(), "  no monitor found \n".into()).unwrap_err();
        assert_eq!(err, TransportError::CommandFailed("no monitor found".into()));
    }

    #[test]
    fn silent_failure_still_reports_something() {
        let err = interpret_output(false, String::new(), String::new()).unwrap_err();
        assert!(matches!(err, TransportError::CommandFailed(msg) if !msg.is_empty()));
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let executor = MsigdExecutor::new("/nonexistent/msigd-binary");
        let err = executor.list_monitors().await.unwrap_err();
        assert!(matches!(err, TransportError::Unavailable(_)));
        assert!(!executor.check_available().await);
    }
}
