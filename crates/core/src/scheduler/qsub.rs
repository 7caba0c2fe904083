//! Grid Engine `qsub` submitter.
//!
//! Runs `<program> <script_path>` and reports the exit status. The program
//! defaults to `qsub` but is configurable for sites that wrap it.

use std::path::Path;
use std::time::Duration;

use tokio::process::Command;

use super::executor::{JobSubmitter, SubmitError, SubmitOutput};
use super::subprocess;

/// Default submission command.
pub const DEFAULT_SUBMIT_COMMAND: &str = "qsub";

/// Default wall-clock limit for the submission command itself.
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(120);

/// Submits scripts by invoking the scheduler's CLI.
#[derive(Debug, Clone)]
pub struct QsubSubmitter {
    program: String,
    timeout: Duration,
}

impl Default for QsubSubmitter {
    fn default() -> Self {
        Self::new(DEFAULT_SUBMIT_COMMAND, DEFAULT_SUBMIT_TIMEOUT)
    }
}

impl QsubSubmitter {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl JobSubmitter for QsubSubmitter {
    async fn submit(&self, script_path: &Path) -> Result<SubmitOutput, SubmitError> {
        if !tokio::fs::try_exists(script_path).await.unwrap_or(false) {
            return Err(SubmitError::ScriptNotFound(
                script_path.display().to_string(),
            ));
        }

        let mut cmd = Command::new(&self.program);
        cmd.arg(script_path);
        subprocess::run_command(&mut cmd, self.timeout).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
