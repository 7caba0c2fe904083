//! Submission interface and shared types.
//!
//! Defines [`JobSubmitter`], the trait every submission backend implements,
//! along with [`SubmitOutput`] and [`SubmitError`]. A non-zero exit status is
//! not an error at this layer: it is reported in [`SubmitOutput::exit_code`]
//! and the caller decides what it means.

use std::fmt;
use std::path::Path;

use serde::Serialize;

/// Captured result of one submission command.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutput {
    /// Complete stdout captured from the command.
    pub stdout: String,
    /// Complete stderr captured from the command.
    pub stderr: String,
    /// Process exit code (`-1` if killed by signal).
    pub exit_code: i32,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl SubmitOutput {
    /// The scheduler accepted the job (exit code zero).
    pub fn accepted(&self) -> bool {
        self.exit_code == 0
    }
}

/// Errors that prevent the submission command from producing an exit status.
#[derive(Debug)]
pub enum SubmitError {
    /// The submission script does not exist.
    ScriptNotFound(String),
    /// The command ran longer than its wall-clock limit and was killed.
    Timeout {
        /// Elapsed wall-clock time before the process was killed.
        elapsed_ms: u64,
    },
    /// Spawning or waiting on the command failed (e.g. `qsub` not on `PATH`).
    IoError(std::io::Error),
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScriptNotFound(path) => write!(f, "Submission script not found: {path}"),
            Self::Timeout { elapsed_ms } => {
                write!(f, "Submission command timed out after {elapsed_ms}ms")
            }
            Self::IoError(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for SubmitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::IoError(err) => Some(err),
            _ => None,
        }
    }
}

/// Hands a rendered submission script to a batch scheduler.
pub trait JobSubmitter: Send + Sync {
    /// Submit the script at `script_path` and wait for the command to return.
    fn submit(
        &self,
        script_path: &Path,
    ) -> impl std::future::Future<Output = Result<SubmitOutput, SubmitError>> + Send;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
