//! Single-attempt job submission.
//!
//! Every way the submission can go wrong collapses into `false` here: a
//! refusing scheduler is an expected steady-state outcome, not an exception.
//! There is no retry.

use std::path::Path;

use imagen_core::scheduler::executor::JobSubmitter;

/// Submit `script_path` once. Returns `true` only if the command exited zero.
pub async fn submit<S: JobSubmitter>(submitter: &S, script_path: &Path, query_id: &str) -> bool {
    match submitter.submit(script_path).await {
        Ok(output) if output.accepted() => {
            tracing::info!(
                query_id,
                duration_ms = output.duration_ms,
                "Job submitted to scheduler",
            );
            tracing::debug!(query_id, stdout = %output.stdout.trim(), "Scheduler response");
            true
        }
        Ok(output) => {
            tracing::warn!(
                query_id,
                exit_code = output.exit_code,
                stderr = %output.stderr.trim(),
                "Submission command returned non-zero code",
            );
            false
        }
        Err(e) => {
            tracing::error!(query_id, error = %e, "Submission command could not run");
            false
        }
    }
}
