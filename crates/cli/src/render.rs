//! User-facing text for the terminal front-end.

use std::time::Duration;

use imagen_core::job_state::{FailureReason, JobState};

/// `Generating the image... Time elapsed: 30/600s.`
pub fn progress_line(elapsed: Duration, timeout: Duration) -> String {
    format!(
        "Generating the image... Time elapsed: {}/{}s.",
        elapsed.as_secs(),
        timeout.as_secs()
    )
}

/// Message shown when a generation ends without an image.
pub fn failure_line(state: JobState) -> String {
    let detail = match state {
        JobState::Failed(FailureReason::GateDisabled) => "generation is disabled (test mode)",
        JobState::Failed(FailureReason::SubmissionFailure) => "the scheduler rejected the job",
        JobState::TimedOut => "timed out waiting for the image",
        JobState::Cancelled => "cancelled",
        _ => "no image was produced",
    };
    format!("Unable to generate the image: {detail}")
}
