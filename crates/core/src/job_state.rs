//! Lifecycle states of one generation attempt.
//!
//! ```text
//! Prepared ──gate/submit ok──▶ Submitted ──▶ Polling ──▶ Completed
//!    │                                         │  ├────▶ TimedOut
//!    └──gate off / submit failed──▶ Failed     │  └────▶ Cancelled
//! ```

use std::fmt;

use serde::Serialize;

/// Why a generation never reached the scheduler (or the scheduler refused it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Submission was suppressed by the generation gate (dry-run mode).
    GateDisabled,
    /// The submission command exited non-zero, could not be spawned, or
    /// exceeded its wall-clock limit.
    SubmissionFailure,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GateDisabled => "gate_disabled",
            Self::SubmissionFailure => "submission_failure",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Prompt file and submission script are written; not yet submitted.
    Prepared,
    /// The scheduler accepted the job.
    Submitted,
    /// Waiting for the output artifact.
    Polling,
    /// The output artifact exists.
    Completed,
    /// The step budget ran out before the artifact appeared.
    TimedOut,
    /// The job never reached polling.
    Failed(FailureReason),
    /// The caller tripped the cancellation token while polling.
    Cancelled,
}

impl JobState {
    /// No further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::TimedOut | Self::Failed(_) | Self::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prepared => "prepared",
            Self::Submitted => "submitted",
            Self::Polling => "polling",
            Self::Completed => "completed",
            Self::TimedOut => "timed_out",
            Self::Failed(_) => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(reason) => write!(f, "failed ({})", reason.as_str()),
            other => f.write_str(other.as_str()),
        }
    }
}
