//! Completion polling for a submitted job.
//!
//! The cluster offers no status API: the worker signals completion by writing
//! `<images_dir>/<id>.png`. [`CompletionPoller`] checks for that file, sleeps
//! `time_step` between checks, and gives up after `timeout_steps` sleeps.
//!
//! The poller is driven lazily. Each call to
//! [`next_progress`](CompletionPoller::next_progress) performs at most one
//! check and one sleep and yields the cumulative elapsed time; the k-th
//! observation is `k * time_step`. A caller that stops asking cancels the
//! wait. The cluster job itself is never touched.
//!
//! Mere existence is the completion signal, so a partially written image can
//! be observed if the check lands mid-write.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::Stream;
use imagen_core::job_state::JobState;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default interval between artifact checks.
pub const DEFAULT_TIME_STEP: Duration = Duration::from_secs(30);

/// Default number of sleeps before giving up.
pub const DEFAULT_TIMEOUT_STEPS: u32 = 20;

// ---------------------------------------------------------------------------
// Artifact probe
// ---------------------------------------------------------------------------

/// Answers "has the worker produced the artifact yet?".
pub trait ArtifactProbe: Send + Sync {
    fn exists(&self, path: &Path) -> impl std::future::Future<Output = bool> + Send;
}

/// Checks the real filesystem. I/O errors count as "not there yet".
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl ArtifactProbe for FsProbe {
    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// Settings and state
// ---------------------------------------------------------------------------

/// Polling cadence and budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub time_step: Duration,
    pub timeout_steps: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            time_step: DEFAULT_TIME_STEP,
            timeout_steps: DEFAULT_TIMEOUT_STEPS,
        }
    }
}

impl PollSettings {
    /// Total time the poller is willing to wait.
    pub fn timeout(&self) -> Duration {
        self.time_step.saturating_mul(self.timeout_steps)
    }
}

/// Transient progress of one polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollState {
    pub elapsed: Duration,
    pub remaining_steps: u32,
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

/// State machine `Submitted → Polling → {Completed, TimedOut, Cancelled}`.
///
/// Not restartable: once terminal, every call yields `None`.
#[derive(Debug)]
pub struct CompletionPoller<P> {
    artifact: PathBuf,
    settings: PollSettings,
    probe: P,
    state: JobState,
    poll: PollState,
}

impl<P: ArtifactProbe> CompletionPoller<P> {
    /// Start observing `artifact` for a job the scheduler just accepted.
    pub fn new(artifact: PathBuf, settings: PollSettings, probe: P) -> Self {
        Self {
            artifact,
            settings,
            probe,
            state: JobState::Submitted,
            poll: PollState {
                elapsed: Duration::ZERO,
                remaining_steps: settings.timeout_steps,
            },
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn poll_state(&self) -> PollState {
        self.poll
    }

    pub fn settings(&self) -> PollSettings {
        self.settings
    }

    /// The artifact path, once polling ended in `Completed`.
    pub fn output_path(&self) -> Option<&Path> {
        match self.state {
            JobState::Completed => Some(&self.artifact),
            _ => None,
        }
    }

    /// Check once; if the artifact is absent and budget remains, sleep one
    /// `time_step` and return the new elapsed time. `None` once terminal.
    pub async fn next_progress(&mut self) -> Option<Duration> {
        self.advance(None).await
    }

    /// Elapsed-time observations as a lazily pulled stream.
    ///
    /// Dropping the stream stops polling; the state stays `Polling`.
    pub fn progress(&mut self) -> impl Stream<Item = Duration> + '_ {
        futures::stream::unfold(self, |poller| async move {
            let elapsed = poller.next_progress().await?;
            Some((elapsed, poller))
        })
    }

    /// Poll to a terminal state, calling `on_progress` after every sleep.
    ///
    /// Each sleep races `cancel`; tripping it ends in `Cancelled`.
    pub async fn wait<F>(&mut self, cancel: &CancellationToken, mut on_progress: F) -> JobState
    where
        F: FnMut(Duration),
    {
        while let Some(elapsed) = self.advance(Some(cancel)).await {
            on_progress(elapsed);
        }
        self.state
    }

    async fn advance(&mut self, cancel: Option<&CancellationToken>) -> Option<Duration> {
        match self.state {
            JobState::Submitted => {
                tracing::debug!(artifact = %self.artifact.display(), "Polling for artifact");
                self.state = JobState::Polling;
            }
            JobState::Polling => {}
            _ => return None,
        }

        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return self.cancelled();
        }

        if self.probe.exists(&self.artifact).await {
            tracing::info!(
                artifact = %self.artifact.display(),
                elapsed_secs = self.poll.elapsed.as_secs(),
                "Artifact found",
            );
            self.state = JobState::Completed;
            return None;
        }

        if self.poll.remaining_steps == 0 {
            tracing::warn!(
                artifact = %self.artifact.display(),
                timeout_secs = self.settings.timeout().as_secs(),
                "Gave up waiting for artifact",
            );
            self.state = JobState::TimedOut;
            return None;
        }

        let time_step = self.settings.time_step;
        match cancel {
            Some(cancel) => {
                tokio::select! {
                    _ = cancel.cancelled() => return self.cancelled(),
                    _ = tokio::time::sleep(time_step) => {}
                }
            }
            None => tokio::time::sleep(time_step).await,
        }

        self.poll.remaining_steps -= 1;
        self.poll.elapsed = self.poll.elapsed.saturating_add(time_step);

        let step = self.settings.timeout_steps - self.poll.remaining_steps;
        tracing::info!(
            artifact = %self.artifact.display(),
            "Waiting until image is generated, step: {step}/{}",
            self.settings.timeout_steps,
        );

        Some(self.poll.elapsed)
    }

    fn cancelled(&mut self) -> Option<Duration> {
        tracing::info!(artifact = %self.artifact.display(), "Polling cancelled");
        self.state = JobState::Cancelled;
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use futures::StreamExt;

    use super::*;

    /// Reports the artifact present from the `appears_on`-th check onward.
    struct AppearsOnCheck {
        appears_on: Option<u32>,
        checks: AtomicU32,
    }

    impl AppearsOnCheck {
        fn after(absent_checks: u32) -> Self {
            Self {
                appears_on: Some(absent_checks + 1),
                checks: AtomicU32::new(0),
            }
        }

        fn never() -> Self {
            Self {
                appears_on: None,
                checks: AtomicU32::new(0),
            }
        }
    }

    impl ArtifactProbe for AppearsOnCheck {
        async fn exists(&self, _path: &Path) -> bool {
            let check = self.checks.fetch_add(1, Ordering::SeqCst) + 1;
            self.appears_on.is_some_and(|n| check >= n)
        }
    }

    fn settings(timeout_steps: u32) -> PollSettings {
        PollSettings {
            time_step: Duration::from_secs(10),
            timeout_steps,
        }
    }

    fn poller(probe: AppearsOnCheck, timeout_steps: u32) -> CompletionPoller<AppearsOnCheck> {
        CompletionPoller::new(PathBuf::from("images/q.png"), settings(timeout_steps), probe)
    }

    #[test]
    fn default_settings_and_timeout() {
        let defaults = PollSettings::default();
        assert_eq!(defaults.time_step, Duration::from_secs(30));
        assert_eq!(defaults.timeout_steps, 20);
        assert_eq!(defaults.timeout(), Duration::from_secs(600));
    }

    #[test]
    fn oversized_timeout_saturates() {
        let huge = PollSettings {
            time_step: Duration::from_secs(u64::MAX),
            timeout_steps: 2,
        };
        assert_eq!(huge.timeout(), Duration::MAX);
    }

    #[test]
    fn starts_submitted_without_output() {
        let p = poller(AppearsOnCheck::never(), 5);
        assert_eq!(p.state(), JobState::Submitted);
        assert!(p.output_path().is_none());
        assert_eq!(p.poll_state().remaining_steps, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn completes_after_three_intervals() {
        let mut p = poller(AppearsOnCheck::after(3), 5);
        let observed: Vec<Duration> = p.progress().collect().await;

        assert_eq!(
            observed,
            vec![
                Duration::from_secs(10),
                Duration::from_secs(20),
                Duration::from_secs(30)
            ]
        );
        assert_eq!(p.state(), JobState::Completed);
        assert_eq!(p.output_path(), Some(Path::new("images/q.png")));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_after_budget() {
        let mut p = poller(AppearsOnCheck::never(), 5);
        let observed: Vec<Duration> = p.progress().collect().await;

        assert_eq!(observed.len(), 5);
        assert_eq!(observed.last(), Some(&Duration::from_secs(50)));
        assert_eq!(p.state(), JobState::TimedOut);
        assert!(p.output_path().is_none());
        assert_eq!(p.poll_state().remaining_steps, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_artifact_yields_nothing() {
        let mut p = poller(AppearsOnCheck::after(0), 5);
        assert_eq!(p.next_progress().await, None);
        assert_eq!(p.state(), JobState::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_budget_times_out_after_one_check() {
        let mut p = poller(AppearsOnCheck::never(), 0);
        assert_eq!(p.next_progress().await, None);
        assert_eq!(p.state(), JobState::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_poller_is_not_restartable() {
        let mut p = poller(AppearsOnCheck::never(), 1);
        while p.next_progress().await.is_some() {}
        assert_eq!(p.state(), JobState::TimedOut);
        assert_eq!(p.next_progress().await, None);
        assert_eq!(p.state(), JobState::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_stream_stops_polling() {
        let probe = AppearsOnCheck::never();
        let mut p = poller(probe, 5);
        let first_two: Vec<Duration> = p.progress().take(2).collect().await;

        assert_eq!(first_two.len(), 2);
        assert_eq!(p.state(), JobState::Polling);
        // take(2) stops before a third check is requested.
        assert_eq!(p.probe.checks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_reports_each_step() {
        let mut p = poller(AppearsOnCheck::after(2), 5);
        let cancel = CancellationToken::new();
        let mut seen = Vec::new();

        let state = p.wait(&cancel, |elapsed| seen.push(elapsed)).await;

        assert_eq!(state, JobState::Completed);
        assert_eq!(seen, vec![Duration::from_secs(10), Duration::from_secs(20)]);
    }

    #[tokio::test(start_paused = true)]
    async fn pre_cancelled_token_stops_before_checking() {
        let mut p = poller(AppearsOnCheck::after(0), 5);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let state = p.wait(&cancel, |_| panic!("no progress expected")).await;

        assert_eq!(state, JobState::Cancelled);
        assert!(p.output_path().is_none());
        assert_eq!(p.probe.checks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_mid_sleep_ends_wait() {
        let mut p = poller(AppearsOnCheck::never(), 5);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(25)).await;
            trigger.cancel();
        });

        let mut seen = Vec::new();
        let state = p.wait(&cancel, |elapsed| seen.push(elapsed)).await;

        assert_eq!(state, JobState::Cancelled);
        assert_eq!(seen, vec![Duration::from_secs(10), Duration::from_secs(20)]);
    }

    #[tokio::test]
    async fn fs_probe_sees_real_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("q.png");
        assert!(!FsProbe.exists(&path).await);
        std::fs::write(&path, b"png").expect("write");
        assert!(FsProbe.exists(&path).await);
    }
}
