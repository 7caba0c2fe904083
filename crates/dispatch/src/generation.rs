//! One text-to-image generation attempt, end to end.
//!
//! [`ImageGeneration`] owns the request's state machine:
//!
//! 1. [`prepare`](ImageGeneration::prepare) writes the prompt file and the
//!    submission script. Failures here are hard errors.
//! 2. [`submit`](ImageGeneration::submit) reads the [`GenerationGate`] once
//!    and, if enabled, runs the submission command a single time. Gate-off
//!    and scheduler refusals end in `Failed` without ever polling.
//! 3. [`progress`](ImageGeneration::progress) or
//!    [`wait`](ImageGeneration::wait) observe the output artifact.
//!
//! A generation is single-use. Retrying means preparing a new request with a
//! new correlation ID.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::Stream;
use imagen_core::job_state::{FailureReason, JobState};
use imagen_core::request::{JobHandle, JobRequest};
use imagen_core::scheduler::executor::JobSubmitter;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::ImagenConfig;
use crate::descriptor::{build_descriptor, JobDescriptor};
use crate::error::DispatchError;
use crate::gate::GenerationGate;
use crate::materialize::{ensure_dir, materialize};
use crate::poller::{ArtifactProbe, CompletionPoller, FsProbe, PollSettings};
use crate::submit::submit;

/// Where the attempt is, with the data each stage needs.
enum Stage<P> {
    Prepared(P),
    Failed(FailureReason),
    Observing(CompletionPoller<P>),
}

/// A prepared (and possibly submitted) generation request.
pub struct ImageGeneration<P = FsProbe> {
    request: JobRequest,
    handle: JobHandle,
    descriptor: JobDescriptor,
    settings: PollSettings,
    stage: Stage<P>,
}

/// Machine-readable outcome of a generation.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub handle: JobHandle,
    pub state: JobState,
    pub output_path: Option<PathBuf>,
}

impl ImageGeneration<FsProbe> {
    /// Prepare a request for `prompt` with a fresh correlation ID, watching
    /// the real filesystem for the artifact.
    pub async fn from_prompt(prompt: &str, config: &ImagenConfig) -> Result<Self, DispatchError> {
        let request = JobRequest::new(prompt, config.dirs.clone())?;
        Self::prepare(request, config, FsProbe).await
    }
}

impl<P: ArtifactProbe> ImageGeneration<P> {
    /// Materialize the prompt and write the submission script.
    ///
    /// The images directory is created as well so the worker can write
    /// into it.
    pub async fn prepare(
        request: JobRequest,
        config: &ImagenConfig,
        probe: P,
    ) -> Result<Self, DispatchError> {
        let prompt_path = materialize(request.prompt(), &request.dirs().queries, request.id()).await?;
        tracing::info!(
            query_id = request.id(),
            path = %prompt_path.display(),
            "Text prompt file has been generated",
        );

        ensure_dir(&request.dirs().images).await?;

        let descriptor = build_descriptor(&request, &config.template).await?;
        tracing::info!(
            query_id = request.id(),
            path = %descriptor.path.display(),
            "Submission script has been created",
        );

        let handle = request.handle();
        Ok(Self {
            request,
            handle,
            descriptor,
            settings: config.poll,
            stage: Stage::Prepared(probe),
        })
    }

    pub fn request(&self) -> &JobRequest {
        &self.request
    }

    pub fn handle(&self) -> &JobHandle {
        &self.handle
    }

    pub fn descriptor(&self) -> &JobDescriptor {
        &self.descriptor
    }

    /// Total time the poller is willing to wait (`time_step * timeout_steps`).
    pub fn timeout(&self) -> Duration {
        self.settings.timeout()
    }

    pub fn state(&self) -> JobState {
        match &self.stage {
            Stage::Prepared(_) => JobState::Prepared,
            Stage::Failed(reason) => JobState::Failed(*reason),
            Stage::Observing(poller) => poller.state(),
        }
    }

    /// The artifact path if polling ended in `Completed`, otherwise `None`.
    pub fn output_path(&self) -> Option<&Path> {
        match &self.stage {
            Stage::Observing(poller) => poller.output_path(),
            _ => None,
        }
    }

    /// Check the gate once and, if enabled, submit the script once.
    ///
    /// Returns whether the scheduler accepted the job. Calling this again
    /// after the first call has no effect.
    pub async fn submit<S: JobSubmitter>(&mut self, submitter: &S, gate: &GenerationGate) -> bool {
        let query_id = self.handle.query_id.as_str();

        let probe = match std::mem::replace(
            &mut self.stage,
            Stage::Failed(FailureReason::SubmissionFailure),
        ) {
            Stage::Prepared(probe) => probe,
            other => {
                tracing::warn!(query_id, "Generation already submitted, ignoring");
                let accepted = matches!(other, Stage::Observing(_));
                self.stage = other;
                return accepted;
            }
        };

        if !gate.is_enabled() {
            tracing::info!(query_id, "Generation gate disabled, skipping submission");
            self.stage = Stage::Failed(FailureReason::GateDisabled);
            return false;
        }

        if !submit(submitter, &self.handle.script_path, query_id).await {
            // Stage is already Failed(SubmissionFailure).
            return false;
        }

        self.stage = Stage::Observing(CompletionPoller::new(
            self.handle.artifact_path.clone(),
            self.settings,
            probe,
        ));
        true
    }

    /// One polling step; see [`CompletionPoller::next_progress`].
    ///
    /// Always `None` unless the job was accepted by the scheduler.
    pub async fn next_progress(&mut self) -> Option<Duration> {
        match &mut self.stage {
            Stage::Observing(poller) => poller.next_progress().await,
            _ => None,
        }
    }

    /// Elapsed-time observations as a lazily pulled stream. Empty unless the
    /// job was accepted by the scheduler.
    pub fn progress(&mut self) -> impl Stream<Item = Duration> + '_ {
        futures::stream::unfold(self, |generation| async move {
            let elapsed = generation.next_progress().await?;
            Some((elapsed, generation))
        })
    }

    /// Poll to a terminal state with cooperative cancellation.
    pub async fn wait<F>(&mut self, cancel: &CancellationToken, on_progress: F) -> JobState
    where
        F: FnMut(Duration),
    {
        if let Stage::Observing(poller) = &mut self.stage {
            poller.wait(cancel, on_progress).await;
        }
        self.state()
    }

    pub fn report(&self) -> GenerationReport {
        GenerationReport {
            handle: self.handle.clone(),
            state: self.state(),
            output_path: self.output_path().map(Path::to_path_buf),
        }
    }
}

/// Run one generation to completion: prepare, submit, poll.
///
/// Returns `Ok(None)` for every "no result" outcome (gate disabled,
/// submission refused, timed out, cancelled). Only preparation failures are
/// errors.
pub async fn generate_image<S, F>(
    prompt: &str,
    config: &ImagenConfig,
    submitter: &S,
    gate: &GenerationGate,
    cancel: &CancellationToken,
    on_progress: F,
) -> Result<Option<PathBuf>, DispatchError>
where
    S: JobSubmitter,
    F: FnMut(Duration),
{
    let mut generation = ImageGeneration::from_prompt(prompt, config).await?;
    if generation.submit(submitter, gate).await {
        generation.wait(cancel, on_progress).await;
    }

    let report = generation.report();
    tracing::info!(
        query_id = %report.handle.query_id,
        state = %report.state,
        "Generation finished",
    );
    Ok(report.output_path)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
