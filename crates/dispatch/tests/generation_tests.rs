//! Integration tests for the generation pipeline.
//!
//! Covers the observable contract of a generation: the files the worker
//! depends on, gate and submission-failure outcomes, and the polling
//! cadence under a virtual clock.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use futures::StreamExt;
use imagen_core::descriptor::WorkerInvocation;
use imagen_core::job_state::{FailureReason, JobState};
use imagen_core::request::{JobDirs, JobRequest};
use imagen_core::scheduler::executor::{JobSubmitter, SubmitError, SubmitOutput};
use imagen_dispatch::config::ImagenConfig;
use imagen_dispatch::gate::GenerationGate;
use imagen_dispatch::generation::{generate_image, ImageGeneration};
use imagen_dispatch::poller::{ArtifactProbe, PollSettings};
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Records calls and answers with a fixed exit code.
struct FakeScheduler {
    exit_code: i32,
    calls: AtomicU32,
}

impl FakeScheduler {
    fn exiting(exit_code: i32) -> Self {
        Self {
            exit_code,
            calls: AtomicU32::new(0),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl JobSubmitter for FakeScheduler {
    async fn submit(&self, _script_path: &Path) -> Result<SubmitOutput, SubmitError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(SubmitOutput {
            stdout: "Your job 1 has been submitted".to_string(),
            stderr: String::new(),
            exit_code: self.exit_code,
            duration_ms: 1,
        })
    }
}

/// The artifact shows up on check number `absent_checks + 1`, or never.
#[derive(Clone)]
struct ScriptedProbe {
    absent_checks: Option<u32>,
    checks: Arc<AtomicU32>,
}

impl ScriptedProbe {
    fn after(absent_checks: u32) -> Self {
        Self {
            absent_checks: Some(absent_checks),
            checks: Arc::new(AtomicU32::new(0)),
        }
    }

    fn never() -> Self {
        Self {
            absent_checks: None,
            checks: Arc::new(AtomicU32::new(0)),
        }
    }

    fn checks(&self) -> u32 {
        self.checks.load(Ordering::SeqCst)
    }
}

impl ArtifactProbe for ScriptedProbe {
    async fn exists(&self, _path: &Path) -> bool {
        let seen = self.checks.fetch_add(1, Ordering::SeqCst);
        self.absent_checks.is_some_and(|n| seen >= n)
    }
}

fn config_under(root: &Path) -> ImagenConfig {
    ImagenConfig {
        dirs: JobDirs::under(root),
        poll: PollSettings {
            time_step: Duration::from_secs(15),
            timeout_steps: 5,
        },
        ..Default::default()
    }
}

async fn prepared(root: &Path, probe: ScriptedProbe) -> ImageGeneration<ScriptedProbe> {
    let config = config_under(root);
    let request = JobRequest::new("an astronaut riding a horse", config.dirs.clone())
        .expect("valid request");
    ImageGeneration::prepare(request, &config, probe)
        .await
        .expect("prepare")
}

// ---------------------------------------------------------------------------
// Polling cadence
// ---------------------------------------------------------------------------

/// Artifact appears after three intervals: three strictly increasing
/// observations, each a multiple of the time step, then `Completed`.
#[tokio::test(start_paused = true)]
async fn artifact_after_three_intervals_completes() {
    let dir = tempfile::tempdir().expect("temp dir");
    let probe = ScriptedProbe::after(3);
    let mut generation = prepared(dir.path(), probe.clone()).await;

    assert!(
        generation
            .submit(&FakeScheduler::exiting(0), &GenerationGate::default())
            .await
    );
    let observed: Vec<Duration> = generation.progress().collect().await;

    assert_eq!(
        observed,
        vec![
            Duration::from_secs(15),
            Duration::from_secs(30),
            Duration::from_secs(45)
        ]
    );
    assert_eq!(generation.state(), JobState::Completed);
    assert_eq!(
        generation.output_path(),
        Some(generation.handle().artifact_path.as_path())
    );
    assert_eq!(probe.checks(), 4);
}

/// Artifact never appears: exactly `timeout_steps` observations, then
/// `TimedOut` with no output path.
#[tokio::test(start_paused = true)]
async fn missing_artifact_times_out() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut generation = prepared(dir.path(), ScriptedProbe::never()).await;

    assert!(
        generation
            .submit(&FakeScheduler::exiting(0), &GenerationGate::default())
            .await
    );
    let observed: Vec<Duration> = generation.progress().collect().await;

    assert_eq!(observed.len(), 5);
    assert!(observed.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(observed.last(), Some(&generation.timeout()));
    assert_eq!(generation.state(), JobState::TimedOut);
    assert!(generation.output_path().is_none());
}

// ---------------------------------------------------------------------------
// Failure outcomes
// ---------------------------------------------------------------------------

/// With the gate disabled the scheduler is never contacted, yet the prompt
/// file and script are still produced.
#[tokio::test]
async fn disabled_gate_yields_no_result() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = config_under(dir.path());
    let scheduler = FakeScheduler::exiting(0);

    let result = generate_image(
        "a quiet harbor\n\n\nat dawn",
        &config,
        &scheduler,
        &GenerationGate::new(false),
        &CancellationToken::new(),
        |_| panic!("no progress expected"),
    )
    .await
    .expect("preparation succeeds");

    assert!(result.is_none());
    assert_eq!(scheduler.calls(), 0);

    let prompts: Vec<_> = std::fs::read_dir(dir.path().join("queries"))
        .expect("queries dir")
        .collect();
    assert_eq!(prompts.len(), 1);
    let scripts: Vec<_> = std::fs::read_dir(dir.path().join("sh"))
        .expect("scripts dir")
        .collect();
    assert_eq!(scripts.len(), 1);
}

/// A refusing scheduler yields no result and the artifact is never checked.
#[tokio::test]
async fn refused_submission_never_polls() {
    let dir = tempfile::tempdir().expect("temp dir");
    let probe = ScriptedProbe::after(0);
    let mut generation = prepared(dir.path(), probe.clone()).await;
    let scheduler = FakeScheduler::exiting(1);

    assert!(!generation.submit(&scheduler, &GenerationGate::default()).await);
    let state = generation
        .wait(&CancellationToken::new(), |_| panic!("no progress expected"))
        .await;

    assert_matches!(state, JobState::Failed(FailureReason::SubmissionFailure));
    assert_eq!(scheduler.calls(), 1);
    assert_eq!(probe.checks(), 0);
    assert!(generation.output_path().is_none());
}

/// Preparation errors are hard failures.
#[tokio::test]
async fn blank_prompt_is_rejected() {
    let dir = tempfile::tempdir().expect("temp dir");
    let result = generate_image(
        "\n\n",
        &config_under(dir.path()),
        &FakeScheduler::exiting(0),
        &GenerationGate::default(),
        &CancellationToken::new(),
        |_| {},
    )
    .await;

    assert!(result.is_err());
}

// ---------------------------------------------------------------------------
// Namespacing
// ---------------------------------------------------------------------------

/// Many requests sharing the same directories never overwrite each other.
#[tokio::test]
async fn concurrent_requests_do_not_collide() {
    let dir = tempfile::tempdir().expect("temp dir");

    let mut ids = HashSet::new();
    for i in 0..50 {
        let config = config_under(dir.path());
        let request = JobRequest::new(&format!("prompt {i}"), config.dirs.clone()).expect("valid");
        let generation = ImageGeneration::prepare(request, &config, ScriptedProbe::never())
            .await
            .expect("prepare");
        ids.insert(generation.handle().query_id.clone());
    }

    assert_eq!(ids.len(), 50);
    assert_eq!(
        std::fs::read_dir(dir.path().join("queries"))
            .expect("queries dir")
            .count(),
        50
    );
}

// ---------------------------------------------------------------------------
// End to end
// ---------------------------------------------------------------------------

/// Uses `bash` as the "scheduler" so the descriptor runs locally, and a
/// stand-in worker that copies the prompt file to the artifact path. The
/// artifact must exist before the first check.
#[tokio::test]
async fn local_scheduler_stand_in_produces_artifact() {
    let dir = tempfile::tempdir().expect("temp dir");
    let worker = dir.path().join("fake_worker.sh");
    std::fs::write(
        &worker,
        r#"while [ $# -gt 0 ]; do
  case "$1" in
    --query_id) id="$2"; shift 2 ;;
    --queries_dir) queries="$2"; shift 2 ;;
    --images_dir) images="$2"; shift 2 ;;
    *) shift ;;
  esac
done
cp "$queries/$id.txt" "$images/$id.png"
"#,
    )
    .expect("write worker");

    let mut config = config_under(dir.path());
    config.submit_command = "bash".to_string();
    config.template.worker = WorkerInvocation {
        interpreter: "sh".to_string(),
        script: worker.display().to_string(),
        ..Default::default()
    };

    let mut progress = Vec::new();
    let output = generate_image(
        "a lantern\n\n\nin the fog",
        &config,
        &config.submitter(),
        &GenerationGate::default(),
        &CancellationToken::new(),
        |elapsed| progress.push(elapsed),
    )
    .await
    .expect("preparation succeeds")
    .expect("artifact produced");

    assert!(progress.is_empty());
    assert_eq!(output.extension().and_then(|e| e.to_str()), Some("png"));
    let contents = std::fs::read_to_string(&output).expect("read artifact");
    assert_eq!(contents, "a lantern\nin the fog");
}
