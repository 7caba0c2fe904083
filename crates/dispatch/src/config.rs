use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use imagen_core::descriptor::{
    DescriptorTemplate, ResourceSpec, SchedulerSpec, WorkerInvocation, DEFAULT_GPU_RAM_GB,
    DEFAULT_JOB_NAME_PREFIX, DEFAULT_QUEUE,
};
use imagen_core::request::JobDirs;
use imagen_core::scheduler::qsub::{QsubSubmitter, DEFAULT_SUBMIT_COMMAND, DEFAULT_SUBMIT_TIMEOUT};

use crate::poller::{PollSettings, DEFAULT_TIMEOUT_STEPS, DEFAULT_TIME_STEP};

/// Dispatch configuration loaded from environment variables.
///
/// All fields have defaults matching the cluster layout the worker expects.
#[derive(Debug, Clone)]
pub struct ImagenConfig {
    pub dirs: JobDirs,
    pub template: DescriptorTemplate,
    pub poll: PollSettings,
    /// Scheduler submission command (default: `qsub`).
    pub submit_command: String,
    /// Wall-clock limit for the submission command (default: 120 s).
    pub submit_timeout: Duration,
}

impl Default for ImagenConfig {
    fn default() -> Self {
        Self {
            dirs: JobDirs::default(),
            template: DescriptorTemplate::default(),
            poll: PollSettings::default(),
            submit_command: DEFAULT_SUBMIT_COMMAND.to_string(),
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} has invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl ImagenConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default          |
    /// |------------------------------|------------------|
    /// | `IMAGEN_QUERIES_DIR`         | `queries`        |
    /// | `IMAGEN_IMAGES_DIR`          | `images`         |
    /// | `IMAGEN_SCRIPTS_DIR`         | `sh`             |
    /// | `IMAGEN_SGE_OUT_DIR`         | `sge_out`        |
    /// | `IMAGEN_TIME_STEP_SECS`      | `30`             |
    /// | `IMAGEN_TIMEOUT_STEPS`       | `20`             |
    /// | `IMAGEN_GPU_RAM_GB`          | `16`             |
    /// | `IMAGEN_QUEUE`               | `long.q@*`       |
    /// | `IMAGEN_JOB_PREFIX`          | `stabDiff`       |
    /// | `IMAGEN_EXTRA_RESOURCES`     | (none)           |
    /// | `IMAGEN_SUBMIT_COMMAND`      | `qsub`           |
    /// | `IMAGEN_SUBMIT_TIMEOUT_SECS` | `120`            |
    /// | `IMAGEN_INTERPRETER`         | `python`         |
    /// | `IMAGEN_WORKER_SCRIPT`       | `hf_generate.py` |
    /// | `IMAGEN_ENV_ACTIVATE`        | (none)           |
    /// | `IMAGEN_WORKER_ARGS`         | (none)           |
    ///
    /// `IMAGEN_EXTRA_RESOURCES` is comma-separated; `IMAGEN_WORKER_ARGS` is
    /// whitespace-separated.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let path = |key: &str, default: &str| PathBuf::from(text(key, default));

        let dirs = JobDirs {
            queries: path("IMAGEN_QUERIES_DIR", "queries"),
            images: path("IMAGEN_IMAGES_DIR", "images"),
            scripts: path("IMAGEN_SCRIPTS_DIR", "sh"),
            scheduler_output: path("IMAGEN_SGE_OUT_DIR", "sge_out"),
        };

        let poll = PollSettings {
            time_step: positive_secs(&lookup, "IMAGEN_TIME_STEP_SECS", DEFAULT_TIME_STEP)?,
            timeout_steps: parse(&lookup, "IMAGEN_TIMEOUT_STEPS", DEFAULT_TIMEOUT_STEPS)?,
        };
        if poll.time_step.checked_mul(poll.timeout_steps).is_none() {
            return Err(ConfigError::Invalid {
                key: "IMAGEN_TIMEOUT_STEPS",
                value: poll.timeout_steps.to_string(),
                reason: format!(
                    "total wait of {} steps of {}s overflows",
                    poll.timeout_steps,
                    poll.time_step.as_secs()
                ),
            });
        }

        let resources = ResourceSpec {
            gpu_ram_gb: parse(&lookup, "IMAGEN_GPU_RAM_GB", DEFAULT_GPU_RAM_GB)?,
            extra: lookup("IMAGEN_EXTRA_RESOURCES")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            ..Default::default()
        };

        let scheduler = SchedulerSpec {
            job_name_prefix: text("IMAGEN_JOB_PREFIX", DEFAULT_JOB_NAME_PREFIX),
            queue: text("IMAGEN_QUEUE", DEFAULT_QUEUE),
            ..Default::default()
        };

        let worker = WorkerInvocation {
            interpreter: text("IMAGEN_INTERPRETER", "python"),
            script: text("IMAGEN_WORKER_SCRIPT", "hf_generate.py"),
            env_activation: lookup("IMAGEN_ENV_ACTIVATE").filter(|v| !v.trim().is_empty()),
            extra_args: lookup("IMAGEN_WORKER_ARGS")
                .map(|v| v.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
        };

        Ok(Self {
            dirs,
            template: DescriptorTemplate {
                scheduler,
                resources,
                worker,
            },
            poll,
            submit_command: text("IMAGEN_SUBMIT_COMMAND", DEFAULT_SUBMIT_COMMAND),
            submit_timeout: positive_secs(
                &lookup,
                "IMAGEN_SUBMIT_TIMEOUT_SECS",
                DEFAULT_SUBMIT_TIMEOUT,
            )?,
        })
    }

    /// The scheduler submitter described by this configuration.
    pub fn submitter(&self) -> QsubSubmitter {
        QsubSubmitter::new(self.submit_command.clone(), self.submit_timeout)
    }
}

fn parse<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

/// A whole number of seconds that must be at least 1.
fn positive_secs<F>(
    lookup: &F,
    key: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match parse(lookup, key, default.as_secs())? {
        0 => Err(ConfigError::Invalid {
            key,
            value: "0".to_string(),
            reason: "must be at least 1".to_string(),
        }),
        secs => Ok(Duration::from_secs(secs)),
    }
}
