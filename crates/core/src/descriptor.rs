//! Grid Engine submission-script templating.
//!
//! [`render_descriptor`] is a pure function: the same request, template and
//! render context always produce the same script text. Writing the script to
//! disk is the caller's concern.

use std::path::Path;

use crate::error::CoreError;
use crate::request::{namespaced, JobRequest, STDERR_EXTENSION, STDOUT_EXTENSION};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Script exit code when changing into the submitting working directory fails.
pub const EXIT_CHDIR_FAILED: i32 = 1;

/// Script exit code when sourcing the worker's environment activation fails.
pub const EXIT_ACTIVATION_FAILED: i32 = 2;

/// Default GPU memory reservation in gigabytes.
pub const DEFAULT_GPU_RAM_GB: u32 = 16;

/// Default queue selector.
pub const DEFAULT_QUEUE: &str = "long.q@*";

/// Default job-name prefix; the job name is `<prefix>_<id>`.
pub const DEFAULT_JOB_NAME_PREFIX: &str = "stabDiff";

// ---------------------------------------------------------------------------
// Template configuration
// ---------------------------------------------------------------------------

/// Resource reservation encoded in the `#$ -l` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSpec {
    pub gpus: u32,
    pub gpu_ram_gb: u32,
    pub mem_free_gb: u32,
    pub ram_free_gb: u32,
    pub cpus: u32,
    /// Site-specific tokens prepended verbatim, e.g. `matylda3=0.01`.
    pub extra: Vec<String>,
}

impl Default for ResourceSpec {
    fn default() -> Self {
        Self {
            gpus: 1,
            gpu_ram_gb: DEFAULT_GPU_RAM_GB,
            mem_free_gb: 20,
            ram_free_gb: 32,
            cpus: 1,
            extra: Vec::new(),
        }
    }
}

impl ResourceSpec {
    /// Comma-separated resource list, e.g.
    /// `gpu=1,gpu_ram=16G,mem_free=20G,ram_free=32G,cpu=1`.
    pub fn directive_value(&self) -> String {
        let mut parts = self.extra.clone();
        parts.push(format!("gpu={}", self.gpus));
        parts.push(format!("gpu_ram={}G", self.gpu_ram_gb));
        parts.push(format!("mem_free={}G", self.mem_free_gb));
        parts.push(format!("ram_free={}G", self.ram_free_gb));
        parts.push(format!("cpu={}", self.cpus));
        parts.join(",")
    }
}

/// Scheduler metadata that does not depend on the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSpec {
    /// Interpreter for both the shebang and the `-S` directive.
    pub shell: String,
    pub job_name_prefix: String,
    pub queue: String,
}

impl Default for SchedulerSpec {
    fn default() -> Self {
        Self {
            shell: "/bin/bash".to_string(),
            job_name_prefix: DEFAULT_JOB_NAME_PREFIX.to_string(),
            queue: DEFAULT_QUEUE.to_string(),
        }
    }
}

/// How the cluster node launches the image-generation worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerInvocation {
    /// Program that runs the worker script, e.g. `python`.
    pub interpreter: String,
    /// Worker script path, relative to the submitting working directory.
    pub script: String,
    /// Optional environment activation script sourced before the worker runs.
    pub env_activation: Option<String>,
    /// Additional flags appended after the directory arguments.
    pub extra_args: Vec<String>,
}

impl Default for WorkerInvocation {
    fn default() -> Self {
        Self {
            interpreter: "python".to_string(),
            script: "hf_generate.py".to_string(),
            env_activation: None,
            extra_args: Vec::new(),
        }
    }
}

/// Everything needed to render a submission script, apart from the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorTemplate {
    pub scheduler: SchedulerSpec,
    pub resources: ResourceSpec,
    pub worker: WorkerInvocation,
}

/// Values captured from the submitting process at build time.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    /// Directory the job changes into before launching the worker.
    pub working_dir: &'a Path,
    /// Absolute scheduler-output directory for the `-o`/`-e` directives.
    pub scheduler_output_dir: &'a Path,
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Scheduler job name: `<prefix>_<id>`.
pub fn job_name(prefix: &str, id: &str) -> String {
    format!("{prefix}_{id}")
}

/// Render the complete submission script for `request`.
pub fn render_descriptor(
    request: &JobRequest,
    template: &DescriptorTemplate,
    ctx: &RenderContext<'_>,
) -> String {
    let id = request.id();
    let scheduler = &template.scheduler;
    let worker = &template.worker;
    let stdout_path = namespaced(ctx.scheduler_output_dir, id, STDOUT_EXTENSION);
    let stderr_path = namespaced(ctx.scheduler_output_dir, id, STDERR_EXTENSION);

    let mut script = String::new();

    // Directives.
    script.push_str(&format!("#!{}\n", scheduler.shell));
    script.push_str(&format!("#$ -S {}\n", scheduler.shell));
    script.push_str(&format!(
        "#$ -N {}\n",
        job_name(&scheduler.job_name_prefix, id)
    ));
    script.push_str(&format!("#$ -o {}\n", stdout_path.display()));
    script.push_str(&format!("#$ -e {}\n", stderr_path.display()));
    script.push_str(&format!("#$ -q {}\n", scheduler.queue));
    script.push_str(&format!(
        "#$ -l {}\n",
        template.resources.directive_value()
    ));

    // Body.
    script.push_str("\n\n");
    script.push_str(&format!("query_id={id}\n"));
    script.push_str(&format!(
        "cd {} || {{ exit {EXIT_CHDIR_FAILED} ; }}\n",
        shell_quote(&ctx.working_dir.display().to_string())
    ));
    if let Some(activation) = &worker.env_activation {
        script.push_str(&format!(
            "source {} || {{ exit {EXIT_ACTIVATION_FAILED} ; }}\n",
            shell_quote(activation)
        ));
    }

    let dirs = request.dirs();
    let mut lines = vec![format!(
        "{} {} --query_id ${{query_id}}",
        shell_quote(&worker.interpreter),
        shell_quote(&worker.script)
    )];
    lines.push(format!(
        "--queries_dir {}",
        shell_quote(&dirs.queries.display().to_string())
    ));
    lines.push(format!(
        "--images_dir {}",
        shell_quote(&dirs.images.display().to_string())
    ));
    lines.extend(worker.extra_args.iter().map(|arg| shell_quote(arg)));
    script.push_str(&lines.join(" \\\n    "));
    script.push_str("\n\n");

    script
}

/// `#$ -o`/`#$ -e` paths are read by the scheduler, not the shell, and cannot
/// be quoted. A path containing whitespace would be split into two arguments.
pub fn check_directive_path(path: &Path) -> Result<(), CoreError> {
    if path.to_string_lossy().chars().any(char::is_whitespace) {
        return Err(CoreError::Validation(format!(
            "Scheduler output directory must not contain whitespace: {}",
            path.display()
        )));
    }
    Ok(())
}

/// Single-quote `value` unless it consists only of characters the shell
/// passes through untouched.
pub fn shell_quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-=:@+,".contains(c));
    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
