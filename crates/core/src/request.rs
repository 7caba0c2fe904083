//! Per-request identity and path derivation.
//!
//! A [`JobRequest`] ties a normalized prompt to a correlation ID and the set
//! of base directories. Every artifact path of the request is derived from
//! those two inputs alone, so two requests with different IDs never touch
//! the same files.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::correlation::{is_safe_id, new_query_id};
use crate::error::CoreError;
use crate::prompt::{normalize_newlines, validate_prompt};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Extension of the prompt file read by the worker.
pub const PROMPT_EXTENSION: &str = "txt";

/// Extension of the scheduler submission script.
pub const SCRIPT_EXTENSION: &str = "sh";

/// Extension of the image written by the worker.
pub const ARTIFACT_EXTENSION: &str = "png";

/// Extension of the scheduler's stdout capture.
pub const STDOUT_EXTENSION: &str = "out";

/// Extension of the scheduler's stderr capture.
pub const STDERR_EXTENSION: &str = "err";

// ---------------------------------------------------------------------------
// Directories
// ---------------------------------------------------------------------------

/// Base directories under which request artifacts are namespaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobDirs {
    /// Prompt files (`<id>.txt`).
    pub queries: PathBuf,
    /// Output images (`<id>.png`), written by the worker.
    pub images: PathBuf,
    /// Submission scripts (`<id>.sh`).
    pub scripts: PathBuf,
    /// Scheduler stdout/stderr captures (`<id>.out`, `<id>.err`).
    pub scheduler_output: PathBuf,
}

impl Default for JobDirs {
    fn default() -> Self {
        Self {
            queries: PathBuf::from("queries"),
            images: PathBuf::from("images"),
            scripts: PathBuf::from("sh"),
            scheduler_output: PathBuf::from("sge_out"),
        }
    }
}

impl JobDirs {
    /// The default directory names placed under `root`.
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let defaults = Self::default();
        Self {
            queries: root.join(defaults.queries),
            images: root.join(defaults.images),
            scripts: root.join(defaults.scripts),
            scheduler_output: root.join(defaults.scheduler_output),
        }
    }

    pub fn prompt_path(&self, id: &str) -> PathBuf {
        namespaced(&self.queries, id, PROMPT_EXTENSION)
    }

    pub fn script_path(&self, id: &str) -> PathBuf {
        namespaced(&self.scripts, id, SCRIPT_EXTENSION)
    }

    pub fn artifact_path(&self, id: &str) -> PathBuf {
        namespaced(&self.images, id, ARTIFACT_EXTENSION)
    }
}

/// `<dir>/<id>.<extension>`
pub fn namespaced(dir: &Path, id: &str, extension: &str) -> PathBuf {
    dir.join(format!("{id}.{extension}"))
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// One text-to-image request. Immutable after construction.
#[derive(Debug, Clone)]
pub struct JobRequest {
    prompt: String,
    id: String,
    dirs: JobDirs,
}

impl JobRequest {
    /// Create a request with a freshly generated correlation ID.
    pub fn new(prompt: &str, dirs: JobDirs) -> Result<Self, CoreError> {
        Self::with_id(prompt, new_query_id(), dirs)
    }

    /// Create a request with a caller-chosen correlation ID.
    ///
    /// The ID must pass [`is_safe_id`] since it is embedded in file names
    /// and in the generated shell script.
    pub fn with_id(prompt: &str, id: impl Into<String>, dirs: JobDirs) -> Result<Self, CoreError> {
        validate_prompt(prompt)?;
        let id = id.into();
        if !is_safe_id(&id) {
            return Err(CoreError::Validation(format!(
                "Correlation ID '{id}' contains characters unsafe for file names"
            )));
        }

        Ok(Self {
            prompt: normalize_newlines(prompt),
            id,
            dirs,
        })
    }

    /// The prompt with newline runs collapsed.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dirs(&self) -> &JobDirs {
        &self.dirs
    }

    pub fn prompt_path(&self) -> PathBuf {
        self.dirs.prompt_path(&self.id)
    }

    pub fn script_path(&self) -> PathBuf {
        self.dirs.script_path(&self.id)
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.dirs.artifact_path(&self.id)
    }

    /// The externally observable identity of this request once submitted.
    pub fn handle(&self) -> JobHandle {
        JobHandle {
            query_id: self.id.clone(),
            script_path: self.script_path(),
            artifact_path: self.artifact_path(),
        }
    }
}

/// Identity of one generation attempt: what was submitted and what the
/// poller waits for. Not persisted or reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobHandle {
    pub query_id: String,
    pub script_path: PathBuf,
    pub artifact_path: PathBuf,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
