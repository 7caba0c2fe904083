//! Writes the rendered submission script to `<sh_dir>/<id>.sh`.

use std::path::PathBuf;

use imagen_core::descriptor::{
    check_directive_path, render_descriptor, DescriptorTemplate, RenderContext,
};
use imagen_core::request::JobRequest;

use crate::error::DispatchError;
use crate::materialize::ensure_dir;

/// A submission script as written to disk. Never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescriptor {
    pub text: String,
    pub path: PathBuf,
}

/// Render and write the submission script for `request`.
///
/// Ensures the scripts and scheduler-output directories exist, captures the
/// current working directory and the absolute scheduler-output path, then
/// writes the script. A failed write is fatal to this attempt. A
/// scheduler-output path containing whitespace is rejected before anything
/// is created.
pub async fn build_descriptor(
    request: &JobRequest,
    template: &DescriptorTemplate,
) -> Result<JobDescriptor, DispatchError> {
    let dirs = request.dirs();
    let scheduler_output_dir =
        std::path::absolute(&dirs.scheduler_output).map_err(|source| DispatchError::Directory {
            path: dirs.scheduler_output.clone(),
            source,
        })?;
    check_directive_path(&scheduler_output_dir)?;

    ensure_dir(&dirs.scripts).await?;
    ensure_dir(&dirs.scheduler_output).await?;

    let working_dir = std::env::current_dir().map_err(DispatchError::WorkingDirectory)?;

    let text = render_descriptor(
        request,
        template,
        &RenderContext {
            working_dir: &working_dir,
            scheduler_output_dir: &scheduler_output_dir,
        },
    );

    let path = request.script_path();
    tokio::fs::write(&path, text.as_bytes())
        .await
        .map_err(|source| DispatchError::Write {
            path: path.clone(),
            source,
        })?;

    tracing::debug!(query_id = request.id(), path = %path.display(), "Submission script written");
    Ok(JobDescriptor { text, path })
}
