//! Request materialization: the worker's input contract.
//!
//! The worker reads `<queries_dir>/<id>.txt` as plain UTF-8 text. That file
//! is the only thing it gets from us besides its command-line flags.

use std::path::{Path, PathBuf};

use imagen_core::prompt::normalize_newlines;
use imagen_core::request::{namespaced, PROMPT_EXTENSION};

use crate::error::DispatchError;

/// Write the newline-normalized prompt to `<queries_dir>/<id>.txt`.
///
/// Creates `queries_dir` (with parents) if needed and overwrites an existing
/// file of the same name.
pub async fn materialize(
    prompt_text: &str,
    queries_dir: &Path,
    id: &str,
) -> Result<PathBuf, DispatchError> {
    ensure_dir(queries_dir).await?;

    let path = namespaced(queries_dir, id, PROMPT_EXTENSION);
    let normalized = normalize_newlines(prompt_text);
    tokio::fs::write(&path, normalized.as_bytes())
        .await
        .map_err(|source| DispatchError::Write {
            path: path.clone(),
            source,
        })?;

    tracing::debug!(query_id = id, path = %path.display(), "Prompt file written");
    Ok(path)
}

/// Create `dir` and its parents unless it already exists.
pub(crate) async fn ensure_dir(dir: &Path) -> Result<(), DispatchError> {
    if tokio::fs::try_exists(dir).await.unwrap_or(false) {
        return Ok(());
    }

    tracing::info!(dir = %dir.display(), "Directory does not exist, creating it");
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| DispatchError::Directory {
            path: dir.to_path_buf(),
            source,
        })
}
