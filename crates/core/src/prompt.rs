//! Prompt text validation and normalization.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;

/// Compiled regex matching one or more consecutive newline characters.
static NEWLINE_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n+").expect("valid regex"));

/// Collapse every run of `\n` characters into a single `\n`.
///
/// Idempotent: normalizing an already-normalized string is a no-op.
pub fn normalize_newlines(text: &str) -> String {
    NEWLINE_RUN_RE.replace_all(text, "\n").into_owned()
}

/// A prompt must contain at least one non-whitespace character. Text made
/// only of spaces, tabs or newlines counts as empty.
pub fn validate_prompt(text: &str) -> Result<(), CoreError> {
    if text.trim().is_empty() {
        return Err(CoreError::Validation(
            "Prompt must not be empty".to_string(),
        ));
    }
    Ok(())
}
