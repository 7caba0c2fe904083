//! Correlation ID generation.
//!
//! Every artifact of a single generation request (prompt file, submission
//! script, scheduler logs, output image) is namespaced by one short random
//! identifier. The ID is a namespacing key, not a security token, so the
//! thread-local RNG is sufficient.

use rand::Rng;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default number of characters in a correlation ID.
///
/// 36^12 ≈ 4.7e18 possible IDs, so collisions among concurrently live
/// requests are negligible.
pub const DEFAULT_ID_LENGTH: usize = 12;

/// Default alphabet: lowercase ASCII letters followed by digits.
pub const DEFAULT_ID_ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz0123456789";

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Generate an ID of exactly `length` characters drawn uniformly, with
/// replacement, from `alphabet`.
///
/// Rejects a zero length or an empty alphabet.
pub fn generate_id(length: usize, alphabet: &str) -> Result<String, CoreError> {
    if length == 0 {
        return Err(CoreError::Validation(
            "Correlation ID length must be at least 1".to_string(),
        ));
    }

    let chars: Vec<char> = alphabet.chars().collect();
    if chars.is_empty() {
        return Err(CoreError::Validation(
            "Correlation ID alphabet must not be empty".to_string(),
        ));
    }

    Ok(sample(&chars, length))
}

/// Generate an ID with [`DEFAULT_ID_LENGTH`] and [`DEFAULT_ID_ALPHABET`].
pub fn new_query_id() -> String {
    let chars: Vec<char> = DEFAULT_ID_ALPHABET.chars().collect();
    sample(&chars, DEFAULT_ID_LENGTH)
}

/// Whether `id` is safe to embed in file names and shell scripts.
///
/// Accepts ASCII alphanumerics, hyphen and underscore, up to 64 characters.
pub fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// `chars` must be non-empty.
fn sample(chars: &[char], length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| chars[rng.random_range(0..chars.len())])
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
