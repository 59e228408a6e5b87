//! Name validation for model declarations.
//!
//! Names are checked once, when the model is built, so the engine can treat
//! every name it sees as well-formed.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::ValidationError;

const NAME_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_\-]*$";

/// Upper bound on declared name length.
pub const MAX_NAME_LEN: usize = 128;

static NAME_REGEX: OnceLock<Regex> = OnceLock::new();

fn name_regex() -> Result<&'static Regex, ValidationError> {
    if let Some(re) = NAME_REGEX.get() {
        return Ok(re);
    }
    let compiled = Regex::new(NAME_PATTERN).map_err(|e| ValidationError::InvalidConfig {
        reason: format!("invalid name pattern '{NAME_PATTERN}': {e}"),
    })?;
    // Another thread may have initialized it while we compiled.
    Ok(NAME_REGEX.get_or_init(|| compiled))
}

/// Validates a declared name of the given kind ("flow", "function", ...).
pub(crate) fn validate_name(kind: &'static str, name: &str) -> Result<(), ValidationError> {
    if name.len() > MAX_NAME_LEN || !name_regex()?.is_match(name) {
        return Err(ValidationError::InvalidName {
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}
