//! Input validation utilities.
//!
//! Centralized validation helpers used across API routes and gateway ops.

use validator::Validate;

use crate::error::BrainiacsError;

/// Validate a request body, returning a BrainiacsError::Validation on failure.
pub fn validate_request<T: Validate>(body: &T) -> Result<(), BrainiacsError> {
    body.validate()
        .map_err(|e| BrainiacsError::validation(format_validation_errors(e)))
}

/// Format validation errors into a human-readable string.
fn format_validation_errors(errors: validator::ValidationErrors) -> String {
    let mut messages = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for '{field}'"))
            })
        })
        .collect::<Vec<_>>();
    if messages.is_empty() {
        // Only nested (list/struct) errors, which field_errors() does not report.
        return errors.to_string();
    }
    messages.sort();
    messages.join("; ")
}

/// Reject empty or whitespace-only text, returning the trimmed value.
pub fn require_text<'a>(value: &'a str, field: &str) -> Result<&'a str, BrainiacsError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(BrainiacsError::validation(format!(
            "'{field}' cannot be empty or whitespace only"
        )));
    }
    Ok(trimmed)
}

/// Like [`require_text`] but also enforces a character limit.
pub fn bounded_text<'a>(value: &'a str, field: &str, max_chars: u32) -> Result<&'a str, BrainiacsError> {
    let trimmed = require_text(value, field)?;
    if trimmed.chars().count() > max_chars as usize {
        return Err(BrainiacsError::validation(format!(
            "'{field}' must be at most {max_chars} characters"
        )));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, Validate)]
    struct Probe {
        #[validate(length(min = 1, message = "name is required"))]
        name: String,
    }

    #[test]
    fn test_validate_request_uses_field_message() {
        let err = validate_request(&Probe { name: String::new() }).unwrap_err();
        assert_eq!(err.to_string(), "Validation failed: name is required");
    }

    #[test]
    fn test_bounded_text() {
        assert_eq!(bounded_text("  hi  ", "text", 10).unwrap(), "hi");
        assert!(bounded_text("   ", "text", 10).is_err());
        assert!(bounded_text("abcdef", "text", 5).is_err());
    }
}
