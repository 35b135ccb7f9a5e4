//! Identifier generation and parsing.
//!
//! Boards, messages, polls and join requests all get UUID v7 ids: unique
//! without coordination and time-sortable, so a board's message ids sort in
//! the same order the messages were appended.

use uuid::Uuid;

use crate::error::{BrainiacsError, BrainiacsResult};

/// Generate a new time-sortable id.
pub fn generate_id() -> Uuid {
    Uuid::now_v7()
}

/// Parse a client-supplied reference, naming the field in the validation error.
pub fn parse_id(raw: &str, field: &str) -> BrainiacsResult<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| BrainiacsError::validation(format!("'{field}' is not a valid id: {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_time_sortable() {
        let id1 = generate_id();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = generate_id();
        assert!(id1 < id2);
    }

    #[test]
    fn test_parse_id_rejects_garbage() {
        let id = generate_id();
        assert_eq!(parse_id(&format!(" {id} "), "userId").unwrap(), id);

        let err = parse_id("u1", "userId").unwrap_err();
        assert!(matches!(err, BrainiacsError::Validation { .. }));
        assert!(err.to_string().contains("userId"));
    }
}
