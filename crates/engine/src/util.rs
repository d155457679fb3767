//! Internal helpers for model validation and conversion.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation and mapping logic so the engine enforces consistent invariants.

use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value).map_err(|_| EngineError::InvalidId(format!("invalid {label} id")))
}

/// Trim a required text field, rejecting blank values.
pub(crate) fn normalize_required_text(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidInput(format!(
            "{label} must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

/// Trim an optional text field, mapping blank values to `None`.
pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Deduplicate member ids preserving first-seen order.
///
/// The resulting order is the recorded participant order, which decides who
/// absorbs the rounding remainder of a split.
pub(crate) fn normalize_member_ids(ids: &[String]) -> ResultEngine<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        let id = id.trim();
        if id.is_empty() {
            return Err(EngineError::InvalidEvent(
                "member id must not be empty".to_string(),
            ));
        }
        if !out.iter().any(|seen| seen == id) {
            out.push(id.to_string());
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_ids_are_deduplicated_in_order() {
        let ids = ["b", " a", "b", "c", "a"].map(String::from);
        assert_eq!(normalize_member_ids(&ids).unwrap(), vec!["b", "a", "c"]);
    }

    #[test]
    fn blank_member_id_is_rejected() {
        let ids = ["a", "  "].map(String::from);
        assert!(matches!(
            normalize_member_ids(&ids),
            Err(EngineError::InvalidEvent(_))
        ));
    }

    #[test]
    fn optional_text_drops_blank() {
        assert_eq!(normalize_optional_text(Some("  ")), None);
        assert_eq!(normalize_optional_text(Some(" x ")), Some("x".to_string()));
    }
}
