use std::collections::HashSet;

use serde::Deserialize;
use uuid::Uuid;

use crate::error::ServiceError;

/// An identifier as clients are allowed to spell it: a raw id string, or
/// an object carrying the id under `_id` or `id` (the shape produced when
/// a previously-populated entity is sent back). Anything else is carried
/// as [`IdRef::Other`] and dropped during normalization.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IdRef {
    Text(String),
    Wrapped(WrappedId),
    Other(serde_json::Value),
}

#[derive(Debug, Clone, Deserialize)]
pub struct WrappedId {
    #[serde(rename = "_id", alias = "id")]
    id: String,
}

impl IdRef {
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            IdRef::Text(text) => Uuid::parse_str(text.trim()).ok(),
            IdRef::Wrapped(wrapped) => Uuid::parse_str(wrapped.id.trim()).ok(),
            IdRef::Other(_) => None,
        }
    }
}

/// Canonicalizes a client-supplied id list: invalid entries are dropped,
/// duplicates removed, first-seen order kept.
pub fn normalize_ids(refs: &[IdRef]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();

    for r in refs {
        if let Some(id) = r.as_uuid() {
            if seen.insert(id) {
                ids.push(id);
            }
        }
    }

    ids
}

/// Normalization for assign/remove operations, which require at least one
/// usable id.
pub fn normalize_required(refs: &[IdRef], what: &str) -> Result<Vec<Uuid>, ServiceError> {
    if refs.is_empty() {
        return Err(ServiceError::Validation(format!(
            "{} id list must not be empty",
            what
        )));
    }

    let ids = normalize_ids(refs);
    if ids.is_empty() {
        return Err(ServiceError::Validation(format!(
            "{} id list contains no valid ids",
            what
        )));
    }

    Ok(ids)
}

/// Normalization for wholesale replacement. An empty input clears the
/// relation; a non-empty input that normalizes to nothing is a caller
/// error, not a request to clear everything.
pub fn normalize_replacement(refs: &[IdRef], what: &str) -> Result<Vec<Uuid>, ServiceError> {
    let ids = normalize_ids(refs);

    if ids.is_empty() && !refs.is_empty() {
        return Err(ServiceError::Validation(format!(
            "{} id list contains no valid ids",
            what
        )));
    }

    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Vec<IdRef> {
        serde_json::from_str(json).expect("valid JSON id list")
    }

    #[test]
    fn accepts_raw_wrapped_and_underscore_shapes() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let refs = parse(&format!(
            r#"[{{"_id":"{a}"}}, "{a}", {{"id":"{b}"}}, null, {{}}]"#,
            a = a,
            b = b
        ));

        let ids = normalize_ids(&refs);
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn drops_garbage_silently() {
        let refs = parse(r#"["definitely-not-a-uuid", 42, {"name":"x"}, true]"#);
        assert!(normalize_ids(&refs).is_empty());
    }

    #[test]
    fn required_rejects_empty_and_all_garbage_input() {
        assert!(matches!(
            normalize_required(&[], "student"),
            Err(ServiceError::Validation(_))
        ));

        let refs = parse(r#"[{}, null]"#);
        assert!(matches!(
            normalize_required(&refs, "student"),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn replacement_allows_clearing_but_not_garbage() {
        assert_eq!(normalize_replacement(&[], "batch").unwrap(), vec![]);

        let refs = parse(r#"["nope"]"#);
        assert!(matches!(
            normalize_replacement(&refs, "batch"),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn duplicates_collapse_to_first_occurrence() {
        let a = Uuid::new_v4();
        let refs = parse(&format!(r#"["{a}", {{"_id":"{a}"}}, "{a}"]"#, a = a));
        assert_eq!(normalize_ids(&refs), vec![a]);
    }
}
