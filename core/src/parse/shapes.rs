//! Shared helpers for walking Voyager's inconsistent JSON shapes.
//!
//! Endpoints disagree about where the payload lives: some nest it under a
//! `data` object with references resolved against a flat `included` array,
//! some embed the entity directly, GraphQL responses add their own
//! envelope. Each parser declares an ordered list of shape matchers (pure
//! `&Value -> Option<T>` functions) and takes the first that produces
//! something.

use serde_json::Value;

/// Try matchers in priority order, returning the first non-empty result.
pub fn first_match<T>(root: &Value, matchers: &[fn(&Value) -> Option<T>]) -> Option<T> {
    matchers.iter().find_map(|m| m(root))
}

/// Like [`first_match`] for list-producing matchers: the first matcher that
/// yields at least one entity wins.
pub fn first_non_empty<T>(root: &Value, matchers: &[fn(&Value) -> Vec<T>]) -> Vec<T> {
    for matcher in matchers {
        let found = matcher(root);
        if !found.is_empty() {
            return found;
        }
    }
    Vec::new()
}

/// The flat `included` array of a normalized REST response, or empty.
pub fn included(root: &Value) -> &[Value] {
    root.get("included")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Entries of `included` whose `$type` ends with the given suffix.
pub fn included_of_type<'a>(root: &'a Value, type_suffix: &'a str) -> impl Iterator<Item = &'a Value> {
    included(root).iter().filter(move |entry| {
        entry
            .get("$type")
            .and_then(Value::as_str)
            .is_some_and(|t| t.ends_with(type_suffix))
    })
}

/// Resolve an URN reference against the `included` array by `entityUrn`.
pub fn resolve_ref<'a>(root: &'a Value, urn: &str) -> Option<&'a Value> {
    included(root)
        .iter()
        .find(|entry| entry.get("entityUrn").and_then(Value::as_str) == Some(urn))
}

/// String field, empty when absent or not a string.
pub fn str_field(value: &Value, field: &str) -> String {
    value
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Non-negative integer field, zero when absent.
pub fn count_field(value: &Value, field: &str) -> u32 {
    value
        .get(field)
        .and_then(Value::as_u64)
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
        .unwrap_or(0)
}

/// Epoch-milliseconds field, zero when absent.
pub fn timestamp_field(value: &Value, field: &str) -> i64 {
    value.get(field).and_then(Value::as_i64).unwrap_or(0)
}

/// Trailing id of an `urn:li:<type>:<id>` string.
pub fn urn_id(urn: &str) -> &str {
    urn.rsplit(':').next().unwrap_or(urn)
}

/// Username out of a profile navigation URL (`.../in/<username>[/...]`).
pub fn username_from_url(url: &str) -> String {
    let Some(rest) = url.split("/in/").nth(1) else {
        return String::new();
    };
    let username: &str = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    // Query-string noise sometimes survives in escaped URLs.
    urlencoding::decode(username)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| username.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_non_empty_respects_order() {
        let root = json!({});
        fn a(_: &Value) -> Vec<u32> {
            vec![]
        }
        fn b(_: &Value) -> Vec<u32> {
            vec![1, 2]
        }
        fn c(_: &Value) -> Vec<u32> {
            vec![9]
        }
        assert_eq!(first_non_empty(&root, &[a, b, c]), vec![1, 2]);
    }

    #[test]
    fn resolve_ref_matches_entity_urn() {
        let root = json!({
            "included": [
                {"entityUrn": "urn:li:fs_profile:1", "publicIdentifier": "one"},
                {"entityUrn": "urn:li:fs_profile:2", "publicIdentifier": "two"}
            ]
        });
        let hit = resolve_ref(&root, "urn:li:fs_profile:2");
        assert_eq!(
            hit.map(|v| str_field(v, "publicIdentifier")),
            Some("two".to_string())
        );
        assert!(resolve_ref(&root, "urn:li:fs_profile:3").is_none());
    }

    #[test]
    fn username_from_url_variants() {
        assert_eq!(username_from_url("https://www.linkedin.com/in/jane-doe"), "jane-doe");
        assert_eq!(username_from_url("/in/jane?miniProfileUrn=x"), "jane");
        assert_eq!(username_from_url("https://example.com/feed/"), "");
    }

    #[test]
    fn urn_id_takes_last_segment() {
        assert_eq!(urn_id("urn:li:fsd_profile:ACoAAB12"), "ACoAAB12");
        assert_eq!(urn_id("bare"), "bare");
    }
}
