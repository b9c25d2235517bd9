//! Offline query-ID refresh from a saved HAR capture.
//!
//! A browser session recorded while using LinkedIn normally contains the
//! GraphQL requests the frontend issued, query IDs included. For each
//! target operation the most recent matching request wins; request headers
//! and the `variables` parameter are captured opportunistically along the
//! way.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;
use crate::queryids::store::{QueryIdSnapshot, QueryIdStore};

const GRAPHQL_MARKER: &str = "/graphql";

/// Header names worth keeping from a captured request.
const INTERESTING_HEADERS: &[&str] = &["csrf-token", "x-li-lang", "x-li-page-instance", "x-restli-protocol-version"];

/// Refresh the store from `har_path` and persist the merged snapshot.
pub fn refresh_from_har(
    store: &QueryIdStore,
    operations: &[String],
    har_path: &Path,
) -> Result<QueryIdSnapshot> {
    let raw = fs::read_to_string(har_path)?;
    let har: Value = serde_json::from_str(&raw)?;
    let entries = har
        .pointer("/log/entries")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    let mut ids = BTreeMap::new();
    let mut headers = BTreeMap::new();
    let mut variables = BTreeMap::new();

    for operation in operations {
        let Some(entry) = latest_matching_entry(entries, operation) else {
            warn!(operation, har = %har_path.display(), "no captured request for operation");
            continue;
        };
        let request = &entry["request"];
        if let Some(id) = query_param(request, "queryId") {
            debug!(operation, id, "query ID taken from capture");
            ids.insert(operation.clone(), id);
        }
        if let Some(vars) = query_param(request, "variables") {
            variables.insert(operation.clone(), vars);
        }
        for (name, value) in request_headers(request) {
            headers.insert(name, value);
        }
    }

    store.merge_and_persist(
        ids,
        headers,
        variables,
        Some(har_path.display().to_string()),
    )
}

/// The most recent entry whose URL names both the GraphQL endpoint and the
/// operation. HAR `startedDateTime` is ISO-8601, so lexicographic order is
/// chronological.
fn latest_matching_entry<'a>(entries: &'a [Value], operation: &str) -> Option<&'a Value> {
    entries
        .iter()
        .filter(|entry| {
            entry
                .pointer("/request/url")
                .and_then(Value::as_str)
                .is_some_and(|url| url.contains(GRAPHQL_MARKER) && url.contains(operation))
        })
        .max_by_key(|entry| {
            entry
                .get("startedDateTime")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string()
        })
}

/// A query-string parameter, from the parsed `queryString` list or, failing
/// that, straight out of the URL.
fn query_param(request: &Value, name: &str) -> Option<String> {
    if let Some(params) = request.get("queryString").and_then(Value::as_array) {
        for param in params {
            if param.get("name").and_then(Value::as_str) == Some(name) {
                if let Some(value) = param.get("value").and_then(Value::as_str) {
                    return Some(decode(value));
                }
            }
        }
    }
    let url = request.get("url").and_then(Value::as_str)?;
    let rest = url.split(&format!("{name}=")).nth(1)?;
    let value: String = rest.chars().take_while(|c| *c != '&').collect();
    Some(decode(&value))
}

fn decode(value: &str) -> String {
    urlencoding::decode(value)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

fn request_headers(request: &Value) -> Vec<(String, String)> {
    let Some(headers) = request.get("headers").and_then(Value::as_array) else {
        return Vec::new();
    };
    headers
        .iter()
        .filter_map(|header| {
            let name = header.get("name").and_then(Value::as_str)?.to_ascii_lowercase();
            if !INTERESTING_HEADERS.contains(&name.as_str()) {
                return None;
            }
            let value = header.get("value").and_then(Value::as_str)?;
            Some((name, value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;

    fn har_with_entries(entries: Vec<Value>) -> Value {
        json!({"log": {"entries": entries}})
    }

    fn graphql_entry(started: &str, op: &str, hash: &str) -> Value {
        json!({
            "startedDateTime": started,
            "request": {
                "url": format!("https://www.linkedin.com/voyager/api/graphql?queryId={op}.{hash}&variables=(start:0)"),
                "queryString": [
                    {"name": "queryId", "value": format!("{op}.{hash}")},
                    {"name": "variables", "value": "(start:0)"}
                ],
                "headers": [
                    {"name": "Csrf-Token", "value": "ajax:1"},
                    {"name": "Cookie", "value": "li_at=secret"}
                ]
            }
        })
    }

    fn write_har(dir: &tempfile::TempDir, har: &Value) -> std::path::PathBuf {
        let path = dir.path().join("session.har");
        fs::write(&path, serde_json::to_string(har).unwrap()).unwrap();
        path
    }

    #[test]
    fn newest_capture_wins() {
        let dir = tempfile::tempdir().unwrap();
        let har = har_with_entries(vec![
            graphql_entry("2025-01-01T10:00:00.000Z", "opA", "old111"),
            graphql_entry("2025-02-01T10:00:00.000Z", "opA", "new222"),
        ]);
        let path = write_har(&dir, &har);
        let store = QueryIdStore::new(dir.path().join("queryids.json"));

        let snapshot = refresh_from_har(&store, &["opA".to_string()], &path).unwrap();
        assert_eq!(snapshot.ids.get("opA").map(String::as_str), Some("opA.new222"));
        assert_eq!(
            snapshot.variables.get("opA").map(String::as_str),
            Some("(start:0)")
        );
        // Session cookie must not leak into the persisted headers.
        assert!(!snapshot.headers.contains_key("cookie"));
        assert_eq!(
            snapshot.headers.get("csrf-token").map(String::as_str),
            Some("ajax:1")
        );
        // Persisted: a fresh store handle sees the same ID.
        assert_eq!(store.get_id("opA").as_deref(), Some("opA.new222"));
    }

    #[test]
    fn refresh_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let har = har_with_entries(vec![graphql_entry(
            "2025-01-01T10:00:00.000Z",
            "opA",
            "abc123",
        )]);
        let path = write_har(&dir, &har);
        let store = QueryIdStore::new(dir.path().join("queryids.json"));

        let first = refresh_from_har(&store, &["opA".to_string()], &path).unwrap();
        let second = refresh_from_har(&store, &["opA".to_string()], &path).unwrap();
        assert_eq!(first.ids, second.ids);
    }

    #[test]
    fn unmatched_operations_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let har = har_with_entries(vec![graphql_entry(
            "2025-01-01T10:00:00.000Z",
            "opA",
            "abc123",
        )]);
        let path = write_har(&dir, &har);
        let store = QueryIdStore::new(dir.path().join("queryids.json"));

        let snapshot =
            refresh_from_har(&store, &["opA".to_string(), "opMissing".to_string()], &path).unwrap();
        assert_eq!(snapshot.ids.len(), 1);
        assert!(!snapshot.ids.contains_key("opMissing"));
    }

    #[test]
    fn url_fallback_when_query_string_list_is_absent() {
        let request = json!({
            "url": "https://x/graphql?queryId=opB.fff999&variables=(q:1)"
        });
        assert_eq!(query_param(&request, "queryId").as_deref(), Some("opB.fff999"));
    }
}
