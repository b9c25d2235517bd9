//! Connection-list extraction from JSON responses.
//!
//! Two families are in circulation: the GraphQL search clusters shape used
//! by the current frontend, and the legacy `relationships/connections`
//! REST shape (both the direct `elements` form and the `data` + `included`
//! form). The GraphQL shape is tried first; the legacy shapes are kept as
//! fallbacks because some accounts still receive them.

use std::collections::HashSet;

use serde_json::Value;

use crate::models::{Connection, profile_url};
use crate::parse::localized::localized_field;
use crate::parse::profile::profile_from_entity;
use crate::parse::shapes::{
    count_field, first_non_empty, included_of_type, str_field, timestamp_field, username_from_url,
};

/// Parse a connections page. Deduplicates by username within this call;
/// multi-page callers must deduplicate again across pages.
pub fn parse_connections(root: &Value, web_base: &str) -> Vec<Connection> {
    let matchers: &[fn(&Value) -> Vec<Connection>] = &[
        match_search_clusters,
        match_legacy_elements,
        match_included_profiles,
    ];
    let mut connections = first_non_empty(root, matchers);
    for conn in &mut connections {
        if !conn.username.is_empty() {
            conn.profile_url = profile_url(web_base, &conn.username);
        }
    }
    dedupe_by_username(connections)
}

pub(crate) fn dedupe_by_username(connections: Vec<Connection>) -> Vec<Connection> {
    let mut seen = HashSet::new();
    connections
        .into_iter()
        .filter(|c| {
            let key = if c.username.is_empty() {
                // Fall back to a natural key when the handle is missing.
                format!("{}|{}", c.urn, c.display_name())
            } else {
                c.username.clone()
            };
            seen.insert(key)
        })
        .collect()
}

/// GraphQL `searchDashClustersByAll`: clusters of items, each wrapping an
/// `entityResult` with flattened display text.
fn match_search_clusters(root: &Value) -> Vec<Connection> {
    let Some(clusters) = root
        .get("data")
        .and_then(|d| d.get("searchDashClustersByAll"))
        .and_then(|s| s.get("elements"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    let mut found = Vec::new();
    for cluster in clusters {
        let items = cluster
            .get("items")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        for item in items {
            let Some(result) = item
                .get("item")
                .and_then(|i| i.get("entityResult"))
                .filter(|r| !r.is_null())
            else {
                continue;
            };
            let username = username_from_url(&str_field(result, "navigationUrl"));
            let title = result
                .get("title")
                .map(|t| str_field(t, "text"))
                .unwrap_or_default();
            let (first_name, last_name) = split_name(&title);
            found.push(Connection {
                urn: str_field(result, "trackingUrn"),
                username,
                first_name,
                last_name,
                headline: result
                    .get("primarySubtitle")
                    .map(|t| str_field(t, "text"))
                    .unwrap_or_default(),
                location: result
                    .get("secondarySubtitle")
                    .map(|t| str_field(t, "text"))
                    .unwrap_or_default(),
                ..Connection::default()
            });
        }
    }
    found
}

/// Legacy REST: `elements[]` each holding the member under
/// `connectedMember` or `miniProfile`, with `createdAt` on the wrapper.
fn match_legacy_elements(root: &Value) -> Vec<Connection> {
    let Some(elements) = root.get("elements").and_then(Value::as_array) else {
        return Vec::new();
    };
    elements
        .iter()
        .filter_map(|element| {
            let member = element
                .get("connectedMember")
                .or_else(|| element.get("miniProfile"))
                .unwrap_or(element);
            let mut conn = connection_from_member(member)?;
            conn.connected_at = timestamp_field(element, "createdAt");
            conn.shared_connections = count_field(element, "sharedConnectionsCount");
            Some(conn)
        })
        .collect()
}

/// `data` + `included`: take every included entry that looks like a
/// mini-profile. Connection metadata is not recoverable on this path.
fn match_included_profiles(root: &Value) -> Vec<Connection> {
    included_of_type(root, "MiniProfile")
        .filter_map(connection_from_member)
        .collect()
}

fn connection_from_member(member: &Value) -> Option<Connection> {
    let profile = profile_from_entity(member)?;
    Some(Connection {
        urn: profile.urn,
        username: profile.username,
        first_name: profile.first_name,
        last_name: profile.last_name,
        headline: if profile.headline.is_empty() {
            localized_field(member, "occupation")
        } else {
            profile.headline
        },
        location: profile.location,
        ..Connection::default()
    })
}

fn split_name(full: &str) -> (String, String) {
    match full.trim().split_once(' ') {
        Some((first, last)) => (first.to_string(), last.trim().to_string()),
        None => (full.trim().to_string(), String::new()),
    }
}
