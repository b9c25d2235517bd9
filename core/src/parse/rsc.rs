//! Extraction from server-streamed "RSC" payloads.
//!
//! Flagship endpoints answer with a stream of bracketed, partially-escaped
//! JS-like fragments rather than one JSON document, so extraction here is
//! regex/windowed-text based: locate a view-name literal unique to the
//! entity type, take a bounded window of the following text, and pull
//! sub-fields out of that window with secondary regexes. Every rule is a
//! named function so upstream drift costs one rule, not the parser.
//!
//! The loose entity pattern over-matches decorative UI blocks; an
//! allow-list of profile IDs harvested from the payload's "action slots"
//! section filters those out.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex_lite::Regex;
use tracing::debug;

use crate::models::{Connection, profile_url};
use crate::parse::connections::dedupe_by_username;

/// View-name literals that precede a connection entry. Checked in order;
/// the first marker with any occurrences wins.
const CONNECTION_MARKERS: &[&str] = &["connections-list-item", "ConnectionCard"];

/// Marker preceding the action-slot section the allow-list is built from.
const ACTION_SLOTS_MARKER: &str = "actionSlots";

/// Window sizes, in bytes, scanned after each marker occurrence.
const ENTITY_WINDOW: usize = 2000;
const ACTION_SLOT_WINDOW: usize = 1500;

static PROFILE_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"urn:li:fsd_profile:([A-Za-z0-9_-]+)").unwrap()
});

/// Profile URL inside a window. Slashes may arrive escaped (`\/` or
/// `\u002F`); [`unescape`] runs first so one plain pattern suffices.
static PROFILE_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"www\.linkedin\.com/in/([A-Za-z0-9%_.-]+)").unwrap()
});

/// Parse a flagship connections payload.
///
/// An HTML document (alternate template or anti-bot interstitial) is routed
/// to the mini-profile fallback pass; anything else goes through the RSC
/// window grammar.
pub fn parse_connections_from_rsc(payload: &str, web_base: &str) -> Vec<Connection> {
    if is_html(payload) {
        return parse_connections_from_html(payload, web_base);
    }
    let text = unescape(payload);
    let allowed = allowlist_from_action_slots(&text);
    debug!(allowed = allowed.len(), "rsc allow-list built");

    let mut found = Vec::new();
    for marker in CONNECTION_MARKERS {
        for window in windows_after(&text, marker, ENTITY_WINDOW) {
            if let Some(conn) = connection_from_window(window, &allowed, web_base) {
                found.push(conn);
            }
        }
        if !found.is_empty() {
            break;
        }
    }
    dedupe_by_username(found)
}

/// Allow-list of profile IDs taken from the action-slots section. Entries
/// of the main pass whose ID is not in this set are decorative.
pub(crate) fn allowlist_from_action_slots(text: &str) -> HashSet<String> {
    let mut allowed = HashSet::new();
    for window in windows_after(text, ACTION_SLOTS_MARKER, ACTION_SLOT_WINDOW) {
        for capture in PROFILE_ID_RE.captures_iter(window) {
            if let Some(id) = capture.get(1) {
                allowed.insert(id.as_str().to_string());
            }
        }
    }
    allowed
}

fn connection_from_window(
    window: &str,
    allowed: &HashSet<String>,
    web_base: &str,
) -> Option<Connection> {
    let id = rule_profile_id(window);
    if !allowed.is_empty() {
        match &id {
            Some(id) if allowed.contains(id) => {}
            _ => return None,
        }
    }

    let username = rule_profile_username(window)?;
    let (first_name, last_name) = split_name(&rule_display_name(window).unwrap_or_default());
    Some(Connection {
        urn: id.map(|i| format!("urn:li:fsd_profile:{i}")).unwrap_or_default(),
        profile_url: profile_url(web_base, &username),
        username,
        first_name,
        last_name,
        headline: rule_headline(window).unwrap_or_default(),
        ..Connection::default()
    })
}

/// First `urn:li:fsd_profile:` ID in the window.
pub(crate) fn rule_profile_id(window: &str) -> Option<String> {
    PROFILE_ID_RE
        .captures(window)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Username from the first profile URL in the window.
pub(crate) fn rule_profile_username(window: &str) -> Option<String> {
    let raw = PROFILE_URL_RE
        .captures(window)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())?;
    Some(
        urlencoding::decode(raw)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| raw.to_string()),
    )
}

/// Display name from the first name-bearing key in the window.
pub(crate) fn rule_display_name(window: &str) -> Option<String> {
    first_kv(window, &["memberName", "title", "text"])
}

/// Headline from the first headline-bearing key in the window.
pub(crate) fn rule_headline(window: &str) -> Option<String> {
    first_kv(window, &["memberHeadline", "headline", "subtitle"])
}

/// First non-empty `"<key>":"<value>"` pair among the given keys.
pub(crate) fn first_kv(window: &str, keys: &[&str]) -> Option<String> {
    for key in keys {
        // Patterns are tiny and the key set is fixed; compiling per call
        // keeps the rule table declarative.
        let Ok(re) = Regex::new(&format!(r#""{key}"\s*:\s*"([^"]+)""#)) else {
            continue;
        };
        if let Some(value) = re.captures(window).and_then(|c| c.get(1)) {
            let value = value.as_str().trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Ordered `"children":"..."` text fragments in a window. Secondary
/// grammar input for payloads that moved data into generic component
/// trees.
pub(crate) fn children_texts(window: &str) -> Vec<String> {
    static CHILDREN_RE: LazyLock<Regex> = LazyLock::new(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r#""children"\s*:\s*"([^"]+)""#).unwrap()
    });
    CHILDREN_RE
        .captures_iter(window)
        .filter_map(|c| c.get(1).map(|m| m.as_str().trim().to_string()))
        .filter(|s| !s.is_empty())
        .collect()
}

/// Raw-HTML fallback: scan embedded `"miniProfile": {...}` JSON fragments.
pub(crate) fn parse_connections_from_html(payload: &str, web_base: &str) -> Vec<Connection> {
    let text = unescape(payload);
    let mut found = Vec::new();
    for window in windows_after(&text, "\"miniProfile\"", 800) {
        let Some(username) = first_kv(window, &["publicIdentifier"]) else {
            continue;
        };
        let first_name = first_kv(window, &["firstName"]).unwrap_or_default();
        let last_name = first_kv(window, &["lastName"]).unwrap_or_default();
        found.push(Connection {
            urn: rule_profile_id(window)
                .map(|i| format!("urn:li:fsd_profile:{i}"))
                .unwrap_or_default(),
            profile_url: profile_url(web_base, &username),
            username,
            first_name,
            last_name,
            headline: first_kv(window, &["occupation", "headline"]).unwrap_or_default(),
            ..Connection::default()
        });
    }
    dedupe_by_username(found)
}

pub(crate) fn is_html(payload: &str) -> bool {
    let head = payload.trim_start();
    head.starts_with("<!DOCTYPE") || head.starts_with("<!doctype") || head.starts_with("<html")
}

/// Normalize the stream's escaping so downstream regexes see plain text:
/// `\"` becomes `"`, and the `\/` and `\u002F` slash forms become `/`.
pub(crate) fn unescape(payload: &str) -> String {
    payload
        .replace("\\u002F", "/")
        .replace("\\u002f", "/")
        .replace("\\/", "/")
        .replace("\\\"", "\"")
}

/// Bounded windows of text following each occurrence of `marker`.
pub(crate) fn windows_after<'a>(
    text: &'a str,
    marker: &'a str,
    window: usize,
) -> impl Iterator<Item = &'a str> + 'a {
    text.match_indices(marker).map(move |(idx, m)| {
        let start = idx + m.len();
        let mut end = (start + window).min(text.len());
        // Stay on a char boundary; the payload can contain multi-byte text.
        while end < text.len() && !text.is_char_boundary(end) {
            end += 1;
        }
        &text[start..end]
    })
}

fn split_name(full: &str) -> (String, String) {
    match full.trim().split_once(' ') {
        Some((first, last)) => (first.to_string(), last.trim().to_string()),
        None => (full.trim().to_string(), String::new()),
    }
}
