//! Invitation extraction.
//!
//! The REST shape still carries tagged fields, and older flagship payloads
//! do too. After the invitations UI moved to generic component trees the
//! tagged fields disappeared, so a second-tier heuristic walks the ordered
//! `children` text fragments of each invitation block, excluding known
//! boilerplate, and guesses which fragment is the name, headline, and
//! message. Relative send dates ("Today", "3 weeks ago") are converted to
//! absolute timestamps at parse time.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use regex_lite::Regex;
use serde_json::Value;
use tracing::debug;

use crate::models::{Invitation, Profile};
use crate::parse::profile::profile_from_entity;
use crate::parse::rsc::{
    children_texts, first_kv, is_html, parse_connections_from_html, rule_profile_id,
    rule_profile_username, unescape, windows_after,
};
use crate::parse::shapes::{first_non_empty, included_of_type, str_field, timestamp_field};

const INVITATION_MARKERS: &[&str] = &["invitation-card", "InvitationCard"];
const INVITATION_WINDOW: usize = 2500;

static RELATIVE_AGO_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^(\d+)\s+(minute|hour|day|week)s?\s+ago$").unwrap()
});

/// Parse a pending-invitations JSON response (legacy REST shapes).
pub fn parse_invitations(root: &Value, web_base: &str) -> Vec<Invitation> {
    let matchers: &[fn(&Value) -> Vec<Invitation>] = &[match_elements, match_included];
    let found = first_non_empty(root, matchers)
        .into_iter()
        .map(|mut inv| {
            inv.inviter = inv.inviter.with_profile_url(web_base);
            inv
        })
        .collect();
    dedupe_by_inviter(found)
}

fn match_elements(root: &Value) -> Vec<Invitation> {
    let Some(elements) = root.get("elements").and_then(Value::as_array) else {
        return Vec::new();
    };
    elements.iter().filter_map(invitation_from_entity).collect()
}

fn match_included(root: &Value) -> Vec<Invitation> {
    included_of_type(root, "Invitation")
        .filter_map(invitation_from_entity)
        .collect()
}

fn invitation_from_entity(entity: &Value) -> Option<Invitation> {
    let member = entity
        .get("fromMember")
        .or_else(|| entity.get("miniProfile"))
        .or_else(|| entity.pointer("/genericInvitationView/fromMember"))?;
    let inviter = profile_from_entity(member)?;
    Some(Invitation {
        urn: str_field(entity, "entityUrn"),
        inviter,
        message: str_field(entity, "message"),
        sent_at: timestamp_field(entity, "sentTime"),
        shared_connections: 0,
    })
}

/// Parse invitations out of a flagship RSC payload.
///
/// Primary strategy: tagged fields inside each invitation window.
/// Secondary: the children-text heuristic, used only when the primary pass
/// finds nothing at all.
pub fn parse_invitations_from_flagship_rsc(payload: &str, web_base: &str) -> Vec<Invitation> {
    parse_invitations_from_flagship_rsc_at(payload, web_base, Utc::now())
}

/// Deterministic-clock variant of [`parse_invitations_from_flagship_rsc`].
pub fn parse_invitations_from_flagship_rsc_at(
    payload: &str,
    web_base: &str,
    now: DateTime<Utc>,
) -> Vec<Invitation> {
    if is_html(payload) {
        // Anti-bot HTML template: salvage whatever mini-profiles survive.
        return parse_connections_from_html(payload, web_base)
            .into_iter()
            .map(|conn| Invitation {
                urn: String::new(),
                inviter: Profile {
                    urn: conn.urn,
                    username: conn.username,
                    first_name: conn.first_name,
                    last_name: conn.last_name,
                    headline: conn.headline,
                    location: conn.location,
                    profile_url: conn.profile_url,
                },
                ..Invitation::default()
            })
            .collect();
    }

    let text = unescape(payload);
    let windows: Vec<&str> = INVITATION_MARKERS
        .iter()
        .flat_map(|marker| windows_after(&text, marker, INVITATION_WINDOW))
        .collect();

    let mut found: Vec<Invitation> = windows
        .iter()
        .filter_map(|w| invitation_from_tagged_window(w, web_base, now))
        .collect();
    if found.is_empty() {
        debug!(windows = windows.len(), "tagged invitation fields absent, using children-text heuristic");
        found = windows
            .iter()
            .filter_map(|w| invitation_from_children(w, web_base, now))
            .collect();
    }
    dedupe_by_inviter(found)
}

/// Primary grammar: named fields present in the window.
fn invitation_from_tagged_window(
    window: &str,
    web_base: &str,
    now: DateTime<Utc>,
) -> Option<Invitation> {
    let username = rule_profile_username(window)?;
    let name = first_kv(window, &["inviterName", "memberName", "title"])?;
    let (first_name, last_name) = split_name(&name);
    Some(Invitation {
        urn: rule_invitation_urn(window).unwrap_or_default(),
        inviter: Profile {
            urn: rule_profile_id(window)
                .map(|id| format!("urn:li:fsd_profile:{id}"))
                .unwrap_or_default(),
            username,
            first_name,
            last_name,
            headline: first_kv(window, &["inviterHeadline", "memberHeadline", "headline"])
                .unwrap_or_default(),
            location: String::new(),
            profile_url: String::new(),
        }
        .with_profile_url(web_base),
        message: first_kv(window, &["customMessage", "invitationMessage", "message"])
            .unwrap_or_default(),
        sent_at: first_kv(window, &["sentTimeLabel", "sentTime", "timeLabel"])
            .and_then(|label| relative_label_to_epoch_ms(&label, now))
            .unwrap_or(0),
        shared_connections: 0,
    })
}

/// Secondary grammar: classify the ordered children-text fragments.
fn invitation_from_children(
    window: &str,
    web_base: &str,
    now: DateTime<Utc>,
) -> Option<Invitation> {
    let username = rule_profile_username(window)?;
    let mut name = String::new();
    let mut headline = String::new();
    let mut message = String::new();
    let mut sent_at = 0;

    for fragment in children_texts(window) {
        if is_boilerplate(&fragment) {
            continue;
        }
        if let Some(ts) = relative_label_to_epoch_ms(&fragment, now) {
            if sent_at == 0 {
                sent_at = ts;
            }
            continue;
        }
        if looks_like_message(&fragment) {
            if message.is_empty() {
                message = strip_quotes(&fragment);
            }
            continue;
        }
        if name.is_empty() {
            name = fragment;
        } else if headline.is_empty() {
            headline = fragment;
        }
    }

    if name.is_empty() && message.is_empty() {
        return None;
    }
    let (first_name, last_name) = split_name(&name);
    Some(Invitation {
        urn: rule_invitation_urn(window).unwrap_or_default(),
        inviter: Profile {
            urn: rule_profile_id(window)
                .map(|id| format!("urn:li:fsd_profile:{id}"))
                .unwrap_or_default(),
            username,
            first_name,
            last_name,
            headline,
            location: String::new(),
            profile_url: String::new(),
        }
        .with_profile_url(web_base),
        message,
        sent_at,
        shared_connections: 0,
    })
}

fn rule_invitation_urn(window: &str) -> Option<String> {
    static INVITATION_URN_RE: LazyLock<Regex> = LazyLock::new(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"urn:li:fsd_invitation:([A-Za-z0-9_-]+)").unwrap()
    });
    INVITATION_URN_RE
        .captures(window)
        .and_then(|c| c.get(0))
        .map(|m| m.as_str().to_string())
}

/// UI labels and counters that are never the name, headline, or message.
fn is_boilerplate(fragment: &str) -> bool {
    const LABELS: &[&str] = &[
        "accept", "ignore", "message", "connect", "pending", "see all", "invitations", "withdraw",
    ];
    let lower = fragment.trim().to_ascii_lowercase();
    lower.contains("mutual connection")
        || LABELS.contains(&lower.as_str())
        || lower.chars().all(|c| c.is_ascii_digit())
}

/// Custom invitation messages are either quoted or conspicuously long.
fn looks_like_message(fragment: &str) -> bool {
    let trimmed = fragment.trim();
    trimmed.starts_with('"')
        || trimmed.starts_with('\u{201c}')
        || trimmed.chars().count() > 60
}

fn strip_quotes(fragment: &str) -> String {
    fragment
        .trim()
        .trim_matches(&['"', '\u{201c}', '\u{201d}'][..])
        .to_string()
}

/// Convert a relative send-date label to epoch milliseconds.
///
/// Supports "Today", "Yesterday", and "<n> <unit> ago" for minutes, hours,
/// days, and weeks. Anything else is `None`.
pub(crate) fn relative_label_to_epoch_ms(label: &str, now: DateTime<Utc>) -> Option<i64> {
    let label = label.trim();
    match label.to_ascii_lowercase().as_str() {
        "today" => return Some(now.timestamp_millis()),
        "yesterday" => return Some((now - Duration::days(1)).timestamp_millis()),
        _ => {}
    }
    let lower = label.to_ascii_lowercase();
    let caps = RELATIVE_AGO_RE.captures(&lower)?;
    let count: i64 = caps.get(1)?.as_str().parse().ok()?;
    let delta = match caps.get(2)?.as_str() {
        "minute" => Duration::minutes(count),
        "hour" => Duration::hours(count),
        "day" => Duration::days(count),
        "week" => Duration::weeks(count),
        _ => return None,
    };
    Some((now - delta).timestamp_millis())
}

fn dedupe_by_inviter(invitations: Vec<Invitation>) -> Vec<Invitation> {
    let mut seen = HashSet::new();
    invitations
        .into_iter()
        .filter(|inv| {
            let key = if inv.inviter.username.is_empty() {
                format!("{}|{}", inv.urn, inv.inviter.display_name())
            } else {
                inv.inviter.username.clone()
            };
            seen.insert(key)
        })
        .collect()
}

fn split_name(full: &str) -> (String, String) {
    match full.trim().split_once(' ') {
        Some((first, last)) => (first.to_string(), last.trim().to_string()),
        None => (full.trim().to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn rest_elements_shape() {
        let root = json!({"elements": [{
            "entityUrn": "urn:li:fs_invitation:7",
            "message": "let's connect",
            "sentTime": 1700000000000i64,
            "fromMember": {
                "publicIdentifier": "inviter-1",
                "firstName": {"localized": {"en_US": "Ines"}},
                "lastName": "Vier"
            }
        }]});
        let invs = parse_invitations(&root, "https://www.linkedin.com");
        assert_eq!(invs.len(), 1);
        assert_eq!(invs[0].inviter.username, "inviter-1");
        assert_eq!(invs[0].message, "let's connect");
        assert_eq!(
            invs[0].inviter.profile_url,
            "https://www.linkedin.com/in/inviter-1"
        );
    }

    #[test]
    fn tagged_rsc_window_is_primary() {
        let payload = r#"["$","invitation-card",null,{"urn":"urn:li:fsd_invitation:42","inviterName":"Nora Lane","inviterHeadline":"CTO","customMessage":"hi there","sentTimeLabel":"3 days ago","url":"https:\/\/www.linkedin.com\/in\/nora"}]"#;
        let invs = parse_invitations_from_flagship_rsc_at(payload, "https://b", fixed_now());
        assert_eq!(invs.len(), 1);
        assert_eq!(invs[0].inviter.username, "nora");
        assert_eq!(invs[0].inviter.first_name, "Nora");
        assert_eq!(invs[0].inviter.headline, "CTO");
        assert_eq!(invs[0].message, "hi there");
        let expected = (fixed_now() - Duration::days(3)).timestamp_millis();
        assert_eq!(invs[0].sent_at, expected);
    }

    #[test]
    fn children_text_heuristic_kicks_in_without_tags() {
        let payload = concat!(
            r#"["$","invitation-card",null,{"link":"https://www.linkedin.com/in/sam-lee","children":["#,
            r#"{"children":"Sam Lee"},{"children":"Data Engineer at Nimbus"},"#,
            r#"{"children":"2 mutual connections"},{"children":"Yesterday"},"#,
            r#"{"children":"Accept"},{"children":"Ignore"}]}]"#
        );
        let invs = parse_invitations_from_flagship_rsc_at(payload, "https://b", fixed_now());
        assert_eq!(invs.len(), 1);
        assert_eq!(invs[0].inviter.username, "sam-lee");
        assert_eq!(invs[0].inviter.first_name, "Sam");
        assert_eq!(invs[0].inviter.headline, "Data Engineer at Nimbus");
        let expected = (fixed_now() - Duration::days(1)).timestamp_millis();
        assert_eq!(invs[0].sent_at, expected);
    }

    #[test]
    fn quoted_fragment_becomes_the_message() {
        let payload = concat!(
            r#"["$","invitation-card",null,{"link":"https://www.linkedin.com/in/ray","children":["#,
            r#"{"children":"Ray Wu"},{"children":"“Loved your talk, would be glad to connect”"},"#,
            r#"{"children":"Today"}]}]"#
        );
        let invs = parse_invitations_from_flagship_rsc_at(payload, "https://b", fixed_now());
        assert_eq!(invs.len(), 1);
        assert_eq!(invs[0].message, "Loved your talk, would be glad to connect");
        assert_eq!(invs[0].sent_at, fixed_now().timestamp_millis());
    }

    #[test]
    fn relative_labels() {
        let now = fixed_now();
        assert_eq!(
            relative_label_to_epoch_ms("Today", now),
            Some(now.timestamp_millis())
        );
        assert_eq!(
            relative_label_to_epoch_ms("2 weeks ago", now),
            Some((now - Duration::weeks(2)).timestamp_millis())
        );
        assert_eq!(
            relative_label_to_epoch_ms("45 minutes ago", now),
            Some((now - Duration::minutes(45)).timestamp_millis())
        );
        assert_eq!(relative_label_to_epoch_ms("sometime", now), None);
        assert_eq!(relative_label_to_epoch_ms("5 months ago", now), None);
    }

    #[test]
    fn boilerplate_fragments_are_excluded() {
        assert!(is_boilerplate("Accept"));
        assert!(is_boilerplate("3 mutual connections"));
        assert!(is_boilerplate("12"));
        assert!(!is_boilerplate("Staff Engineer"));
    }
}
