//! Message-list extraction for a single conversation.

use std::collections::HashSet;

use serde_json::Value;

use crate::models::Message;
use crate::parse::localized::localized_field;
use crate::parse::shapes::{first_non_empty, included_of_type, str_field, timestamp_field};

/// Parse a messaging events page into chronological messages.
pub fn parse_messages(root: &Value) -> Vec<Message> {
    let matchers: &[fn(&Value) -> Vec<Message>] = &[match_elements, match_included];
    let mut seen = HashSet::new();
    first_non_empty(root, matchers)
        .into_iter()
        .filter(|m| {
            let key = if m.urn.is_empty() {
                format!("{}|{}", m.sent_at, m.body)
            } else {
                m.urn.clone()
            };
            seen.insert(key)
        })
        .collect()
}

fn match_elements(root: &Value) -> Vec<Message> {
    let Some(elements) = root.get("elements").and_then(Value::as_array) else {
        return Vec::new();
    };
    elements.iter().filter_map(message_from_event).collect()
}

fn match_included(root: &Value) -> Vec<Message> {
    included_of_type(root, "Event")
        .filter_map(message_from_event)
        .collect()
}

fn message_from_event(event: &Value) -> Option<Message> {
    let body = event_body(event);
    let urn = str_field(event, "entityUrn");
    if body.is_empty() && urn.is_empty() {
        return None;
    }
    let mini = event
        .pointer("/from/com.linkedin.voyager.messaging.MessagingMember/miniProfile")
        .or_else(|| event.pointer("/from/miniProfile"))
        .cloned()
        .unwrap_or(Value::Null);
    Some(Message {
        urn,
        sender_name: format!(
            "{} {}",
            localized_field(&mini, "firstName"),
            localized_field(&mini, "lastName")
        )
        .trim()
        .to_string(),
        sender_username: str_field(&mini, "publicIdentifier"),
        body,
        sent_at: timestamp_field(event, "createdAt"),
    })
}

/// Message text out of an event, across the known nesting variants.
pub(crate) fn event_body(event: &Value) -> String {
    const PATHS: &[&str] = &[
        "/eventContent/com.linkedin.voyager.messaging.event.MessageEvent/attributedBody/text",
        "/eventContent/attributedBody/text",
        "/body/text",
    ];
    for path in PATHS {
        if let Some(text) = event.pointer(path).and_then(Value::as_str) {
            return text.to_string();
        }
    }
    String::new()
}
