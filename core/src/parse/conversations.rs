//! Conversation-list extraction.

use std::collections::HashSet;

use serde_json::Value;

use crate::models::Conversation;
use crate::parse::localized::localized_field;
use crate::parse::shapes::{
    count_field, first_non_empty, included_of_type, str_field, timestamp_field,
};

/// Parse a messaging conversations page. Dedupe key is the conversation
/// URN, falling back to the participant handle.
pub fn parse_conversations(root: &Value) -> Vec<Conversation> {
    let matchers: &[fn(&Value) -> Vec<Conversation>] = &[match_elements, match_included];
    let mut seen = HashSet::new();
    first_non_empty(root, matchers)
        .into_iter()
        .filter(|c| {
            let key = if c.urn.is_empty() {
                format!("@{}", c.participant_username)
            } else {
                c.urn.clone()
            };
            seen.insert(key)
        })
        .collect()
}

fn match_elements(root: &Value) -> Vec<Conversation> {
    let Some(elements) = root.get("elements").and_then(Value::as_array) else {
        return Vec::new();
    };
    elements.iter().filter_map(conversation_from_entity).collect()
}

fn match_included(root: &Value) -> Vec<Conversation> {
    included_of_type(root, "Conversation")
        .filter_map(conversation_from_entity)
        .collect()
}

fn conversation_from_entity(entity: &Value) -> Option<Conversation> {
    let urn = str_field(entity, "entityUrn");
    let (participant_name, participant_username) = first_participant(entity);
    if urn.is_empty() && participant_username.is_empty() {
        return None;
    }
    Some(Conversation {
        urn,
        participant_name,
        participant_username,
        last_message: last_event_body(entity),
        last_activity_at: timestamp_field(entity, "lastActivityAt"),
        unread_count: count_field(entity, "unreadCount"),
    })
}

/// First participant's display name and handle, wherever the mini-profile
/// happens to be nested on this variant.
fn first_participant(entity: &Value) -> (String, String) {
    let Some(participants) = entity.get("participants").and_then(Value::as_array) else {
        return (String::new(), String::new());
    };
    for participant in participants {
        let mini = participant
            .pointer("/com.linkedin.voyager.messaging.MessagingMember/miniProfile")
            .or_else(|| participant.get("miniProfile"))
            .unwrap_or(participant);
        let username = str_field(mini, "publicIdentifier");
        let name = format!(
            "{} {}",
            localized_field(mini, "firstName"),
            localized_field(mini, "lastName")
        )
        .trim()
        .to_string();
        if !username.is_empty() || !name.is_empty() {
            return (name, username);
        }
    }
    (String::new(), String::new())
}

fn last_event_body(entity: &Value) -> String {
    let Some(events) = entity.get("events").and_then(Value::as_array) else {
        return String::new();
    };
    events
        .first()
        .map(crate::parse::messages::event_body)
        .unwrap_or_default()
}
