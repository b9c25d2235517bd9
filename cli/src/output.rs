//! Text and JSON rendering for command results.

use chrono::{DateTime, Utc};
use serde::Serialize;
use voyager_core::models::{Connection, Conversation, Invitation, Message, Profile};

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_profile(profile: &Profile) {
    println!("{}", profile.display_name());
    if !profile.headline.is_empty() {
        println!("  {}", profile.headline);
    }
    if !profile.location.is_empty() {
        println!("  {}", profile.location);
    }
    if !profile.profile_url.is_empty() {
        println!("  {}", profile.profile_url);
    }
}

pub fn print_connections(connections: &[Connection]) {
    for conn in connections {
        let mut line = conn.display_name();
        if !conn.username.is_empty() {
            line.push_str(&format!(" (@{})", conn.username));
        }
        if !conn.headline.is_empty() {
            line.push_str(&format!(" - {}", conn.headline));
        }
        println!("{line}");
    }
    eprintln!("{} connections", connections.len());
}

pub fn print_conversations(conversations: &[Conversation]) {
    for conv in conversations {
        let when = format_epoch_ms(conv.last_activity_at);
        let unread = if conv.unread_count > 0 {
            format!(" [{} unread]", conv.unread_count)
        } else {
            String::new()
        };
        println!(
            "{}  {}{}  {}",
            when, conv.participant_name, unread, conv.urn
        );
        if !conv.last_message.is_empty() {
            println!("  {}", conv.last_message);
        }
    }
}

pub fn print_messages(messages: &[Message]) {
    for msg in messages {
        println!("{}  {}", format_epoch_ms(msg.sent_at), msg.sender_name);
        println!("  {}", msg.body);
    }
}

pub fn print_invitations(invitations: &[Invitation]) {
    for inv in invitations {
        let mut line = inv.inviter.display_name();
        if !inv.inviter.username.is_empty() {
            line.push_str(&format!(" (@{})", inv.inviter.username));
        }
        if inv.sent_at > 0 {
            line.push_str(&format!("  {}", format_epoch_ms(inv.sent_at)));
        }
        println!("{line}");
        if !inv.inviter.headline.is_empty() {
            println!("  {}", inv.inviter.headline);
        }
        if !inv.message.is_empty() {
            println!("  \"{}\"", inv.message);
        }
    }
    eprintln!("{} pending invitations", invitations.len());
}

/// Epoch milliseconds as a UTC date, or a dash when unknown.
fn format_epoch_ms(ms: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(ms) {
        Some(ts) if ms > 0 => ts.format("%Y-%m-%d %H:%M").to_string(),
        _ => "-".to_string(),
    }
}
