//! Normalized entity records.
//!
//! Everything the parser layer produces is one of these plain value types.
//! Fields the upstream format did not yield degrade to empty strings or
//! zero; in particular `urn` is legitimately empty on heuristic extraction
//! paths that cannot recover it, and callers must tolerate that.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub urn: String,
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub location: String,
    /// Canonical URL, derived as `<web base>/in/<username>`.
    #[serde(default)]
    pub profile_url: String,
}

impl Profile {
    /// Fills in `profile_url` from the username. Empty usernames yield an
    /// empty URL rather than a dangling base path.
    pub fn with_profile_url(mut self, web_base: &str) -> Self {
        if !self.username.is_empty() {
            self.profile_url = profile_url(web_base, &self.username);
        }
        self
    }

    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        name.trim().to_string()
    }
}

pub fn profile_url(web_base: &str, username: &str) -> String {
    format!("{}/in/{}", web_base.trim_end_matches('/'), username)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    #[serde(default)]
    pub urn: String,
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub profile_url: String,
    /// Epoch milliseconds; 0 when unknown.
    #[serde(default)]
    pub connected_at: i64,
    #[serde(default)]
    pub shared_connections: u32,
}

impl Connection {
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        name.trim().to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(default)]
    pub urn: String,
    #[serde(default)]
    pub participant_name: String,
    #[serde(default)]
    pub participant_username: String,
    #[serde(default)]
    pub last_message: String,
    /// Epoch milliseconds; 0 when unknown.
    #[serde(default)]
    pub last_activity_at: i64,
    #[serde(default)]
    pub unread_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub urn: String,
    #[serde(default)]
    pub sender_name: String,
    #[serde(default)]
    pub sender_username: String,
    #[serde(default)]
    pub body: String,
    /// Epoch milliseconds; 0 when unknown.
    #[serde(default)]
    pub sent_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Invitation {
    #[serde(default)]
    pub urn: String,
    pub inviter: Profile,
    #[serde(default)]
    pub message: String,
    /// Epoch milliseconds; 0 when unknown. Relative dates in streamed
    /// payloads ("3 days ago") are converted at parse time.
    #[serde(default)]
    pub sent_at: i64,
    #[serde(default)]
    pub shared_connections: u32,
}
