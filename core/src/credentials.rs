//! Session credentials.
//!
//! LinkedIn authenticates Voyager calls with two cookies: `li_at` (the
//! session) and `JSESSIONID` (whose unquoted value doubles as the CSRF
//! token). The bundle is resolved once per invocation by the CLI and is
//! read-only afterward.

use serde::Serialize;

/// Immutable cookie pair plus derived CSRF token.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub li_at: String,
    pub jsession_id: String,
    /// Ready-to-send `Cookie` header value.
    pub cookie_header: String,
    /// `jsession_id` with surrounding quotes stripped.
    pub csrf_token: String,
    /// Provenance label ("cli", "env", "cli+env"), diagnostics only.
    pub source: String,
}

impl Credentials {
    pub fn new(
        li_at: impl Into<String>,
        jsession_id: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        let li_at = li_at.into();
        let jsession_id = jsession_id.into();
        let csrf_token = jsession_id.trim_matches('"').to_string();
        let cookie_header = format!("li_at={li_at}; JSESSIONID=\"{csrf_token}\"");
        Self {
            li_at,
            jsession_id,
            cookie_header,
            csrf_token,
            source: source.into(),
        }
    }
}
