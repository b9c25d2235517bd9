//! Error types for the Voyager data-access layer.

use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, VoyagerError>;

/// Errors surfaced by the client, parser, query-ID, and pagination layers.
///
/// Every non-success HTTP response maps to exactly one variant; parsers never
/// produce errors (they degrade to empty fields instead).
#[derive(Debug, Error)]
pub enum VoyagerError {
    /// Session is no longer valid. Covers a real 401 as well as the redirect
    /// LinkedIn uses to signal a dead session without a clean status code.
    #[error("session expired or invalid: {0}. Re-export your li_at/JSESSIONID cookies")]
    Auth(String),

    /// HTTP 403.
    #[error("not authorized to access this resource: {0}")]
    Forbidden(String),

    /// HTTP 404.
    #[error("resource not found{}", detail_suffix(.0))]
    NotFound(String),

    /// HTTP 400.
    #[error("invalid request{}", detail_suffix(.0))]
    InvalidRequest(String),

    /// HTTP 429 after exhausting all retries.
    #[error("rate limited by LinkedIn after {attempts} attempts; wait a while before retrying")]
    RateLimited { attempts: u32 },

    /// HTTP 999, LinkedIn's bot-blocking status.
    #[error("request blocked by LinkedIn anti-automation (HTTP 999)")]
    UpstreamBlocked,

    /// Any other non-success status.
    #[error("request failed with HTTP {status}{}", detail_suffix(.detail))]
    Http { status: u16, detail: String },

    /// Transport-level failure (DNS, connection reset, timeout). Status 0.
    #[error("network error: {0}")]
    Network(String),

    /// A GraphQL call failed in a way consistent with an outdated query ID.
    #[error(
        "GraphQL call for `{operation}` failed with HTTP {status}; the cached query ID is \
         likely stale. Run `voyager refresh-ids` (or pass --har <capture>) and retry"
    )]
    StaleQueryId { operation: String, status: u16 },

    /// Live query-ID discovery exhausted its budget without finding anything.
    #[error(
        "query-ID discovery failed: scanned {bundles_scanned} bundles in {timeout:?} without a \
         match; LinkedIn may have changed its bundle format"
    )]
    DiscoveryFailed {
        bundles_scanned: usize,
        timeout: Duration,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn detail_suffix(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!(": {detail}")
    }
}

impl VoyagerError {
    /// HTTP status associated with this error, with 0 meaning "no response".
    pub fn status(&self) -> u16 {
        match self {
            VoyagerError::Auth(_) => 401,
            VoyagerError::Forbidden(_) => 403,
            VoyagerError::NotFound(_) => 404,
            VoyagerError::InvalidRequest(_) => 400,
            VoyagerError::RateLimited { .. } => 429,
            VoyagerError::UpstreamBlocked => 999,
            VoyagerError::Http { status, .. } => *status,
            VoyagerError::StaleQueryId { status, .. } => *status,
            _ => 0,
        }
    }

    pub fn is_stale_query_id(&self) -> bool {
        matches!(self, VoyagerError::StaleQueryId { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_covers_http_variants() {
        assert_eq!(VoyagerError::Auth("x".into()).status(), 401);
        assert_eq!(VoyagerError::RateLimited { attempts: 6 }.status(), 429);
        assert_eq!(VoyagerError::UpstreamBlocked.status(), 999);
        assert_eq!(VoyagerError::Network("reset".into()).status(), 0);
    }

    #[test]
    fn detail_is_omitted_when_empty() {
        let msg = VoyagerError::NotFound(String::new()).to_string();
        assert_eq!(msg, "resource not found");
        let msg = VoyagerError::NotFound("profile xyz".into()).to_string();
        assert!(msg.ends_with(": profile xyz"));
    }
}
