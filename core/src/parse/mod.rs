//! Response parsers.
//!
//! LinkedIn answers in several distinct wire formats: legacy REST JSON with
//! a `data` + `included` normalization pattern, GraphQL-dash JSON, a
//! server-streamed "RSC" text format that is not JSON at all, and plain
//! HTML under some anti-bot conditions. No single strategy is reliable
//! across all of them, so each entry point tries its primary strategy first
//! and then cascades through the rest in a fixed order until one yields at
//! least one result.
//!
//! Parsers never fail: a field the payload did not carry degrades to an
//! empty string or zero, and a payload nothing matched yields an empty
//! list. Only the HTTP layer produces errors.

pub mod connections;
pub mod conversations;
pub mod invitations;
pub mod localized;
pub mod messages;
pub mod profile;
pub mod rsc;
pub mod shapes;

pub use connections::parse_connections;
pub use conversations::parse_conversations;
pub use invitations::{parse_invitations, parse_invitations_from_flagship_rsc};
pub use localized::extract_localized;
pub use messages::parse_messages;
pub use profile::parse_profile;
pub use rsc::parse_connections_from_rsc;
