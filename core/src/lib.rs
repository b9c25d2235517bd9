//! Root of the `voyager-core` library.
//!
//! The resilient data-access layer for LinkedIn's undocumented Voyager and
//! flagship-web APIs: a rate-limited authenticated HTTP client, layered
//! response parsers for the several wire formats LinkedIn ships, a
//! persisted query-ID cache with live discovery, and a pagination
//! controller that drives the client/parser pair.

// Library code must not write to stdout/stderr directly; diagnostics go
// through the tracing stack.
#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod client;
pub mod config;
pub mod connections;
pub mod credentials;
pub mod error;
pub mod models;
pub mod pagination;
pub mod parse;
pub mod queryids;

pub use client::VoyagerClient;
pub use config::ClientConfig;
pub use credentials::Credentials;
pub use error::{Result, VoyagerError};
pub use models::{Connection, Conversation, Invitation, Message, Profile};
pub use queryids::{QueryIdSnapshot, QueryIdStore, SnapshotInfo};
