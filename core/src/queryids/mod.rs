//! Query-ID cache and discovery.
//!
//! LinkedIn's GraphQL gateway requires an opaque `<operation>.<hash>` ID
//! per named operation and documents it nowhere. This module owns the
//! persisted snapshot of known IDs, the offline refresh from a HAR
//! capture, the live bundle-scanning discovery, and the one-retry recovery
//! wrapper commands use around GraphQL calls.

pub mod discovery;
pub mod har;
pub mod store;

use std::future::Future;
use std::path::Path;

use tracing::{info, warn};

use crate::client::VoyagerClient;
use crate::error::{Result, VoyagerError};

pub use discovery::{DiscoveryOptions, refresh_from_linkedin};
pub use har::refresh_from_har;
pub use store::{FRESHNESS_WINDOW, DiscoveryMeta, QueryIdSnapshot, QueryIdStore, SnapshotInfo};

/// Run a GraphQL call with query-ID recovery.
///
/// Resolves the operation's ID from the cache (refreshing on a miss, and
/// preferring a refresh when the snapshot is past its advisory freshness
/// window), invokes `call`, and on a stale-ID failure refreshes once and
/// retries exactly once. A second stale-ID failure propagates; its message
/// tells the operator how to refresh manually.
pub async fn with_query_id_retry<T, F, Fut>(
    store: &QueryIdStore,
    client: &VoyagerClient,
    operation: &str,
    opts: &DiscoveryOptions,
    har_path: Option<&Path>,
    call: F,
) -> Result<T>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let id = resolve_id(store, client, operation, opts, har_path).await?;
    match call(id).await {
        Err(e) if e.is_stale_query_id() => {
            warn!(operation, "query ID rejected upstream, refreshing and retrying once");
            let snapshot = refresh(store, client, operation, opts, har_path).await?;
            let id = snapshot.ids.get(operation).cloned().ok_or_else(|| {
                VoyagerError::StaleQueryId {
                    operation: operation.to_string(),
                    status: 0,
                }
            })?;
            call(id).await
        }
        outcome => outcome,
    }
}

async fn resolve_id(
    store: &QueryIdStore,
    client: &VoyagerClient,
    operation: &str,
    opts: &DiscoveryOptions,
    har_path: Option<&Path>,
) -> Result<String> {
    let info = store.snapshot_info();
    let cached = info
        .as_ref()
        .and_then(|i| i.snapshot.ids.get(operation).cloned());
    let fresh = info.as_ref().is_some_and(|i| i.is_fresh);

    match (cached, fresh) {
        (Some(id), true) => Ok(id),
        (Some(id), false) => {
            // Stale data is usable if a refresh fails; freshness is advisory.
            match refresh(store, client, operation, opts, har_path).await {
                Ok(snapshot) => Ok(snapshot.ids.get(operation).cloned().unwrap_or(id)),
                Err(e) => {
                    warn!(operation, error = %e, "refresh failed, using stale query ID");
                    Ok(id)
                }
            }
        }
        (None, _) => {
            let snapshot = refresh(store, client, operation, opts, har_path).await?;
            snapshot.ids.get(operation).cloned().ok_or_else(|| {
                VoyagerError::StaleQueryId {
                    operation: operation.to_string(),
                    status: 0,
                }
            })
        }
    }
}

/// Live discovery first; fall back to the configured HAR capture when the
/// scan comes up empty.
async fn refresh(
    store: &QueryIdStore,
    client: &VoyagerClient,
    operation: &str,
    opts: &DiscoveryOptions,
    har_path: Option<&Path>,
) -> Result<QueryIdSnapshot> {
    let operations = vec![operation.to_string()];
    match refresh_from_linkedin(store, client, &operations, opts).await {
        Ok(snapshot) => Ok(snapshot),
        Err(e) => match har_path {
            Some(har) => {
                info!(operation, har = %har.display(), error = %e, "live discovery failed, trying capture file");
                refresh_from_har(store, &operations, har)
            }
            None => Err(e),
        },
    }
}
