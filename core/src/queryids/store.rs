//! On-disk query-ID snapshot store.
//!
//! One JSON file holds the whole cache: a timestamped map of GraphQL
//! operation name to the opaque `<operation>.<hash>` ID the gateway
//! requires, plus opportunistically captured headers and variables.
//! Writes are whole-file atomic rewrites (temp file + rename), so
//! concurrent processes can race but never corrupt the file. Headers may
//! carry session-adjacent values, hence the owner-only permissions.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Snapshots older than this are advisory-stale: callers should prefer a
/// refresh but may still use the data when the refresh fails.
pub const FRESHNESS_WINDOW: Duration = Duration::from_secs(7 * 24 * 60 * 60);

const CACHE_DIR: &str = "voyager";
const CACHE_FILE: &str = "queryids.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryMeta {
    /// HAR capture the snapshot was (last) refreshed from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub har_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryIdSnapshot {
    /// Epoch milliseconds of the refresh that produced this snapshot.
    pub fetched_at: i64,
    /// Operation name to full `<operation>.<hash>` query ID. A BTreeMap
    /// keeps the persisted form order-independent.
    pub ids: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,
    #[serde(default)]
    pub discovery: DiscoveryMeta,
}

#[derive(Debug, Clone)]
pub struct SnapshotInfo {
    pub snapshot: QueryIdSnapshot,
    pub age: Duration,
    pub is_fresh: bool,
}

/// Cache access goes through this handle; the path is injected so tests can
/// point it at a temp directory without touching process environment.
#[derive(Debug, Clone)]
pub struct QueryIdStore {
    path: PathBuf,
}

impl QueryIdStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Platform default: XDG cache dir on Linux, `Library/Caches` on macOS,
    /// `%LOCALAPPDATA%` on Windows.
    pub fn default_path() -> Option<PathBuf> {
        dirs::cache_dir().map(|dir| dir.join(CACHE_DIR).join(CACHE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot from disk. Missing or unparsable files read as
    /// absent; a corrupt cache is not worth failing a command over.
    pub fn load(&self) -> Option<QueryIdSnapshot> {
        let raw = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "ignoring unreadable query-ID cache");
                None
            }
        }
    }

    /// Cached ID for one operation. Cache read only; never triggers
    /// discovery.
    pub fn get_id(&self, operation: &str) -> Option<String> {
        self.load()?.ids.get(operation).cloned()
    }

    pub fn snapshot_info(&self) -> Option<SnapshotInfo> {
        let snapshot = self.load()?;
        let age_ms = (Utc::now().timestamp_millis() - snapshot.fetched_at).max(0);
        let age = Duration::from_millis(age_ms as u64);
        Some(SnapshotInfo {
            is_fresh: age < FRESHNESS_WINDOW,
            snapshot,
            age,
        })
    }

    /// Atomically replace the cache file with `snapshot`.
    pub fn persist(&self, snapshot: &QueryIdSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
            restrict_dir(parent)?;
        }
        let mut body = serde_json::to_string_pretty(snapshot)?;
        body.push('\n');

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body)?;
        restrict_file(&tmp)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), ids = snapshot.ids.len(), "query-ID snapshot persisted");
        Ok(())
    }

    /// Merge newly discovered IDs over the existing snapshot and persist.
    /// Operations the refresh did not cover keep their old IDs.
    pub fn merge_and_persist(
        &self,
        ids: BTreeMap<String, String>,
        headers: BTreeMap<String, String>,
        variables: BTreeMap<String, String>,
        har_path: Option<String>,
    ) -> Result<QueryIdSnapshot> {
        let mut snapshot = self.load().unwrap_or_default();
        snapshot.fetched_at = Utc::now().timestamp_millis();
        snapshot.ids.extend(ids);
        snapshot.headers.extend(headers);
        snapshot.variables.extend(variables);
        snapshot.discovery = DiscoveryMeta { har_path };
        self.persist(&snapshot)?;
        Ok(snapshot)
    }
}

#[cfg(unix)]
fn restrict_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(unix)]
fn restrict_dir(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_file(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(not(unix))]
fn restrict_dir(_path: &Path) -> Result<()> {
    Ok(())
}
