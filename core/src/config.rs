//! Client configuration.
//!
//! All tunables are resolved once at the process boundary (the CLI reads
//! flags and environment variables) and threaded into constructors from
//! there. Library code never consults the environment directly.

use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

/// Default Voyager REST/GraphQL base.
pub const DEFAULT_BASE_URL: &str = "https://www.linkedin.com/voyager/api";

/// Default web host, used for flagship endpoints, entry pages, and profile URLs.
pub const DEFAULT_WEB_BASE: &str = "https://www.linkedin.com";

/// Browser-like User-Agent sent with every request. Kept stable across a run;
/// LinkedIn's anti-automation heuristics are sensitive to churn here.
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Default inter-request delay range, in seconds.
pub const DEFAULT_DELAY_RANGE: RangeInclusive<f64> = 2.0..=5.0;

/// Fast-mode delay range. Used until the first throttling response, after
/// which the client falls back to [`DEFAULT_DELAY_RANGE`].
pub const FAST_DELAY_RANGE: RangeInclusive<f64> = 0.3..=0.9;

/// Configuration for [`VoyagerClient`](crate::client::VoyagerClient) and the
/// query-ID layer.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub web_base: String,
    /// Randomized pacing range, in seconds, applied before every request
    /// after the first. Set to `0.0..=0.0` in tests.
    pub delay_range: RangeInclusive<f64>,
    /// Short pacing with adaptive slowdown on the first 429.
    pub fast_mode: bool,
    /// Maximum 429 retries before giving up.
    pub max_retries: u32,
    /// First 429 backoff delay; doubles per attempt.
    pub initial_backoff: Duration,
    /// Query-ID cache file override. `None` selects the platform cache dir.
    pub cache_path: Option<PathBuf>,
    /// HAR capture to fall back to when live discovery fails.
    pub har_path: Option<PathBuf>,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            web_base: DEFAULT_WEB_BASE.to_string(),
            delay_range: DEFAULT_DELAY_RANGE,
            fast_mode: false,
            max_retries: 5,
            initial_backoff: Duration::from_secs(5),
            cache_path: None,
            har_path: None,
            user_agent: USER_AGENT.to_string(),
        }
    }
}

impl ClientConfig {
    /// Config with pacing disabled, for tests and local mock servers.
    pub fn unpaced(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            web_base: base_url.clone(),
            base_url,
            delay_range: 0.0..=0.0,
            initial_backoff: Duration::from_millis(5),
            ..Self::default()
        }
    }
}
