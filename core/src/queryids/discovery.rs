//! Live query-ID discovery.
//!
//! When no usable capture exists, the IDs have to be dug out of LinkedIn
//! itself: fetch a few authenticated entry pages, look for IDs inlined in
//! the page, and otherwise chase the JavaScript bundles the page references
//! until every requested operation is found or the budget runs out. The
//! site ships hundreds of bundle files, so the scan is bounded three ways:
//! a small concurrent fetch pool, a bundle-count cap, and a wall-clock
//! deadline checked between work units.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use futures::stream;
use regex_lite::Regex;
use reqwest::Method;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::client::VoyagerClient;
use crate::error::{Result, VoyagerError};
use crate::queryids::store::{QueryIdSnapshot, QueryIdStore};

/// Entry pages likely to reference the bundles that register GraphQL
/// operations.
const ENTRY_PAGES: &[&str] = &[
    "/feed/",
    "/mynetwork/invite-connect/connections/",
    "/messaging/",
];

#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Bundle fetches in flight at once.
    pub concurrency: usize,
    /// Wall-clock budget for the bundle scan, checked between work units.
    pub deadline: Duration,
    /// Hard cap on bundles fetched regardless of deadline.
    pub max_bundles: usize,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            concurrency: 3,
            deadline: Duration::from_secs(20),
            max_bundles: 80,
        }
    }
}

/// Scan LinkedIn for the requested operations' query IDs, persist whatever
/// was found, and return the merged snapshot.
///
/// Fails with [`VoyagerError::DiscoveryFailed`] only when nothing at all
/// was resolved; partial results are persisted and returned.
pub async fn refresh_from_linkedin(
    store: &QueryIdStore,
    client: &VoyagerClient,
    operations: &[String],
    opts: &DiscoveryOptions,
) -> Result<QueryIdSnapshot> {
    let started = Instant::now();
    let mut found: BTreeMap<String, String> = BTreeMap::new();
    let mut needed: HashSet<String> = operations.iter().cloned().collect();
    let mut bundle_urls: Vec<String> = Vec::new();
    let mut page_error: Option<VoyagerError> = None;
    let mut pages_fetched = 0usize;

    let web_base = client.config().web_base.clone();
    for page in ENTRY_PAGES {
        if needed.is_empty() {
            break;
        }
        let url = format!("{}{}", web_base.trim_end_matches('/'), page);
        let html = match fetch_page(client, &url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(url, error = %e, "entry page fetch failed");
                page_error = Some(e);
                continue;
            }
        };
        pages_fetched += 1;

        // Cheap path: the ID is sometimes inlined in the page itself.
        needed.retain(|op| match direct_query_id(&html, op) {
            Some(id) => {
                debug!(operation = %op, id, "query ID inlined in entry page");
                found.insert(op.clone(), id);
                false
            }
            None => true,
        });

        for bundle in extract_bundle_urls(&html, &web_base) {
            if !bundle_urls.contains(&bundle) {
                bundle_urls.push(bundle);
            }
        }
    }

    if pages_fetched == 0 {
        // Every entry page failed; surface the underlying error rather
        // than a misleading discovery failure.
        if let Some(e) = page_error {
            return Err(e);
        }
    }

    let mut bundles_scanned = 0usize;
    if !needed.is_empty() {
        let (scanned, bundle_hits) =
            scan_bundles(&bundle_urls, &needed, opts, started, &client.config().user_agent).await?;
        bundles_scanned = scanned;
        for (op, id) in bundle_hits {
            needed.remove(&op);
            found.insert(op, id);
        }
    }

    if found.is_empty() {
        return Err(VoyagerError::DiscoveryFailed {
            bundles_scanned,
            timeout: opts.deadline,
        });
    }
    if !needed.is_empty() {
        warn!(missing = ?needed, "discovery resolved only part of the requested operations");
    }
    info!(
        resolved = found.len(),
        bundles_scanned,
        elapsed = ?started.elapsed(),
        "query-ID discovery finished"
    );
    store.merge_and_persist(found, BTreeMap::new(), BTreeMap::new(), None)
}

async fn fetch_page(client: &VoyagerClient, url: &str) -> Result<String> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static("text/html,application/xhtml+xml"),
    );
    let resp = client
        .request_absolute(Method::GET, url, None, Some(headers))
        .await?;
    resp.text()
        .await
        .map_err(|e| VoyagerError::Network(e.to_string()))
}

/// Fan out over bundle URLs with bounded concurrency, removing operations
/// from the shared still-needed set as they resolve (check-then-delete
/// under one lock, so two workers cannot both claim the same operation).
async fn scan_bundles(
    urls: &[String],
    needed: &HashSet<String>,
    opts: &DiscoveryOptions,
    started: Instant,
    user_agent: &str,
) -> Result<(usize, Vec<(String, String)>)> {
    let fetcher = reqwest::Client::builder()
        .user_agent(user_agent)
        .build()
        .map_err(|e| VoyagerError::Network(e.to_string()))?;
    let remaining = Arc::new(Mutex::new(needed.clone()));
    let deadline = opts.deadline;

    let mut hits = Vec::new();
    let mut scanned = 0usize;
    let mut fetches = stream::iter(urls.iter().take(opts.max_bundles).cloned())
        .map(|url| {
            let fetcher = fetcher.clone();
            let remaining = Arc::clone(&remaining);
            async move {
                if started.elapsed() >= deadline || remaining.lock().await.is_empty() {
                    return None;
                }
                debug!(url, "scanning bundle");
                let body = match fetcher.get(&url).send().await {
                    Ok(resp) => resp.text().await.unwrap_or_default(),
                    Err(e) => {
                        debug!(url, error = %e, "bundle fetch failed");
                        return Some(Vec::new());
                    }
                };
                let mut found = Vec::new();
                let mut still = remaining.lock().await;
                still.retain(|op| match scan_bundle(&body, op) {
                    Some(id) => {
                        found.push((op.clone(), id));
                        false
                    }
                    None => true,
                });
                Some(found)
            }
        })
        .buffer_unordered(opts.concurrency.max(1));

    while let Some(outcome) = fetches.next().await {
        if let Some(found) = outcome {
            scanned += 1;
            hits.extend(found);
        }
        if started.elapsed() >= deadline || remaining.lock().await.is_empty() {
            break;
        }
    }
    Ok((scanned, hits))
}

/// Regex variants for an ID already inlined in a page or bundle. The hash
/// part is hex-ish but its exact alphabet has drifted before, so accept a
/// broad word-character run.
pub(crate) fn direct_query_id(text: &str, operation: &str) -> Option<String> {
    let patterns = [
        format!(r#"queryId=({operation}\.[A-Za-z0-9]+)"#),
        format!(r#""queryId"\s*:\s*"({operation}\.[A-Za-z0-9]+)""#),
        format!(r#"queryId:"({operation}\.[A-Za-z0-9]+)""#),
    ];
    for pattern in &patterns {
        let Ok(re) = Regex::new(pattern) else { continue };
        if let Some(id) = re.captures(text).and_then(|c| c.get(1)) {
            return Some(id.as_str().to_string());
        }
    }
    None
}

/// ID patterns as they appear inside a JavaScript bundle. The direct
/// variants apply there too; a bare `<op>.<hash>` token is the last
/// resort.
pub(crate) fn scan_bundle(body: &str, operation: &str) -> Option<String> {
    if let Some(id) = direct_query_id(body, operation) {
        return Some(id);
    }
    let Ok(re) = Regex::new(&format!(r#"({operation}\.[A-Za-z0-9]{{8,64}})"#)) else {
        return None;
    };
    re.captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Every JavaScript bundle URL a page references, normalized to absolute
/// HTTPS. Script tags, link tags, inline JSON blobs, and the `jsUrls`
/// data-island array all count; URLs may be absolute, protocol-relative,
/// path-relative, or escaped.
pub(crate) fn extract_bundle_urls(html: &str, web_base: &str) -> Vec<String> {
    let text = crate::parse::rsc::unescape(html);
    let mut urls = Vec::new();
    let mut push = |raw: &str| {
        if let Some(url) = normalize_bundle_url(raw, web_base) {
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
    };

    static TAG_RE: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r#"<(?:script|link)[^>]+(?:src|href)="([^"]+)""#).unwrap()
    });
    for capture in TAG_RE.captures_iter(&text) {
        if let Some(url) = capture.get(1) {
            push(url.as_str());
        }
    }

    // Inline data island: "jsUrls":["...","..."]
    static JS_URLS_RE: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r#""jsUrls"\s*:\s*\[([^\]]*)\]"#).unwrap()
    });
    static QUOTED_RE: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r#""([^"]+)""#).unwrap()
    });
    for island in JS_URLS_RE.captures_iter(&text) {
        if let Some(list) = island.get(1) {
            for quoted in QUOTED_RE.captures_iter(list.as_str()) {
                if let Some(url) = quoted.get(1) {
                    push(url.as_str());
                }
            }
        }
    }

    // Any other quoted .js URL embedded in JSON blobs.
    static LOOSE_JS_RE: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r#""((?:https:)?//[^"]+\.js(?:\?[^"]*)?)""#).unwrap()
    });
    for capture in LOOSE_JS_RE.captures_iter(&text) {
        if let Some(url) = capture.get(1) {
            push(url.as_str());
        }
    }

    urls
}

/// Normalize one raw reference to an absolute HTTPS bundle URL, or reject
/// it when it is not a JavaScript asset.
pub(crate) fn normalize_bundle_url(raw: &str, web_base: &str) -> Option<String> {
    let raw = raw.trim();
    let absolute = if let Some(rest) = raw.strip_prefix("//") {
        format!("https://{rest}")
    } else if raw.starts_with("https://") || raw.starts_with("http://") {
        raw.to_string()
    } else if raw.starts_with('/') {
        format!("{}{raw}", web_base.trim_end_matches('/'))
    } else {
        return None;
    };
    let path = absolute.split('?').next().unwrap_or(&absolute);
    if !path.ends_with(".js") {
        return None;
    }
    Some(absolute)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn direct_patterns_cover_the_inline_variants() {
        assert_eq!(
            direct_query_id("…?queryId=opA.abc123&variables=()", "opA").as_deref(),
            Some("opA.abc123")
        );
        assert_eq!(
            direct_query_id(r#"{"queryId":"opA.def456"}"#, "opA").as_deref(),
            Some("opA.def456")
        );
        assert_eq!(
            direct_query_id(r#"x={queryId:"opA.aaa111"}"#, "opA").as_deref(),
            Some("opA.aaa111")
        );
        assert!(direct_query_id("nothing here", "opA").is_none());
    }

    #[test]
    fn bare_bundle_token_is_last_resort() {
        assert_eq!(
            scan_bundle(r#"registry.register("opB.cafe0123beef")"#, "opB").as_deref(),
            Some("opB.cafe0123beef")
        );
        // Too short to be a hash.
        assert!(scan_bundle("opB.ab", "opB").is_none());
    }

    #[test]
    fn bundle_urls_are_extracted_and_normalized() {
        let html = concat!(
            r#"<script src="https://static.licdn.com/sc/h/main.js"></script>"#,
            r#"<link href="//static.licdn.com/sc/h/vendor.js" rel="preload">"#,
            r#"<script src="/assets/local.js"></script>"#,
            r#"<script src="/assets/styles.css"></script>"#,
            r#"{"jsUrls":["https:\/\/static.licdn.com\/sc\/h\/island.js","\/assets\/rel.js"]}"#,
        );
        let urls = extract_bundle_urls(html, "https://www.linkedin.com");
        assert_eq!(
            urls,
            vec![
                "https://static.licdn.com/sc/h/main.js",
                "https://static.licdn.com/sc/h/vendor.js",
                "https://www.linkedin.com/assets/local.js",
                "https://static.licdn.com/sc/h/island.js",
                "https://www.linkedin.com/assets/rel.js",
            ]
        );
    }

    #[test]
    fn non_js_and_relative_junk_is_rejected() {
        assert!(normalize_bundle_url("/style.css", "https://b").is_none());
        assert!(normalize_bundle_url("data:text/javascript;base64,x", "https://b").is_none());
        assert_eq!(
            normalize_bundle_url("//cdn/x.js?v=2", "https://b").as_deref(),
            Some("https://cdn/x.js?v=2")
        );
    }
}
