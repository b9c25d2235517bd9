//! Rate-limited, cookie-authenticated HTTP client.
//!
//! Every request funnels through one retry routine that enforces a
//! randomized inter-request delay, backs off exponentially on 429, refuses
//! to follow redirects (a 302 back to the requested URL is how LinkedIn
//! signals a dead session), and maps every non-success response into the
//! [`VoyagerError`] taxonomy.

use std::time::{Duration, Instant};

use rand::Rng;
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, COOKIE, HeaderMap, HeaderName, HeaderValue, LOCATION, SET_COOKIE,
    USER_AGENT,
};
use reqwest::{Method, StatusCode};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::{ClientConfig, FAST_DELAY_RANGE};
use crate::credentials::Credentials;
use crate::error::{Result, VoyagerError};

const CSRF_TOKEN: &str = "csrf-token";
const LI_LANG: &str = "x-li-lang";
const RESTLI_PROTOCOL: &str = "x-restli-protocol-version";
const PAGE_INSTANCE: &str = "x-li-page-instance";

/// Pacing state shared by all requests on one client instance. Holding the
/// lock across the sleep is what serializes outbound requests.
#[derive(Debug)]
struct Pacing {
    last_request_at: Option<Instant>,
    /// Set after the first 429 while in fast mode; subsequent requests use
    /// the default slower range.
    slowed: bool,
}

pub struct VoyagerClient {
    http: reqwest::Client,
    config: ClientConfig,
    /// Built once at construction and reused verbatim for every request, so
    /// fingerprint-sensitive headers stay stable across a burst of calls.
    headers: HeaderMap,
    pacing: Mutex<Pacing>,
}

impl VoyagerClient {
    pub fn new(credentials: &Credentials, config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| VoyagerError::Network(e.to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, header_value(&credentials.cookie_header)?);
        headers.insert(
            HeaderName::from_static(CSRF_TOKEN),
            header_value(&credentials.csrf_token)?,
        );
        headers.insert(USER_AGENT, header_value(&config.user_agent)?);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(
            HeaderName::from_static(LI_LANG),
            HeaderValue::from_static("en_US"),
        );
        headers.insert(
            HeaderName::from_static(RESTLI_PROTOCOL),
            HeaderValue::from_static("2.0.0"),
        );
        headers.insert(
            HeaderName::from_static(PAGE_INSTANCE),
            header_value(&page_instance())?,
        );

        Ok(Self {
            http,
            config,
            headers,
            pacing: Mutex::new(Pacing {
                last_request_at: None,
                slowed: false,
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// GET relative to the Voyager API base.
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        self.request(Method::GET, path, None, None).await
    }

    /// POST relative to the Voyager API base.
    pub async fn post(&self, path: &str, body: &serde_json::Value) -> Result<reqwest::Response> {
        self.request(Method::POST, path, Some(body.clone()), None)
            .await
    }

    /// PUT relative to the Voyager API base.
    pub async fn put(&self, path: &str, body: &serde_json::Value) -> Result<reqwest::Response> {
        self.request(Method::PUT, path, Some(body.clone()), None)
            .await
    }

    /// Request against a path relative to the configured API base.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<reqwest::Response> {
        let url = join_url(&self.config.base_url, path);
        self.request_with_retry(method, &url, body, extra_headers)
            .await
    }

    /// Request against an arbitrary absolute URL (flagship endpoints, entry
    /// pages). Same pacing, retry, and error mapping as [`Self::request`].
    pub async fn request_absolute(
        &self,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<reqwest::Response> {
        self.request_with_retry(method, url, body, extra_headers)
            .await
    }

    async fn request_with_retry(
        &self,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<reqwest::Response> {
        let mut headers = self.headers.clone();
        if let Some(extra) = extra_headers {
            for (name, value) in extra.iter() {
                headers.insert(name.clone(), value.clone());
            }
        }

        let mut attempt: u32 = 0;
        loop {
            self.pace().await;
            debug!(%method, url, attempt, "sending request");

            let mut req = self.http.request(method.clone(), url).headers(headers.clone());
            if let Some(body) = &body {
                req = req.json(body);
            }
            let resp = match req.send().await {
                Ok(resp) => resp,
                Err(e) => return Err(VoyagerError::Network(e.to_string())),
            };

            let status = resp.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                self.note_throttled().await;
                if attempt >= self.config.max_retries {
                    return Err(VoyagerError::RateLimited {
                        attempts: attempt + 1,
                    });
                }
                // 5s, 10s, 20s, ... doubling per attempt.
                let delay = self
                    .config
                    .initial_backoff
                    .saturating_mul(1u32 << attempt.min(16));
                warn!(url, attempt, ?delay, "throttled (429), backing off");
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            if status.is_redirection() {
                return Err(self.classify_redirect(&resp, url));
            }

            if status.is_success() {
                return Ok(resp);
            }

            return Err(map_failure(status, url, resp).await);
        }
    }

    /// Sleep long enough that at least one randomized delay has passed since
    /// the previous request on this instance.
    async fn pace(&self) {
        let mut state = self.pacing.lock().await;
        if let Some(last) = state.last_request_at {
            let range = if self.config.fast_mode && !state.slowed {
                FAST_DELAY_RANGE
            } else {
                self.config.delay_range.clone()
            };
            let (min, max) = (*range.start(), *range.end());
            let target = if max <= min {
                min
            } else {
                rand::rng().random_range(min..=max)
            };
            let elapsed = last.elapsed().as_secs_f64();
            if target > elapsed {
                tokio::time::sleep(Duration::from_secs_f64(target - elapsed)).await;
            }
        }
        state.last_request_at = Some(Instant::now());
    }

    async fn note_throttled(&self) {
        if self.config.fast_mode {
            let mut state = self.pacing.lock().await;
            if !state.slowed {
                warn!("fast pacing throttled; falling back to default delays");
                state.slowed = true;
            }
        }
    }

    /// A 302 that points back at the requested URL, or that clears the
    /// session cookie, is LinkedIn's way of reporting a dead session.
    fn classify_redirect(&self, resp: &reqwest::Response, url: &str) -> VoyagerError {
        let location = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if resp.status() == StatusCode::FOUND && location == url {
            return VoyagerError::Auth(format!("redirected back to {url}"));
        }
        for cookie in resp.headers().get_all(SET_COOKIE) {
            let cookie = cookie.to_str().unwrap_or("");
            if cookie.starts_with("li_at=") && is_cookie_deletion(cookie) {
                return VoyagerError::Auth("server cleared the li_at session cookie".into());
            }
        }
        VoyagerError::Http {
            status: resp.status().as_u16(),
            detail: format!("unexpected redirect to {location}"),
        }
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| VoyagerError::InvalidRequest(format!("header value not sendable: {value:?}")))
}

/// Stable per-process page-instance identifier.
fn page_instance() -> String {
    let tag: u64 = rand::rng().random();
    format!("urn:li:page:d_flagship3_feed;{tag:016x}")
}

fn is_cookie_deletion(cookie: &str) -> bool {
    let lower = cookie.to_ascii_lowercase();
    lower.contains("li_at=delete")
        || lower.contains("max-age=0")
        || lower.contains("expires=thu, 01 jan 1970")
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Map a non-2xx, non-429, non-redirect response to a typed error, pulling a
/// human-useful detail string out of the body when one is present.
async fn map_failure(status: StatusCode, url: &str, resp: reqwest::Response) -> VoyagerError {
    let body = resp.text().await.unwrap_or_default();
    let detail = body_detail(&body);

    // 400/403/404 on a GraphQL path usually means the cached query ID no
    // longer matches what the deployed frontend registered.
    if url.contains("/graphql")
        && matches!(status.as_u16(), 400 | 403 | 404)
    {
        return VoyagerError::StaleQueryId {
            operation: query_operation(url),
            status: status.as_u16(),
        };
    }

    match status.as_u16() {
        401 => VoyagerError::Auth(or_status(detail, 401)),
        403 => VoyagerError::Forbidden(or_status(detail, 403)),
        404 => VoyagerError::NotFound(detail),
        400 => VoyagerError::InvalidRequest(detail),
        999 => VoyagerError::UpstreamBlocked,
        code => VoyagerError::Http {
            status: code,
            detail,
        },
    }
}

fn or_status(detail: String, status: u16) -> String {
    if detail.is_empty() {
        format!("HTTP {status}")
    } else {
        detail
    }
}

fn body_detail(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "error", "code"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                return text.to_string();
            }
        }
    }
    let trimmed = body.trim();
    let mut detail: String = trimmed.chars().take(180).collect();
    if detail.len() < trimmed.len() {
        detail.push('…');
    }
    detail
}

/// Operation name out of a `queryId=<op>.<hash>` query string, best effort.
fn query_operation(url: &str) -> String {
    url.split("queryId=")
        .nth(1)
        .map(|rest| {
            rest.chars()
                .take_while(|c| *c != '.' && *c != '&')
                .collect()
        })
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(join_url("https://h/api/", "/me"), "https://h/api/me");
        assert_eq!(join_url("https://h/api", "me"), "https://h/api/me");
    }

    #[test]
    fn cookie_deletion_markers() {
        assert!(is_cookie_deletion("li_at=delete me; Path=/"));
        assert!(is_cookie_deletion("li_at=x; Max-Age=0"));
        assert!(is_cookie_deletion(
            "li_at=x; Expires=Thu, 01 Jan 1970 00:00:00 GMT"
        ));
        assert!(!is_cookie_deletion("li_at=abc; Path=/; Secure"));
    }

    #[test]
    fn query_operation_is_extracted_from_url() {
        let url = "https://h/voyager/api/graphql?queryId=voyagerSearchDashClusters.abc12&variables=()";
        assert_eq!(query_operation(url), "voyagerSearchDashClusters");
        assert_eq!(query_operation("https://h/graphql"), "unknown");
    }

    #[test]
    fn body_detail_prefers_json_message() {
        assert_eq!(body_detail(r#"{"message":"no such member"}"#), "no such member");
        assert_eq!(body_detail("plain text"), "plain text");
    }
}
