//! Connection listing.
//!
//! Two structurally different upstream paths produce the same normalized
//! list: the GraphQL search endpoint (primary) and the experimental
//! flagship streamed endpoint. Both sit behind [`ListBackend`] so the
//! choice is pure strategy selection; the pagination controller never
//! special-cases either. When the experimental backend errors or parses
//! nothing, the primary runs as a fallback.

use reqwest::Method;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, REFERER};
use serde_json::{Value, json};
use tracing::warn;

use crate::client::VoyagerClient;
use crate::error::{Result, VoyagerError};
use crate::models::Connection;
use crate::pagination::{PageRequest, PaginateOptions, Progress, paginate};
use crate::parse::{parse_connections, parse_connections_from_rsc};
use crate::queryids::{DiscoveryOptions, QueryIdStore, with_query_id_retry};

/// GraphQL operation behind the people-search connections listing.
pub const SEARCH_CONNECTIONS_OP: &str = "voyagerSearchDashClustersByAll";

/// Page size both backends request.
pub const CONNECTIONS_PAGE_SIZE: usize = 50;

/// Flagship pager identifier for the connections list.
const FLAGSHIP_PAGER_ID: &str = "com.linkedin.sdui.mynetwork.ConnectionsList";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendChoice {
    /// GraphQL search clusters, the stable path.
    #[default]
    Search,
    /// Flagship streamed endpoint, selected explicitly by flag.
    Flagship,
}

#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// `None` fetches until exhausted.
    pub target: Option<usize>,
    pub backend: BackendChoice,
    pub discovery: DiscoveryOptions,
}

/// One page of connections from one upstream path.
pub trait ListBackend {
    fn name(&self) -> &'static str;
    fn fetch_page(
        &self,
        client: &VoyagerClient,
        req: PageRequest,
    ) -> impl Future<Output = Result<Vec<Connection>>>;
}

/// Fetch connections with the selected backend, falling back to the
/// primary when the experimental one fails or yields nothing.
pub async fn list_connections(
    client: &VoyagerClient,
    store: &QueryIdStore,
    opts: &ListOptions,
    progress: Option<&(dyn Fn(Progress) + Send + Sync)>,
) -> Result<Vec<Connection>> {
    match opts.backend {
        BackendChoice::Search => search_connections(client, store, opts, progress).await,
        BackendChoice::Flagship => {
            match flagship_connections(client, opts, progress).await {
                Ok(found) if !found.is_empty() => Ok(found),
                Ok(_) => {
                    warn!("flagship backend parsed nothing, falling back to search");
                    search_connections(client, store, opts, progress).await
                }
                Err(e) => {
                    warn!(error = %e, "flagship backend failed, falling back to search");
                    search_connections(client, store, opts, progress).await
                }
            }
        }
    }
}

async fn search_connections(
    client: &VoyagerClient,
    store: &QueryIdStore,
    opts: &ListOptions,
    progress: Option<&(dyn Fn(Progress) + Send + Sync)>,
) -> Result<Vec<Connection>> {
    let har_path = client.config().har_path.clone();
    with_query_id_retry(
        store,
        client,
        SEARCH_CONNECTIONS_OP,
        &opts.discovery,
        har_path.as_deref(),
        |query_id| {
            let backend = SearchBackend { query_id };
            run_backend(backend, client, opts, progress, false)
        },
    )
    .await
}

async fn flagship_connections(
    client: &VoyagerClient,
    opts: &ListOptions,
    progress: Option<&(dyn Fn(Progress) + Send + Sync)>,
) -> Result<Vec<Connection>> {
    // The streamed endpoint is the one prone to transient empty pages.
    run_backend(FlagshipBackend, client, opts, progress, true).await
}

async fn run_backend<B: ListBackend>(
    backend: B,
    client: &VoyagerClient,
    opts: &ListOptions,
    progress: Option<&(dyn Fn(Progress) + Send + Sync)>,
    tolerate_empty_pages: bool,
) -> Result<Vec<Connection>> {
    let paginate_opts = PaginateOptions {
        target: opts.target,
        page_size: CONNECTIONS_PAGE_SIZE,
        tolerate_empty_pages,
    };
    paginate(
        &paginate_opts,
        connection_key,
        progress,
        |req| backend.fetch_page(client, req),
    )
    .await
}

/// Cross-page dedup key: username, or a natural key when it is missing.
fn connection_key(conn: &Connection) -> String {
    if conn.username.is_empty() {
        format!("{}|{}", conn.urn, conn.display_name())
    } else {
        conn.username.clone()
    }
}

/// Primary: GraphQL search clusters.
pub struct SearchBackend {
    pub query_id: String,
}

impl ListBackend for SearchBackend {
    fn name(&self) -> &'static str {
        "search"
    }

    async fn fetch_page(
        &self,
        client: &VoyagerClient,
        req: PageRequest,
    ) -> Result<Vec<Connection>> {
        let variables = format!(
            "(start:{},count:{},origin:MEMBER_PROFILE_CANNED_SEARCH,query:(flagshipSearchIntent:SEARCH_SRP,queryParameters:List((key:network,value:List(F)),(key:resultType,value:List(PEOPLE)))))",
            req.offset, CONNECTIONS_PAGE_SIZE
        );
        let path = format!("graphql?queryId={}&variables={variables}", self.query_id);
        let resp = client.get(&path).await?;
        let value: Value = resp
            .json()
            .await
            .map_err(|e| VoyagerError::Network(e.to_string()))?;
        Ok(parse_connections(&value, &client.config().web_base))
    }
}

/// Experimental: flagship streamed pager.
pub struct FlagshipBackend;

impl ListBackend for FlagshipBackend {
    fn name(&self) -> &'static str {
        "flagship"
    }

    async fn fetch_page(
        &self,
        client: &VoyagerClient,
        req: PageRequest,
    ) -> Result<Vec<Connection>> {
        let web_base = client.config().web_base.clone();
        let url = format!("{web_base}/flagship-web/rsc?sduiid={FLAGSHIP_PAGER_ID}");
        let body = json!({
            "pagerId": FLAGSHIP_PAGER_ID,
            "state": {
                "start": req.offset,
                "count": CONNECTIONS_PAGE_SIZE,
            }
        });
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/x-component"));
        if let Ok(referer) =
            HeaderValue::from_str(&format!("{web_base}/mynetwork/invite-connect/connections/"))
        {
            headers.insert(REFERER, referer);
        }
        let resp = client
            .request_absolute(Method::POST, &url, Some(body), Some(headers))
            .await?;
        let payload = resp
            .text()
            .await
            .map_err(|e| VoyagerError::Network(e.to_string()))?;
        Ok(parse_connections_from_rsc(&payload, &web_base))
    }
}
