//! One async function per subcommand.
//!
//! Each command is a thin composition: client call(s), a parser from
//! `voyager-core`, and one of the output renderers. Pagination-driven
//! commands report progress to stderr so stdout stays machine-readable.

use std::path::PathBuf;

use anyhow::Context as _;
use reqwest::Method;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use tracing::info;

use voyager_core::connections::{
    BackendChoice, ListOptions, SEARCH_CONNECTIONS_OP, list_connections,
};
use voyager_core::models::{Conversation, Invitation, Message};
use voyager_core::pagination::{PaginateOptions, Progress, paginate};
use voyager_core::parse::{
    parse_conversations, parse_invitations, parse_invitations_from_flagship_rsc, parse_messages,
    parse_profile,
};
use voyager_core::queryids::{DiscoveryOptions, refresh_from_har, refresh_from_linkedin};
use voyager_core::{ClientConfig, Credentials, QueryIdStore, VoyagerClient};

use crate::output;

/// Messaging endpoints page in twenties.
const MESSAGING_PAGE_SIZE: usize = 20;

pub struct Context {
    client: VoyagerClient,
    store: QueryIdStore,
    json: bool,
}

impl Context {
    pub fn new(credentials: Credentials, config: ClientConfig, json: bool) -> anyhow::Result<Self> {
        info!(source = %credentials.source, "credentials resolved");
        let cache_path = match &config.cache_path {
            Some(path) => path.clone(),
            None => QueryIdStore::default_path()
                .context("no cache directory on this platform; set $VOYAGER_CACHE_PATH")?,
        };
        let store = QueryIdStore::new(cache_path);
        let client = VoyagerClient::new(&credentials, config)?;
        Ok(Self {
            client,
            store,
            json,
        })
    }

    fn web_base(&self) -> &str {
        &self.client.config().web_base
    }
}

pub async fn profile(ctx: &Context, username: &str) -> anyhow::Result<()> {
    let path = format!("identity/profiles/{username}/profileView");
    let resp = ctx.client.get(&path).await?;
    let value: Value = resp.json().await?;
    let profile = parse_profile(&value, ctx.web_base())
        .with_context(|| format!("no profile found in the response for {username}"))?;
    if ctx.json {
        output::print_json(&profile)?;
    } else {
        output::print_profile(&profile);
    }
    Ok(())
}

pub async fn connections(
    ctx: &Context,
    count: Option<usize>,
    experimental: bool,
) -> anyhow::Result<()> {
    let opts = ListOptions {
        target: count,
        backend: if experimental {
            BackendChoice::Flagship
        } else {
            BackendChoice::Search
        },
        discovery: DiscoveryOptions::default(),
    };
    let found = list_connections(&ctx.client, &ctx.store, &opts, Some(&report_progress)).await?;
    if ctx.json {
        output::print_json(&found)?;
    } else {
        output::print_connections(&found);
    }
    Ok(())
}

pub async fn conversations(ctx: &Context, count: Option<usize>) -> anyhow::Result<()> {
    let opts = PaginateOptions {
        target: count,
        page_size: MESSAGING_PAGE_SIZE,
        tolerate_empty_pages: false,
    };
    let found: Vec<Conversation> = paginate(
        &opts,
        |c: &Conversation| {
            if c.urn.is_empty() {
                format!("@{}", c.participant_username)
            } else {
                c.urn.clone()
            }
        },
        Some(&report_progress),
        |req| {
            let path = format!(
                "messaging/conversations?keyVersion=LEGACY_INBOX&start={}&count={MESSAGING_PAGE_SIZE}",
                req.offset
            );
            fetch_and_parse(ctx, path, |value| parse_conversations(&value))
        },
    )
    .await?;
    if ctx.json {
        output::print_json(&found)?;
    } else {
        output::print_conversations(&found);
    }
    Ok(())
}

pub async fn messages(
    ctx: &Context,
    conversation: &str,
    count: Option<usize>,
) -> anyhow::Result<()> {
    let opts = PaginateOptions {
        target: count,
        page_size: MESSAGING_PAGE_SIZE,
        tolerate_empty_pages: false,
    };
    let found: Vec<Message> = paginate(
        &opts,
        |m: &Message| {
            if m.urn.is_empty() {
                format!("{}|{}", m.sent_at, m.body)
            } else {
                m.urn.clone()
            }
        },
        Some(&report_progress),
        |req| {
            let path = format!(
                "messaging/conversations/{conversation}/events?start={}&count={MESSAGING_PAGE_SIZE}",
                req.offset
            );
            fetch_and_parse(ctx, path, |value| parse_messages(&value))
        },
    )
    .await?;
    if ctx.json {
        output::print_json(&found)?;
    } else {
        output::print_messages(&found);
    }
    Ok(())
}

pub async fn invitations(ctx: &Context) -> anyhow::Result<()> {
    let resp = ctx
        .client
        .get("relationships/invitationViews?start=0&count=100")
        .await?;
    let value: Value = resp.json().await?;
    let mut found = parse_invitations(&value, ctx.web_base());

    // The REST view sometimes reports nothing while the web UI shows
    // pending invitations; the streamed page is the fallback source.
    if found.is_empty() {
        found = flagship_invitations(ctx).await?;
    }

    if ctx.json {
        output::print_json(&found)?;
    } else {
        output::print_invitations(&found);
    }
    Ok(())
}

async fn flagship_invitations(ctx: &Context) -> anyhow::Result<Vec<Invitation>> {
    let url = format!(
        "{}/flagship-web/mynetwork/invitation-manager/received/",
        ctx.web_base()
    );
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("text/x-component"));
    let resp = ctx
        .client
        .request_absolute(Method::GET, &url, None, Some(headers))
        .await?;
    let payload = resp.text().await?;
    Ok(parse_invitations_from_flagship_rsc(&payload, ctx.web_base()))
}

pub async fn send_message(ctx: &Context, conversation: &str, body: &str) -> anyhow::Result<()> {
    let path = format!("messaging/conversations/{conversation}/events?action=create");
    let payload = json!({
        "eventCreate": {
            "value": {
                "com.linkedin.voyager.messaging.create.MessageCreate": {
                    "attributedBody": { "text": body, "attributes": [] },
                    "attachments": []
                }
            }
        }
    });
    ctx.client.post(&path, &payload).await?;
    if ctx.json {
        output::print_json(&json!({ "sent": true, "conversation": conversation }))?;
    } else {
        println!("message sent to {conversation}");
    }
    Ok(())
}

pub async fn accept_invite(
    ctx: &Context,
    invitation_id: &str,
    shared_secret: &str,
) -> anyhow::Result<()> {
    let path = format!("relationships/invitations/{invitation_id}?action=accept");
    let payload = json!({
        "invitationId": invitation_id,
        "sharedSecret": shared_secret,
    });
    ctx.client.post(&path, &payload).await?;
    if ctx.json {
        output::print_json(&json!({ "accepted": true, "invitation": invitation_id }))?;
    } else {
        println!("invitation {invitation_id} accepted");
    }
    Ok(())
}

pub async fn refresh_ids(
    ctx: &Context,
    operations: Vec<String>,
    har: Option<PathBuf>,
) -> anyhow::Result<()> {
    let operations = if operations.is_empty() {
        vec![SEARCH_CONNECTIONS_OP.to_string()]
    } else {
        operations
    };

    let har = har.or_else(|| ctx.client.config().har_path.clone());
    let snapshot = match har {
        Some(har_path) => {
            info!(har = %har_path.display(), "refreshing query IDs from capture file");
            refresh_from_har(&ctx.store, &operations, &har_path)?
        }
        None => {
            refresh_from_linkedin(
                &ctx.store,
                &ctx.client,
                &operations,
                &DiscoveryOptions::default(),
            )
            .await?
        }
    };

    if ctx.json {
        output::print_json(&snapshot)?;
    } else {
        for (op, id) in &snapshot.ids {
            println!("{op} = {id}");
        }
        eprintln!(
            "{} query IDs cached at {}",
            snapshot.ids.len(),
            ctx.store.path().display()
        );
    }
    Ok(())
}

/// Shared page fetch: GET a relative path, parse the JSON body with `parse`.
async fn fetch_and_parse<T>(
    ctx: &Context,
    path: String,
    parse: impl Fn(Value) -> Vec<T>,
) -> voyager_core::Result<Vec<T>> {
    let resp = ctx.client.get(&path).await?;
    let value: Value = resp
        .json()
        .await
        .map_err(|e| voyager_core::VoyagerError::Network(e.to_string()))?;
    Ok(parse(value))
}

fn report_progress(p: Progress) {
    match p.target {
        Some(target) => eprintln!("page {}: {}/{target}", p.page + 1, p.fetched),
        None => eprintln!("page {}: {} so far", p.page + 1, p.fetched),
    }
}
