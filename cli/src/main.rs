//! `voyager` command-line entry point.
//!
//! This layer only parses arguments, resolves credentials and
//! configuration from flags and environment, and dispatches into
//! `voyager-core`. All network behavior lives in the core crate.

mod commands;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use voyager_core::config::DEFAULT_DELAY_RANGE;
use voyager_core::{ClientConfig, Credentials};

/// Environment variables consumed at this boundary.
const ENV_LI_AT: &str = "LI_AT";
const ENV_JSESSIONID: &str = "JSESSIONID";
const ENV_CACHE_PATH: &str = "VOYAGER_CACHE_PATH";
const ENV_HAR_PATH: &str = "VOYAGER_HAR_PATH";
const ENV_MIN_DELAY: &str = "VOYAGER_MIN_DELAY";
const ENV_MAX_DELAY: &str = "VOYAGER_MAX_DELAY";

#[derive(Parser)]
#[command(name = "voyager", about = "LinkedIn Voyager command-line client", version)]
struct Cli {
    /// li_at session cookie (falls back to $LI_AT).
    #[arg(long, global = true)]
    li_at: Option<String>,

    /// JSESSIONID cookie (falls back to $JSESSIONID).
    #[arg(long, global = true)]
    jsession_id: Option<String>,

    /// Short request pacing; slows back down after the first 429.
    #[arg(long, global = true)]
    fast: bool,

    /// Emit JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch one profile by public identifier.
    Profile { username: String },

    /// List connections.
    Connections {
        /// Stop after this many; omit to fetch all.
        #[arg(long)]
        count: Option<usize>,
        /// Use the experimental flagship backend (falls back to search).
        #[arg(long)]
        experimental: bool,
    },

    /// List message threads.
    Conversations {
        #[arg(long)]
        count: Option<usize>,
    },

    /// List messages in one conversation.
    Messages {
        conversation: String,
        #[arg(long)]
        count: Option<usize>,
    },

    /// List pending invitations.
    Invitations,

    /// Send a message to an existing conversation.
    SendMessage { conversation: String, body: String },

    /// Accept a pending invitation.
    AcceptInvite {
        invitation_id: String,
        shared_secret: String,
    },

    /// Refresh the GraphQL query-ID cache.
    RefreshIds {
        /// Operations to resolve; defaults to the ones this tool uses.
        operations: Vec<String>,
        /// Read IDs from a HAR capture instead of scanning LinkedIn.
        #[arg(long)]
        har: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("voyager: failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };
    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("voyager: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let credentials = resolve_credentials(cli.li_at.clone(), cli.jsession_id.clone())?;
    let config = resolve_config(cli.fast)?;
    let ctx = commands::Context::new(credentials, config, cli.json)?;

    match cli.command {
        Command::Profile { username } => commands::profile(&ctx, &username).await,
        Command::Connections {
            count,
            experimental,
        } => commands::connections(&ctx, count, experimental).await,
        Command::Conversations { count } => commands::conversations(&ctx, count).await,
        Command::Messages {
            conversation,
            count,
        } => commands::messages(&ctx, &conversation, count).await,
        Command::Invitations => commands::invitations(&ctx).await,
        Command::SendMessage { conversation, body } => {
            commands::send_message(&ctx, &conversation, &body).await
        }
        Command::AcceptInvite {
            invitation_id,
            shared_secret,
        } => commands::accept_invite(&ctx, &invitation_id, &shared_secret).await,
        Command::RefreshIds { operations, har } => {
            commands::refresh_ids(&ctx, operations, har).await
        }
    }
}

/// Credentials from flags first, environment second; the provenance label
/// records which supplied what.
fn resolve_credentials(
    li_at_flag: Option<String>,
    jsession_flag: Option<String>,
) -> anyhow::Result<Credentials> {
    let li_at_env = std::env::var(ENV_LI_AT).ok();
    let jsession_env = std::env::var(ENV_JSESSIONID).ok();

    let from_cli = li_at_flag.is_some() || jsession_flag.is_some();
    let li_at = li_at_flag.or(li_at_env.clone());
    let jsession_id = jsession_flag.or(jsession_env.clone());
    let from_env = match (&li_at, &jsession_id) {
        (Some(_), Some(_)) => li_at_env.is_some() || jsession_env.is_some(),
        _ => false,
    };

    let (Some(li_at), Some(jsession_id)) = (li_at, jsession_id) else {
        anyhow::bail!(
            "missing credentials: pass --li-at/--jsession-id or set $LI_AT and $JSESSIONID"
        );
    };
    let source = match (from_cli, from_env) {
        (true, true) => "cli+env",
        (true, false) => "cli",
        _ => "env",
    };
    Ok(Credentials::new(li_at, jsession_id, source))
}

fn resolve_config(fast: bool) -> anyhow::Result<ClientConfig> {
    let mut config = ClientConfig {
        fast_mode: fast,
        ..ClientConfig::default()
    };
    if let Ok(path) = std::env::var(ENV_CACHE_PATH) {
        config.cache_path = Some(PathBuf::from(path));
    }
    if let Ok(path) = std::env::var(ENV_HAR_PATH) {
        config.har_path = Some(PathBuf::from(path));
    }

    let min = parse_delay(ENV_MIN_DELAY)?;
    let max = parse_delay(ENV_MAX_DELAY)?;
    config.delay_range = match (min, max) {
        (Some(min), Some(max)) if min <= max => min..=max,
        (Some(min), None) => min..=min.max(*DEFAULT_DELAY_RANGE.end()),
        (None, Some(max)) => (*DEFAULT_DELAY_RANGE.start()).min(max)..=max,
        (None, None) => DEFAULT_DELAY_RANGE,
        (Some(min), Some(max)) => anyhow::bail!(
            "${ENV_MIN_DELAY} ({min}) must not exceed ${ENV_MAX_DELAY} ({max})"
        ),
    };
    Ok(config)
}

fn parse_delay(var: &str) -> anyhow::Result<Option<f64>> {
    match std::env::var(var) {
        Ok(raw) => {
            let seconds: f64 = raw
                .parse()
                .map_err(|_| anyhow::anyhow!("${var} must be a number of seconds, got {raw:?}"))?;
            if seconds < 0.0 {
                anyhow::bail!("${var} must not be negative");
            }
            Ok(Some(seconds))
        }
        Err(_) => Ok(None),
    }
}
