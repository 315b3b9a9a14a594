//! LectureLink command-line entry point.
//!
//! Runs one session for a group that was formed outside the app (for example
//! two laptops on the same classroom network), using the static substrate.
//!
//! ```text
//! # lecturer
//! lecturelink --role owner --port 8888
//!
//! # student: sends the greeting, then each --message, then exits
//! lecturelink --role client --owner-address 192.168.49.1 -m "What is on the exam?"
//! ```
//!
//! Every published session view is printed to stdout as one JSON line, so the
//! output can be piped into other tools.  Logs go to stderr.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load config (file, then CLI / env overrides)
//!  └─ AppState::new()          -- spawns the session task
//!  └─ start_discovery           -- static group: straight to owner/client
//!       ├─ owner:  serve until Ctrl-C
//!       └─ client: exchange all messages, then tear down
//! ```

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use lecturelink::application::session::SessionView;
use lecturelink::infrastructure::storage::config::{
    load_config, load_config_from, AppConfig, GroupRole, StaticGroupConfig,
    DEFAULT_GROUP_OWNER_ADDRESS,
};
use lecturelink::infrastructure::substrate::static_group::StaticSubstrate;
use lecturelink::infrastructure::substrate::DiscoverySubstrate;
use lecturelink::infrastructure::ui_bridge::{
    end_session, send_message, start_discovery, AppState, SessionViewDto,
};
use lecturelink_core::Role;

// ── CLI definition ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliRole {
    Owner,
    Client,
}

impl From<CliRole> for GroupRole {
    fn from(role: CliRole) -> Self {
        match role {
            CliRole::Owner => GroupRole::Owner,
            CliRole::Client => GroupRole::Client,
        }
    }
}

/// Command-line arguments.  Each flag can also be set via environment
/// variable; flags win over the config file.
#[derive(Debug, Parser)]
#[command(
    name = "lecturelink",
    about = "Lecturer/student line exchange over an ad-hoc group",
    version
)]
struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, env = "LECTURELINK_CONFIG")]
    config: Option<PathBuf>,

    /// This device's side of the group.
    #[arg(long, value_enum, env = "LECTURELINK_ROLE")]
    role: Option<CliRole>,

    /// Address of the group owner.
    #[arg(long, env = "LECTURELINK_OWNER_ADDRESS")]
    owner_address: Option<IpAddr>,

    /// TCP port of the exchange.
    #[arg(long, env = "LECTURELINK_PORT")]
    port: Option<u16>,

    /// Message to send after the greeting (client only; repeatable).
    #[arg(short = 'm', long = "message")]
    messages: Vec<String>,
}

impl Cli {
    fn apply_to(&self, config: &mut AppConfig) {
        if let Some(port) = self.port {
            config.transport.port = port;
        }
        if let Some(role) = self.role {
            let group = config.static_group.get_or_insert_with(|| StaticGroupConfig {
                role: role.into(),
                owner_address: DEFAULT_GROUP_OWNER_ADDRESS.to_string(),
            });
            group.role = role.into();
        }
        if let Some(owner) = self.owner_address {
            match config.static_group.as_mut() {
                Some(group) => group.owner_address = owner.to_string(),
                None => warn!("--owner-address ignored: no role given"),
            }
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => load_config().context("failed to load config")?,
    };

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.session.log_level)),
        )
        .init();

    cli.apply_to(&mut config);
    let group = config
        .static_group
        .clone()
        .context("no group configured: pass --role or add a [static_group] section")?;
    let owner_ip = group.owner_ip()?;
    let session_config = config.session_config().context("invalid configuration")?;
    let expected_replies = usize::from(session_config.greeting.is_some()) + cli.messages.len();

    let substrate: Arc<dyn DiscoverySubstrate> = match group.role {
        GroupRole::Owner => Arc::new(StaticSubstrate::owner(owner_ip)),
        GroupRole::Client => Arc::new(StaticSubstrate::client(owner_ip)),
    };
    let state = AppState::new(substrate, session_config);
    info!("LectureLink {:?} session {} (owner {owner_ip})", group.role, state.session.id());

    let printer = tokio::spawn(print_views(state.session.subscribe()));

    let started = start_discovery(Arc::clone(&state)).await;
    if !started.success {
        bail!(
            "session failed to start: {}",
            started.error.unwrap_or_default()
        );
    }

    let outcome = match group.role {
        GroupRole::Owner => wait_for_ctrl_c().await,
        GroupRole::Client => tokio::select! {
            outcome = run_client(Arc::clone(&state), cli.messages.clone(), expected_replies) => outcome,
            signal = wait_for_ctrl_c() => signal,
        },
    };

    end_session(Arc::clone(&state)).await;
    if let Err(e) = printer.await {
        error!("view printer failed: {e}");
    }
    info!("LectureLink stopped");
    outcome
}

async fn wait_for_ctrl_c() -> anyhow::Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("Ctrl-C received; shutting down");
    Ok(())
}

/// Sends every message once the group is joined, then waits for all replies.
async fn run_client(state: Arc<AppState>, messages: Vec<String>, expected: usize) -> anyhow::Result<()> {
    let joined = state
        .session
        .wait_until(|v| v.role == Role::Client || v.ended)
        .await;
    if joined.role != Role::Client {
        bail!("session ended before joining the group");
    }

    for text in messages {
        let result = send_message(Arc::clone(&state), text).await;
        if !result.success {
            bail!("message rejected: {}", result.error.unwrap_or_default());
        }
    }

    let done = state
        .session
        .wait_until(|v| {
            v.received_count() >= expected
                || (v.pending_exchanges == 0 && v.last_error.is_some())
                || v.ended
        })
        .await;
    if done.received_count() < expected {
        match &done.last_error {
            Some(e) => bail!("exchange failed: {e}"),
            None => bail!("session ended before all replies arrived"),
        }
    }
    Ok(())
}

/// Prints each published view as one JSON line until the session ends.
async fn print_views(mut views: watch::Receiver<Arc<SessionView>>) {
    loop {
        let dto = SessionViewDto::from(&**views.borrow_and_update());
        match serde_json::to_string(&dto) {
            Ok(line) => println!("{line}"),
            Err(e) => error!("failed to serialize session view: {e}"),
        }
        if views.changed().await.is_err() {
            break;
        }
    }
}
