//! UI command bridge: exposes session operations to a presentation layer.
//!
//! Each `pub async fn` here is one UI command.  They all take the shared
//! [`AppState`], delegate to the [`SessionHandle`], and answer with a
//! [`CommandResult`] so every response has the same JSON shape:
//! `{ success: bool, data: T | null, error: string | null }`.
//!
//! Action commands (`start_discovery`, `connect_peer`, `send_message`,
//! `end_session`) return the session view as it stands right after the
//! action, so the UI can re-render from the response without a second call.
//!
//! # Data Transfer Objects (DTOs)
//!
//! The session publishes rich Rust types (`PeerId`, `IpAddr`, error enums).
//! The DTOs below flatten those into plain strings and numbers for the UI.
//! Any change to a DTO here must be mirrored by the UI's type definitions.

use std::sync::Arc;

use lecturelink_core::{Direction, LogEntry, PeerDevice, PeerId, PeerStatus};
use serde::{Deserialize, Serialize};

use crate::application::session::{SessionConfig, SessionError, SessionHandle, SessionView};
use crate::infrastructure::substrate::DiscoverySubstrate;

// ── Shared application state ──────────────────────────────────────────────────

/// State shared by all UI commands.
pub struct AppState {
    pub session: SessionHandle,
}

impl AppState {
    /// Spawns a session against `substrate` and wraps it for the UI.
    pub fn new(substrate: Arc<dyn DiscoverySubstrate>, config: SessionConfig) -> Arc<Self> {
        Arc::new(Self {
            session: SessionHandle::spawn(substrate, config),
        })
    }
}

// ── Data Transfer Objects ─────────────────────────────────────────────────────

/// One peer as shown in the peer list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerDto {
    pub id: String,
    pub display_name: String,
    /// `"discovered"`, `"connecting"`, `"connected"` or `"disconnected"`.
    pub status: String,
}

impl From<&PeerDevice> for PeerDto {
    fn from(peer: &PeerDevice) -> Self {
        let status = match peer.status {
            PeerStatus::Discovered => "discovered",
            PeerStatus::Connecting => "connecting",
            PeerStatus::Connected => "connected",
            PeerStatus::Disconnected => "disconnected",
        };
        Self {
            id: peer.id.to_string(),
            display_name: peer.display_name.clone(),
            status: status.to_string(),
        }
    }
}

/// One line of the message log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntryDto {
    /// `"sent"` or `"received"`.
    pub direction: String,
    pub text: String,
}

impl From<&LogEntry> for LogEntryDto {
    fn from(entry: &LogEntry) -> Self {
        let direction = match entry.direction {
            Direction::Sent => "sent",
            Direction::Received => "received",
        };
        Self {
            direction: direction.to_string(),
            text: entry.text.clone(),
        }
    }
}

/// Everything the UI renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionViewDto {
    pub session_id: String,
    pub state: String,
    pub role: String,
    pub owner_address: Option<String>,
    pub listen_addr: Option<String>,
    pub peers: Vec<PeerDto>,
    pub message_log: Vec<LogEntryDto>,
    pub last_error: Option<String>,
    pub radio_enabled: Option<bool>,
    pub pending_exchanges: usize,
    pub ended: bool,
}

impl From<&SessionView> for SessionViewDto {
    fn from(view: &SessionView) -> Self {
        Self {
            session_id: view.session_id.to_string(),
            state: view.state.to_string(),
            role: format!("{:?}", view.role),
            owner_address: view.owner_address.map(|a| a.to_string()),
            listen_addr: view.listen_addr.map(|a| a.to_string()),
            peers: view.peers.iter().map(PeerDto::from).collect(),
            message_log: view.message_log.iter().map(LogEntryDto::from).collect(),
            last_error: view.last_error.as_ref().map(SessionError::to_string),
            radio_enabled: view.radio_enabled,
            pending_exchanges: view.pending_exchanges,
            ended: view.ended,
        }
    }
}

/// Unified response wrapper used by all commands.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResult<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> CommandResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

fn view_result(state: &AppState, outcome: Result<(), SessionError>) -> CommandResult<SessionViewDto> {
    match outcome {
        Ok(()) => CommandResult::ok(SessionViewDto::from(&*state.session.view())),
        Err(e) => CommandResult::err(e.to_string()),
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// Starts peer discovery (or re-scans while discovering).
pub async fn start_discovery(state: Arc<AppState>) -> CommandResult<SessionViewDto> {
    let outcome = state.session.start_discovery().await;
    view_result(&state, outcome)
}

/// Requests a group with the peer whose link address is `peer_id`.
pub async fn connect_peer(state: Arc<AppState>, peer_id: String) -> CommandResult<SessionViewDto> {
    let outcome = state.session.connect(PeerId::new(peer_id)).await;
    view_result(&state, outcome)
}

/// Queues `text` for exchange with the group owner.
pub async fn send_message(state: Arc<AppState>, text: String) -> CommandResult<SessionViewDto> {
    let outcome = state.session.send_message(text).await;
    view_result(&state, outcome)
}

/// Ends the session.  Safe to call more than once.
pub async fn end_session(state: Arc<AppState>) -> CommandResult<SessionViewDto> {
    state.session.teardown().await;
    view_result(&state, Ok(()))
}

/// Returns the latest published view.
pub async fn get_session_view(state: Arc<AppState>) -> CommandResult<SessionViewDto> {
    view_result(&state, Ok(()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
