//! Session: the top-level orchestrator the UI talks to.
//!
//! A session is a single Tokio task that exclusively owns the formation state
//! machine, the peer registry, the group snapshot, the transport endpoint, and
//! the message log.  Everything else talks to it through queues:
//!
//! ```text
//!   SessionHandle ──commands──▶ ┌──────────────┐ ──watch──▶ Arc<SessionView>
//!   EventBridge ──────inputs──▶ │ session task │
//!   OwnerListener ────inputs──▶ │ (serialized) │
//!   client exchange ──inputs──▶ └──────────────┘
//! ```
//!
//! # Why one task? (for beginners)
//!
//! The radio's notifications, the UI's button presses, and finished socket
//! exchanges all arrive at unpredictable times.  Funnelling them into one task
//! that handles one message at a time means no locks around the state and no
//! event is ever processed concurrently with another.  Readers get an
//! immutable [`SessionView`] snapshot through a `watch` channel and never
//! block the session.
//!
//! # Endpoint generations
//!
//! Every group transition replaces the transport endpoint and bumps a
//! generation counter.  The one exception is an owner whose group gains or
//! loses members: its listener stays open under the same generation.  Listener reports and client exchange results carry the
//! generation they were started under; results from a replaced endpoint are
//! dropped.

use std::collections::VecDeque;
use std::mem;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use lecturelink_core::{LogEntry, MessageLog, PeerDevice, PeerId, Role};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::group_formation::{FormationState, GroupFormation, TransportDirective};
use crate::infrastructure::event_bridge::EventBridge;
use crate::infrastructure::substrate::{
    reason, DiscoverySubstrate, SubstrateError, SubstrateEvent, SubstrateOperation,
    DEFAULT_FEED_DEPTH,
};
use crate::infrastructure::transport::{
    exchange, ListenerReport, OwnerListener, TransportError, TransportSettings,
};

/// Text a client sends automatically once it has joined a group.
pub const DEFAULT_GREETING: &str = "Hello from client";

const COMMAND_QUEUE_DEPTH: usize = 32;

/// Unique identifier of one session.
pub type SessionId = Uuid;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors surfaced by session operations and recorded in the view.
///
/// None of these is fatal: the session keeps running and the most recent one
/// is shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The runtime authorization for the radio is missing.
    #[error("{operation} needs runtime authorization for the peer-to-peer radio")]
    Unauthorized { operation: SubstrateOperation },

    /// The platform rejected a request.
    #[error("{operation} failed: {} (reason code {reason_code})", reason::describe(*.reason_code))]
    SubstrateFailure {
        operation: SubstrateOperation,
        reason_code: i32,
    },

    /// A socket-level failure on the current endpoint.
    #[error("transport error: {cause}")]
    Transport { cause: String },

    /// The operation is not valid right now.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl SessionError {
    /// Attributes a substrate refusal to `operation`.
    pub fn from_substrate(operation: SubstrateOperation, err: SubstrateError) -> Self {
        match err {
            SubstrateError::Unauthorized => SessionError::Unauthorized { operation },
            SubstrateError::Rejected { reason_code } => SessionError::SubstrateFailure {
                operation,
                reason_code,
            },
        }
    }

    fn ended() -> Self {
        SessionError::InvalidState("session has ended".to_string())
    }
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        SessionError::Transport {
            cause: err.to_string(),
        }
    }
}

// ── Configuration and view ────────────────────────────────────────────────────

/// Runtime settings for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Name this device shows in logs.
    pub display_name: String,
    /// Sent automatically on becoming a client; `None` disables it.
    pub greeting: Option<String>,
    pub transport: TransportSettings,
    /// Capacity of the inbound event queue.
    pub event_queue_depth: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            display_name: "LectureLink".to_string(),
            greeting: Some(DEFAULT_GREETING.to_string()),
            transport: TransportSettings::default(),
            event_queue_depth: DEFAULT_FEED_DEPTH,
        }
    }
}

/// Immutable snapshot of a session, republished after every change.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub session_id: SessionId,
    pub state: FormationState,
    pub role: Role,
    pub owner_address: Option<IpAddr>,
    /// Bound address of the owner's listener while it is open.
    pub listen_addr: Option<SocketAddr>,
    pub peers: Vec<PeerDevice>,
    pub message_log: Vec<LogEntry>,
    pub last_error: Option<SessionError>,
    pub radio_enabled: Option<bool>,
    /// Client messages queued or in flight.
    pub pending_exchanges: usize,
    /// `true` once the session has been torn down.
    pub ended: bool,
}

impl SessionView {
    fn initial(session_id: SessionId) -> Self {
        Self {
            session_id,
            state: FormationState::Idle,
            role: Role::Unassigned,
            owner_address: None,
            listen_addr: None,
            peers: Vec::new(),
            message_log: Vec::new(),
            last_error: None,
            radio_enabled: None,
            pending_exchanges: 0,
            ended: false,
        }
    }

    /// Number of `Received` entries in the log.
    pub fn received_count(&self) -> usize {
        self.message_log
            .iter()
            .filter(|e| e.direction == lecturelink_core::Direction::Received)
            .count()
    }
}

// ── Handle ────────────────────────────────────────────────────────────────────

enum Command {
    StartDiscovery {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Connect {
        peer_id: PeerId,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    SendMessage {
        text: String,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Teardown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle to a running session.
///
/// Dropping every handle tears the session down.
#[derive(Clone)]
pub struct SessionHandle {
    session_id: SessionId,
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<Arc<SessionView>>,
}

impl SessionHandle {
    /// Spawns a new session on the current Tokio runtime.
    pub fn spawn(substrate: Arc<dyn DiscoverySubstrate>, config: SessionConfig) -> Self {
        let session_id = Uuid::new_v4();
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let (inputs_tx, inputs_rx) = mpsc::channel(config.event_queue_depth.max(1));
        let (view_tx, view_rx) = watch::channel(Arc::new(SessionView::initial(session_id)));

        info!("session {session_id} starting as {}", config.display_name);
        let actor = SessionActor {
            session_id,
            formation: GroupFormation::new(substrate),
            bridge: EventBridge::new(),
            endpoint: Endpoint::Idle,
            generation: 0,
            log: MessageLog::new(),
            last_error: None,
            ended: false,
            inputs_tx,
            view_tx,
            config,
        };
        tokio::spawn(actor.run(commands_rx, inputs_rx));

        Self {
            session_id,
            commands: commands_tx,
            view: view_rx,
        }
    }

    pub fn id(&self) -> SessionId {
        self.session_id
    }

    /// Starts (or re-issues) peer discovery.
    pub async fn start_discovery(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::StartDiscovery { reply }).await?
    }

    /// Requests a group with a discovered peer.
    pub async fn connect(&self, peer_id: PeerId) -> Result<(), SessionError> {
        self.request(|reply| Command::Connect { peer_id, reply }).await?
    }

    /// Queues `text` for exchange with the group owner.
    ///
    /// Returns once the message is queued; the reply shows up in the view's
    /// message log.
    pub async fn send_message(&self, text: impl Into<String>) -> Result<(), SessionError> {
        let text = text.into();
        self.request(|reply| Command::SendMessage { text, reply }).await?
    }

    /// Tears the session down and waits until it has stopped.  Idempotent.
    pub async fn teardown(&self) {
        if self.request(|reply| Command::Teardown { reply }).await.is_err() {
            debug!("session {} already ended", self.session_id);
        }
    }

    /// The latest published view.
    pub fn view(&self) -> Arc<SessionView> {
        Arc::clone(&self.view.borrow())
    }

    /// A receiver that is notified on every republish.
    pub fn subscribe(&self) -> watch::Receiver<Arc<SessionView>> {
        self.view.clone()
    }

    /// Waits until a published view satisfies `predicate` and returns it.
    ///
    /// If the session ends first, returns the final view.
    pub async fn wait_until<F>(&self, mut predicate: F) -> Arc<SessionView>
    where
        F: FnMut(&SessionView) -> bool,
    {
        let mut rx = self.view.clone();
        if let Ok(view) = rx.wait_for(|view| predicate(view)).await {
            return Arc::clone(&view);
        }
        let last = Arc::clone(&rx.borrow());
        last
    }

    async fn request<R>(
        &self,
        make: impl FnOnce(oneshot::Sender<R>) -> Command,
    ) -> Result<R, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(make(reply_tx))
            .await
            .map_err(|_| SessionError::ended())?;
        reply_rx.await.map_err(|_| SessionError::ended())
    }
}

// ── Session task ──────────────────────────────────────────────────────────────

/// Messages from the session's own collaborators.
#[derive(Debug)]
enum SessionInput {
    Substrate(SubstrateEvent),
    Served(ListenerReport),
    ExchangeDone {
        generation: u64,
        result: Result<String, TransportError>,
    },
}

impl From<SubstrateEvent> for SessionInput {
    fn from(event: SubstrateEvent) -> Self {
        SessionInput::Substrate(event)
    }
}

impl From<ListenerReport> for SessionInput {
    fn from(report: ListenerReport) -> Self {
        SessionInput::Served(report)
    }
}

/// The client side of a group: one owner address, exchanges run one at a time.
struct ClientChannel {
    owner: SocketAddr,
    pending: VecDeque<String>,
    in_flight: Option<JoinHandle<()>>,
    /// Set after a transport failure; cleared only by the next group change.
    dead: bool,
}

enum Endpoint {
    Idle,
    Listening(OwnerListener),
    Connecting(ClientChannel),
}

struct SessionActor {
    session_id: SessionId,
    config: SessionConfig,
    formation: GroupFormation,
    bridge: EventBridge,
    endpoint: Endpoint,
    generation: u64,
    log: MessageLog,
    last_error: Option<SessionError>,
    ended: bool,
    inputs_tx: mpsc::Sender<SessionInput>,
    view_tx: watch::Sender<Arc<SessionView>>,
}

impl SessionActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut inputs: mpsc::Receiver<SessionInput>,
    ) {
        loop {
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(Command::Teardown { reply }) => {
                        self.teardown().await;
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => {
                        debug!("all handles to session {} dropped", self.session_id);
                        self.teardown().await;
                        break;
                    }
                },
                Some(input) = inputs.recv() => self.handle_input(input).await,
            }
            self.publish();
        }
        info!("session {} ended", self.session_id);
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::StartDiscovery { reply } => {
                let result = self.start_discovery().await;
                self.reply(reply, result);
            }
            Command::Connect { peer_id, reply } => {
                let result = self.formation.connect(&peer_id).await;
                self.reply(reply, result);
            }
            Command::SendMessage { text, reply } => {
                let result = self.send_message(text);
                self.reply(reply, result);
            }
            // Handled by the run loop.
            Command::Teardown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    async fn handle_input(&mut self, input: SessionInput) {
        match input {
            SessionInput::Substrate(event) => {
                debug!("substrate event {event:?}");
                match self.formation.handle_event(event).await {
                    Ok(directive) => self.apply(directive).await,
                    Err(e) => {
                        warn!("handling {event:?} failed: {e}");
                        self.last_error = Some(e);
                    }
                }
            }
            SessionInput::Served(report) => self.on_served(report),
            SessionInput::ExchangeDone { generation, result } => {
                self.on_exchange_done(generation, result)
            }
        }
    }

    /// Records a failure as the latest error, publishes, then answers.
    /// A caller woken by the reply already sees the outcome in the view.
    fn reply(
        &mut self,
        reply: oneshot::Sender<Result<(), SessionError>>,
        result: Result<(), SessionError>,
    ) {
        if let Err(e) = &result {
            warn!("session {}: {e}", self.session_id);
            self.last_error = Some(e.clone());
        }
        self.publish();
        let _ = reply.send(result);
    }

    // ── Operations ────────────────────────────────────────────────────────────

    async fn start_discovery(&mut self) -> Result<(), SessionError> {
        if let Some(feed) = self.formation.start_discovery().await? {
            self.bridge.register(feed, self.inputs_tx.clone());
        }
        Ok(())
    }

    fn send_message(&mut self, text: String) -> Result<(), SessionError> {
        let role = self.formation.role();
        let Endpoint::Connecting(channel) = &mut self.endpoint else {
            return Err(SessionError::InvalidState(format!(
                "messages can only be sent as a client (current role: {role:?})"
            )));
        };
        if text.contains('\n') {
            return Err(SessionError::InvalidState(
                "message must not contain a line break".to_string(),
            ));
        }
        if channel.dead {
            return Err(SessionError::Transport {
                cause: format!(
                    "connection to group owner {} failed; waiting for the group to change",
                    channel.owner
                ),
            });
        }
        channel.pending.push_back(text);
        self.pump_exchanges();
        Ok(())
    }

    async fn teardown(&mut self) {
        self.close_endpoint().await;
        self.bridge.unregister();
        if self.formation.teardown() {
            info!("session {} torn down", self.session_id);
        }
        self.ended = true;
        self.publish();
    }

    // ── Endpoint management ───────────────────────────────────────────────────

    async fn apply(&mut self, directive: TransportDirective) {
        match directive {
            TransportDirective::Unchanged => {}
            TransportDirective::Close => self.close_endpoint().await,
            TransportDirective::Listen if matches!(self.endpoint, Endpoint::Listening(_)) => {
                debug!("group membership changed; owner listener kept");
            }
            TransportDirective::Listen => {
                self.close_endpoint().await;
                match OwnerListener::open(&self.config.transport, self.generation, self.inputs_tx.clone()).await {
                    Ok(listener) => self.endpoint = Endpoint::Listening(listener),
                    Err(e) => {
                        error!("owner listener could not start: {e}");
                        self.last_error = Some(e.into());
                    }
                }
            }
            TransportDirective::Connect(owner) => {
                self.close_endpoint().await;
                let owner = self.config.transport.owner_endpoint(owner);
                info!("joined group owned by {owner}");
                let mut channel = ClientChannel {
                    owner,
                    pending: VecDeque::new(),
                    in_flight: None,
                    dead: false,
                };
                if let Some(greeting) = &self.config.greeting {
                    channel.pending.push_back(greeting.clone());
                }
                self.endpoint = Endpoint::Connecting(channel);
                self.pump_exchanges();
            }
        }
    }

    /// Closes the current endpoint and starts a new generation.
    async fn close_endpoint(&mut self) {
        self.generation += 1;
        match mem::replace(&mut self.endpoint, Endpoint::Idle) {
            Endpoint::Idle => {}
            Endpoint::Listening(listener) => listener.close().await,
            Endpoint::Connecting(channel) => {
                if let Some(task) = channel.in_flight {
                    task.abort();
                }
                if !channel.pending.is_empty() {
                    debug!("dropping {} queued message(s)", channel.pending.len());
                }
            }
        }
    }

    /// Starts the next queued client exchange unless one is already running.
    fn pump_exchanges(&mut self) {
        let generation = self.generation;
        let Endpoint::Connecting(channel) = &mut self.endpoint else {
            return;
        };
        if channel.dead || channel.in_flight.is_some() {
            return;
        }
        let Some(text) = channel.pending.pop_front() else {
            return;
        };

        self.log.append(LogEntry::sent(text.clone()));
        let owner = channel.owner;
        let settings = self.config.transport.clone();
        let inputs = self.inputs_tx.clone();
        channel.in_flight = Some(tokio::spawn(async move {
            let result = exchange(owner, &text, &settings).await;
            let _ = inputs.send(SessionInput::ExchangeDone { generation, result }).await;
        }));
    }

    fn on_exchange_done(&mut self, generation: u64, result: Result<String, TransportError>) {
        if generation != self.generation {
            debug!("dropping exchange result from replaced endpoint");
            return;
        }
        let Endpoint::Connecting(channel) = &mut self.endpoint else {
            return;
        };
        channel.in_flight = None;
        match result {
            Ok(reply) => self.log.append(LogEntry::received(reply)),
            Err(e) => {
                warn!("exchange with group owner {} failed: {e}", channel.owner);
                channel.dead = true;
                channel.pending.clear();
                self.last_error = Some(e.into());
            }
        }
        self.pump_exchanges();
    }

    fn on_served(&mut self, report: ListenerReport) {
        if report.generation != self.generation || !matches!(self.endpoint, Endpoint::Listening(_)) {
            debug!("dropping report from replaced listener");
            return;
        }
        let served = report.exchange;
        info!("answered {}: {:?}", served.peer, served.response);
        self.log.append(LogEntry::received(served.request));
        self.log.append(LogEntry::sent(served.response));
    }

    // ── View ──────────────────────────────────────────────────────────────────

    fn snapshot(&self) -> SessionView {
        let (listen_addr, pending_exchanges) = match &self.endpoint {
            Endpoint::Idle => (None, 0),
            Endpoint::Listening(listener) => (Some(listener.local_addr()), 0),
            Endpoint::Connecting(channel) => (
                None,
                channel.pending.len() + usize::from(channel.in_flight.is_some()),
            ),
        };
        SessionView {
            session_id: self.session_id,
            state: self.formation.state(),
            role: self.formation.role(),
            owner_address: self.formation.group().owner_address,
            listen_addr,
            peers: self.formation.registry().all().to_vec(),
            message_log: self.log.entries().to_vec(),
            last_error: self.last_error.clone(),
            radio_enabled: self.formation.radio_enabled(),
            pending_exchanges,
            ended: self.ended,
        }
    }

    /// Publishes a new view if anything changed.
    fn publish(&self) {
        let view = self.snapshot();
        self.view_tx.send_if_modified(|current| {
            if **current == view {
                false
            } else {
                *current = Arc::new(view);
                true
            }
        });
    }
}
