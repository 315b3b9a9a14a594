//! GroupFormation: the discovery → connection → group → role state machine.
//!
//! # States (for beginners)
//!
//! ```text
//!            start_discovery                ConnectionChanged
//!   Idle ─────────────────────▶ Discovering ─────────────────▶ AwaitingGroup
//!    ▲                            ▲    │ connect(peer)             │
//!    │ teardown                   │    └──────(stays)              │ group info
//!    │                            │                                ▼
//!    └──────────── any ◀──────────┴── not formed ◀──── { Owner | Client }
//! ```
//!
//! - `PeersChanged` refreshes the registry in every non-idle state.
//! - `connect` is accepted while `Discovering` and while `Owner`, so a
//!   lecturer can keep inviting students into the group it already owns.
//! - `ConnectionChanged` is honoured in every non-idle state: the machine
//!   asks for the group info and moves to the role it describes.
//! - `teardown` is terminal: a torn-down machine refuses to start again.
//!
//! The machine itself never touches sockets.  Each group transition returns a
//! [`TransportDirective`] telling the session what to do with its endpoint.
//!
//! # Failure policy
//!
//! A refused substrate request (missing authorization or a platform reason
//! code) aborts only that operation.  The state the machine was in before the
//! request is kept; nothing is retried.

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use lecturelink_core::{GroupInfo, PeerId, Role};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::application::manage_peers::PeerRegistry;
use crate::application::session::SessionError;
use crate::infrastructure::substrate::{
    reason, DiscoverySubstrate, EventFeed, SubstrateEvent, SubstrateOperation,
};

/// Where the machine is in the formation pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum FormationState {
    #[default]
    Idle,
    Discovering,
    AwaitingGroup,
    Owner,
    Client,
}

impl fmt::Display for FormationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FormationState::Idle => "idle",
            FormationState::Discovering => "discovering",
            FormationState::AwaitingGroup => "awaiting group",
            FormationState::Owner => "group owner",
            FormationState::Client => "client",
        };
        f.write_str(label)
    }
}

/// What the session must do with its transport endpoint after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportDirective {
    /// Keep the current endpoint.
    Unchanged,
    /// Close the current endpoint; the group is gone.
    Close,
    /// Replace the endpoint with a listener.
    Listen,
    /// Replace the endpoint with a client channel to the owner.
    Connect(IpAddr),
}

/// The formation state machine together with the registry and group snapshot
/// it maintains.
pub struct GroupFormation {
    state: FormationState,
    substrate: Arc<dyn DiscoverySubstrate>,
    registry: PeerRegistry,
    group: GroupInfo,
    radio_enabled: Option<bool>,
    torn_down: bool,
}

impl GroupFormation {
    pub fn new(substrate: Arc<dyn DiscoverySubstrate>) -> Self {
        Self {
            state: FormationState::Idle,
            substrate,
            registry: PeerRegistry::new(),
            group: GroupInfo::dissolved(),
            radio_enabled: None,
            torn_down: false,
        }
    }

    pub fn state(&self) -> FormationState {
        self.state
    }

    /// The role derived from the latest group snapshot.
    pub fn role(&self) -> Role {
        self.group.role()
    }

    pub fn group(&self) -> &GroupInfo {
        &self.group
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    /// Last reported radio state, `None` until the first report.
    pub fn radio_enabled(&self) -> Option<bool> {
        self.radio_enabled
    }

    // ── Operations ────────────────────────────────────────────────────────────

    /// Starts discovery, or re-issues the discovery request while discovering.
    ///
    /// Returns the substrate's event feed when this call subscribed to it (the
    /// first call from `Idle`); the caller must pump it into the session.
    ///
    /// # Errors
    ///
    /// - `InvalidState` outside `Idle`/`Discovering`, or after teardown.
    /// - `Unauthorized` / `SubstrateFailure` if the substrate refuses; the
    ///   machine stays where it was (and is unsubscribed again from `Idle`).
    pub async fn start_discovery(&mut self) -> Result<Option<EventFeed>, SessionError> {
        if self.torn_down {
            return Err(SessionError::InvalidState(
                "session has been torn down".to_string(),
            ));
        }
        match self.state {
            FormationState::Idle => {
                let feed = self
                    .substrate
                    .subscribe()
                    .map_err(|e| SessionError::from_substrate(SubstrateOperation::Discovery, e))?;
                if let Err(e) = self.substrate.request_discovery().await {
                    self.substrate.unsubscribe();
                    return Err(SessionError::from_substrate(SubstrateOperation::Discovery, e));
                }
                self.transition(FormationState::Discovering);
                Ok(Some(feed))
            }
            FormationState::Discovering => {
                self.substrate
                    .request_discovery()
                    .await
                    .map_err(|e| SessionError::from_substrate(SubstrateOperation::Discovery, e))?;
                debug!("discovery re-issued");
                Ok(None)
            }
            other => Err(SessionError::InvalidState(format!(
                "cannot start discovery while {other}"
            ))),
        }
    }

    /// Requests a group with `peer_id`, or invites it into the group this
    /// device already owns.  On success the peer is marked `Connecting`; the
    /// outcome arrives later as `ConnectionChanged`.
    ///
    /// Valid while `Discovering` or `Owner`.  A client cannot add members, and
    /// nothing may be requested while a group snapshot is pending.
    pub async fn connect(&mut self, peer_id: &PeerId) -> Result<(), SessionError> {
        if !matches!(self.state, FormationState::Discovering | FormationState::Owner) {
            return Err(SessionError::InvalidState(format!(
                "cannot connect while {}",
                self.state
            )));
        }
        if self.registry.is_empty() {
            return Err(SessionError::InvalidState(format!(
                "unknown peer {peer_id}: no peers discovered yet"
            )));
        }
        if !self.registry.contains(peer_id) {
            return Err(SessionError::InvalidState(format!("unknown peer {peer_id}")));
        }
        self.substrate
            .request_connect(peer_id)
            .await
            .map_err(|e| SessionError::from_substrate(SubstrateOperation::Connect, e))?;
        self.registry.mark_connecting(peer_id);
        info!("connection to {peer_id} requested");
        Ok(())
    }

    /// Applies one substrate notification.
    pub async fn handle_event(
        &mut self,
        event: SubstrateEvent,
    ) -> Result<TransportDirective, SessionError> {
        if self.state == FormationState::Idle {
            debug!("ignoring {event:?} while idle");
            return Ok(TransportDirective::Unchanged);
        }
        match event {
            SubstrateEvent::StateChanged { enabled } => {
                if enabled {
                    info!("peer-to-peer radio enabled");
                } else {
                    warn!("peer-to-peer radio disabled");
                }
                self.radio_enabled = Some(enabled);
                Ok(TransportDirective::Unchanged)
            }
            SubstrateEvent::PeersChanged => {
                let snapshot = self
                    .substrate
                    .request_peer_snapshot()
                    .await
                    .map_err(|e| SessionError::from_substrate(SubstrateOperation::PeerSnapshot, e))?;
                let reported = snapshot.len();
                self.registry.upsert(snapshot);
                debug!("peer snapshot with {reported} device(s), {} known", self.registry.len());
                Ok(TransportDirective::Unchanged)
            }
            SubstrateEvent::ConnectionChanged => self.on_connection_changed().await,
            SubstrateEvent::ThisDeviceChanged => {
                info!("this device's details changed");
                Ok(TransportDirective::Unchanged)
            }
        }
    }

    /// Unsubscribes and returns to `Idle`.
    ///
    /// Returns `false`, without touching the substrate, if already idle.
    pub fn teardown(&mut self) -> bool {
        if self.state == FormationState::Idle {
            return false;
        }
        self.substrate.unsubscribe();
        self.group = GroupInfo::dissolved();
        self.torn_down = true;
        self.transition(FormationState::Idle);
        true
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    async fn on_connection_changed(&mut self) -> Result<TransportDirective, SessionError> {
        let previous = self.state;
        self.transition(FormationState::AwaitingGroup);

        let group = match self.substrate.request_group_info().await {
            Ok(group) => group,
            Err(e) => {
                self.state = previous;
                return Err(SessionError::from_substrate(SubstrateOperation::GroupInfo, e));
            }
        };

        let (next, directive) = match group.role() {
            Role::Owner => (FormationState::Owner, TransportDirective::Listen),
            Role::Client => match group.owner_address {
                Some(owner) => (FormationState::Client, TransportDirective::Connect(owner)),
                None => {
                    self.state = previous;
                    warn!("group info names this device a client but carries no owner address");
                    return Err(SessionError::SubstrateFailure {
                        operation: SubstrateOperation::GroupInfo,
                        reason_code: reason::ERROR,
                    });
                }
            },
            Role::Unassigned => (FormationState::Discovering, TransportDirective::Close),
        };

        if group.formed {
            for id in self.registry.connected_ids() {
                if !group.client_ids.contains(&id) {
                    info!("peer {id} left the group");
                    self.registry.mark_disconnected(&id);
                }
            }
            for id in &group.client_ids {
                self.registry.mark_connected(id);
            }
        } else {
            for id in self.registry.mark_all_disconnected() {
                info!("peer {id} disconnected");
            }
        }

        self.group = group;
        self.transition(next);
        Ok(directive)
    }

    fn transition(&mut self, next: FormationState) {
        if self.state != next {
            info!("formation: {} -> {}", self.state, next);
            self.state = next;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
