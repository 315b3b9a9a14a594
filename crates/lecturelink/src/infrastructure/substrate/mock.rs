//! Scripted discovery substrate for tests and demos.
//!
//! [`ScriptedSubstrate`] answers requests from state the test sets up
//! (authorization, the peer list, the group snapshot, queued failures) and
//! records every call so tests can assert on the exact request sequence.
//! Notifications are pushed with [`ScriptedSubstrate::emit`] or, to exercise
//! the platform translation path, with [`ScriptedSubstrate::deliver`].

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use lecturelink_core::{GroupInfo, PeerDevice, PeerId};
use tokio::sync::{mpsc, oneshot};

use super::{
    DiscoverySubstrate, EventFeed, SubstrateError, SubstrateEvent, SubstrateOperation,
    DEFAULT_FEED_DEPTH,
};
use crate::infrastructure::event_bridge::{translate, PlatformNotification};

/// One recorded call on a [`ScriptedSubstrate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubstrateCall {
    Discovery,
    PeerSnapshot,
    Connect(PeerId),
    GroupInfo,
    Subscribe,
    Unsubscribe,
}

struct ScriptState {
    authorized: bool,
    failures: HashMap<SubstrateOperation, VecDeque<SubstrateError>>,
    peers: Vec<PeerDevice>,
    group: GroupInfo,
    feed: Option<mpsc::Sender<SubstrateEvent>>,
    group_info_gate: Option<oneshot::Receiver<()>>,
    calls: Vec<SubstrateCall>,
}

/// An in-memory [`DiscoverySubstrate`] driven entirely by the caller.
pub struct ScriptedSubstrate {
    state: Mutex<ScriptState>,
}

impl ScriptedSubstrate {
    /// Creates an authorized substrate with no peers and no group.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ScriptState {
                authorized: true,
                failures: HashMap::new(),
                peers: Vec::new(),
                group: GroupInfo::dissolved(),
                feed: None,
                group_info_gate: None,
                calls: Vec::new(),
            }),
        }
    }

    /// Grants or revokes the runtime authorization.  Requests fail with
    /// [`SubstrateError::Unauthorized`] while it is revoked.
    pub fn set_authorized(&self, authorized: bool) {
        self.lock().authorized = authorized;
    }

    /// Makes the next call of `operation` fail with `error`.  Calls queue up.
    pub fn fail_next(&self, operation: SubstrateOperation, error: SubstrateError) {
        self.lock()
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Sets the list returned by peer snapshot requests.
    pub fn set_peers(&self, peers: Vec<PeerDevice>) {
        self.lock().peers = peers;
    }

    /// Sets the snapshot returned by group info requests.
    pub fn set_group_info(&self, group: GroupInfo) {
        self.lock().group = group;
    }

    /// Holds the next group info request open until the returned sender is
    /// used or dropped.  The call is recorded as soon as it arrives.
    pub fn hold_group_info(&self) -> oneshot::Sender<()> {
        let (release, gate) = oneshot::channel();
        self.lock().group_info_gate = Some(gate);
        release
    }

    /// Pushes `event` onto the current feed.
    ///
    /// Returns `false` if nobody is subscribed or the feed was dropped.
    pub async fn emit(&self, event: SubstrateEvent) -> bool {
        let feed = self.lock().feed.clone();
        match feed {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Translates a raw platform notification and pushes the result.
    ///
    /// Returns `false` if the notification is not recognised or nobody is
    /// subscribed.
    pub async fn deliver(&self, notification: &PlatformNotification) -> bool {
        match translate(notification) {
            Some(event) => self.emit(event).await,
            None => false,
        }
    }

    /// Returns every call made so far, oldest first.
    pub fn calls(&self) -> Vec<SubstrateCall> {
        self.lock().calls.clone()
    }

    pub fn is_subscribed(&self) -> bool {
        self.lock().feed.is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptState> {
        self.state.lock().expect("lock poisoned")
    }

    /// Records `call` and returns the scripted outcome for `operation`.
    fn check(&self, call: SubstrateCall, operation: SubstrateOperation) -> Result<(), SubstrateError> {
        let mut state = self.lock();
        state.calls.push(call);
        if !state.authorized {
            return Err(SubstrateError::Unauthorized);
        }
        match state.failures.get_mut(&operation).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl Default for ScriptedSubstrate {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DiscoverySubstrate for ScriptedSubstrate {
    async fn request_discovery(&self) -> Result<(), SubstrateError> {
        self.check(SubstrateCall::Discovery, SubstrateOperation::Discovery)
    }

    async fn request_peer_snapshot(&self) -> Result<Vec<PeerDevice>, SubstrateError> {
        self.check(SubstrateCall::PeerSnapshot, SubstrateOperation::PeerSnapshot)?;
        Ok(self.lock().peers.clone())
    }

    async fn request_connect(&self, peer_id: &PeerId) -> Result<(), SubstrateError> {
        self.check(SubstrateCall::Connect(peer_id.clone()), SubstrateOperation::Connect)
    }

    async fn request_group_info(&self) -> Result<GroupInfo, SubstrateError> {
        self.check(SubstrateCall::GroupInfo, SubstrateOperation::GroupInfo)?;
        let gate = self.lock().group_info_gate.take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        Ok(self.lock().group.clone())
    }

    fn subscribe(&self) -> Result<EventFeed, SubstrateError> {
        let (tx, rx) = mpsc::channel(DEFAULT_FEED_DEPTH);
        let mut state = self.lock();
        state.calls.push(SubstrateCall::Subscribe);
        state.feed = Some(tx);
        Ok(rx)
    }

    fn unsubscribe(&self) {
        let mut state = self.lock();
        state.calls.push(SubstrateCall::Unsubscribe);
        state.feed = None;
    }
}
