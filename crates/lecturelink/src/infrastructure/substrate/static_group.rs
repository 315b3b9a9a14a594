//! Substrate for a group that already exists.
//!
//! Classrooms without a peer-to-peer radio can still run a session when the
//! devices share a network and the lecturer's address is known in advance.
//! [`StaticSubstrate`] reports that fixed group: subscribing immediately
//! queues a radio-on notification followed by a connection change, so the
//! session proceeds straight to its role just as it would after a real group
//! negotiation.

use std::net::IpAddr;
use std::sync::Mutex;

use async_trait::async_trait;
use lecturelink_core::{GroupInfo, PeerDevice, PeerId};
use tokio::sync::mpsc;
use tracing::debug;

use super::{DiscoverySubstrate, EventFeed, SubstrateError, SubstrateEvent, DEFAULT_FEED_DEPTH};

/// A [`DiscoverySubstrate`] that reports a fixed, pre-formed group.
pub struct StaticSubstrate {
    group: GroupInfo,
    peers: Vec<PeerDevice>,
    feed: Mutex<Option<mpsc::Sender<SubstrateEvent>>>,
}

impl StaticSubstrate {
    pub fn new(group: GroupInfo, peers: Vec<PeerDevice>) -> Self {
        Self {
            group,
            peers,
            feed: Mutex::new(None),
        }
    }

    /// This device owns the group at `owner_address`.
    pub fn owner(owner_address: IpAddr) -> Self {
        Self::new(GroupInfo::owned(owner_address, []), Vec::new())
    }

    /// This device is a member of the group owned by `owner_address`.
    pub fn client(owner_address: IpAddr) -> Self {
        Self::new(GroupInfo::joined(owner_address, []), Vec::new())
    }
}

#[async_trait]
impl DiscoverySubstrate for StaticSubstrate {
    async fn request_discovery(&self) -> Result<(), SubstrateError> {
        Ok(())
    }

    async fn request_peer_snapshot(&self) -> Result<Vec<PeerDevice>, SubstrateError> {
        Ok(self.peers.clone())
    }

    async fn request_connect(&self, peer_id: &PeerId) -> Result<(), SubstrateError> {
        debug!("static group: connect to {peer_id} accepted, membership is fixed");
        Ok(())
    }

    async fn request_group_info(&self) -> Result<GroupInfo, SubstrateError> {
        Ok(self.group.clone())
    }

    fn subscribe(&self) -> Result<EventFeed, SubstrateError> {
        let (tx, rx) = mpsc::channel(DEFAULT_FEED_DEPTH);
        for event in [
            SubstrateEvent::StateChanged { enabled: true },
            SubstrateEvent::ConnectionChanged,
        ] {
            // A fresh channel has room for both.
            let _ = tx.try_send(event);
        }
        *self.feed.lock().expect("lock poisoned") = Some(tx);
        Ok(rx)
    }

    fn unsubscribe(&self) {
        *self.feed.lock().expect("lock poisoned") = None;
    }
}
