//! Peer devices reported by the discovery substrate.
//!
//! A *peer* is another device reachable over the local ad-hoc radio link.
//! Peers are identified by their link-layer address (on Wi-Fi Direct this is
//! the P2P device MAC address, e.g. `"02:00:00:00:01:00"`), which stays stable
//! for as long as the radio is up.
//!
//! # Peer lifecycle
//!
//! ```text
//! Discovered  ──►  Connecting  ──►  Connected
//!                                       │
//!                                 Disconnected  ──►  (rediscovered)
//! ```
//!
//! - `Discovered`: the peer appeared in a discovery snapshot.
//! - `Connecting`: a connection request was accepted by the substrate.
//! - `Connected`: the peer is a member of the currently formed group.
//! - `Disconnected`: the peer left the group; it may reappear later.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque, stable link address identifying a peer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Wraps a raw link address.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Returns the raw link address.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Discovery / connection state of a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeerStatus {
    /// Seen in the latest discovery snapshot; no connection requested.
    Discovered,
    /// A connection request to this peer was accepted by the substrate.
    Connecting,
    /// Member of the currently formed group.
    Connected,
    /// Left the group.  Kept so the peer can be shown again when it reappears.
    Disconnected,
}

/// A peer device known to the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerDevice {
    pub id: PeerId,
    pub display_name: String,
    pub status: PeerStatus,
}

impl PeerDevice {
    /// Creates a freshly discovered peer.
    pub fn discovered(id: impl Into<PeerId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            status: PeerStatus::Discovered,
        }
    }

    /// Creates a peer learned about through a connection event.
    ///
    /// The display name is not known yet, so the link address stands in for it
    /// until a discovery snapshot reports the real name.
    pub fn connected(id: PeerId) -> Self {
        Self {
            display_name: id.to_string(),
            id,
            status: PeerStatus::Connected,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == PeerStatus::Connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_id_displays_raw_address() {
        let id = PeerId::new("02:00:00:00:01:00");
        assert_eq!(id.to_string(), "02:00:00:00:01:00");
        assert_eq!(id.as_str(), "02:00:00:00:01:00");
    }

    #[test]
    fn test_discovered_constructor_sets_discovered_status() {
        let peer = PeerDevice::discovered("aa:bb", "Pixel 7");
        assert_eq!(peer.status, PeerStatus::Discovered);
        assert_eq!(peer.display_name, "Pixel 7");
        assert!(!peer.is_connected());
    }

    #[test]
    fn test_connected_constructor_uses_address_as_name() {
        let peer = PeerDevice::connected(PeerId::from("aa:bb"));
        assert!(peer.is_connected());
        assert_eq!(peer.display_name, "aa:bb");
    }

    #[test]
    fn test_peer_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&PeerId::from("aa:bb")).expect("serialize");
        assert_eq!(json, "\"aa:bb\"");
    }
}
