//! Discovery substrate: the platform's peer-to-peer radio service.
//!
//! The session never talks to the radio directly.  It issues four kinds of
//! *requests* through the [`DiscoverySubstrate`] trait and receives
//! asynchronous *notifications* as [`SubstrateEvent`]s on the feed returned by
//! [`DiscoverySubstrate::subscribe`].
//!
//! # Request/notification split (for beginners)
//!
//! On real hardware a request such as "discover peers" only *starts* work.
//! Its `Ok(())` means the radio accepted the request, not that anything was
//! found.  Results arrive later as notifications: `PeersChanged` says the
//! peer list changed (the session then asks for a fresh snapshot), and
//! `ConnectionChanged` says group membership changed (the session then asks
//! for the group info).  This keeps the state machine driven by one ordered
//! stream of events instead of racing callbacks.
//!
//! # Implementations
//!
//! - [`static_group::StaticSubstrate`]: a group that was formed out-of-band,
//!   for example a classroom access point with a fixed owner address.
//! - [`mock::ScriptedSubstrate`]: an in-memory double whose responses tests
//!   script and whose notifications tests emit by hand.
//!
//! # Testability
//!
//! Under `cfg(test)` mockall also generates `MockDiscoverySubstrate`, which the
//! group formation unit tests use to assert exact call sequences.

use std::fmt;

use async_trait::async_trait;
use lecturelink_core::{GroupInfo, PeerDevice, PeerId};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

pub mod mock;
pub mod static_group;

/// Capacity of a notification feed created by a substrate implementation.
pub const DEFAULT_FEED_DEPTH: usize = 64;

/// Platform reason codes carried by [`SubstrateError::Rejected`].
pub mod reason {
    /// Internal error in the platform service.
    pub const ERROR: i32 = 0;
    /// The device has no peer-to-peer radio.
    pub const P2P_UNSUPPORTED: i32 = 1;
    /// The platform service is busy with another request.
    pub const BUSY: i32 = 2;
    /// A service discovery was requested without any service requests added.
    pub const NO_SERVICE_REQUESTS: i32 = 3;

    /// Returns a short human-readable label for `code`.
    pub fn describe(code: i32) -> &'static str {
        match code {
            ERROR => "internal error",
            P2P_UNSUPPORTED => "peer-to-peer unsupported",
            BUSY => "framework busy",
            NO_SERVICE_REQUESTS => "no service requests",
            _ => "unknown reason",
        }
    }
}

/// An asynchronous notification from the substrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubstrateEvent {
    /// The peer-to-peer radio was switched on or off.
    StateChanged { enabled: bool },
    /// The set of discoverable peers changed; request a fresh snapshot.
    PeersChanged,
    /// Group membership or connectivity changed; request the group info.
    ConnectionChanged,
    /// This device's own radio details changed.
    ThisDeviceChanged,
}

/// Receiving end of a substrate's notification feed.
pub type EventFeed = mpsc::Receiver<SubstrateEvent>;

/// Identifies which substrate request an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SubstrateOperation {
    Discovery,
    PeerSnapshot,
    Connect,
    GroupInfo,
}

impl fmt::Display for SubstrateOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SubstrateOperation::Discovery => "peer discovery",
            SubstrateOperation::PeerSnapshot => "peer snapshot request",
            SubstrateOperation::Connect => "connection request",
            SubstrateOperation::GroupInfo => "group info request",
        };
        f.write_str(label)
    }
}

/// Why the substrate refused a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubstrateError {
    /// The runtime authorization needed for radio operations is missing.
    #[error("runtime authorization for the peer-to-peer radio is missing")]
    Unauthorized,
    /// The platform rejected the request with a reason code.
    #[error("rejected by the platform: {} (reason code {reason_code})", reason::describe(*.reason_code))]
    Rejected { reason_code: i32 },
}

/// The platform's peer-to-peer radio service.
///
/// Every method that touches the radio is a request: success means the
/// request was accepted, and its effects show up later on the event feed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DiscoverySubstrate: Send + Sync {
    /// Starts (or restarts) a scan for nearby peers.
    async fn request_discovery(&self) -> Result<(), SubstrateError>;

    /// Returns the complete list of peers the radio currently sees.
    async fn request_peer_snapshot(&self) -> Result<Vec<PeerDevice>, SubstrateError>;

    /// Asks the radio to form (or join) a group with `peer_id`.
    async fn request_connect(&self, peer_id: &PeerId) -> Result<(), SubstrateError>;

    /// Returns the current group snapshot.
    async fn request_group_info(&self) -> Result<GroupInfo, SubstrateError>;

    /// Registers for notifications and returns the feed they arrive on.
    ///
    /// Subscribing again replaces the previous feed.
    fn subscribe(&self) -> Result<EventFeed, SubstrateError>;

    /// Stops notifications.  The feed returned by `subscribe` then closes.
    fn unsubscribe(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_error_names_reason() {
        let err = SubstrateError::Rejected { reason_code: reason::BUSY };
        assert_eq!(
            err.to_string(),
            "rejected by the platform: framework busy (reason code 2)"
        );
    }

    #[test]
    fn test_unknown_reason_code_is_labelled() {
        assert_eq!(reason::describe(42), "unknown reason");
    }

    #[test]
    fn test_operation_display() {
        assert_eq!(SubstrateOperation::Connect.to_string(), "connection request");
    }
}
