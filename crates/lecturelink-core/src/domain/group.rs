//! Group snapshot reported by the discovery substrate, and the derived role.
//!
//! Every time the radio reports that the connection changed, the substrate is
//! asked for the current group information.  The answer is authoritative: it
//! replaces the previous [`GroupInfo`] wholesale rather than being merged into
//! it.  The device's [`Role`] is never stored on its own; it is always derived
//! from the latest snapshot.

use std::collections::BTreeSet;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use super::peer::PeerId;

/// Snapshot of the ad-hoc group as seen by this device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    /// `true` once group negotiation has completed.
    pub formed: bool,
    /// `true` if this device won the negotiation and serves the group.
    pub is_owner: bool,
    /// IP address of the group owner on the group's link.
    pub owner_address: Option<IpAddr>,
    /// Link addresses of the group's member devices.
    #[serde(default)]
    pub client_ids: BTreeSet<PeerId>,
}

impl GroupInfo {
    /// A snapshot stating that no group exists.
    pub fn dissolved() -> Self {
        Self::default()
    }

    /// A snapshot in which this device owns the group.
    pub fn owned(owner_address: IpAddr, client_ids: impl IntoIterator<Item = PeerId>) -> Self {
        Self {
            formed: true,
            is_owner: true,
            owner_address: Some(owner_address),
            client_ids: client_ids.into_iter().collect(),
        }
    }

    /// A snapshot in which this device joined a group owned by `owner_address`.
    pub fn joined(owner_address: IpAddr, client_ids: impl IntoIterator<Item = PeerId>) -> Self {
        Self {
            formed: true,
            is_owner: false,
            owner_address: Some(owner_address),
            client_ids: client_ids.into_iter().collect(),
        }
    }

    pub fn role(&self) -> Role {
        Role::from(self)
    }
}

/// Role of this device inside the group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// No group has been formed.
    #[default]
    Unassigned,
    /// This device serves the group and answers client messages.
    Owner,
    /// This device joined a group served by another device.
    Client,
}

impl From<&GroupInfo> for Role {
    fn from(info: &GroupInfo) -> Self {
        match (info.formed, info.is_owner) {
            (true, true) => Role::Owner,
            (true, false) => Role::Client,
            (false, _) => Role::Unassigned,
        }
    }
}
