//! PeerRegistry: the session's in-memory record of every peer device it knows.
//!
//! Each entry tracks a peer's link address, display name, and current
//! [`PeerStatus`].  The registry is owned by the group formation state
//! machine and is only ever mutated from the serialized session task; the UI
//! sees it through the immutable snapshots the session publishes.
//!
//! # Snapshot semantics (for beginners)
//!
//! The radio reports discovered peers as a *complete list* every time it
//! notices a change.  [`PeerRegistry::upsert`] therefore replaces the
//! not-yet-connected part of the registry with the new list instead of
//! merging into it, so devices that walked out of range disappear.  Peers that
//! are members of the current group are the exception: a discovery scan that
//! happens to miss them must not make them vanish, so `Connected` entries are
//! kept until a connection event explicitly marks them `Disconnected`.
//!
//! # Ordering choice
//!
//! A classroom has tens of devices, not thousands, so entries are kept in a
//! plain `Vec` in insertion order and looked up linearly.  The UI shows peers
//! in the order they were first seen.

use lecturelink_core::{PeerDevice, PeerId, PeerStatus};

/// Insertion-ordered registry of known peers, at most one entry per id.
#[derive(Debug, Clone, Default)]
pub struct PeerRegistry {
    peers: Vec<PeerDevice>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a fresh discovery snapshot.
    ///
    /// - Entries present in `snapshot` take the snapshot's attributes, except
    ///   that a `Connected` entry keeps its status.
    /// - Entries absent from `snapshot` are dropped unless they are `Connected`.
    /// - New ids are appended in snapshot order.  Duplicate ids inside the
    ///   snapshot collapse to the last occurrence.
    pub fn upsert(&mut self, snapshot: Vec<PeerDevice>) {
        let mut incoming: Vec<PeerDevice> = Vec::with_capacity(snapshot.len());
        for peer in snapshot {
            match incoming.iter_mut().find(|p| p.id == peer.id) {
                Some(existing) => *existing = peer,
                None => incoming.push(peer),
            }
        }

        let mut next: Vec<PeerDevice> = Vec::with_capacity(self.peers.len() + incoming.len());
        for current in self.peers.drain(..) {
            let reported = incoming
                .iter()
                .position(|p| p.id == current.id)
                .map(|idx| incoming.remove(idx));
            match reported {
                Some(mut peer) => {
                    if current.is_connected() {
                        peer.status = PeerStatus::Connected;
                    }
                    next.push(peer);
                }
                None if current.is_connected() => next.push(current),
                None => {}
            }
        }
        next.extend(incoming);
        self.peers = next;
    }

    /// Marks `id` as a member of the group, inserting it if unknown.
    ///
    /// A peer can be learned about through a connection event before any
    /// discovery snapshot mentions it; its address then stands in for the name.
    pub fn mark_connected(&mut self, id: &PeerId) {
        match self.get_mut(id) {
            Some(peer) => peer.status = PeerStatus::Connected,
            None => self.peers.push(PeerDevice::connected(id.clone())),
        }
    }

    /// Marks `id` as being connected to.  Unknown ids are ignored.
    pub fn mark_connecting(&mut self, id: &PeerId) {
        if let Some(peer) = self.get_mut(id) {
            peer.status = PeerStatus::Connecting;
        }
    }

    /// Marks `id` as having left the group.  Unknown ids are ignored.
    pub fn mark_disconnected(&mut self, id: &PeerId) {
        if let Some(peer) = self.get_mut(id) {
            peer.status = PeerStatus::Disconnected;
        }
    }

    /// Marks every `Connected` peer as `Disconnected` and returns their ids.
    pub fn mark_all_disconnected(&mut self) -> Vec<PeerId> {
        self.peers
            .iter_mut()
            .filter(|p| p.is_connected())
            .map(|p| {
                p.status = PeerStatus::Disconnected;
                p.id.clone()
            })
            .collect()
    }

    /// Returns the ids of all `Connected` peers, in registry order.
    pub fn connected_ids(&self) -> Vec<PeerId> {
        self.peers
            .iter()
            .filter(|p| p.is_connected())
            .map(|p| p.id.clone())
            .collect()
    }

    pub fn get(&self, id: &PeerId) -> Option<&PeerDevice> {
        self.peers.iter().find(|p| &p.id == id)
    }

    pub fn contains(&self, id: &PeerId) -> bool {
        self.get(id).is_some()
    }

    /// Returns all peers in insertion order.
    pub fn all(&self) -> &[PeerDevice] {
        &self.peers
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    fn get_mut(&mut self, id: &PeerId) -> Option<&mut PeerDevice> {
        self.peers.iter_mut().find(|p| &p.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn peer(id: &str, name: &str) -> PeerDevice {
        PeerDevice::discovered(id, name)
    }

    fn ids(registry: &PeerRegistry) -> Vec<&str> {
        registry.all().iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_registry_starts_empty() {
        let registry = PeerRegistry::new();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_upsert_adds_peers_in_snapshot_order() {
        let mut registry = PeerRegistry::new();
        registry.upsert(vec![peer("b", "Bea"), peer("a", "Ali")]);
        assert_eq!(ids(&registry), vec!["b", "a"]);
    }

    #[test]
    fn test_upsert_collapses_duplicate_ids_last_write_wins() {
        // Arrange
        let mut registry = PeerRegistry::new();

        // Act
        registry.upsert(vec![peer("a", "old"), peer("a", "new")]);

        // Assert
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&"a".into()).unwrap().display_name, "new");
    }

    #[test]
    fn test_upsert_updates_attributes_and_keeps_position() {
        let mut registry = PeerRegistry::new();
        registry.upsert(vec![peer("a", "Ali"), peer("b", "Bea")]);

        registry.upsert(vec![peer("b", "Bea's tablet"), peer("a", "Ali")]);

        assert_eq!(ids(&registry), vec!["a", "b"]);
        assert_eq!(registry.get(&"b".into()).unwrap().display_name, "Bea's tablet");
    }

    #[test]
    fn test_upsert_drops_unreported_discovered_peers() {
        let mut registry = PeerRegistry::new();
        registry.upsert(vec![peer("a", "Ali"), peer("b", "Bea")]);

        registry.upsert(vec![peer("b", "Bea")]);

        assert_eq!(ids(&registry), vec!["b"]);
    }

    #[test]
    fn test_upsert_keeps_connected_peer_missing_from_snapshot() {
        // Arrange
        let mut registry = PeerRegistry::new();
        registry.upsert(vec![peer("a", "Ali"), peer("b", "Bea")]);
        registry.mark_connected(&"a".into());

        // Act: a scan that misses the connected peer
        registry.upsert(vec![peer("b", "Bea")]);

        // Assert
        let a = registry.get(&"a".into()).expect("connected peer must survive");
        assert_eq!(a.status, PeerStatus::Connected);
    }

    #[test]
    fn test_upsert_does_not_downgrade_connected_peer() {
        let mut registry = PeerRegistry::new();
        registry.mark_connected(&"a".into());

        registry.upsert(vec![peer("a", "Ali")]);

        let a = registry.get(&"a".into()).unwrap();
        assert_eq!(a.status, PeerStatus::Connected);
        assert_eq!(a.display_name, "Ali", "name must still refresh");
    }

    #[test]
    fn test_mark_connected_inserts_unknown_peer() {
        let mut registry = PeerRegistry::new();
        registry.mark_connected(&"zz".into());
        assert_eq!(registry.get(&"zz".into()).unwrap().status, PeerStatus::Connected);
    }

    #[test]
    fn test_mark_disconnected_ignores_unknown_peer() {
        let mut registry = PeerRegistry::new();
        registry.mark_disconnected(&"ghost".into());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_mark_connecting_ignores_unknown_peer() {
        let mut registry = PeerRegistry::new();
        registry.mark_connecting(&"ghost".into());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_disconnected_peer_can_be_dropped_and_rediscovered() {
        let mut registry = PeerRegistry::new();
        registry.mark_connected(&"a".into());
        registry.mark_disconnected(&"a".into());

        registry.upsert(vec![]);
        assert!(registry.is_empty());

        registry.upsert(vec![peer("a", "Ali")]);
        assert_eq!(registry.get(&"a".into()).unwrap().status, PeerStatus::Discovered);
    }

    #[test]
    fn test_mark_all_disconnected_returns_only_connected_ids() {
        let mut registry = PeerRegistry::new();
        registry.upsert(vec![peer("a", "Ali"), peer("b", "Bea"), peer("c", "Cy")]);
        registry.mark_connected(&"a".into());
        registry.mark_connected(&"c".into());

        let dropped = registry.mark_all_disconnected();

        assert_eq!(dropped, vec![PeerId::from("a"), PeerId::from("c")]);
        assert!(registry.connected_ids().is_empty());
        assert_eq!(registry.get(&"b".into()).unwrap().status, PeerStatus::Discovered);
    }

    #[test]
    fn test_ids_stay_unique_across_snapshot_sequences() {
        // Arrange: a deterministic pseudo-random walk over snapshots and marks.
        let pool = ["a", "b", "c", "d", "e"];
        let mut registry = PeerRegistry::new();
        let mut seed: u32 = 7;
        let mut next = || {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            (seed >> 16) as usize
        };

        for _ in 0..200 {
            // Act
            let snapshot: Vec<PeerDevice> = (0..next() % 6)
                .map(|_| {
                    let id = pool[next() % pool.len()];
                    peer(id, id)
                })
                .collect();
            let connected_before = registry.connected_ids();
            registry.upsert(snapshot);
            if next() % 3 == 0 {
                registry.mark_connected(&pool[next() % pool.len()].into());
            }

            // Assert
            let unique: HashSet<&PeerId> = registry.all().iter().map(|p| &p.id).collect();
            assert_eq!(unique.len(), registry.len(), "duplicate id in registry");
            for id in &connected_before {
                assert!(registry.contains(id), "connected peer {id} was dropped");
            }
        }
    }
}
