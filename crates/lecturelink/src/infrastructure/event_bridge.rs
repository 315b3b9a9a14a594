//! Event bridge: platform notifications in, ordered session events out.
//!
//! Two jobs live here:
//!
//! 1. [`translate`] maps a raw platform notification (an action string plus
//!    integer extras, as the radio service broadcasts them) onto a
//!    [`SubstrateEvent`].  Unrelated actions are dropped.
//! 2. [`EventBridge`] pumps a substrate's [`EventFeed`] into the session's
//!    input queue.  It forwards events one at a time in arrival order and
//!    awaits queue capacity instead of dropping, so the session observes every
//!    notification exactly once.
//!
//! The bridge is registered when discovery starts and unregistered on
//! teardown; after `unregister` nothing more reaches the session.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::infrastructure::substrate::{EventFeed, SubstrateEvent};

// ── Platform vocabulary ───────────────────────────────────────────────────────

pub const ACTION_STATE_CHANGED: &str = "android.net.wifi.p2p.STATE_CHANGED";
pub const ACTION_PEERS_CHANGED: &str = "android.net.wifi.p2p.PEERS_CHANGED";
pub const ACTION_CONNECTION_CHANGED: &str = "android.net.wifi.p2p.CONNECTION_STATE_CHANGE";
pub const ACTION_THIS_DEVICE_CHANGED: &str = "android.net.wifi.p2p.THIS_DEVICE_CHANGED";

/// Extra carrying the radio state on a state-changed notification.
pub const EXTRA_WIFI_STATE: &str = "wifi_p2p_state";
/// Radio state value meaning "enabled".
pub const WIFI_P2P_STATE_ENABLED: i64 = 2;
/// Radio state value meaning "disabled".
pub const WIFI_P2P_STATE_DISABLED: i64 = 1;

/// A raw notification as broadcast by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformNotification {
    pub action: String,
    pub extras: HashMap<String, i64>,
}

impl PlatformNotification {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            extras: HashMap::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: i64) -> Self {
        self.extras.insert(key.into(), value);
        self
    }
}

/// Maps a platform notification onto a [`SubstrateEvent`].
///
/// A state-changed notification without the state extra counts as disabled.
pub fn translate(notification: &PlatformNotification) -> Option<SubstrateEvent> {
    match notification.action.as_str() {
        ACTION_STATE_CHANGED => {
            let state = notification.extras.get(EXTRA_WIFI_STATE).copied();
            Some(SubstrateEvent::StateChanged {
                enabled: state == Some(WIFI_P2P_STATE_ENABLED),
            })
        }
        ACTION_PEERS_CHANGED => Some(SubstrateEvent::PeersChanged),
        ACTION_CONNECTION_CHANGED => Some(SubstrateEvent::ConnectionChanged),
        ACTION_THIS_DEVICE_CHANGED => Some(SubstrateEvent::ThisDeviceChanged),
        other => {
            trace!("ignoring unrelated platform notification {other}");
            None
        }
    }
}

// ── Pump ──────────────────────────────────────────────────────────────────────

/// Forwards substrate notifications into a session input queue.
#[derive(Debug, Default)]
pub struct EventBridge {
    pump: Option<JoinHandle<()>>,
}

impl EventBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts forwarding `feed` into `sink`, replacing any previous pump.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn register<T>(&mut self, mut feed: EventFeed, sink: mpsc::Sender<T>)
    where
        T: From<SubstrateEvent> + Send + 'static,
    {
        self.unregister();
        let pump = tokio::spawn(async move {
            while let Some(event) = feed.recv().await {
                trace!("forwarding substrate event {event:?}");
                if sink.send(T::from(event)).await.is_err() {
                    debug!("session input closed; stopping event pump");
                    return;
                }
            }
            debug!("substrate event feed closed");
        });
        self.pump = Some(pump);
    }

    /// Stops forwarding.  Events still queued in the feed are discarded.
    pub fn unregister(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }

    pub fn is_registered(&self) -> bool {
        self.pump.as_ref().is_some_and(|pump| !pump.is_finished())
    }
}

impl Drop for EventBridge {
    fn drop(&mut self) {
        self.unregister();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_state_changed_enabled() {
        let n = PlatformNotification::new(ACTION_STATE_CHANGED)
            .with_extra(EXTRA_WIFI_STATE, WIFI_P2P_STATE_ENABLED);
        assert_eq!(translate(&n), Some(SubstrateEvent::StateChanged { enabled: true }));
    }

    #[test]
    fn test_translate_state_changed_disabled_or_missing_extra() {
        let disabled = PlatformNotification::new(ACTION_STATE_CHANGED)
            .with_extra(EXTRA_WIFI_STATE, WIFI_P2P_STATE_DISABLED);
        let missing = PlatformNotification::new(ACTION_STATE_CHANGED);

        assert_eq!(translate(&disabled), Some(SubstrateEvent::StateChanged { enabled: false }));
        assert_eq!(translate(&missing), Some(SubstrateEvent::StateChanged { enabled: false }));
    }

    #[test]
    fn test_translate_membership_actions() {
        assert_eq!(
            translate(&PlatformNotification::new(ACTION_PEERS_CHANGED)),
            Some(SubstrateEvent::PeersChanged)
        );
        assert_eq!(
            translate(&PlatformNotification::new(ACTION_CONNECTION_CHANGED)),
            Some(SubstrateEvent::ConnectionChanged)
        );
        assert_eq!(
            translate(&PlatformNotification::new(ACTION_THIS_DEVICE_CHANGED)),
            Some(SubstrateEvent::ThisDeviceChanged)
        );
    }

    #[test]
    fn test_translate_ignores_unrelated_action() {
        assert_eq!(translate(&PlatformNotification::new("android.intent.action.BOOT_COMPLETED")), None);
    }

    #[tokio::test]
    async fn test_bridge_forwards_events_in_order() {
        // Arrange
        let (feed_tx, feed_rx) = mpsc::channel(8);
        let (sink_tx, mut sink_rx) = mpsc::channel::<SubstrateEvent>(1);
        let mut bridge = EventBridge::new();
        bridge.register(feed_rx, sink_tx);

        // Act
        feed_tx.send(SubstrateEvent::PeersChanged).await.unwrap();
        feed_tx.send(SubstrateEvent::ConnectionChanged).await.unwrap();
        feed_tx.send(SubstrateEvent::ThisDeviceChanged).await.unwrap();

        // Assert: a capacity-1 sink applies backpressure but loses nothing.
        assert_eq!(sink_rx.recv().await, Some(SubstrateEvent::PeersChanged));
        assert_eq!(sink_rx.recv().await, Some(SubstrateEvent::ConnectionChanged));
        assert_eq!(sink_rx.recv().await, Some(SubstrateEvent::ThisDeviceChanged));
        assert!(bridge.is_registered());
    }

    #[tokio::test]
    async fn test_unregister_stops_forwarding() {
        // Arrange
        let (feed_tx, feed_rx) = mpsc::channel(8);
        let (sink_tx, mut sink_rx) = mpsc::channel::<SubstrateEvent>(8);
        let mut bridge = EventBridge::new();
        bridge.register(feed_rx, sink_tx);

        // Act
        bridge.unregister();
        let _ = feed_tx.send(SubstrateEvent::PeersChanged).await;

        // Assert: the aborted pump drops its sink sender, closing the queue.
        assert!(!bridge.is_registered());
        assert_eq!(sink_rx.recv().await, None);
    }
}
