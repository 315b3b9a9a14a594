//! Infrastructure layer for LectureLink.
//!
//! Contains the adapters facing the outside world: the discovery substrate
//! (the ad-hoc radio), the event bridge that turns its notifications into
//! typed events, the TCP transport, configuration storage, and the UI bridge.
//!
//! # Sub-modules
//!
//! - **`substrate`** – The [`substrate::DiscoverySubstrate`] trait plus a
//!   static adapter for groups formed out-of-band and a scripted test double.
//!
//! - **`event_bridge`** – Translates platform notifications into
//!   [`substrate::SubstrateEvent`]s and pumps them into the session queue.
//!
//! - **`transport`** – The owner's accept loop and the client's one-shot
//!   exchange over the line protocol.
//!
//! - **`storage`** – TOML configuration persistence.
//!
//! - **`ui_bridge`** – Command functions and DTOs for the UI layer.

pub mod event_bridge;
pub mod storage;
pub mod substrate;
pub mod transport;
pub mod ui_bridge;
