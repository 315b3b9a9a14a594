//! Application layer use cases for LectureLink.
//!
//! Use cases in this layer orchestrate domain objects to fulfil a user goal
//! and depend on abstractions (the [`DiscoverySubstrate`] trait) rather than
//! on a concrete radio, so they can be driven entirely from tests.
//!
//! # Sub-modules
//!
//! - **`manage_peers`** – The in-memory registry of every peer device the
//!   session has heard about, and its discovery/connection status.
//!
//! - **`group_formation`** – The state machine that walks a session from
//!   discovery to a formed group with an assigned role.
//!
//! - **`session`** – The serialized session task that owns the state machine,
//!   the active transport endpoint, and the message log, and publishes an
//!   immutable view for the UI.
//!
//! [`DiscoverySubstrate`]: crate::infrastructure::substrate::DiscoverySubstrate

pub mod group_formation;
pub mod manage_peers;
pub mod session;

pub use group_formation::{FormationState, GroupFormation, TransportDirective};
pub use manage_peers::PeerRegistry;
pub use session::{SessionConfig, SessionError, SessionHandle, SessionId, SessionView};
