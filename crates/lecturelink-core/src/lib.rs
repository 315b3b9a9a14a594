//! # lecturelink-core
//!
//! Shared library for LectureLink containing the domain entities of a
//! classroom session and the line-oriented wire protocol spoken between a
//! group owner and its clients.
//!
//! This crate has zero dependencies on OS APIs, radio drivers, or sockets.
//!
//! # Architecture overview (for beginners)
//!
//! LectureLink lets a lecturer's device form an ad-hoc peer-to-peer group with
//! nearby student devices, without a Wi-Fi access point.  One device ends up
//! as the *group owner* (the addressable server) and the others join as
//! *clients*.  Once the group exists, clients exchange short one-line
//! messages with the owner over plain TCP.
//!
//! This crate (`lecturelink-core`) is the shared foundation.  It defines:
//!
//! - **`domain`** – Pure data types with no I/O: the peers we know about,
//!   the group snapshot reported by the radio, the derived role, and the
//!   append-only message log.
//!
//! - **`protocol`** – How one message travels over the wire: a single UTF-8
//!   line terminated by `\n`, answered by the character-reversed line.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `lecturelink_core::PeerDevice` instead of `lecturelink_core::domain::peer::PeerDevice`.
pub use domain::group::{GroupInfo, Role};
pub use domain::message_log::{Direction, LogEntry, MessageLog};
pub use domain::peer::{PeerDevice, PeerId, PeerStatus};
pub use protocol::line::{decode_line, encode_line, reverse_line, ProtocolError, DEFAULT_PORT};
