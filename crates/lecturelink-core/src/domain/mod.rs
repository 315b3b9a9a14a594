//! Domain entities for LectureLink.
//!
//! This module contains pure data types with no infrastructure dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! The innermost layer of the codebase.  Domain code defines the vocabulary
//! of the application (peers, groups, roles, messages) and never imports
//! sockets, radio APIs, or UI frameworks, so it can be unit-tested anywhere.
//!
//! Code in outer layers (application, infrastructure) depends on the domain,
//! but the domain never depends on them.

/// The ad-hoc group snapshot and the role derived from it.
pub mod group;

/// Append-only log of the lines exchanged during a session.
pub mod message_log;

/// Peer devices discovered over the local radio link.
pub mod peer;
