//! lecturelink library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does lecturelink do? (for beginners)
//!
//! A lecturer's device and the students' devices find each other over the
//! local ad-hoc radio link (Wi-Fi Direct on phones), negotiate a group, and
//! then talk over plain TCP on the group's private network:
//!
//! 1. **Discovery** – the radio scans for nearby devices and reports them.
//! 2. **Connection** – the user picks a peer; the radio negotiates a group.
//! 3. **Role assignment** – one device becomes the group *owner*, the others
//!    become *clients*.
//! 4. **Exchange** – clients send one-line messages; the owner answers each
//!    with the reversed line.

/// Application layer: peer registry, group formation state machine, session.
pub mod application;

/// Infrastructure layer: radio substrate adapters, TCP transport, config, UI bridge.
pub mod infrastructure;
