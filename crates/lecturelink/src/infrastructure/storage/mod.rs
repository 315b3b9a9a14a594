//! Storage infrastructure: configuration file persistence.
//!
//! LectureLink keeps no session history; the only thing it stores is the
//! TOML configuration handled by the `config` sub-module:
//!
//! - Reading the configuration from the platform-appropriate directory.
//! - Writing it back.
//! - Turning the on-disk values into runtime settings for a session.

pub mod config;
