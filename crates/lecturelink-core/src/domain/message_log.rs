//! Append-only record of the lines exchanged during a session.

use serde::{Deserialize, Serialize};

/// Which way a line travelled, from this device's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Sent,
    Received,
}

/// One line in the message log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub direction: Direction,
    pub text: String,
}

impl LogEntry {
    pub fn sent(text: impl Into<String>) -> Self {
        Self {
            direction: Direction::Sent,
            text: text.into(),
        }
    }

    pub fn received(text: impl Into<String>) -> Self {
        Self {
            direction: Direction::Received,
            text: text.into(),
        }
    }
}

/// Ordered, append-only sequence of [`LogEntry`] values.
///
/// Entries can only be added at the end; there is no way to edit or remove
/// one, which keeps the log a faithful transcript of the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageLog {
    entries: Vec<LogEntry>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the last `n` entries (fewer if the log is shorter).
    pub fn tail(&self, n: usize) -> &[LogEntry] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }
}
