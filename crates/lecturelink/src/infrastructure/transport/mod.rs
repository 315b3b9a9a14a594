//! TCP transport for the one-shot line exchange.
//!
//! - [`listener::OwnerListener`]: the group owner's accept loop.  Every
//!   accepted connection gets exactly one reply (the request reversed) and is
//!   then closed.
//! - [`exchange::exchange`]: the client side.  Opens a connection to the
//!   owner, sends one line, reads one line back, closes.
//!
//! Both ends frame with `lecturelink_core::protocol`; this module only adds
//! sockets, timeouts, and a bounded read.

use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use lecturelink_core::protocol::{ProtocolError, DEFAULT_PORT, LINE_TERMINATOR, MAX_LINE_BYTES};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

pub mod exchange;
pub mod listener;

pub use exchange::exchange;
pub use listener::{ListenerReport, OwnerListener, ServedExchange};

/// Socket-level settings shared by both ends of the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    /// Port the owner listens on and clients connect to.
    pub port: u16,
    /// Local address the owner binds.
    pub bind_address: IpAddr,
    pub connect_timeout: Duration,
    /// Upper bound on waiting for a full line from the other end.
    pub read_timeout: Duration,
    /// Upper bound on a single line, terminator included.
    pub max_line_bytes: usize,
}

impl TransportSettings {
    /// The address the owner's listener binds.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// The endpoint a client connects to for an owner at `owner`.
    pub fn owner_endpoint(&self, owner: IpAddr) -> SocketAddr {
        SocketAddr::new(owner, self.port)
    }
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
            max_line_bytes: MAX_LINE_BYTES,
        }
    }
}

/// Which step of an exchange timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeStage {
    Connecting,
    Reading,
}

impl fmt::Display for ExchangeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeStage::Connecting => f.write_str("connecting to the group owner"),
            ExchangeStage::Reading => f.write_str("waiting for a line"),
        }
    }
}

/// Error type for transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("bind failed on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("connect to {addr} failed: {source}")]
    ConnectFailed {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("timed out after {after:?} while {stage}")]
    Timeout { stage: ExchangeStage, after: Duration },
    #[error("connection I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Reads up to and including the next terminator, never more than
/// `max_line_bytes`.
///
/// Returns whatever was read if the stream ends first; the caller's decode
/// step reports that as unterminated.
pub(crate) async fn read_frame<R>(reader: &mut R, max_line_bytes: usize) -> Result<Vec<u8>, TransportError>
where
    R: AsyncBufRead + Unpin,
{
    let mut frame = Vec::new();
    let mut bounded = reader.take(max_line_bytes as u64);
    bounded.read_until(LINE_TERMINATOR, &mut frame).await?;
    if frame.last() != Some(&LINE_TERMINATOR) && frame.len() >= max_line_bytes {
        return Err(ProtocolError::TooLong { limit: max_line_bytes }.into());
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[test]
    fn test_default_settings_use_well_known_port() {
        let settings = TransportSettings::default();
        assert_eq!(settings.port, 8888);
        assert_eq!(settings.listen_addr().to_string(), "0.0.0.0:8888");
    }

    #[test]
    fn test_owner_endpoint_combines_address_and_port() {
        let settings = TransportSettings::default();
        let owner: IpAddr = "192.168.49.1".parse().unwrap();
        assert_eq!(settings.owner_endpoint(owner).to_string(), "192.168.49.1:8888");
    }

    #[tokio::test]
    async fn test_read_frame_stops_at_terminator() {
        let mut reader = BufReader::new(&b"first\nsecond\n"[..]);
        let frame = read_frame(&mut reader, 64).await.unwrap();
        assert_eq!(frame, b"first\n");
    }

    #[tokio::test]
    async fn test_read_frame_returns_partial_line_at_eof() {
        let mut reader = BufReader::new(&b"no end"[..]);
        let frame = read_frame(&mut reader, 64).await.unwrap();
        assert_eq!(frame, b"no end");
    }

    #[tokio::test]
    async fn test_read_frame_rejects_overlong_line() {
        let mut reader = BufReader::new(&b"0123456789abcdef\n"[..]);
        let result = read_frame(&mut reader, 8).await;
        assert!(matches!(
            result,
            Err(TransportError::Protocol(ProtocolError::TooLong { limit: 8 }))
        ));
    }

    #[tokio::test]
    async fn test_read_frame_accepts_line_exactly_at_limit() {
        let mut reader = BufReader::new(&b"1234567\n"[..]);
        let frame = read_frame(&mut reader, 8).await.unwrap();
        assert_eq!(frame, b"1234567\n");
    }
}
