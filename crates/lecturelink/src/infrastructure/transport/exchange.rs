//! The client side of the line exchange.

use std::net::SocketAddr;

use lecturelink_core::protocol::{decode_line, encode_line};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use super::{read_frame, ExchangeStage, TransportError, TransportSettings};

/// Sends `text` to the owner at `owner` and returns the owner's reply.
///
/// Each call uses a fresh connection: connect, write one line, read one line,
/// close.
///
/// # Errors
///
/// - [`TransportError::Protocol`] if `text` contains a line break or the
///   reply is malformed (including a connection closed before the reply's
///   terminator).
/// - [`TransportError::ConnectFailed`] / [`TransportError::Timeout`] if the
///   owner cannot be reached or does not answer in time.
pub async fn exchange(
    owner: SocketAddr,
    text: &str,
    settings: &TransportSettings,
) -> Result<String, TransportError> {
    let request = encode_line(text)?;

    let stream = match timeout(settings.connect_timeout, TcpStream::connect(owner)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => return Err(TransportError::ConnectFailed { addr: owner, source }),
        Err(_) => {
            return Err(TransportError::Timeout {
                stage: ExchangeStage::Connecting,
                after: settings.connect_timeout,
            })
        }
    };

    let (read_half, mut write_half) = stream.into_split();
    write_half.write_all(&request).await?;
    write_half.flush().await?;

    let mut reader = BufReader::new(read_half);
    let frame = timeout(settings.read_timeout, read_frame(&mut reader, settings.max_line_bytes))
        .await
        .map_err(|_| TransportError::Timeout {
            stage: ExchangeStage::Reading,
            after: settings.read_timeout,
        })??;
    let reply = decode_line(&frame)?;

    debug!("exchange with {owner}: {text:?} -> {reply:?}");
    Ok(reply)
}
