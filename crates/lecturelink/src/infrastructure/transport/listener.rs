//! The group owner's listener.
//!
//! [`OwnerListener::open`] binds the configured port and spawns an accept
//! loop.  Each accepted connection is handled on its own task:
//!
//! 1. Read one line (bounded, with a timeout).
//! 2. Reply with the line reversed, or with the empty line if the request was
//!    malformed (no terminator, too long, not UTF-8).
//! 3. Half-close, drain whatever the client still sends, close.
//!
//! Completed exchanges are reported to the session as [`ListenerReport`]s,
//! tagged with the generation the listener was opened for so the session can
//! ignore reports from a listener it has already replaced.
//!
//! Closing the listener (explicitly or by dropping it) stops the accept loop,
//! aborts in-flight responders, and releases the port.

use std::net::SocketAddr;
use std::time::Duration;

use lecturelink_core::protocol::{encode_line, reply_to};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::{read_frame, TransportError, TransportSettings};

/// Pause after a failed `accept()` so a persistent error does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// How long a responder waits for the client to close after replying.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// One exchange the owner has served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedExchange {
    pub peer: SocketAddr,
    /// The decoded request, empty if it was malformed.
    pub request: String,
    pub response: String,
    pub malformed: bool,
}

/// A served exchange, tagged with the listener generation that served it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerReport {
    pub generation: u64,
    pub exchange: ServedExchange,
}

/// A bound, accepting owner endpoint.
#[derive(Debug)]
pub struct OwnerListener {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl OwnerListener {
    /// Binds `settings.listen_addr()` and starts accepting.
    ///
    /// Served exchanges are sent to `reports` as `T::from(ListenerReport)`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::BindFailed`] if the port cannot be bound.
    pub async fn open<T>(
        settings: &TransportSettings,
        generation: u64,
        reports: mpsc::Sender<T>,
    ) -> Result<Self, TransportError>
    where
        T: From<ListenerReport> + Send + 'static,
    {
        let addr = settings.listen_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::BindFailed { addr, source })?;
        let local_addr = listener.local_addr()?;
        info!("owner listening on {local_addr}");

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(accept_loop(
            listener,
            settings.clone(),
            generation,
            reports,
            shutdown_rx,
        ));

        Ok(Self {
            local_addr,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }

    /// The bound address; differs from the configured one when port 0 was used.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting and waits until the port is released.
    pub async fn close(mut self) {
        self.signal_shutdown();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("owner accept loop ended abnormally: {e}");
            }
        }
    }

    fn signal_shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for OwnerListener {
    fn drop(&mut self) {
        self.signal_shutdown();
    }
}

// ── Accept loop ───────────────────────────────────────────────────────────────

async fn accept_loop<T>(
    listener: TcpListener,
    settings: TransportSettings,
    generation: u64,
    reports: mpsc::Sender<T>,
    mut shutdown: oneshot::Receiver<()>,
) where
    T: From<ListenerReport> + Send + 'static,
{
    let mut responders = JoinSet::new();

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!("accepted connection from {peer}");
                    let settings = settings.clone();
                    let reports = reports.clone();
                    responders.spawn(async move {
                        match respond_once(stream, peer, &settings).await {
                            Ok(exchange) => {
                                let report = ListenerReport { generation, exchange };
                                let _ = reports.send(T::from(report)).await;
                            }
                            Err(e) => warn!("exchange with {peer} failed: {e}"),
                        }
                    });
                }
                Err(e) => {
                    // Transient (e.g. out of file descriptors); keep serving.
                    error!("accept error: {e}");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
            Some(_) = responders.join_next(), if !responders.is_empty() => {}
        }
    }

    responders.shutdown().await;
    let addr = listener.local_addr().map(|a| a.to_string()).unwrap_or_default();
    info!("owner listener {addr} closed");
}

/// Serves exactly one request on `stream`.
async fn respond_once(
    stream: TcpStream,
    peer: SocketAddr,
    settings: &TransportSettings,
) -> Result<ServedExchange, TransportError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let frame = match timeout(settings.read_timeout, read_frame(&mut reader, settings.max_line_bytes)).await {
        Ok(Ok(frame)) => frame,
        Ok(Err(e)) => {
            warn!("unreadable request from {peer}: {e}");
            Vec::new()
        }
        Err(_) => {
            warn!("no request from {peer} within {:?}", settings.read_timeout);
            Vec::new()
        }
    };

    let reply = reply_to(&frame);
    if let Some(e) = &reply.fault {
        if !frame.is_empty() {
            warn!("malformed request from {peer}: {e}");
        }
    }
    let served = ServedExchange {
        peer,
        malformed: reply.fault.is_some(),
        request: reply.request,
        response: reply.response,
    };

    write_half.write_all(&encode_line(&served.response)?).await?;
    write_half.shutdown().await?;

    // Drain until the client closes so unread bytes do not turn our close into a reset.
    let _ = timeout(DRAIN_GRACE, tokio::io::copy(&mut reader, &mut tokio::io::sink())).await;

    debug!("served {peer}: {:?} -> {:?}", served.request, served.response);
    Ok(served)
}
