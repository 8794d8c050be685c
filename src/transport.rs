//! TCP link to the relay.
//!
//! [`connect`] spawns one task that resolves the host, tries each address
//! once, then runs a read loop and a write loop over the split stream:
//!
//! - Read loop: raw chunks → [`BracketDecoder`] → [`SessionEvent::Inbound`]
//! - Write loop: queued byte buffers → socket
//!
//! Neither loop ever touches the session. Losing the connection clears the
//! shared `connected` flag and posts [`SessionEvent::Disconnected`]; there is
//! no reconnect. The task ends with the read loop, dropping the write half
//! and any queued outbound bytes. A failed write only stops the write loop;
//! inbound traffic keeps flowing until the peer closes.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{lookup_host, TcpStream};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::constants::READ_BUFFER_SIZE;
use crate::error::{FramingError, TransportError};
use crate::framing::{BracketDecoder, FramingMode};
use crate::session::{Outbound, SessionEvent};

/// Result of the connect attempt, delivered once.
pub type ConnectOutcome = oneshot::Receiver<Result<SocketAddr, TransportError>>;

/// Outbound handle to a spawned connection.
pub struct TransportHandle {
    connected: Arc<AtomicBool>,
    out_tx: UnboundedSender<Vec<u8>>,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for TransportHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportHandle")
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl TransportHandle {
    /// Abort the connection task. No [`SessionEvent::Disconnected`] is sent.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
        self.task.abort();
    }

    /// True once the connection task has stopped, for any reason.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Outbound for TransportHandle {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn send(&self, bytes: Vec<u8>) {
        if self.out_tx.send(bytes).is_err() {
            log::debug!("[Transport] Writer gone, dropping outbound command");
        }
    }
}

/// Start connecting to `host:port` in the background.
///
/// Must be called from inside a tokio runtime. Decoded commands are posted
/// to `events_tx`. The returned receiver resolves once the connect attempt
/// has succeeded or every resolved address has failed.
pub fn connect(
    host: &str,
    port: u16,
    framing: FramingMode,
    events_tx: UnboundedSender<SessionEvent>,
) -> (TransportHandle, ConnectOutcome) {
    let connected = Arc::new(AtomicBool::new(false));
    let (out_tx, out_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let (done_tx, done_rx) = oneshot::channel();

    let task = tokio::spawn(run_connection(
        host.to_string(),
        port,
        framing,
        Arc::clone(&connected),
        events_tx,
        out_rx,
        done_tx,
    ));

    (
        TransportHandle {
            connected,
            out_tx,
            task,
        },
        done_rx,
    )
}

async fn run_connection(
    host: String,
    port: u16,
    framing: FramingMode,
    connected: Arc<AtomicBool>,
    events_tx: UnboundedSender<SessionEvent>,
    out_rx: UnboundedReceiver<Vec<u8>>,
    done_tx: oneshot::Sender<Result<SocketAddr, TransportError>>,
) {
    let (stream, addr) = match open(&host, port).await {
        Ok(opened) => opened,
        Err(e) => {
            log::error!("[Transport] {e}");
            let _ = done_tx.send(Err(e));
            return;
        }
    };

    log::info!("[Transport] Connected to {}", addr);
    connected.store(true, Ordering::Release);
    let _ = done_tx.send(Ok(addr));

    let (read_half, write_half) = stream.into_split();
    let reader = read_loop(read_half, framing, Arc::clone(&connected), events_tx);
    tokio::pin!(reader);
    tokio::select! {
        () = &mut reader => {}
        () = write_loop(write_half, connected, out_rx) => (&mut reader).await,
    }
    log::debug!("[Transport] Connection task finished");
}

/// Resolve `host` and try each address once, in resolver order.
async fn open(host: &str, port: u16) -> Result<(TcpStream, SocketAddr), TransportError> {
    let addrs: Vec<SocketAddr> = lookup_host((host, port))
        .await
        .map_err(|source| TransportError::Resolve {
            host: host.to_string(),
            source,
        })?
        .collect();

    for addr in &addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok((stream, *addr)),
            Err(e) => log::warn!("[Transport] Connect to {} failed: {e}", addr),
        }
    }

    Err(TransportError::AllAddressesFailed {
        host: host.to_string(),
        attempts: addrs.len(),
    })
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    framing: FramingMode,
    connected: Arc<AtomicBool>,
    events_tx: UnboundedSender<SessionEvent>,
) {
    let mut decoder = BracketDecoder::with_mode(framing);
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                log::info!("[Transport] Connection closed by peer");
                break;
            }
            Ok(n) => {
                for decoded in decoder.feed(&buf[..n]) {
                    match decoded {
                        Ok(command) => {
                            if events_tx.send(SessionEvent::Inbound(command)).is_err() {
                                log::debug!("[Transport] Session queue closed, stopping reader");
                                connected.store(false, Ordering::Release);
                                return;
                            }
                        }
                        // Already logged by the decoder.
                        Err(FramingError::Malformed { .. }) => {}
                        Err(e) => log::warn!("[Transport] Skipping inbound value: {e}"),
                    }
                }
            }
            Err(e) => {
                log::error!("[Transport] Read error: {e}");
                break;
            }
        }
    }

    connected.store(false, Ordering::Release);
    let _ = events_tx.send(SessionEvent::Disconnected);
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    connected: Arc<AtomicBool>,
    mut out_rx: UnboundedReceiver<Vec<u8>>,
) {
    while let Some(data) = out_rx.recv().await {
        if let Err(e) = writer.write_all(&data).await {
            log::error!("[Transport] Write error: {e}");
            connected.store(false, Ordering::Release);
            break;
        }
    }
}
