//! # Serial Transport Module
//!
//! Line-framed serial transport with a background reader.
//!
//! This module handles:
//! - Opening a serial endpoint exclusively at 115,200 baud
//! - A background task turning raw bytes into newline-framed text lines
//! - Fan-out of received lines through the [`Broadcaster`]
//! - Raw byte writes from the caller's task
//! - Release/reacquire around an external flashing tool that needs the port
//!
//! The transport stays alive across reconnects: closing and re-opening the
//! endpoint does not disturb broadcaster registrations, so listeners attach
//! once and survive a firmware flash or an unplug/replug cycle.

pub mod port;

use crate::broadcast::Broadcaster;
use crate::error::{JoystickLinkError, Result};
use bytes::BytesMut;
use port::{PortReader, PortWriter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Default bound on a single blocking read in the background loop
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Grace period for the background reader to observe a close signal
const CLOSE_GRACE: Duration = Duration::from_millis(500);

/// Idle backoff when a read window elapses without data
const IDLE_BACKOFF: Duration = Duration::from_millis(10);

/// One open endpoint: its writer half plus the reader task controls
struct Session {
    endpoint: String,
    writer: PortWriter,
    shutdown: watch::Sender<bool>,
    reader: JoinHandle<()>,
    /// Set by the reader when it dies on a read error; the transport then
    /// behaves as closed until explicitly re-opened
    failed: Arc<AtomicBool>,
}

#[derive(Clone)]
struct OpenParams {
    endpoint: String,
    baud: u32,
    read_timeout: Duration,
}

struct Inner {
    session: Option<Session>,
    last_open: Option<OpenParams>,
}

/// Line-framed reader/writer over a single exclusively-owned serial endpoint.
///
/// At most one endpoint is held open at a time; opening a different endpoint
/// first closes the current one. While open, exactly one background task
/// reads the port and pushes decoded lines into the broadcaster.
pub struct LineTransport {
    broadcaster: Broadcaster,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for LineTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineTransport")
            .field("broadcaster", &self.broadcaster)
            .finish_non_exhaustive()
    }
}

impl Default for LineTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LineTransport {
    #[must_use]
    pub fn new() -> Self {
        Self {
            broadcaster: Broadcaster::new(),
            inner: Mutex::new(Inner {
                session: None,
                last_open: None,
            }),
        }
    }

    /// The broadcaster receiving every decoded line from this transport.
    ///
    /// Registrations outlive the serial connection itself.
    #[must_use]
    pub fn broadcaster(&self) -> Broadcaster {
        self.broadcaster.clone()
    }

    /// Whether an endpoint is currently open and its reader is healthy
    pub async fn is_open(&self) -> bool {
        let inner = self.inner.lock().await;
        inner
            .session
            .as_ref()
            .map(|s| !s.failed.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Identity of the currently open endpoint, if any
    pub async fn endpoint(&self) -> Option<String> {
        let inner = self.inner.lock().await;
        inner.session.as_ref().map(|s| s.endpoint.clone())
    }

    /// Opens a serial endpoint and starts the background reader.
    ///
    /// Idempotent for the endpoint already open: a matching call is a no-op.
    /// Opening while connected to a different endpoint performs an implicit
    /// close first.
    ///
    /// # Errors
    ///
    /// Returns [`JoystickLinkError::PortUnavailable`] when the endpoint
    /// cannot be exclusively acquired.
    pub async fn open(&self, endpoint: &str, baud: u32, read_timeout: Duration) -> Result<()> {
        {
            let inner = self.inner.lock().await;
            if let Some(session) = &inner.session {
                if session.endpoint == endpoint && !session.failed.load(Ordering::SeqCst) {
                    debug!("Endpoint {} already open; open is a no-op", endpoint);
                    return Ok(());
                }
            }
        }

        self.close().await;
        let (reader, writer) = port::open_endpoint(endpoint, baud)?;
        self.attach(endpoint, reader, writer, read_timeout).await;

        let mut inner = self.inner.lock().await;
        inner.last_open = Some(OpenParams {
            endpoint: endpoint.to_string(),
            baud,
            read_timeout,
        });
        info!("Opened serial endpoint {} at {} baud", endpoint, baud);
        Ok(())
    }

    /// Attaches an already-open byte stream pair as the endpoint.
    ///
    /// Used by tests to run the full transport over an in-memory duplex
    /// stream; `reacquire` does not remember endpoints attached this way.
    pub async fn open_io(
        &self,
        label: &str,
        reader: PortReader,
        writer: PortWriter,
        read_timeout: Duration,
    ) {
        self.close().await;
        self.attach(label, reader, writer, read_timeout).await;
    }

    async fn attach(
        &self,
        endpoint: &str,
        reader: PortReader,
        writer: PortWriter,
        read_timeout: Duration,
    ) {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let failed = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(read_loop(
            reader,
            self.broadcaster.clone(),
            read_timeout,
            shutdown_rx,
            Arc::clone(&failed),
        ));

        let mut inner = self.inner.lock().await;
        inner.session = Some(Session {
            endpoint: endpoint.to_string(),
            writer,
            shutdown,
            reader: task,
            failed,
        });
    }

    /// Closes the endpoint and stops the background reader.
    ///
    /// No-op when already closed. Waits at most a small grace period for the
    /// reader to observe the signal, then aborts it; either way the endpoint
    /// identity is free for re-open afterwards.
    pub async fn close(&self) {
        let session = {
            let mut inner = self.inner.lock().await;
            inner.session.take()
        };
        let Some(session) = session else {
            return;
        };

        let _ = session.shutdown.send(true);
        // Dropping the writer half happens with the session below; the reader
        // half is dropped by the task itself when it exits.
        let mut task = session.reader;
        if timeout(CLOSE_GRACE, &mut task).await.is_err() {
            warn!(
                "Reader for {} ignored close signal within {:?}; aborting",
                session.endpoint, CLOSE_GRACE
            );
            task.abort();
        }
        info!("Closed serial endpoint {}", session.endpoint);
    }

    /// Writes raw bytes to the endpoint.
    ///
    /// Best-effort pass-through with no internal queueing; flow control is
    /// left to the endpoint itself.
    ///
    /// # Errors
    ///
    /// Returns [`JoystickLinkError::NotOpen`] while closed (including closed
    /// by a read failure), or an I/O error from the endpoint.
    pub async fn write(&self, bytes: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let session = inner.session.as_mut().ok_or(JoystickLinkError::NotOpen)?;
        if session.failed.load(Ordering::SeqCst) {
            return Err(JoystickLinkError::NotOpen);
        }
        session.writer.write_all(bytes).await?;
        session.writer.flush().await?;
        Ok(())
    }

    /// Releases the endpoint for an external tool (e.g. a firmware flasher)
    /// that needs temporary exclusive ownership.
    pub async fn release(&self) {
        self.close().await;
    }

    /// Re-opens the endpoint released by [`LineTransport::release`].
    ///
    /// # Errors
    ///
    /// Returns [`JoystickLinkError::PortUnavailable`] when nothing was
    /// previously opened or the endpoint cannot be acquired again.
    pub async fn reacquire(&self) -> Result<()> {
        let params = {
            let inner = self.inner.lock().await;
            inner.last_open.clone()
        };
        let Some(params) = params else {
            return Err(JoystickLinkError::PortUnavailable(
                "no previously opened endpoint to reacquire".to_string(),
            ));
        };
        self.open(&params.endpoint, params.baud, params.read_timeout).await
    }
}

/// Background read loop: one per open endpoint.
///
/// Blocks at most `read_timeout` per read, backs off briefly on an empty
/// window instead of spinning, and dispatches each newline-framed chunk as a
/// lossily-decoded line. A read error or EOF is surfaced once as a synthetic
/// diagnostic line, after which the loop terminates and the transport counts
/// as closed.
async fn read_loop(
    mut reader: PortReader,
    broadcaster: Broadcaster,
    read_timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
    failed: Arc<AtomicBool>,
) {
    let mut chunk = [0u8; 512];
    let mut pending = BytesMut::with_capacity(1024);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            result = timeout(read_timeout, reader.read(&mut chunk)) => match result {
                // Nothing arrived inside the read window
                Err(_elapsed) => sleep(IDLE_BACKOFF).await,
                Ok(Ok(0)) => {
                    broadcaster.dispatch("<ERROR reading serial: endpoint closed>\n");
                    failed.store(true, Ordering::SeqCst);
                    break;
                }
                Ok(Ok(n)) => {
                    pending.extend_from_slice(&chunk[..n]);
                    drain_lines(&mut pending, &broadcaster);
                }
                Ok(Err(e)) => {
                    broadcaster.dispatch(&format!("<ERROR reading serial: {}>\n", e));
                    failed.store(true, Ordering::SeqCst);
                    break;
                }
            },
        }
    }
    debug!("Serial read loop terminated");
}

/// Dispatches every complete line buffered so far, terminator retained.
///
/// Invalid byte sequences are replaced, never raised, so a burst of line
/// noise at most garbles one line.
fn drain_lines(pending: &mut BytesMut, broadcaster: &Broadcaster) {
    while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
        let line = pending.split_to(pos + 1);
        broadcaster.dispatch(&String::from_utf8_lossy(&line));
    }
}
