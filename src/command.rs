//! # Command Channel Module
//!
//! Thin request layer over the transport's write path.
//!
//! Commands are fire-and-forget verbs; when a response matters (the version
//! query), the channel correlates it by pattern against the broadcast line
//! stream rather than by any protocol-level request id, racing the matcher
//! against a timeout. A timeout is a normal, displayable outcome ("version
//! unknown"), not an error.

use crate::error::{JoystickLinkError, Result};
use crate::protocol::{self, Command, FirmwareVersion};
use crate::transport::LineTransport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

/// Default wait for the firmware version report
pub const DEFAULT_VERSION_TIMEOUT: Duration = Duration::from_secs(2);

/// Sends line-framed commands and correlates pattern-matched responses.
pub struct CommandChannel {
    transport: Arc<LineTransport>,
    /// One awaited correlation may be outstanding at a time
    pending: AtomicBool,
}

impl std::fmt::Debug for CommandChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandChannel")
            .field("pending", &self.pending.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl CommandChannel {
    #[must_use]
    pub fn new(transport: Arc<LineTransport>) -> Self {
        Self {
            transport,
            pending: AtomicBool::new(false),
        }
    }

    /// Writes a command frame (token plus terminator) to the device.
    ///
    /// # Errors
    ///
    /// Returns [`JoystickLinkError::NotConnected`] when no transport is open;
    /// the caller must reconnect.
    pub async fn send(&self, command: &Command) -> Result<()> {
        debug!("Sending command: {}", command);
        match self.transport.write(command.to_frame().as_bytes()).await {
            Err(JoystickLinkError::NotOpen) => Err(JoystickLinkError::NotConnected),
            other => other,
        }
    }

    /// Sends a command and awaits a broadcaster-delivered line matching
    /// `matcher`, racing it against `timeout`.
    ///
    /// Resolves to `Some(T)` on the first match and `None` on timeout.
    /// The listener registers before the command is written, so a reply
    /// arriving between send and await cannot be missed. Closing the
    /// transport mid-wait resolves as a timeout rather than hanging.
    ///
    /// # Errors
    ///
    /// [`JoystickLinkError::CorrelationBusy`] when another awaited request is
    /// still outstanding on this channel;
    /// [`JoystickLinkError::NotConnected`] when no transport is open.
    pub async fn send_and_await<T, F>(
        &self,
        command: &Command,
        matcher: F,
        timeout: Duration,
    ) -> Result<Option<T>>
    where
        T: Send + 'static,
        F: Fn(&str) -> Option<T> + Send + Sync + 'static,
    {
        if self
            .pending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(JoystickLinkError::CorrelationBusy);
        }

        let (tx, rx) = oneshot::channel();
        let slot = Mutex::new(Some(tx));
        let broadcaster = self.transport.broadcaster();
        let subscription = broadcaster.subscribe(move |line| {
            if let Some(value) = matcher(line) {
                if let Some(tx) = slot.lock().unwrap().take() {
                    let _ = tx.send(value);
                }
            }
        });

        let result = match self.send(command).await {
            Ok(()) => match tokio::time::timeout(timeout, rx).await {
                Ok(Ok(value)) => Ok(Some(value)),
                // Sender dropped without a match; treat like a timeout
                Ok(Err(_)) => Ok(None),
                Err(_elapsed) => Ok(None),
            },
            Err(e) => Err(e),
        };

        broadcaster.unsubscribe(subscription);
        self.pending.store(false, Ordering::SeqCst);
        result
    }

    /// Queries the firmware version, waiting up to `timeout` for the report.
    ///
    /// `Ok(None)` means the version is unknown; callers treat that as a valid
    /// terminal state, not a retry trigger.
    pub async fn query_version(&self, timeout: Duration) -> Result<Option<FirmwareVersion>> {
        self.send_and_await(&Command::Version, protocol::parse_version_line, timeout)
            .await
    }
}
