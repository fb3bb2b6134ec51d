//! Request/response correlation
//!
//! Replies carry no sequence number or command echo, so the only way to pair
//! one with its request is to allow a single request in flight per link. The
//! [`Correlator`] enforces that: callers queue for a turn, register a pending
//! slot, write the command byte, and wait for the reader loop to drop the next
//! reply into the slot.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use lc1_protocol::{Command, Encode};
use tokio::sync::{mpsc, oneshot, Mutex as TurnLock};
use tracing::{debug, warn};

use crate::error::LinkError;

/// A reply matched to the request that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Command that was outstanding when the reply arrived
    pub command: Command,
    /// Address byte from the reply frame
    pub device_id: u8,
    /// Raw bytes following the address
    pub payload: Vec<u8>,
}

/// The single in-flight request
#[derive(Debug)]
struct PendingRequest {
    command: Command,
    reply_tx: oneshot::Sender<Reply>,
}

/// Pairs outbound commands with inbound replies
#[derive(Debug)]
pub struct Correlator {
    /// Held for a whole request/reply exchange; FIFO, so callers are served in order
    turn: TurnLock<()>,
    /// Only locked for the instant it takes to fill or empty it
    pending: Mutex<Option<PendingRequest>>,
    /// Bytes for the I/O task to write
    outbound: mpsc::Sender<Vec<u8>>,
}

impl Correlator {
    /// Create a correlator that writes commands into `outbound`
    pub fn new(outbound: mpsc::Sender<Vec<u8>>) -> Self {
        Self {
            turn: TurnLock::new(()),
            pending: Mutex::new(None),
            outbound,
        }
    }

    /// Send a command and wait for its reply
    ///
    /// Blocks until no other request is outstanding, then until the reply
    /// arrives or `timeout` elapses. The slot is released either way.
    pub async fn send_and_wait(
        &self,
        command: Command,
        timeout: Duration,
    ) -> Result<Reply, LinkError> {
        let _turn = self.turn.lock().await;

        let (reply_tx, reply_rx) = oneshot::channel();
        *self.slot() = Some(PendingRequest { command, reply_tx });

        let result = self.exchange(command, timeout, reply_rx).await;
        self.slot().take();
        result
    }

    async fn exchange(
        &self,
        command: Command,
        timeout: Duration,
        reply_rx: oneshot::Receiver<Reply>,
    ) -> Result<Reply, LinkError> {
        debug!("Sending {:?}", command);
        self.outbound
            .send(command.encode())
            .await
            .map_err(|_| LinkError::Disconnected)?;

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            // Slot emptied by close(): the I/O task is gone
            Ok(Err(_)) => Err(LinkError::Disconnected),
            Err(_) => {
                warn!("No reply to {:?} within {:?}", command, timeout);
                Err(LinkError::RequestTimeout {
                    command,
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Hand a reply to the outstanding request
    ///
    /// Returns false if nothing was waiting; the reply is logged and dropped.
    pub fn deliver(&self, device_id: u8, payload: Vec<u8>) -> bool {
        let Some(pending) = self.slot().take() else {
            warn!(
                "Unexpected reply from 0x{:02X} with no request pending: {:02X?}",
                device_id, payload
            );
            return false;
        };

        let reply = Reply {
            command: pending.command,
            device_id,
            payload,
        };
        if pending.reply_tx.send(reply).is_err() {
            debug!("Requester for {:?} stopped waiting", pending.command);
            return false;
        }
        true
    }

    /// Returns true if a request is waiting for its reply
    pub fn is_pending(&self) -> bool {
        self.slot().is_some()
    }

    /// Fail the outstanding request, if any, with [`LinkError::Disconnected`]
    pub fn close(&self) {
        if let Some(pending) = self.slot().take() {
            debug!("Abandoning {:?}: link closed", pending.command);
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<PendingRequest>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
