// SPDX-License-Identifier: AGPL-3.0
// Gosh Transfer Queue - Engine interface
//
// The queue never moves bytes itself. It consumes lifecycle events from the
// transfer engine and sends commands back through the TransferEngine trait.
// Commands are fire-and-forget: the outcome shows up as a later event.

use crate::record::{PublicNode, TransferError};
use crate::types::{
    NodeHandle, QueueError, TransferDirection, TransferState, TransferTag, TransferType,
};
use async_channel::{Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Snapshot of one transfer as reported by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineTransfer {
    pub tag: TransferTag,
    pub direction: TransferDirection,
    pub is_sync: bool,
    pub is_folder: bool,
    pub is_streaming: bool,
    pub state: TransferState,
    pub priority: u64,
    pub total_bytes: u64,
    pub transferred_bytes: u64,
    /// Instantaneous speed in bytes per second
    pub speed: u64,
    /// Mean speed in bytes per second
    pub mean_speed: u64,
    /// Engine clock, deciseconds
    pub start_time: i64,
    /// Engine clock, deciseconds
    pub update_time: i64,
    pub file_name: String,
    pub path: PathBuf,
    pub parent_handle: NodeHandle,
    pub node_handle: NodeHandle,
    pub public_node: Option<PublicNode>,
    pub last_error: Option<TransferError>,
    /// Ascending per-session notification number
    pub notification_number: u64,
}

impl EngineTransfer {
    pub fn transfer_type(&self) -> TransferType {
        TransferType {
            direction: self.direction,
            sync: self.is_sync,
        }
    }

    /// Folder and streaming transfers are never shown in the queue
    pub fn is_tracked_kind(&self) -> bool {
        !self.is_folder && !self.is_streaming
    }
}

/// Lifecycle callbacks emitted by the engine
#[derive(Debug, Clone)]
pub enum EngineEvent {
    Started(EngineTransfer),
    Updated(EngineTransfer),
    TemporaryError {
        transfer: EngineTransfer,
        error: Option<TransferError>,
    },
    Finished {
        transfer: EngineTransfer,
        error: Option<TransferError>,
    },
}

impl EngineEvent {
    pub fn transfer(&self) -> &EngineTransfer {
        match self {
            Self::Started(transfer) | Self::Updated(transfer) => transfer,
            Self::TemporaryError { transfer, .. } | Self::Finished { transfer, .. } => transfer,
        }
    }
}

/// Full transfer list taken from the engine at startup
#[derive(Debug, Clone, Default)]
pub struct EngineSnapshot {
    pub transfers: Vec<EngineTransfer>,
    /// Notification number at the time the snapshot was taken
    pub notification_number: u64,
}

/// Commands the queue can issue to the engine
pub trait TransferEngine: Send + Sync {
    fn pause_transfer(&self, tag: TransferTag, pause: bool);

    fn pause_all(&self, pause: bool);

    fn cancel_transfer(&self, tag: TransferTag);

    fn cancel_all(&self, direction: TransferDirection);

    fn move_to_first(&self, tag: TransferTag);

    fn move_to_last(&self, tag: TransferTag);

    fn move_before(&self, tag: TransferTag, target: TransferTag);

    /// Resubmit a failed transfer. A successful retry comes back as a new
    /// start event.
    fn retry_transfer(&self, transfer: EngineTransfer);
}

/// Commands that can be sent to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    PauseTransfer { tag: TransferTag, pause: bool },
    PauseAll { pause: bool },
    CancelTransfer { tag: TransferTag },
    CancelAll { direction: TransferDirection },
    MoveToFirst { tag: TransferTag },
    MoveToLast { tag: TransferTag },
    MoveBefore { tag: TransferTag, target: TransferTag },
    RetryTransfer { transfer: Box<EngineTransfer> },
}

/// TransferEngine implementation that forwards commands over a channel to
/// the task owning the real engine
#[derive(Debug, Clone)]
pub struct ChannelEngine {
    command_tx: Sender<EngineCommand>,
}

impl ChannelEngine {
    pub fn new(command_tx: Sender<EngineCommand>) -> Self {
        Self { command_tx }
    }

    /// Create an engine handle with a bounded command channel
    pub fn bounded(capacity: usize) -> (Self, async_channel::Receiver<EngineCommand>) {
        let (command_tx, command_rx) = async_channel::bounded(capacity);
        (Self::new(command_tx), command_rx)
    }

    /// Enqueue a command without blocking
    pub fn send(&self, command: EngineCommand) -> Result<(), QueueError> {
        match self.command_tx.try_send(command) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(command)) => {
                // Callers are on engine or UI threads; never block them.
                tracing::warn!("Engine command queue full, dropping {:?}", command);
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(QueueError::EngineUnavailable),
        }
    }

    fn dispatch(&self, command: EngineCommand) {
        if let Err(e) = self.send(command) {
            tracing::warn!("Failed to send engine command: {}", e);
        }
    }
}

impl TransferEngine for ChannelEngine {
    fn pause_transfer(&self, tag: TransferTag, pause: bool) {
        self.dispatch(EngineCommand::PauseTransfer { tag, pause });
    }

    fn pause_all(&self, pause: bool) {
        self.dispatch(EngineCommand::PauseAll { pause });
    }

    fn cancel_transfer(&self, tag: TransferTag) {
        self.dispatch(EngineCommand::CancelTransfer { tag });
    }

    fn cancel_all(&self, direction: TransferDirection) {
        self.dispatch(EngineCommand::CancelAll { direction });
    }

    fn move_to_first(&self, tag: TransferTag) {
        self.dispatch(EngineCommand::MoveToFirst { tag });
    }

    fn move_to_last(&self, tag: TransferTag) {
        self.dispatch(EngineCommand::MoveToLast { tag });
    }

    fn move_before(&self, tag: TransferTag, target: TransferTag) {
        self.dispatch(EngineCommand::MoveBefore { tag, target });
    }

    fn retry_transfer(&self, transfer: EngineTransfer) {
        self.dispatch(EngineCommand::RetryTransfer {
            transfer: Box::new(transfer),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::transfer;

    #[test]
    fn test_channel_engine_forwards_commands() {
        let (engine, commands) = ChannelEngine::bounded(8);
        engine.pause_transfer(3, true);
        engine.move_before(4, 1);
        engine.cancel_all(TransferDirection::Upload);

        assert_eq!(
            commands.try_recv().unwrap(),
            EngineCommand::PauseTransfer { tag: 3, pause: true }
        );
        assert_eq!(
            commands.try_recv().unwrap(),
            EngineCommand::MoveBefore { tag: 4, target: 1 }
        );
        assert_eq!(
            commands.try_recv().unwrap(),
            EngineCommand::CancelAll {
                direction: TransferDirection::Upload
            }
        );
    }

    #[test]
    fn test_full_queue_drops_without_error() {
        let (engine, commands) = ChannelEngine::bounded(1);
        assert!(engine.send(EngineCommand::PauseAll { pause: true }).is_ok());
        assert!(engine.send(EngineCommand::PauseAll { pause: false }).is_ok());
        assert_eq!(commands.len(), 1);
    }

    #[test]
    fn test_closed_channel_is_reported() {
        let (engine, commands) = ChannelEngine::bounded(1);
        drop(commands);
        assert!(matches!(
            engine.send(EngineCommand::CancelTransfer { tag: 1 }),
            Err(QueueError::EngineUnavailable)
        ));
    }

    #[test]
    fn test_tracked_kind() {
        let mut t = transfer(1, TransferDirection::Download, 10, 1);
        assert!(t.is_tracked_kind());
        t.is_folder = true;
        assert!(!t.is_tracked_kind());
        t.is_folder = false;
        t.is_streaming = true;
        assert!(!t.is_tracked_kind());
    }
}
