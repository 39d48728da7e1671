// SPDX-License-Identifier: AGPL-3.0
// Gosh Transfer Queue - Engine event adapter
//
// Feeds engine lifecycle events and the startup snapshot into the registry.
// Folder and streaming transfers never reach it.

use crate::engine::{EngineEvent, EngineSnapshot};
use crate::registry::TransferRegistry;
use crate::settings::QueueSettings;
use async_channel::Receiver;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Routes engine events to the matching registry operation
pub struct EventAdapter {
    registry: Arc<TransferRegistry>,
    rows_per_chunk: usize,
}

impl EventAdapter {
    pub fn new(registry: Arc<TransferRegistry>, settings: &QueueSettings) -> Self {
        Self {
            registry,
            rows_per_chunk: settings.rows_per_chunk.max(1),
        }
    }

    pub fn registry(&self) -> &Arc<TransferRegistry> {
        &self.registry
    }

    /// Apply one engine event. Returns whether the registry changed.
    pub fn handle(&self, event: &EngineEvent) -> bool {
        if !event.transfer().is_tracked_kind() {
            return false;
        }

        match event {
            EngineEvent::Started(transfer) => self.registry.update_on_start(transfer),
            EngineEvent::Updated(transfer) => self.registry.update_on_progress(transfer),
            EngineEvent::TemporaryError { transfer, error } => {
                self.registry.update_on_temporary_error(transfer, *error)
            }
            EngineEvent::Finished { transfer, error } => self.registry.finalize(transfer, *error),
        }
    }

    /// Load the engine's transfer list into the registry.
    ///
    /// Rows are inserted in chunks, each under its own write lock, so readers
    /// are never starved by a large queue. Returns the number of rows added.
    pub fn populate(&self, snapshot: EngineSnapshot) -> usize {
        let EngineSnapshot {
            mut transfers,
            notification_number,
        } = snapshot;

        transfers.retain(|transfer| transfer.is_tracked_kind() && transfer.priority != 0);
        transfers.sort_by_key(|transfer| {
            (transfer.direction.index(), transfer.is_sync, transfer.priority)
        });

        tracing::info!(
            "Loading {} transfers from engine snapshot (#{})",
            transfers.len(),
            notification_number
        );

        if transfers.is_empty() {
            return self.registry.populate_chunk(&[], notification_number);
        }

        transfers
            .chunks(self.rows_per_chunk)
            .map(|chunk| self.registry.populate_chunk(chunk, notification_number))
            .sum()
    }

    /// Consume engine events until the channel closes
    pub fn spawn(self: Arc<Self>, events: Receiver<EngineEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                self.handle(&event);
            }
            tracing::info!("Engine event channel closed");
        })
    }

    /// Run the initial population off the async executor
    pub fn spawn_population(self: Arc<Self>, snapshot: EngineSnapshot) -> JoinHandle<usize> {
        tokio::task::spawn_blocking(move || self.populate(snapshot))
    }
}
