// SPDX-License-Identifier: AGPL-3.0
// Gosh Transfer Queue - Test doubles
//
// A recording engine and an in-memory pause preference so the registry and
// adapter can be driven without a real transfer engine.

use crate::engine::{EngineCommand, EngineTransfer, TransferEngine};
use crate::registry::{QueueChange, TransferRegistry};
use crate::settings::{PausePreference, QueueSettings};
use crate::types::{TransferDirection, TransferState, TransferTag, INVALID_HANDLE};
use async_channel::Receiver;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Queued transfer snapshot with otherwise neutral values
pub fn transfer(
    tag: TransferTag,
    direction: TransferDirection,
    priority: u64,
    notification_number: u64,
) -> EngineTransfer {
    EngineTransfer {
        tag,
        direction,
        is_sync: false,
        is_folder: false,
        is_streaming: false,
        state: TransferState::Queued,
        priority,
        total_bytes: 1000,
        transferred_bytes: 0,
        speed: 0,
        mean_speed: 0,
        start_time: 0,
        update_time: 0,
        file_name: format!("file-{}.bin", tag),
        path: PathBuf::from("/tmp"),
        parent_handle: INVALID_HANDLE,
        node_handle: INVALID_HANDLE,
        public_node: None,
        last_error: None,
        notification_number,
    }
}

/// Engine that only records the commands it receives
#[derive(Default)]
pub struct RecordingEngine {
    commands: Mutex<Vec<EngineCommand>>,
}

impl RecordingEngine {
    pub fn commands(&self) -> Vec<EngineCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub fn take(&self) -> Vec<EngineCommand> {
        std::mem::take(&mut *self.commands.lock().unwrap())
    }

    fn push(&self, command: EngineCommand) {
        self.commands.lock().unwrap().push(command);
    }
}

impl TransferEngine for RecordingEngine {
    fn pause_transfer(&self, tag: TransferTag, pause: bool) {
        self.push(EngineCommand::PauseTransfer { tag, pause });
    }

    fn pause_all(&self, pause: bool) {
        self.push(EngineCommand::PauseAll { pause });
    }

    fn cancel_transfer(&self, tag: TransferTag) {
        self.push(EngineCommand::CancelTransfer { tag });
    }

    fn cancel_all(&self, direction: TransferDirection) {
        self.push(EngineCommand::CancelAll { direction });
    }

    fn move_to_first(&self, tag: TransferTag) {
        self.push(EngineCommand::MoveToFirst { tag });
    }

    fn move_to_last(&self, tag: TransferTag) {
        self.push(EngineCommand::MoveToLast { tag });
    }

    fn move_before(&self, tag: TransferTag, target: TransferTag) {
        self.push(EngineCommand::MoveBefore { tag, target });
    }

    fn retry_transfer(&self, transfer: EngineTransfer) {
        self.push(EngineCommand::RetryTransfer {
            transfer: Box::new(transfer),
        });
    }
}

#[derive(Default)]
pub struct MemoryPreference {
    paused: AtomicBool,
}

impl PausePreference for MemoryPreference {
    fn global_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn set_global_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }
}

pub struct Harness {
    pub registry: Arc<TransferRegistry>,
    pub engine: Arc<RecordingEngine>,
    pub preference: Arc<MemoryPreference>,
    pub changes: Receiver<QueueChange>,
}

pub fn harness() -> Harness {
    harness_with(QueueSettings::default())
}

pub fn harness_with(settings: QueueSettings) -> Harness {
    let engine = Arc::new(RecordingEngine::default());
    let preference = Arc::new(MemoryPreference::default());
    preference.set_global_paused(settings.global_paused);

    let registry = Arc::new(TransferRegistry::new(
        engine.clone(),
        preference.clone(),
        &settings,
    ));
    let changes = registry.subscribe();

    Harness {
        registry,
        engine,
        preference,
        changes,
    }
}

/// Collect every change published so far
pub fn drain(changes: &Receiver<QueueChange>) -> Vec<QueueChange> {
    let mut out = Vec::new();
    while let Ok(change) = changes.try_recv() {
        out.push(change);
    }
    out
}
