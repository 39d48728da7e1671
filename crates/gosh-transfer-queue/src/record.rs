// SPDX-License-Identifier: AGPL-3.0
// Gosh Transfer Queue - Transfer record
//
// One row of the queue: the full snapshot of a transfer as last reported by
// the engine, plus the values derived from it (ETA, file category, finish
// time).

use crate::engine::EngineTransfer;
use crate::types::{FileCategory, NodeHandle, TransferState, TransferTag, TransferType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Engine-reported error: code plus auxiliary value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferError {
    pub code: i32,
    pub value: i64,
}

/// Detached snapshot of a publicly shared node.
///
/// Owned by the record that received it; dropping the record disposes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicNode {
    pub handle: NodeHandle,
    /// Base64 node handle used in links
    pub base64_handle: String,
    /// Base64 node key, absent when the node is not exported
    pub base64_key: Option<String>,
}

impl PublicNode {
    pub fn is_public(&self) -> bool {
        self.base64_key.is_some()
    }

    /// Build the public link for this node under `base_url`
    pub fn link(&self, base_url: &str) -> Option<String> {
        let key = self.base64_key.as_deref()?;
        if self.base64_handle.is_empty() || key.is_empty() {
            return None;
        }
        Some(format!(
            "{}/#!{}!{}",
            base_url.trim_end_matches('/'),
            self.base64_handle,
            key
        ))
    }
}

/// Snapshot of one queued, running or finished transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    pub tag: TransferTag,
    pub transfer_type: TransferType,
    pub state: TransferState,
    pub priority: u64,
    pub total_bytes: u64,
    pub transferred_bytes: u64,
    pub speed: u64,
    pub mean_speed: u64,
    pub remaining_time: Option<Duration>,
    /// Engine clock, deciseconds
    pub started_at: i64,
    /// Engine clock, deciseconds
    pub updated_at: i64,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<TransferError>,
    pub file_name: String,
    pub path: PathBuf,
    pub file_category: FileCategory,
    pub parent_handle: NodeHandle,
    pub node_handle: NodeHandle,
    pub public_node: Option<PublicNode>,
}

impl TransferRecord {
    /// Build a record from the engine snapshot of a starting transfer
    pub fn from_engine(transfer: &EngineTransfer, remaining_time: Option<Duration>) -> Self {
        Self {
            tag: transfer.tag,
            transfer_type: transfer.transfer_type(),
            state: transfer.state,
            priority: transfer.priority,
            total_bytes: transfer.total_bytes,
            transferred_bytes: transfer.transferred_bytes,
            speed: transfer.speed,
            mean_speed: transfer.mean_speed,
            remaining_time,
            started_at: transfer.start_time,
            updated_at: transfer.update_time,
            finished_at: None,
            error: transfer.last_error,
            file_name: transfer.file_name.clone(),
            path: transfer.path.clone(),
            file_category: FileCategory::from_file_name(&transfer.file_name),
            parent_handle: transfer.parent_handle,
            node_handle: transfer.node_handle,
            public_node: transfer.public_node.clone(),
        }
    }

    pub fn remaining_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.transferred_bytes)
    }

    /// Progress fraction in [0.0, 1.0]
    pub fn progress(&self) -> f64 {
        if self.total_bytes == 0 {
            return if self.state == TransferState::Completed { 1.0 } else { 0.0 };
        }
        (self.transferred_bytes as f64 / self.total_bytes as f64).clamp(0.0, 1.0)
    }

    /// Apply a progress or temporary-error snapshot.
    ///
    /// The state is only taken over when the transition is allowed for
    /// non-finish events. Priority is left to the caller since a change
    /// may require a reorder.
    pub(crate) fn apply_update(
        &mut self,
        transfer: &EngineTransfer,
        remaining_time: Option<Duration>,
        error: Option<TransferError>,
    ) {
        if self.state.accepts_update_to(transfer.state) {
            self.state = transfer.state;
        }
        self.total_bytes = transfer.total_bytes;
        self.transferred_bytes = transfer.transferred_bytes;
        self.speed = transfer.speed;
        self.mean_speed = transfer.mean_speed;
        self.remaining_time = remaining_time;
        self.updated_at = transfer.update_time;
        self.error = error;
        if transfer.public_node.is_some() {
            self.public_node = transfer.public_node.clone();
        }
    }

    /// Apply the final snapshot of a finished transfer
    pub(crate) fn apply_finish(
        &mut self,
        transfer: &EngineTransfer,
        finished_at: DateTime<Utc>,
        error: Option<TransferError>,
    ) {
        self.state = transfer.state;
        self.transferred_bytes = transfer.transferred_bytes;
        self.mean_speed = if transfer.mean_speed == 0 {
            transfer.transferred_bytes
        } else {
            transfer.mean_speed
        };
        self.speed = 0;
        self.remaining_time = None;
        self.updated_at = transfer.update_time;
        self.finished_at = Some(finished_at);
        self.error = error;
        self.parent_handle = transfer.parent_handle;
        self.node_handle = transfer.node_handle;
        if transfer.public_node.is_some() {
            self.public_node = transfer.public_node.clone();
        }
    }
}
