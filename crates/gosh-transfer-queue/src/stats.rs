// SPDX-License-Identifier: AGPL-3.0
// Gosh Transfer Queue - Queue statistics
//
// Counters are updated in O(1) by the registry, under the same write lock as
// the sequence mutation they describe.

use crate::record::TransferRecord;
use crate::types::{FileCategory, TransferDirection, TransferState};
use serde::Serialize;

/// Record counts by state, direction and file category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferStatistics {
    by_state: [usize; TransferState::COUNT],
    /// Unfinished transfers only
    active_by_direction: [usize; 2],
    by_file_category: [usize; FileCategory::COUNT],
    finished_by_file_category: [usize; FileCategory::COUNT],
}

impl TransferStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count_for_state(&self, state: TransferState) -> usize {
        self.by_state[state.index()]
    }

    /// Number of unfinished transfers in `direction`
    pub fn count_for_direction(&self, direction: TransferDirection) -> usize {
        self.active_by_direction[direction.index()]
    }

    pub fn count_for_file_category(&self, category: FileCategory) -> usize {
        self.by_file_category[category.index()]
    }

    pub fn finished_for_file_category(&self, category: FileCategory) -> usize {
        self.finished_by_file_category[category.index()]
    }

    /// Sum of the per-state counters, always equal to the row count
    pub fn total(&self) -> usize {
        self.by_state.iter().sum()
    }

    pub(crate) fn record_inserted(&mut self, record: &TransferRecord) {
        self.by_state[record.state.index()] += 1;
        self.by_file_category[record.file_category.index()] += 1;
        if record.state.is_finished() {
            self.finished_by_file_category[record.file_category.index()] += 1;
        } else {
            self.active_by_direction[record.transfer_type.direction.index()] += 1;
        }
    }

    pub(crate) fn record_removed(&mut self, record: &TransferRecord) {
        decrement(&mut self.by_state[record.state.index()]);
        decrement(&mut self.by_file_category[record.file_category.index()]);
        if record.state.is_finished() {
            decrement(&mut self.finished_by_file_category[record.file_category.index()]);
        } else {
            decrement(&mut self.active_by_direction[record.transfer_type.direction.index()]);
        }
    }

    /// Account for `record` moving from `previous` to its current state
    pub(crate) fn state_changed(&mut self, previous: TransferState, record: &TransferRecord) {
        let current = record.state;
        if previous == current {
            return;
        }

        decrement(&mut self.by_state[previous.index()]);
        self.by_state[current.index()] += 1;

        if !previous.is_finished() && current.is_finished() {
            decrement(&mut self.active_by_direction[record.transfer_type.direction.index()]);
            self.finished_by_file_category[record.file_category.index()] += 1;
        } else if previous.is_finished() && !current.is_finished() {
            self.active_by_direction[record.transfer_type.direction.index()] += 1;
            decrement(&mut self.finished_by_file_category[record.file_category.index()]);
        }
    }
}

fn decrement(counter: &mut usize) {
    debug_assert!(*counter > 0, "statistics counter underflow");
    *counter = counter.saturating_sub(1);
}
