// SPDX-License-Identifier: AGPL-3.0
// Gosh Transfer Queue - Transfer registry
//
// The ordered, concurrently readable view of all transfers.
//
// Map, row order, statistics and side tables live behind a single RwLock.
// Every mutation takes the write lock and publishes its QueueChange before
// releasing it, so subscribers observe changes in mutation order. Engine
// commands are issued after the lock is released and are never awaited.

use crate::engine::{EngineTransfer, TransferEngine};
use crate::eta::RemainingTimeEstimator;
use crate::record::{TransferError, TransferRecord};
use crate::settings::{PausePreference, QueueSettings};
use crate::stats::TransferStatistics;
use crate::types::{NodeHandle, TransferDirection, TransferState, TransferTag, TransferType};
use async_channel::{Receiver, Sender};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};
use std::time::Duration;

/// Structural and aggregate change notifications for observers.
///
/// Row ranges are inclusive and refer to the sequence as it was right
/// before the change (for removals and moves) or right after it (for
/// insertions and updates).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum QueueChange {
    RowsInserted {
        first: usize,
        last: usize,
    },
    RowsRemoved {
        first: usize,
        last: usize,
    },
    /// Rows `first..=last` now sit before the row that was at `destination`
    RowsMoved {
        first: usize,
        last: usize,
        destination: usize,
    },
    RowUpdated {
        row: usize,
    },
    /// The queue went from empty to non-empty (`true`) or back (`false`)
    TransfersPresent(bool),
    PauseStateChanged(bool),
}

/// Links collected for a selection of rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferLinks {
    /// Nodes without a public link; they must be exported first
    pub export_handles: Vec<NodeHandle>,
    pub links: Vec<String>,
}

/// Reprioritization request derived from a row move
#[derive(Debug, Clone, Copy)]
enum MoveRequest {
    First(TransferTag),
    Last(TransferTag),
    Before(TransferTag, TransferTag),
}

#[derive(Default)]
struct QueueState {
    transfers: HashMap<TransferTag, TransferRecord>,
    order: Vec<TransferTag>,
    stats: TransferStatistics,
    failed: HashMap<TransferTag, EngineTransfer>,
    estimators: HashMap<TransferTag, RemainingTimeEstimator>,
    /// Last applied engine notification number
    notification_number: u64,
}

impl QueueState {
    fn row_of(&self, tag: TransferTag) -> Option<usize> {
        self.order.iter().position(|t| *t == tag)
    }

    fn record_at(&self, row: usize) -> Option<&TransferRecord> {
        self.order.get(row).and_then(|tag| self.transfers.get(tag))
    }

    fn is_stale(&self, notification_number: u64) -> bool {
        notification_number <= self.notification_number
    }

    /// Rows sorted from last to first, duplicates and out-of-range rows
    /// dropped
    fn descending_rows(&self, rows: &[usize]) -> Vec<usize> {
        let len = self.order.len();
        debug_assert!(rows.iter().all(|&row| row < len), "row out of bounds");

        let mut rows: Vec<usize> = rows.iter().copied().filter(|&row| row < len).collect();
        rows.sort_unstable_by(|a, b| b.cmp(a));
        rows.dedup();
        rows
    }

    fn insert(&mut self, transfer: &EngineTransfer, row: usize, smoothing: f64) -> bool {
        if self.transfers.contains_key(&transfer.tag) {
            return false;
        }
        if row > self.order.len() {
            debug_assert!(false, "insert row {} out of bounds", row);
            return false;
        }

        let mut estimator = RemainingTimeEstimator::new(transfer.speed, smoothing);
        let remaining = transfer.total_bytes.saturating_sub(transfer.transferred_bytes);
        let remaining_time = estimator.estimate(transfer.speed, remaining);
        let record = TransferRecord::from_engine(transfer, remaining_time);

        self.stats.record_inserted(&record);
        if record.state == TransferState::Failed {
            self.failed.insert(transfer.tag, transfer.clone());
        }
        if !record.state.is_finished() {
            self.estimators.insert(transfer.tag, estimator);
        }
        self.transfers.insert(transfer.tag, record);
        self.order.insert(row, transfer.tag);
        true
    }

    /// Remove `count` rows starting at `row`. The range must be valid.
    fn remove_range(&mut self, row: usize, count: usize) {
        for tag in self.order.drain(row..row + count) {
            if let Some(record) = self.transfers.remove(&tag) {
                self.stats.record_removed(&record);
            }
            self.failed.remove(&tag);
            self.estimators.remove(&tag);
        }
    }

    /// Translate a block move into engine reprioritization requests.
    ///
    /// The destination must lie outside `source_row..source_row + count`.
    fn plan_move(
        &self,
        source_row: usize,
        count: usize,
        destination: usize,
        out: &mut Vec<MoveRequest>,
    ) -> bool {
        let len = self.order.len();
        let in_bounds = source_row.checked_add(count).is_some_and(|end| end <= len);
        if count == 0 || !in_bounds || destination > len {
            return false;
        }
        let last_row = source_row + count - 1;
        if destination >= source_row && destination <= last_row {
            return false;
        }

        let tags = &self.order[source_row..=last_row];
        if destination == 0 {
            // Each move-to-first lands above the previous one
            out.extend(tags.iter().rev().map(|&tag| MoveRequest::First(tag)));
        } else if destination == len {
            out.extend(tags.iter().map(|&tag| MoveRequest::Last(tag)));
        } else {
            let target = self.order[destination];
            out.extend(tags.iter().map(|&tag| MoveRequest::Before(tag, target)));
        }
        true
    }
}

/// Row at which a transfer of `transfer_type` with `priority` belongs.
///
/// Walks forward through the block of same-type rows starting at the first
/// one and stops before the first row with a greater priority. When the
/// block ends without a match, scans back from the tail for the last
/// same-type row that does not sort after the new one. Unknown types go to
/// the tail.
fn find_insertion_row(
    order: &[TransferTag],
    transfers: &HashMap<TransferTag, TransferRecord>,
    transfer_type: TransferType,
    priority: u64,
) -> usize {
    let same_type = |tag: &TransferTag| {
        transfers
            .get(tag)
            .filter(|record| record.transfer_type == transfer_type)
    };

    let Some(first) = order.iter().position(|tag| same_type(tag).is_some()) else {
        return order.len();
    };

    for (row, tag) in order.iter().enumerate().skip(first) {
        match same_type(tag) {
            Some(record) if priority < record.priority => return row,
            Some(_) => {}
            None => break,
        }
    }

    order
        .iter()
        .rposition(|tag| same_type(tag).is_some_and(|record| record.priority <= priority))
        .map_or(first, |row| row + 1)
}

/// Read access that falls back to the write lock under contention
enum StateGuard<'a> {
    Shared(RwLockReadGuard<'a, QueueState>),
    Exclusive(RwLockWriteGuard<'a, QueueState>),
}

impl Deref for StateGuard<'_> {
    type Target = QueueState;

    fn deref(&self) -> &QueueState {
        match self {
            Self::Shared(guard) => &**guard,
            Self::Exclusive(guard) => &**guard,
        }
    }
}

/// Ordered registry of in-flight and finished transfers
pub struct TransferRegistry {
    state: RwLock<QueueState>,
    engine: Arc<dyn TransferEngine>,
    preference: Arc<dyn PausePreference>,
    all_paused: AtomicBool,
    subscribers: Mutex<Vec<Sender<QueueChange>>>,
    eta_smoothing: f64,
    link_base_url: String,
}

impl TransferRegistry {
    pub fn new(
        engine: Arc<dyn TransferEngine>,
        preference: Arc<dyn PausePreference>,
        settings: &QueueSettings,
    ) -> Self {
        let all_paused = preference.global_paused();

        Self {
            state: RwLock::new(QueueState::default()),
            engine,
            preference,
            all_paused: AtomicBool::new(all_paused),
            subscribers: Mutex::new(Vec::new()),
            eta_smoothing: settings.eta_smoothing,
            link_base_url: settings.link_base_url.clone(),
        }
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> Receiver<QueueChange> {
        let (tx, rx) = async_channel::unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    fn emit(&self, change: QueueChange) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Closed receivers are pruned
        subscribers.retain(|tx| tx.try_send(change).is_ok());
    }

    fn read_state(&self) -> StateGuard<'_> {
        match self.state.try_read() {
            Ok(guard) => StateGuard::Shared(guard),
            Err(TryLockError::Poisoned(e)) => StateGuard::Shared(e.into_inner()),
            Err(TryLockError::WouldBlock) => StateGuard::Exclusive(self.write_state()),
        }
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, QueueState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn row_count(&self) -> usize {
        self.read_state().order.len()
    }

    pub fn has_transfers(&self) -> bool {
        !self.read_state().order.is_empty()
    }

    /// Snapshot of the record displayed at `row`
    pub fn record_at(&self, row: usize) -> Option<TransferRecord> {
        self.read_state().record_at(row).cloned()
    }

    pub fn tag_at(&self, row: usize) -> Option<TransferTag> {
        self.read_state().order.get(row).copied()
    }

    pub fn row_of(&self, tag: TransferTag) -> Option<usize> {
        self.read_state().row_of(tag)
    }

    /// All records in row order
    pub fn records(&self) -> Vec<TransferRecord> {
        let state = self.read_state();
        state
            .order
            .iter()
            .filter_map(|tag| state.transfers.get(tag).cloned())
            .collect()
    }

    pub fn statistics(&self) -> TransferStatistics {
        self.read_state().stats.clone()
    }

    pub fn count_for_state(&self, state: TransferState) -> usize {
        self.read_state().stats.count_for_state(state)
    }

    pub fn count_for_direction(&self, direction: TransferDirection) -> usize {
        self.read_state().stats.count_for_direction(direction)
    }

    /// Retained snapshot of a failed transfer
    pub fn failed_transfer(&self, tag: TransferTag) -> Option<EngineTransfer> {
        self.read_state().failed.get(&tag).cloned()
    }

    pub fn notification_number(&self) -> u64 {
        self.read_state().notification_number
    }

    pub fn are_all_paused(&self) -> bool {
        self.all_paused.load(Ordering::SeqCst)
    }

    /// Insert a transfer at `row`. No-op if the tag is already tracked.
    pub fn insert(&self, transfer: &EngineTransfer, row: usize) -> bool {
        let mut state = self.write_state();
        if !state.insert(transfer, row, self.eta_smoothing) {
            return false;
        }

        self.emit(QueueChange::RowsInserted {
            first: row,
            last: row,
        });
        if state.order.len() == 1 {
            self.emit(QueueChange::TransfersPresent(true));
        }
        true
    }

    /// Row a new transfer of this type and priority would be inserted at
    pub fn find_insertion_row(&self, transfer_type: TransferType, priority: u64) -> usize {
        let state = self.read_state();
        find_insertion_row(&state.order, &state.transfers, transfer_type, priority)
    }

    /// Handle a start event
    pub fn update_on_start(&self, transfer: &EngineTransfer) -> bool {
        let inserted = {
            let mut state = self.write_state();
            if state.is_stale(transfer.notification_number) {
                tracing::trace!(
                    "Dropping stale start for transfer {} (#{})",
                    transfer.tag,
                    transfer.notification_number
                );
                return false;
            }

            let row = find_insertion_row(
                &state.order,
                &state.transfers,
                transfer.transfer_type(),
                transfer.priority,
            );
            let inserted = state.insert(transfer, row, self.eta_smoothing);
            state.notification_number = transfer.notification_number;

            if inserted {
                self.emit(QueueChange::RowsInserted {
                    first: row,
                    last: row,
                });
                if state.order.len() == 1 {
                    self.emit(QueueChange::TransfersPresent(true));
                }
            }
            inserted
        };

        if inserted && self.are_all_paused() && transfer.state.is_pausable() {
            tracing::debug!("Pausing new transfer {} (all paused)", transfer.tag);
            self.engine.pause_transfer(transfer.tag, true);
        }
        inserted
    }

    /// Handle a progress event. Reorders the row when the priority changed.
    pub fn update_on_progress(&self, transfer: &EngineTransfer) -> bool {
        let mut guard = self.write_state();
        if guard.is_stale(transfer.notification_number) {
            tracing::trace!(
                "Dropping stale update for transfer {} (#{})",
                transfer.tag,
                transfer.notification_number
            );
            return false;
        }
        guard.notification_number = transfer.notification_number;

        let Some(row) = guard.row_of(transfer.tag) else {
            tracing::debug!("Ignoring update for untracked transfer {}", transfer.tag);
            return false;
        };

        let QueueState {
            transfers,
            order,
            stats,
            estimators,
            ..
        } = &mut *guard;
        let Some(record) = transfers.get_mut(&transfer.tag) else {
            return false;
        };

        let previous_state = record.state;
        let previous_priority = record.priority;
        if previous_state == transfer.state
            && previous_priority == transfer.priority
            && transfer.transferred_bytes < record.transferred_bytes
        {
            return false;
        }

        let remaining_time =
            estimate_remaining(estimators, self.eta_smoothing, record.state, transfer);
        record.apply_update(transfer, remaining_time, transfer.last_error);
        record.priority = transfer.priority;
        stats.state_changed(previous_state, record);
        let transfer_type = record.transfer_type;

        if transfer.priority != previous_priority {
            order.remove(row);
            // Moving up lands before equal priorities, moving down after them
            let new_row = if transfer.priority < previous_priority {
                order
                    .iter()
                    .position(|tag| {
                        transfers.get(tag).is_some_and(|record| {
                            record.transfer_type == transfer_type
                                && transfer.priority <= record.priority
                        })
                    })
                    .unwrap_or_else(|| {
                        find_insertion_row(order, transfers, transfer_type, transfer.priority)
                    })
            } else {
                find_insertion_row(order, transfers, transfer_type, transfer.priority)
            };
            order.insert(new_row, transfer.tag);

            if new_row != row {
                let destination = if new_row > row { new_row + 1 } else { new_row };
                self.emit(QueueChange::RowsMoved {
                    first: row,
                    last: row,
                    destination,
                });
                return true;
            }
        }

        self.emit(QueueChange::RowUpdated { row });
        true
    }

    /// Handle a temporary error. Never reorders.
    pub fn update_on_temporary_error(
        &self,
        transfer: &EngineTransfer,
        error: Option<TransferError>,
    ) -> bool {
        let mut guard = self.write_state();
        if guard.is_stale(transfer.notification_number) {
            return false;
        }
        guard.notification_number = transfer.notification_number;

        let Some(row) = guard.row_of(transfer.tag) else {
            tracing::debug!(
                "Ignoring temporary error for untracked transfer {}",
                transfer.tag
            );
            return false;
        };

        let QueueState {
            transfers,
            stats,
            estimators,
            ..
        } = &mut *guard;
        let Some(record) = transfers.get_mut(&transfer.tag) else {
            return false;
        };

        let previous_state = record.state;
        let remaining_time =
            estimate_remaining(estimators, self.eta_smoothing, record.state, transfer);
        record.apply_update(transfer, remaining_time, error);
        stats.state_changed(previous_state, record);

        self.emit(QueueChange::RowUpdated { row });
        true
    }

    /// Handle a finish event. The row stays until it is explicitly cleared.
    pub fn finalize(&self, transfer: &EngineTransfer, error: Option<TransferError>) -> bool {
        let mut guard = self.write_state();
        if guard.is_stale(transfer.notification_number) {
            return false;
        }
        guard.notification_number = transfer.notification_number;

        let Some(row) = guard.row_of(transfer.tag) else {
            tracing::debug!("Ignoring finish for untracked transfer {}", transfer.tag);
            return false;
        };

        let state = &mut *guard;
        let Some(record) = state.transfers.get_mut(&transfer.tag) else {
            return false;
        };

        // Engine times are in deciseconds
        let elapsed = transfer.update_time.saturating_sub(transfer.start_time).max(0);
        let now = Utc::now();
        let finished_at = now
            .checked_add_signed(chrono::Duration::milliseconds(elapsed.saturating_mul(100)))
            .unwrap_or(now);

        let previous_state = record.state;
        record.apply_finish(transfer, finished_at, error);
        state.stats.state_changed(previous_state, record);

        if record.state == TransferState::Failed {
            let mut snapshot = transfer.clone();
            snapshot.last_error = error.or(transfer.last_error);
            state.failed.insert(transfer.tag, snapshot);
        } else {
            state.failed.remove(&transfer.tag);
        }
        state.estimators.remove(&transfer.tag);

        tracing::debug!(
            "Transfer {} finished as {:?}",
            transfer.tag,
            transfer.state
        );
        self.emit(QueueChange::RowUpdated { row });
        true
    }

    fn remove_run(&self, state: &mut QueueState, row: usize, count: usize) {
        state.remove_range(row, count);
        self.emit(QueueChange::RowsRemoved {
            first: row,
            last: row + count - 1,
        });
    }

    fn emit_if_emptied(&self, state: &QueueState, had_rows: bool) {
        if had_rows && state.order.is_empty() {
            self.emit(QueueChange::TransfersPresent(false));
        }
    }

    /// Remove the given rows, one notification per contiguous run.
    ///
    /// Runs are removed from the tail so the remaining row indices stay
    /// valid. Returns the number of rows removed.
    pub fn remove(&self, rows: &[usize]) -> usize {
        let mut state = self.write_state();
        let rows = state.descending_rows(rows);
        let had_rows = !state.order.is_empty();

        let mut removed = 0;
        let mut rows = rows.into_iter().peekable();
        while let Some(high) = rows.next() {
            let mut low = high;
            while let Some(next) = low.checked_sub(1) {
                if rows.peek() != Some(&next) {
                    break;
                }
                rows.next();
                low = next;
            }

            self.remove_run(&mut state, low, high - low + 1);
            removed += high - low + 1;
        }

        self.emit_if_emptied(&state, had_rows);
        removed
    }

    /// Remove `count` contiguous rows starting at `row`
    pub fn remove_rows(&self, row: usize, count: usize) -> bool {
        let mut state = self.write_state();
        if count == 0 {
            return false;
        }
        let len = state.order.len();
        if row.checked_add(count).map_or(true, |end| end > len) {
            tracing::warn!("Ignoring removal of rows {}+{} (have {})", row, count, len);
            return false;
        }

        self.remove_run(&mut state, row, count);
        self.emit_if_emptied(&state, true);
        true
    }

    /// Ask the engine to move `count` rows starting at `source_row` before
    /// `destination`.
    ///
    /// The local order only changes once the resulting priority updates come
    /// back from the engine.
    pub fn move_rows(&self, source_row: usize, count: usize, destination: usize) -> bool {
        let mut requests = Vec::new();
        if !self
            .read_state()
            .plan_move(source_row, count, destination, &mut requests)
        {
            return false;
        }

        self.request_moves(requests);
        true
    }

    /// Drag-and-drop ingress: move each of `rows` before `destination`
    pub fn drop_rows(&self, rows: &[usize], destination: usize) -> bool {
        let mut requests = Vec::new();
        {
            let state = self.read_state();
            if destination > state.order.len() {
                return false;
            }

            let mut rows = rows.to_vec();
            if destination == 0 {
                rows.sort_unstable_by(|a, b| b.cmp(a));
            } else {
                rows.sort_unstable();
            }
            rows.dedup();

            for row in rows {
                state.plan_move(row, 1, destination, &mut requests);
            }
        }

        if requests.is_empty() {
            return false;
        }
        self.request_moves(requests);
        true
    }

    fn request_moves(&self, requests: Vec<MoveRequest>) {
        for request in requests {
            match request {
                MoveRequest::First(tag) => self.engine.move_to_first(tag),
                MoveRequest::Last(tag) => self.engine.move_to_last(tag),
                MoveRequest::Before(tag, target) => self.engine.move_before(tag, target),
            }
        }
    }

    /// Pause or resume one transfer. Silently ignored when the current
    /// state does not allow it.
    pub fn pause_or_resume_by_tag(&self, tag: TransferTag, pause: bool) -> bool {
        let applies = {
            let state = self.read_state();
            match state.transfers.get(&tag) {
                Some(record) if pause => record.state.is_pausable(),
                Some(record) => record.state == TransferState::Paused,
                None => false,
            }
        };

        if applies {
            self.engine.pause_transfer(tag, pause);
        }
        applies
    }

    /// Pause or resume a selection. Resuming anything lifts the global pause.
    pub fn pause_rows(&self, rows: &[usize], pause: bool) {
        let tags: Vec<TransferTag> = {
            let state = self.read_state();
            rows.iter()
                .filter_map(|&row| state.order.get(row).copied())
                .collect()
        };

        for tag in tags {
            self.pause_or_resume_by_tag(tag, pause);
        }

        if !pause && self.all_paused.swap(false, Ordering::SeqCst) {
            self.preference.set_global_paused(false);
            self.engine.pause_all(false);
            self.emit(QueueChange::PauseStateChanged(false));
        }
    }

    /// Pause or resume every transfer in the queue.
    ///
    /// Pausing walks the queue from the tail so the most urgent transfers
    /// keep running the longest; resuming walks it from the head.
    pub fn pause_resume_all(&self, pause: bool) {
        let was_paused = self.all_paused.swap(pause, Ordering::SeqCst);
        self.preference.set_global_paused(pause);
        if was_paused != pause {
            self.emit(QueueChange::PauseStateChanged(pause));
        }

        let order = self.read_state().order.clone();
        tracing::info!(
            "{} {} transfers",
            if pause { "Pausing" } else { "Resuming" },
            order.len()
        );

        if pause {
            self.engine.pause_all(true);
            for &tag in order.iter().rev() {
                self.pause_or_resume_by_tag(tag, true);
            }
        } else {
            for &tag in &order {
                self.pause_or_resume_by_tag(tag, false);
            }
            self.engine.pause_all(false);
        }
    }

    /// Flip the global pause state. Returns the new state.
    pub fn toggle_pause_all(&self) -> bool {
        let pause = !self.are_all_paused();
        self.pause_resume_all(pause);
        pause
    }

    /// Apply the persisted pause preference if it changed behind our back
    pub fn sync_pause_preference(&self) -> bool {
        let paused = self.preference.global_paused();
        if paused == self.are_all_paused() {
            return false;
        }
        self.pause_resume_all(paused);
        true
    }

    /// Clear finished rows and/or cancel unfinished ones in a selection.
    ///
    /// With `clear`, finished rows are removed first and cancel requests go
    /// out afterwards, so no cancel callback can shift rows mid-removal.
    pub fn cancel_and_clear(&self, rows: &[usize], cancel: bool, clear: bool) {
        let mut to_cancel = Vec::new();
        {
            let mut state = self.write_state();
            let rows = state.descending_rows(rows);

            if clear {
                let had_rows = !state.order.is_empty();
                // Pending run of finished rows: (lowest row, count)
                let mut run: Option<(usize, usize)> = None;

                for row in rows {
                    let Some((tag, record_state)) =
                        state.record_at(row).map(|record| (record.tag, record.state))
                    else {
                        continue;
                    };

                    if record_state.is_finished() {
                        run = match run {
                            Some((low, count)) if low == row + 1 => Some((row, count + 1)),
                            Some((low, count)) => {
                                self.remove_run(&mut state, low, count);
                                Some((row, 1))
                            }
                            None => Some((row, 1)),
                        };
                    } else {
                        if let Some((low, count)) = run.take() {
                            self.remove_run(&mut state, low, count);
                        }
                        if cancel && record_state.is_cancelable() {
                            to_cancel.push(tag);
                        }
                    }
                }

                if let Some((low, count)) = run {
                    self.remove_run(&mut state, low, count);
                }
                self.emit_if_emptied(&state, had_rows);
            } else if cancel {
                to_cancel.extend(
                    rows.into_iter()
                        .filter_map(|row| state.record_at(row))
                        .filter(|record| record.state.is_cancelable())
                        .map(|record| record.tag),
                );
            }
        }

        for tag in to_cancel {
            self.engine.cancel_transfer(tag);
        }
    }

    /// Cancel every upload and download known to the engine
    pub fn cancel_all(&self) {
        for direction in TransferDirection::ALL {
            self.engine.cancel_all(direction);
        }
    }

    /// Resubmit a failed transfer and drop its row.
    ///
    /// A successful retry comes back as a new start event.
    pub fn retry(&self, tag: TransferTag) -> bool {
        let snapshot = {
            let mut state = self.write_state();
            let Some(snapshot) = state.failed.remove(&tag) else {
                tracing::debug!("No failed transfer {} to retry", tag);
                return false;
            };

            if let Some(row) = state.row_of(tag) {
                self.remove_run(&mut state, row, 1);
                self.emit_if_emptied(&state, true);
            }
            snapshot
        };

        tracing::info!("Retrying transfer {}", tag);
        self.engine.retry_transfer(snapshot);
        true
    }

    /// Public links for the selected rows, or the node handles that still
    /// need exporting
    pub fn links(&self, rows: &[usize]) -> TransferLinks {
        let state = self.read_state();
        let mut links = TransferLinks::default();

        for &row in rows {
            let Some(record) = state.record_at(row) else {
                continue;
            };

            let node = if record.state == TransferState::Failed {
                state
                    .failed
                    .get(&record.tag)
                    .and_then(|transfer| transfer.public_node.as_ref())
            } else {
                record.public_node.as_ref()
            };

            match node.and_then(|node| node.link(&self.link_base_url)) {
                Some(link) => links.links.push(link),
                None => links.export_handles.push(record.node_handle),
            }
        }

        links
    }

    /// Insert one chunk of the startup snapshot under a single write lock.
    ///
    /// Contiguous insertions are reported as one range.
    pub(crate) fn populate_chunk(&self, chunk: &[EngineTransfer], notification_number: u64) -> usize {
        let mut state = self.write_state();
        if notification_number > state.notification_number {
            state.notification_number = notification_number;
        }

        let was_empty = state.order.is_empty();
        let mut pending: Option<(usize, usize)> = None;
        let mut inserted = 0;

        for transfer in chunk {
            let row = population_row(
                &state.order,
                &state.transfers,
                transfer.transfer_type(),
                transfer.priority,
            );

            if let Some((first, last)) = pending {
                if row != last + 1 {
                    self.emit(QueueChange::RowsInserted { first, last });
                    pending = None;
                }
            }

            if !state.insert(transfer, row, self.eta_smoothing) {
                continue;
            }
            inserted += 1;
            pending = match pending {
                Some((first, _)) => Some((first, row)),
                None => Some((row, row)),
            };
        }

        if let Some((first, last)) = pending {
            self.emit(QueueChange::RowsInserted { first, last });
        }
        if was_empty && !state.order.is_empty() {
            self.emit(QueueChange::TransfersPresent(true));
        }
        inserted
    }
}

/// Insertion row for snapshot loading. Snapshots are grouped by type and
/// sorted by priority, so the answer is normally right after the last row
/// of the same type.
fn population_row(
    order: &[TransferTag],
    transfers: &HashMap<TransferTag, TransferRecord>,
    transfer_type: TransferType,
    priority: u64,
) -> usize {
    let last_same_type = order.iter().rposition(|tag| {
        transfers
            .get(tag)
            .is_some_and(|record| record.transfer_type == transfer_type)
    });

    match last_same_type {
        None => order.len(),
        Some(row)
            if transfers
                .get(&order[row])
                .is_some_and(|record| record.priority <= priority) =>
        {
            row + 1
        }
        Some(_) => find_insertion_row(order, transfers, transfer_type, priority),
    }
}

fn estimate_remaining(
    estimators: &mut HashMap<TransferTag, RemainingTimeEstimator>,
    smoothing: f64,
    current: TransferState,
    transfer: &EngineTransfer,
) -> Option<Duration> {
    if current.is_finished() {
        return None;
    }

    let remaining = transfer.total_bytes.saturating_sub(transfer.transferred_bytes);
    estimators
        .entry(transfer.tag)
        .or_insert_with(|| RemainingTimeEstimator::new(transfer.speed, smoothing))
        .estimate(transfer.speed, remaining)
}
