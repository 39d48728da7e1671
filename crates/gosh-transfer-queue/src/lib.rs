// SPDX-License-Identifier: AGPL-3.0
// Gosh Transfer Queue - Transfer queue model for all frontends
//
// This crate provides:
// - TransferRegistry, the ordered and concurrently readable transfer list
// - EventAdapter for feeding engine events and the startup snapshot into it
// - TransferStatistics kept in step with every mutation
// - SettingsStore for persistent queue preferences
//
// Rendering and the transfer engine itself live in other crates.

pub mod adapter;
pub mod engine;
pub mod eta;
pub mod record;
pub mod registry;
pub mod settings;
pub mod stats;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used items
pub use adapter::EventAdapter;
pub use engine::{
    ChannelEngine, EngineCommand, EngineEvent, EngineSnapshot, EngineTransfer, TransferEngine,
};
pub use eta::RemainingTimeEstimator;
pub use record::{PublicNode, TransferError, TransferRecord};
pub use registry::{QueueChange, TransferLinks, TransferRegistry};
pub use settings::{PausePreference, QueueSettings, SettingsStore};
pub use stats::TransferStatistics;
pub use types::{
    FileCategory, NodeHandle, QueueError, TransferDirection, TransferState, TransferTag,
    TransferType, INVALID_HANDLE,
};
