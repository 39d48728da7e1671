// SPDX-License-Identifier: AGPL-3.0
// Gosh Transfer Queue - Type definitions

use serde::{Deserialize, Serialize};

/// Engine-assigned transfer identity
pub type TransferTag = i32;

/// Opaque handle of a remote node
pub type NodeHandle = u64;

/// Handle value used when a transfer has no associated node
pub const INVALID_HANDLE: NodeHandle = u64::MAX;

/// Direction of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransferDirection {
    Upload,
    Download,
}

impl TransferDirection {
    pub const ALL: [TransferDirection; 2] = [TransferDirection::Upload, TransferDirection::Download];

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Upload => 0,
            Self::Download => 1,
        }
    }
}

/// Transfer type: the direction plus the orthogonal sync flag.
///
/// Priority ordering is partitioned by the full type, so a sync download
/// and a regular download are ordered independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferType {
    pub direction: TransferDirection,
    pub sync: bool,
}

impl TransferType {
    pub fn upload() -> Self {
        Self {
            direction: TransferDirection::Upload,
            sync: false,
        }
    }

    pub fn download() -> Self {
        Self {
            direction: TransferDirection::Download,
            sync: false,
        }
    }

    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }
}

/// Lifecycle state of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransferState {
    Queued,
    Active,
    Paused,
    Retrying,
    Completing,
    Completed,
    Cancelled,
    Failed,
}

/// Membership of one state in the pausable / cancelable / finished groups
#[derive(Debug, Clone, Copy)]
struct StateTraits {
    pausable: bool,
    cancelable: bool,
    finished: bool,
}

// Indexed by `TransferState::index`.
const STATE_TRAITS: [StateTraits; TransferState::COUNT] = [
    // Queued
    StateTraits { pausable: true, cancelable: true, finished: false },
    // Active
    StateTraits { pausable: true, cancelable: true, finished: false },
    // Paused
    StateTraits { pausable: false, cancelable: true, finished: false },
    // Retrying
    StateTraits { pausable: true, cancelable: true, finished: false },
    // Completing
    StateTraits { pausable: false, cancelable: false, finished: false },
    // Completed
    StateTraits { pausable: false, cancelable: false, finished: true },
    // Cancelled
    StateTraits { pausable: false, cancelable: false, finished: true },
    // Failed
    StateTraits { pausable: false, cancelable: false, finished: true },
];

impl TransferState {
    pub const COUNT: usize = 8;

    pub const ALL: [TransferState; Self::COUNT] = [
        Self::Queued,
        Self::Active,
        Self::Paused,
        Self::Retrying,
        Self::Completing,
        Self::Completed,
        Self::Cancelled,
        Self::Failed,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Queued => 0,
            Self::Active => 1,
            Self::Paused => 2,
            Self::Retrying => 3,
            Self::Completing => 4,
            Self::Completed => 5,
            Self::Cancelled => 6,
            Self::Failed => 7,
        }
    }

    fn traits(self) -> StateTraits {
        STATE_TRAITS[self.index()]
    }

    /// Queued, Active or Retrying
    pub fn is_pausable(self) -> bool {
        self.traits().pausable
    }

    /// Queued, Active, Paused or Retrying
    pub fn is_cancelable(self) -> bool {
        self.traits().cancelable
    }

    /// Completed, Cancelled or Failed
    pub fn is_finished(self) -> bool {
        self.traits().finished
    }

    /// Whether a progress or temporary-error event may move a record from
    /// `self` to `next`. Terminal states are only entered on finish and
    /// never left.
    pub fn accepts_update_to(self, next: TransferState) -> bool {
        !self.is_finished() && !next.is_finished()
    }
}

/// Coarse file classification derived from the file name extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileCategory {
    Text,
    Audio,
    Video,
    Archive,
    Document,
    Image,
    Other,
}

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "rtf", "log", "csv", "json", "xml", "yaml", "yml", "ini", "conf", "c", "cpp",
    "h", "hpp", "rs", "py", "js", "ts", "java", "go", "sh", "html", "htm", "css",
];
const AUDIO_EXTENSIONS: &[&str] = &[
    "wav", "mp3", "flac", "ogg", "oga", "aac", "m4a", "wma", "aiff", "aif", "opus", "mid",
    "midi",
];
const VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "mov", "wmv", "flv", "webm", "m4v", "mpg", "mpeg", "3gp", "vob",
];
const ARCHIVE_EXTENSIONS: &[&str] = &[
    "tar", "zip", "gz", "tgz", "bz2", "xz", "7z", "rar", "zst", "iso", "dmg", "deb", "rpm",
];
const DOCUMENT_EXTENSIONS: &[&str] = &[
    "odt", "ods", "odp", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "pdf", "pages",
    "numbers", "key", "epub",
];
const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "tif", "tiff", "svg", "webp", "heic", "ico", "raw",
    "psd",
];

impl FileCategory {
    pub const COUNT: usize = 7;

    pub const ALL: [FileCategory; Self::COUNT] = [
        Self::Text,
        Self::Audio,
        Self::Video,
        Self::Archive,
        Self::Document,
        Self::Image,
        Self::Other,
    ];

    /// Determine category from a file name
    pub fn from_file_name(name: &str) -> Self {
        let extension = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_ascii_lowercase(),
            _ => return Self::Other,
        };
        let ext = extension.as_str();

        if TEXT_EXTENSIONS.contains(&ext) {
            Self::Text
        } else if AUDIO_EXTENSIONS.contains(&ext) {
            Self::Audio
        } else if VIDEO_EXTENSIONS.contains(&ext) {
            Self::Video
        } else if ARCHIVE_EXTENSIONS.contains(&ext) {
            Self::Archive
        } else if DOCUMENT_EXTENSIONS.contains(&ext) {
            Self::Document
        } else if IMAGE_EXTENSIONS.contains(&ext) {
            Self::Image
        } else {
            Self::Other
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Text => 0,
            Self::Audio => 1,
            Self::Video => 2,
            Self::Archive => 3,
            Self::Document => 4,
            Self::Image => 5,
            Self::Other => 6,
        }
    }
}

/// Error types for the queue crate
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("File I/O error: {0}")]
    FileIo(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Engine channel closed")]
    EngineUnavailable,
}

impl From<std::io::Error> for QueueError {
    fn from(err: std::io::Error) -> Self {
        QueueError::FileIo(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_groups() {
        let pausable: Vec<_> = TransferState::ALL
            .into_iter()
            .filter(|s| s.is_pausable())
            .collect();
        assert_eq!(
            pausable,
            vec![TransferState::Queued, TransferState::Active, TransferState::Retrying]
        );

        let cancelable: Vec<_> = TransferState::ALL
            .into_iter()
            .filter(|s| s.is_cancelable())
            .collect();
        assert_eq!(
            cancelable,
            vec![
                TransferState::Queued,
                TransferState::Active,
                TransferState::Paused,
                TransferState::Retrying
            ]
        );

        let finished: Vec<_> = TransferState::ALL
            .into_iter()
            .filter(|s| s.is_finished())
            .collect();
        assert_eq!(
            finished,
            vec![TransferState::Completed, TransferState::Cancelled, TransferState::Failed]
        );
    }

    #[test]
    fn test_state_index_matches_table_order() {
        for (i, state) in TransferState::ALL.into_iter().enumerate() {
            assert_eq!(state.index(), i);
        }
    }

    #[test]
    fn test_update_transitions() {
        assert!(TransferState::Queued.accepts_update_to(TransferState::Active));
        assert!(TransferState::Active.accepts_update_to(TransferState::Completing));
        assert!(!TransferState::Active.accepts_update_to(TransferState::Completed));
        assert!(!TransferState::Failed.accepts_update_to(TransferState::Queued));
    }

    #[test]
    fn test_file_category_from_name() {
        assert_eq!(FileCategory::from_file_name("notes.TXT"), FileCategory::Text);
        assert_eq!(FileCategory::from_file_name("song.wav"), FileCategory::Audio);
        assert_eq!(FileCategory::from_file_name("movie.mkv"), FileCategory::Video);
        assert_eq!(FileCategory::from_file_name("backup.tar"), FileCategory::Archive);
        assert_eq!(FileCategory::from_file_name("report.odt"), FileCategory::Document);
        assert_eq!(FileCategory::from_file_name("photo.png"), FileCategory::Image);
        assert_eq!(FileCategory::from_file_name("firmware.bin"), FileCategory::Other);
        assert_eq!(FileCategory::from_file_name("Makefile"), FileCategory::Other);
        assert_eq!(FileCategory::from_file_name(".bashrc"), FileCategory::Other);
    }
}
