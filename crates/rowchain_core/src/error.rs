//! Error types for rowchain core.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by the container engine, the chained reader and the
/// record writer.
///
/// Validity filtering during chain construction never produces one of
/// these; rejected files are skipped and logged instead.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] rowchain_storage::StorageError),

    /// Record or object (de)serialization error.
    #[error("codec error: {0}")]
    Codec(#[from] rowchain_codec::CodecError),

    /// The reader or writer has no open handle.
    #[error("{component}: not open")]
    NotOpen {
        /// Which component was used while closed.
        component: &'static str,
    },

    /// No candidate file was admitted to the chain.
    #[error("no valid files in chain for container '{container}'")]
    NoValidFiles {
        /// Container the chain was built for.
        container: String,
    },

    /// The requested entry does not exist in the chain.
    #[error("entry {index} not found in file chain of {size} entries")]
    EntryOutOfRange {
        /// The requested index.
        index: u64,
        /// Total entries in the chain.
        size: u64,
    },

    /// No chain file holds an auxiliary object with this name and type.
    #[error("no object '{name}' of type '{class}' found in file chain")]
    AuxObjectNotFound {
        /// Requested object name.
        name: String,
        /// Requested object type name.
        class: &'static str,
    },

    /// A physical file could not be created or opened, or is corrupt.
    #[error("open failed for '{}': {reason}", path.display())]
    OpenFailed {
        /// The file involved.
        path: PathBuf,
        /// Why the open failed.
        reason: String,
    },

    /// The logical container or its field binding could not be set up.
    #[error("field binding failed: {message}")]
    FieldBindingFailed {
        /// Description of the mismatch.
        message: String,
    },

    /// Two cursors from different readers were combined.
    #[error("mixing cursors of different chain readers")]
    CrossReaderIteratorMisuse,

    /// The container file structure is damaged.
    #[error("container corruption: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// A frame's stored checksum does not match its content.
    #[error("checksum mismatch at offset {offset}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Offset of the damaged frame.
        offset: u64,
        /// Stored checksum.
        expected: u32,
        /// Computed checksum.
        actual: u32,
    },
}

impl CoreError {
    /// Creates a not-open error.
    pub fn not_open(component: &'static str) -> Self {
        Self::NotOpen { component }
    }

    /// Creates a no-valid-files error.
    pub fn no_valid_files(container: impl Into<String>) -> Self {
        Self::NoValidFiles {
            container: container.into(),
        }
    }

    /// Creates an open-failed error.
    pub fn open_failed(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::OpenFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a field binding error.
    pub fn field_binding(message: impl Into<String>) -> Self {
        Self::FieldBindingFailed {
            message: message.into(),
        }
    }

    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }
}
