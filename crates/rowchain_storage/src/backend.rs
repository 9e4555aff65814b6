//! Storage backend trait definition.

use crate::error::StorageResult;

/// A positional byte store holding one physical container file.
///
/// Backends are **opaque**. The container engine decides what the bytes
/// mean; a backend only guarantees that what was appended can be read
/// back at the returned offset.
///
/// # Invariants
///
/// - `append` returns the offset where data was written
/// - `read_at` observes every byte appended so far, flushed or not
/// - `flush` pushes buffered writes to the OS, `sync` makes them durable
/// - a backend that is not writable rejects `append` and `truncate`
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the range extends past the current size or an
    /// I/O error occurs.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends data to the end of the storage and returns its offset.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ReadOnly`](crate::StorageError::ReadOnly)
    /// for read-only backends, or an I/O error.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Flushes buffered writes to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Returns the current size in bytes, buffered writes included.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Flushes and syncs data and metadata to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Truncates the storage to `new_size` bytes.
    ///
    /// The container writer never shrinks a file; this exists so that
    /// interrupted writes can be reproduced against a finished image.
    ///
    /// # Errors
    ///
    /// Returns an error if `new_size` is larger than the current size,
    /// the backend is read-only, or the truncation fails.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;

    /// Returns whether the backend accepts appends.
    fn is_writable(&self) -> bool;
}
