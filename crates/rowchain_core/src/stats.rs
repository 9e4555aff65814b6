//! Reader and writer counters.
//!
//! Readers and writers are single-owner values, so the counters are plain
//! integers updated in place; `stats()` hands out a copy.
//!
//! ```rust,ignore
//! let hit = reader.get(3)?;
//! let hit = reader.get(3)?;
//! assert_eq!(reader.stats().cache_hits, 1);
//! ```

/// Counters kept by a [`ChainReader`](crate::ChainReader).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    /// Records deserialized into the entry buffer.
    pub entries_decoded: u64,
    /// Indexed accesses answered from the entry buffer.
    pub cache_hits: u64,
    /// Chain member files opened for record access.
    pub files_loaded: u64,
    /// Bytes of record payload read from storage.
    pub bytes_read: u64,
}

impl ReaderStats {
    pub(crate) fn record_decode(&mut self, bytes: usize) {
        self.entries_decoded += 1;
        self.bytes_read += bytes as u64;
    }

    pub(crate) fn record_cache_hit(&mut self) {
        self.cache_hits += 1;
    }

    pub(crate) fn record_file_load(&mut self) {
        self.files_loaded += 1;
    }
}

/// Counters kept by a [`RecordWriter`](crate::RecordWriter).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Records appended.
    pub records_written: u64,
    /// Auxiliary objects written.
    pub objects_written: u64,
    /// Encoded record and object bytes handed to the engine.
    pub bytes_written: u64,
    /// Files finalized, rollovers included.
    pub files_finished: u64,
}

impl WriterStats {
    pub(crate) fn record_entry(&mut self, bytes: usize) {
        self.records_written += 1;
        self.bytes_written += bytes as u64;
    }

    pub(crate) fn record_object(&mut self, bytes: usize) {
        self.objects_written += 1;
        self.bytes_written += bytes as u64;
    }

    pub(crate) fn record_file_finished(&mut self) {
        self.files_finished += 1;
    }
}
