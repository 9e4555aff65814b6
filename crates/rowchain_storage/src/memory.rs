//! In-memory storage backend for tests.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;

/// An in-memory storage backend.
///
/// Holds a whole container image in a `Vec<u8>`. Tests use it to build a
/// file, take its bytes with [`InMemoryBackend::data`], damage them, and
/// reopen the result with [`InMemoryBackend::with_data`].
///
/// # Example
///
/// ```rust
/// use rowchain_storage::{StorageBackend, InMemoryBackend};
///
/// let mut backend = InMemoryBackend::new();
/// let offset = backend.append(b"test data").unwrap();
/// assert_eq!(offset, 0);
/// assert_eq!(backend.size().unwrap(), 9);
/// ```
#[derive(Debug)]
pub struct InMemoryBackend {
    data: RwLock<Vec<u8>>,
    writable: bool,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    /// Creates a new empty, writable backend.
    #[must_use]
    pub fn new() -> Self {
        Self::with_data(Vec::new())
    }

    /// Creates a writable backend with pre-existing data.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
            writable: true,
        }
    }

    /// Creates a read-only backend over `data`.
    #[must_use]
    pub fn read_only(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
            writable: false,
        }
    }

    /// Returns a copy of all data in the backend.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let end = offset.saturating_add(len as u64);

        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        Ok(data[offset as usize..end as usize].to_vec())
    }

    fn append(&mut self, new_data: &[u8]) -> StorageResult<u64> {
        if !self.writable {
            return Err(StorageError::ReadOnly);
        }
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(new_data);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        if !self.writable {
            return Err(StorageError::ReadOnly);
        }
        let mut data = self.data.write();
        let size = data.len() as u64;

        if new_size > size {
            return Err(StorageError::TruncatePastEnd {
                requested: new_size,
                size,
            });
        }

        data.truncate(new_size as usize);
        Ok(())
    }

    fn is_writable(&self) -> bool {
        self.writable
    }
}
