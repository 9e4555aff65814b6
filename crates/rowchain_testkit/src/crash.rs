//! Interrupted-write testing for container files.
//!
//! Simulates a writer that dies after a given number of bytes reached
//! storage and checks what a reader makes of the remains.
//!
//! ## Test Strategy
//!
//! 1. **Crash inside the header** - the file must not open
//! 2. **Crash inside a record frame** - complete records survive
//! 3. **Crash before the directory** - the file opens as recovered
//! 4. **Crash inside the trailer** - the file opens as recovered
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rowchain_testkit::crash::CrashHarness;
//!
//! let harness = CrashHarness::new(sample_hits(0..10));
//! let outcome = harness.crash_after(200);
//! assert!(outcome.recovered_entries <= 10);
//! ```

use crate::fixtures::Hit;
use parking_lot::RwLock;
use rowchain_codec::{from_cbor, to_cbor};
use rowchain_core::file::{ContainerFile, ContainerWriter, FileHeader};
use rowchain_core::{CoreResult, Named, Record};
use rowchain_storage::{InMemoryBackend, StorageBackend, StorageError, StorageResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A storage backend that stops accepting bytes after a threshold.
///
/// The append that crosses the threshold writes its leading part and
/// fails, like a process killed mid-write. Clones share the same bytes,
/// so a test can keep one to inspect what the writer left behind.
#[derive(Debug, Clone)]
pub struct CrashableBackend {
    inner: Arc<RwLock<InMemoryBackend>>,
    crash_after_bytes: u64,
    crashed: Arc<AtomicBool>,
}

impl CrashableBackend {
    /// Creates a backend that crashes once `bytes` bytes were written.
    pub fn new(bytes: u64) -> Self {
        Self {
            inner: Arc::new(RwLock::new(InMemoryBackend::new())),
            crash_after_bytes: bytes,
            crashed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns whether the crash happened.
    pub fn has_crashed(&self) -> bool {
        self.crashed.load(Ordering::SeqCst)
    }

    /// Returns the bytes that reached storage.
    pub fn data(&self) -> Vec<u8> {
        self.inner.read().data()
    }

    fn crash(&self, message: &str) -> StorageError {
        self.crashed.store(true, Ordering::SeqCst);
        StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, message.to_string()))
    }
}

impl StorageBackend for CrashableBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read().read_at(offset, len)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let mut inner = self.inner.write();
        let current = inner.size()?;

        if self.has_crashed() || current >= self.crash_after_bytes {
            return Err(self.crash("simulated crash during write"));
        }
        if current + data.len() as u64 > self.crash_after_bytes {
            let partial = usize::try_from(self.crash_after_bytes - current).unwrap_or(data.len());
            inner.append(&data[..partial])?;
            return Err(self.crash("simulated crash during partial write"));
        }
        inner.append(data)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.inner.write().flush()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.read().size()
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.inner.write().sync()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.inner.write().truncate(new_size)
    }

    fn is_writable(&self) -> bool {
        !self.has_crashed()
    }
}

/// What a reader found in the remains of an interrupted write.
#[derive(Debug, Clone, PartialEq)]
pub struct CrashOutcome {
    /// Bytes that reached storage.
    pub bytes_on_disk: u64,
    /// Whether the remains open at all.
    pub opens: bool,
    /// Whether the file opened as recovered.
    pub recovered: bool,
    /// Records readable from the container.
    pub recovered_entries: u64,
    /// Whether every readable record equals the one written at its index.
    pub prefix_intact: bool,
}

/// Writes a fixed set of hits through a [`CrashableBackend`] and inspects
/// the result.
#[derive(Debug, Clone)]
pub struct CrashHarness {
    hits: Vec<Hit>,
}

impl CrashHarness {
    /// Creates a harness writing `hits`.
    pub fn new(hits: Vec<Hit>) -> Self {
        Self { hits }
    }

    /// Returns the size of the file when the write completes.
    pub fn full_size(&self) -> u64 {
        self.crash_after(u64::MAX).bytes_on_disk
    }

    /// Writes the hits, crashing once `bytes` bytes were written.
    pub fn crash_after(&self, bytes: u64) -> CrashOutcome {
        let data = write_until_crash(&self.hits, bytes);
        self.inspect(data)
    }

    fn inspect(&self, data: Vec<u8>) -> CrashOutcome {
        let bytes_on_disk = data.len() as u64;
        let Ok(file) = ContainerFile::open(InMemoryBackend::read_only(data)) else {
            return CrashOutcome {
                bytes_on_disk,
                opens: false,
                recovered: false,
                recovered_entries: 0,
                prefix_intact: true,
            };
        };

        let container = Hit::container_name();
        let slot = file.container_slot(&container);
        let entries = file.container(&container).map_or(0, |c| c.len());

        let prefix_intact = slot.map_or(true, |slot| {
            (0..entries).all(|index| {
                let stored = file
                    .read_record(slot, index)
                    .ok()
                    .flatten()
                    .and_then(|bytes| from_cbor::<Hit>(&bytes).ok());
                let written = usize::try_from(index).ok().and_then(|i| self.hits.get(i));
                stored.as_ref() == written
            })
        });

        CrashOutcome {
            bytes_on_disk,
            opens: true,
            recovered: file.is_recovered(),
            recovered_entries: entries,
            prefix_intact,
        }
    }
}

fn write_until_crash(hits: &[Hit], bytes: u64) -> Vec<u8> {
    let backend = CrashableBackend::new(bytes);
    let written: CoreResult<()> = (|| {
        let mut writer = ContainerWriter::create(backend.clone(), FileHeader::new(1, 4096))?;
        let slot =
            writer.declare_container(&Hit::container_name(), &Hit::field_name(), Hit::NAME)?;
        for hit in hits {
            writer.container(slot)?.append(&to_cbor(hit)?)?;
        }
        writer.finish()?;
        Ok(())
    })();

    if let Err(e) = written {
        assert!(backend.has_crashed(), "write failed without a crash: {e}");
    }
    backend.data()
}
