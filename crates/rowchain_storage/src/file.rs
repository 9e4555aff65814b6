//! File-based storage backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Write buffer capacity used when none is requested.
pub const DEFAULT_BUFFER_SIZE: usize = 900_000;

#[derive(Debug)]
enum Handle {
    Read(File),
    Write(BufWriter<File>),
}

/// A file-based storage backend.
///
/// Chain members are opened with [`FileBackend::open`], which never
/// modifies the file. Writers use [`FileBackend::create`], which
/// truncates (or creates) the file and buffers appends in memory up to
/// the requested capacity.
///
/// # Example
///
/// ```no_run
/// use rowchain_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::create(Path::new("hits.rch"), 64 * 1024).unwrap();
/// backend.append(b"payload").unwrap();
/// backend.sync().unwrap();
///
/// let reader = FileBackend::open(Path::new("hits.rch")).unwrap();
/// assert!(!reader.is_writable());
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    handle: RwLock<Handle>,
    size: RwLock<u64>,
}

impl FileBackend {
    /// Opens an existing file for reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be opened.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            handle: RwLock::new(Handle::Read(file)),
            size: RwLock::new(size),
        })
    }

    /// Creates the file, truncating any previous content.
    ///
    /// `buffer_size` is the capacity of the in-memory write buffer; a
    /// zero capacity writes straight through.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create(path: &Path, buffer_size: usize) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            handle: RwLock::new(Handle::Write(BufWriter::with_capacity(buffer_size, file))),
            size: RwLock::new(0),
        })
    }

    /// Creates the file like [`FileBackend::create`], creating parent
    /// directories first.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the file
    /// cannot be created.
    pub fn create_with_dirs(path: &Path, buffer_size: usize) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::create(path, buffer_size)
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let size = *self.size.read();
        let end = offset.saturating_add(len as u64);

        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        if len == 0 {
            return Ok(Vec::new());
        }

        let mut buffer = vec![0u8; len];
        let mut handle = self.handle.write();
        match &mut *handle {
            Handle::Read(file) => {
                file.seek(SeekFrom::Start(offset))?;
                file.read_exact(&mut buffer)?;
            }
            Handle::Write(writer) => {
                writer.flush()?;
                let file = writer.get_mut();
                file.seek(SeekFrom::Start(offset))?;
                file.read_exact(&mut buffer)?;
                // appends rely on the cursor sitting at the end
                file.seek(SeekFrom::End(0))?;
            }
        }

        Ok(buffer)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let mut handle = self.handle.write();
        let Handle::Write(writer) = &mut *handle else {
            return Err(StorageError::ReadOnly);
        };

        let mut size = self.size.write();
        let offset = *size;
        if data.is_empty() {
            return Ok(offset);
        }

        writer.write_all(data)?;
        *size += data.len() as u64;

        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        if let Handle::Write(writer) = &mut *self.handle.write() {
            writer.flush()?;
        }
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(*self.size.read())
    }

    fn sync(&mut self) -> StorageResult<()> {
        if let Handle::Write(writer) = &mut *self.handle.write() {
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut handle = self.handle.write();
        let Handle::Write(writer) = &mut *handle else {
            return Err(StorageError::ReadOnly);
        };

        let mut size = self.size.write();
        if new_size > *size {
            return Err(StorageError::TruncatePastEnd {
                requested: new_size,
                size: *size,
            });
        }

        writer.flush()?;
        writer.get_ref().set_len(new_size)?;
        writer.get_mut().seek(SeekFrom::Start(new_size))?;
        *size = new_size;

        Ok(())
    }

    fn is_writable(&self) -> bool {
        matches!(*self.handle.read(), Handle::Write(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_truncates_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.rch");
        std::fs::write(&path, b"stale content").unwrap();

        let backend = FileBackend::create(&path, 16).unwrap();
        assert_eq!(backend.size().unwrap(), 0);
        assert!(backend.is_writable());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn buffered_appends_are_readable_before_flush() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.rch");

        let mut backend = FileBackend::create(&path, 1024).unwrap();
        assert_eq!(backend.append(b"hello").unwrap(), 0);
        assert_eq!(backend.append(b" world").unwrap(), 5);

        assert_eq!(backend.size().unwrap(), 11);
        assert_eq!(backend.read_at(6, 5).unwrap(), b"world");
    }

    #[test]
    fn small_appends_stay_in_the_buffer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.rch");

        let mut backend = FileBackend::create(&path, 1 << 20).unwrap();
        backend.append(b"hello").unwrap();
        backend.append(b"world").unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);

        backend.flush().unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 10);
    }

    #[test]
    fn appends_after_read_land_at_the_end() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.rch");

        let mut backend = FileBackend::create(&path, 1024).unwrap();
        backend.append(b"abcdef").unwrap();
        assert_eq!(backend.read_at(1, 2).unwrap(), b"bc");
        assert_eq!(backend.append(b"gh").unwrap(), 6);

        backend.sync().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"abcdefgh");
    }

    #[test]
    fn open_is_read_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("in.rch");
        std::fs::write(&path, b"abc").unwrap();

        let mut backend = FileBackend::open(&path).unwrap();
        assert!(!backend.is_writable());
        assert_eq!(backend.size().unwrap(), 3);
        assert!(matches!(backend.append(b"x"), Err(StorageError::ReadOnly)));
        assert!(matches!(backend.truncate(1), Err(StorageError::ReadOnly)));
        // flush and sync are no-ops on a read handle
        assert!(backend.flush().is_ok());
        assert!(backend.sync().is_ok());
    }

    #[test]
    fn open_missing_file_fails() {
        let dir = tempdir().unwrap();
        let result = FileBackend::open(&dir.path().join("absent.rch"));
        assert!(matches!(result, Err(StorageError::Io(_))));
    }

    #[test]
    fn read_past_end_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.rch");

        let mut backend = FileBackend::create(&path, 0).unwrap();
        backend.append(b"hello").unwrap();

        let result = backend.read_at(3, 5);
        assert!(matches!(result, Err(StorageError::ReadPastEnd { .. })));
    }

    #[test]
    fn synced_data_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.rch");

        {
            let mut backend = FileBackend::create(&path, 4096).unwrap();
            backend.append(b"persistent data").unwrap();
            backend.sync().unwrap();
        }

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 15);
        assert_eq!(backend.read_at(0, 15).unwrap(), b"persistent data");
    }

    #[test]
    fn truncate_drops_tail() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.rch");

        let mut backend = FileBackend::create(&path, 64).unwrap();
        backend.append(b"hello world").unwrap();
        backend.truncate(5).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 5);

        assert_eq!(backend.size().unwrap(), 5);
        assert_eq!(backend.read_at(0, 5).unwrap(), b"hello");
        assert!(matches!(
            backend.truncate(50),
            Err(StorageError::TruncatePastEnd { requested: 50, size: 5 })
        ));

        backend.append(b"!").unwrap();
        assert_eq!(backend.read_at(0, 6).unwrap(), b"hello!");
        backend.sync().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"hello!");
    }

    #[test]
    fn create_with_dirs_builds_parents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run").join("day1").join("out.rch");

        let backend = FileBackend::create_with_dirs(&path, 0).unwrap();
        assert_eq!(backend.path(), path);
        assert!(path.exists());
    }
}
