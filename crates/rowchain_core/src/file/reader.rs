//! Read side of a container file.

use crate::error::{CoreError, CoreResult};
use crate::file::directory::{ContainerDecl, ContainerEntry, Directory, ObjectEntry, ObjectPayload};
use crate::file::frame::{
    read_frame, read_trailer, FileHeader, Frame, FrameKind, HEADER_SIZE, TRAILER_SIZE,
};
use rowchain_codec::from_cbor;
use rowchain_storage::StorageBackend;
use tracing::debug;

/// An open container file.
///
/// A file whose trailer is intact is opened through its directory. A
/// file without trailer is rebuilt by scanning frames from the header
/// forward and is flagged as recovered. A file with a broken header, or
/// whose trailer points at a damaged directory, does not open at all.
#[derive(Debug)]
pub struct ContainerFile<B: StorageBackend> {
    backend: B,
    header: FileHeader,
    directory: Directory,
    recovered: bool,
}

impl<B: StorageBackend> ContainerFile<B> {
    /// Opens a container file.
    ///
    /// # Errors
    ///
    /// Returns a corruption error if the header is invalid or the
    /// directory referenced by the trailer is damaged, or a storage error.
    pub fn open(backend: B) -> CoreResult<Self> {
        let size = backend.size()?;
        if size < HEADER_SIZE as u64 {
            return Err(CoreError::corrupted("file shorter than header"));
        }
        let header = FileHeader::decode(&backend.read_at(0, HEADER_SIZE)?)?;

        let (directory, recovered) = match read_trailer(&backend, size)? {
            Some(directory_offset) => (load_directory(&backend, directory_offset, size)?, false),
            None => (scan(&backend, size), true),
        };

        Ok(Self {
            backend,
            header,
            directory,
            recovered,
        })
    }

    /// Returns the file header.
    #[must_use]
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Returns whether the directory had to be rebuilt by scanning.
    #[must_use]
    pub fn is_recovered(&self) -> bool {
        self.recovered
    }

    /// Returns the directory.
    #[must_use]
    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Returns the position of the container called `name`.
    #[must_use]
    pub fn container_slot(&self, name: &str) -> Option<usize> {
        self.directory.container_slot(name)
    }

    /// Returns the container called `name`.
    #[must_use]
    pub fn container(&self, name: &str) -> Option<&ContainerEntry> {
        self.directory.container(name)
    }

    /// Reads the encoded record `index` of the container in `slot`.
    ///
    /// Returns `Ok(None)` if the container has no such entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the record frame is missing, damaged or
    /// belongs to a different container.
    pub fn read_record(&self, slot: usize, index: u64) -> CoreResult<Option<Vec<u8>>> {
        let Some(entry) = self.directory.containers.get(slot) else {
            return Ok(None);
        };
        let Some(&offset) = usize::try_from(index).ok().and_then(|i| entry.offsets.get(i)) else {
            return Ok(None);
        };

        let frame = self.frame_at(offset, FrameKind::Record)?;
        if frame.payload.len() < 4 {
            return Err(CoreError::corrupted(format!(
                "record frame at offset {offset} too short"
            )));
        }
        let owner = u32::from_le_bytes([
            frame.payload[0],
            frame.payload[1],
            frame.payload[2],
            frame.payload[3],
        ]);
        if owner as usize != slot {
            return Err(CoreError::corrupted(format!(
                "record at offset {offset} belongs to slot {owner}, expected {slot}"
            )));
        }

        let mut payload = frame.payload;
        payload.drain(..4);
        Ok(Some(payload))
    }

    /// Returns whether an object with this name and type exists.
    #[must_use]
    pub fn has_object(&self, name: &str, class: &str) -> bool {
        self.directory.object(name, class).is_some()
    }

    /// Reads the encoded object with this name and type, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the object frame is damaged.
    pub fn read_object(&self, name: &str, class: &str) -> CoreResult<Option<Vec<u8>>> {
        let Some(entry) = self.directory.object(name, class) else {
            return Ok(None);
        };

        let frame = self.frame_at(entry.offset, FrameKind::Object)?;
        let payload = ObjectPayload::decode(&frame.payload)?;
        if payload.name != name || payload.class != class {
            return Err(CoreError::corrupted(format!(
                "object frame at offset {} does not match directory",
                entry.offset
            )));
        }
        Ok(Some(payload.data))
    }

    fn frame_at(&self, offset: u64, kind: FrameKind) -> CoreResult<Frame> {
        let size = self.backend.size()?;
        let frame = read_frame(&self.backend, offset, size)?.ok_or_else(|| {
            CoreError::corrupted(format!("truncated frame at offset {offset}"))
        })?;
        if frame.kind != kind {
            return Err(CoreError::corrupted(format!(
                "expected {kind:?} frame at offset {offset}, found {:?}",
                frame.kind
            )));
        }
        Ok(frame)
    }
}

fn load_directory<B: StorageBackend>(
    backend: &B,
    directory_offset: u64,
    size: u64,
) -> CoreResult<Directory> {
    let data_end = size - TRAILER_SIZE as u64;
    if directory_offset < HEADER_SIZE as u64 || directory_offset >= data_end {
        return Err(CoreError::corrupted(format!(
            "trailer points outside file: {directory_offset}"
        )));
    }

    let frame = read_frame(backend, directory_offset, data_end)?
        .ok_or_else(|| CoreError::corrupted("truncated directory"))?;
    if frame.kind != FrameKind::Directory || directory_offset + frame.encoded_len != data_end {
        return Err(CoreError::corrupted("trailer does not point at directory"));
    }

    let directory: Directory = from_cbor(&frame.payload)?;
    directory.check_bounds(HEADER_SIZE as u64, directory_offset)?;
    Ok(directory)
}

/// Rebuilds the directory from the frames that made it to storage.
///
/// Stops at the end of data, at a directory frame, or at the first frame
/// that is truncated or fails verification.
fn scan<B: StorageBackend>(backend: &B, size: u64) -> Directory {
    let mut directory = Directory::default();
    let mut offset = HEADER_SIZE as u64;

    loop {
        let frame = match read_frame(backend, offset, size) {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                debug!(offset, error = %e, "recovery scan stopped at damaged frame");
                break;
            }
        };

        match frame.kind {
            FrameKind::Container => match from_cbor::<ContainerDecl>(&frame.payload) {
                Ok(decl) => directory.containers.push(ContainerEntry {
                    decl,
                    offsets: Vec::new(),
                }),
                Err(_) => break,
            },
            FrameKind::Record => {
                let Some(slot) = frame
                    .payload
                    .get(..4)
                    .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize)
                else {
                    break;
                };
                let Some(entry) = directory.containers.get_mut(slot) else {
                    break;
                };
                entry.offsets.push(offset);
            }
            FrameKind::Object => match ObjectPayload::decode(&frame.payload) {
                Ok(payload) => directory.objects.push(ObjectEntry {
                    name: payload.name,
                    class: payload.class,
                    offset,
                }),
                Err(_) => break,
            },
            FrameKind::Directory => break,
        }

        offset += frame.encoded_len;
    }

    debug!(
        containers = directory.containers.len(),
        objects = directory.objects.len(),
        end = offset,
        "recovered container file by scanning"
    );
    directory
}
