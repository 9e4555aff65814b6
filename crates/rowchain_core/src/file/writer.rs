//! Write side of a container file.

use crate::error::{CoreError, CoreResult};
use crate::file::directory::{ContainerDecl, ContainerEntry, Directory, ObjectEntry, ObjectPayload};
use crate::file::frame::{encode_frame, encode_trailer, FileHeader, FrameKind};
use rowchain_codec::to_cbor;
use rowchain_storage::StorageBackend;
use tracing::debug;

/// Position of a container within its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerSlot(u32);

impl ContainerSlot {
    /// Returns the slot as an index into the directory.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A container file being written.
///
/// The physical file owns its logical containers. They are reached
/// through [`ContainerWriter::container`], which lends out a view for
/// as long as the caller holds the writer mutably; there is no container
/// handle that could outlive or be dropped apart from the file.
///
/// Dropping a writer without [`finish`](ContainerWriter::finish) leaves
/// a file without directory, which readers open as recovered.
#[derive(Debug)]
pub struct ContainerWriter<B: StorageBackend> {
    backend: B,
    header: FileHeader,
    directory: Directory,
}

impl<B: StorageBackend> ContainerWriter<B> {
    /// Starts a new container file on an empty, writable backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is read-only, already holds data,
    /// or the header cannot be written.
    pub fn create(mut backend: B, header: FileHeader) -> CoreResult<Self> {
        if !backend.is_writable() {
            return Err(rowchain_storage::StorageError::ReadOnly.into());
        }
        if backend.size()? != 0 {
            return Err(CoreError::corrupted("output storage is not empty"));
        }

        backend.append(&header.encode())?;
        Ok(Self {
            backend,
            header,
            directory: Directory::default(),
        })
    }

    /// Returns the header written at the start of the file.
    #[must_use]
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Returns whether the file still accepts data.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.backend.is_writable()
    }

    /// Returns the bytes written so far.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the size cannot be determined.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.size()?)
    }

    /// Declares a logical record container.
    ///
    /// # Errors
    ///
    /// Returns `FieldBindingFailed` if a container with this name already
    /// exists, or an error if the declaration cannot be written.
    pub fn declare_container(
        &mut self,
        name: &str,
        field: &str,
        record_type: &str,
    ) -> CoreResult<ContainerSlot> {
        if self.directory.container_slot(name).is_some() {
            return Err(CoreError::field_binding(format!(
                "container '{name}' already declared"
            )));
        }
        let slot = u32::try_from(self.directory.containers.len())
            .map_err(|_| CoreError::field_binding("too many containers"))?;

        let decl = ContainerDecl {
            name: name.to_string(),
            field: field.to_string(),
            record_type: record_type.to_string(),
        };
        let frame = encode_frame(FrameKind::Container, &to_cbor(&decl)?)?;
        self.backend.append(&frame)?;

        debug!(container = name, field, record_type, "declared container");
        self.directory.containers.push(ContainerEntry {
            decl,
            offsets: Vec::new(),
        });
        Ok(ContainerSlot(slot))
    }

    /// Borrows the container in `slot`.
    ///
    /// # Errors
    ///
    /// Returns `FieldBindingFailed` if the slot was not declared here.
    pub fn container(&mut self, slot: ContainerSlot) -> CoreResult<LogicalContainer<'_, B>> {
        if slot.index() >= self.directory.containers.len() {
            return Err(CoreError::field_binding(format!(
                "no container in slot {}",
                slot.0
            )));
        }
        Ok(LogicalContainer { file: self, slot })
    }

    /// Writes an auxiliary object, independent of any container.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be encoded or written.
    pub fn write_object(&mut self, name: &str, class: &str, data: &[u8]) -> CoreResult<()> {
        let payload = ObjectPayload::encode(name, class, data)?;
        let offset = self.backend.append(&encode_frame(FrameKind::Object, &payload)?)?;
        self.directory.objects.push(ObjectEntry {
            name: name.to_string(),
            class: class.to_string(),
            offset,
        });
        Ok(())
    }

    /// Writes the directory and trailer, syncs, and returns the backend.
    ///
    /// # Errors
    ///
    /// Returns an error if any write or the sync fails.
    pub fn finish(mut self) -> CoreResult<B> {
        let directory_offset = self.backend.size()?;
        let frame = encode_frame(FrameKind::Directory, &to_cbor(&self.directory)?)?;
        self.backend.append(&frame)?;
        self.backend.append(&encode_trailer(directory_offset))?;
        self.backend.sync()?;

        debug!(
            containers = self.directory.containers.len(),
            objects = self.directory.objects.len(),
            size = directory_offset,
            "finalized container file"
        );
        Ok(self.backend)
    }

    /// Gives up the file without writing its directory.
    ///
    /// Buffered data is flushed, so the result is what a writer that
    /// died before closing leaves on disk.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the flush fails.
    pub fn abandon(mut self) -> CoreResult<B> {
        self.backend.flush()?;
        Ok(self.backend)
    }
}

/// A logical record container, borrowed from its file.
#[derive(Debug)]
pub struct LogicalContainer<'a, B: StorageBackend> {
    file: &'a mut ContainerWriter<B>,
    slot: ContainerSlot,
}

impl<B: StorageBackend> LogicalContainer<'_, B> {
    fn entry(&self) -> &ContainerEntry {
        &self.file.directory.containers[self.slot.index()]
    }

    /// Returns the container's declaration.
    #[must_use]
    pub fn decl(&self) -> &ContainerDecl {
        &self.entry().decl
    }

    /// Returns the number of records appended so far.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.entry().len()
    }

    /// Returns whether no record has been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entry().is_empty()
    }

    /// Appends one encoded record and returns its entry index.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be encoded or written.
    pub fn append(&mut self, record: &[u8]) -> CoreResult<u64> {
        let mut payload = Vec::with_capacity(4 + record.len());
        payload.extend_from_slice(&self.slot.0.to_le_bytes());
        payload.extend_from_slice(record);

        let frame = encode_frame(FrameKind::Record, &payload)?;
        let offset = self.file.backend.append(&frame)?;

        let offsets = &mut self.file.directory.containers[self.slot.index()].offsets;
        offsets.push(offset);
        Ok(offsets.len() as u64 - 1)
    }
}
