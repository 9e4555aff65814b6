//! File header and frame envelope.

use crate::error::{CoreError, CoreResult};
use rowchain_storage::StorageBackend;

/// Magic bytes at the start of every container file.
pub const FILE_MAGIC: [u8; 4] = *b"RCHN";

/// Magic bytes closing the trailer of a finalized file.
pub const TRAILER_MAGIC: [u8; 4] = *b"RCHE";

/// Current format version.
pub const FORMAT_VERSION: u16 = 1;

/// Header size: magic (4) + version (2) + reserved (2) + compression (4) + buffer size (4).
pub const HEADER_SIZE: usize = 16;

/// Trailer size: directory offset (8) + magic (4).
pub const TRAILER_SIZE: usize = 12;

/// Frame header size: kind (1) + payload length (4).
const FRAME_HEADER_SIZE: usize = 5;

/// CRC size.
const CRC_SIZE: usize = 4;

/// Computes the CRC32 (IEEE) of `data`.
#[must_use]
pub fn compute_crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Header written at offset 0 of every container file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Format version the file was written with.
    pub version: u16,
    /// Compression level requested by the writer.
    pub compression: u32,
    /// Write buffer size used by the writer.
    pub buffer_size: u32,
}

impl FileHeader {
    /// Creates a header for the current format version.
    #[must_use]
    pub const fn new(compression: u32, buffer_size: u32) -> Self {
        Self {
            version: FORMAT_VERSION,
            compression,
            buffer_size,
        }
    }

    /// Encodes the header.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&FILE_MAGIC);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[8..12].copy_from_slice(&self.compression.to_le_bytes());
        buf[12..16].copy_from_slice(&self.buffer_size.to_le_bytes());
        buf
    }

    /// Decodes and validates a header.
    ///
    /// # Errors
    ///
    /// Returns a corruption error on short input, wrong magic or a
    /// version newer than this build understands.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        if data.len() < HEADER_SIZE {
            return Err(CoreError::corrupted("file shorter than header"));
        }
        if data[0..4] != FILE_MAGIC {
            return Err(CoreError::corrupted("invalid file magic"));
        }

        let version = u16::from_le_bytes([data[4], data[5]]);
        if version == 0 || version > FORMAT_VERSION {
            return Err(CoreError::corrupted(format!(
                "unsupported format version {version}"
            )));
        }

        Ok(Self {
            version,
            compression: u32::from_le_bytes([data[8], data[9], data[10], data[11]]),
            buffer_size: u32::from_le_bytes([data[12], data[13], data[14], data[15]]),
        })
    }
}

/// Frame kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    /// Declares a logical record container.
    Container = 0x01,
    /// One record of a declared container.
    Record = 0x02,
    /// An auxiliary named object.
    Object = 0x03,
    /// The directory written when the file is finalized.
    Directory = 0x04,
}

impl FrameKind {
    /// Parses a kind byte.
    #[must_use]
    pub const fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::Container),
            0x02 => Some(Self::Record),
            0x03 => Some(Self::Object),
            0x04 => Some(Self::Directory),
            _ => None,
        }
    }

    /// Returns the kind byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A frame read back from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame kind.
    pub kind: FrameKind,
    /// Frame payload.
    pub payload: Vec<u8>,
    /// Offset the frame starts at.
    pub offset: u64,
    /// Encoded size including envelope and CRC.
    pub encoded_len: u64,
}

/// Wraps a payload in the frame envelope:
///
/// ```text
/// | kind (1) | payload_len (4) | payload (N) | crc32 (4) |
/// ```
///
/// # Errors
///
/// Returns an error if the payload exceeds 4 GiB.
pub fn encode_frame(kind: FrameKind, payload: &[u8]) -> CoreResult<Vec<u8>> {
    let len = u32::try_from(payload.len())
        .map_err(|_| CoreError::corrupted("frame payload too large"))?;

    let mut buf = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len() + CRC_SIZE);
    buf.push(kind.as_byte());
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(payload);

    let crc = compute_crc32(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    Ok(buf)
}

/// Reads the frame starting at `offset`, looking no further than `end`.
///
/// Returns `Ok(None)` when the frame is cut off before `end`, which is
/// what an interrupted write leaves behind.
///
/// # Errors
///
/// Returns `ChecksumMismatch` for a damaged frame, a corruption error
/// for an unknown kind, or a storage error.
pub fn read_frame<B: StorageBackend + ?Sized>(
    backend: &B,
    offset: u64,
    end: u64,
) -> CoreResult<Option<Frame>> {
    if offset.saturating_add(FRAME_HEADER_SIZE as u64) > end {
        return Ok(None);
    }

    let header = backend.read_at(offset, FRAME_HEADER_SIZE)?;
    let len = u32::from_le_bytes([header[1], header[2], header[3], header[4]]) as u64;
    let encoded_len = FRAME_HEADER_SIZE as u64 + len + CRC_SIZE as u64;
    if offset.saturating_add(encoded_len) > end {
        return Ok(None);
    }

    let data = backend.read_at(offset, encoded_len as usize)?;
    let body_len = data.len() - CRC_SIZE;
    let stored = u32::from_le_bytes([
        data[body_len],
        data[body_len + 1],
        data[body_len + 2],
        data[body_len + 3],
    ]);
    let computed = compute_crc32(&data[..body_len]);
    if stored != computed {
        return Err(CoreError::ChecksumMismatch {
            offset,
            expected: stored,
            actual: computed,
        });
    }

    let kind = FrameKind::from_byte(data[0]).ok_or_else(|| {
        CoreError::corrupted(format!("unknown frame kind {} at offset {offset}", data[0]))
    })?;

    Ok(Some(Frame {
        kind,
        payload: data[FRAME_HEADER_SIZE..body_len].to_vec(),
        offset,
        encoded_len,
    }))
}

/// Encodes the trailer pointing at the directory frame.
#[must_use]
pub fn encode_trailer(directory_offset: u64) -> [u8; TRAILER_SIZE] {
    let mut buf = [0u8; TRAILER_SIZE];
    buf[0..8].copy_from_slice(&directory_offset.to_le_bytes());
    buf[8..12].copy_from_slice(&TRAILER_MAGIC);
    buf
}

/// Reads the trailer of a file of `size` bytes.
///
/// Returns the directory offset, or `None` if the file has no trailer.
///
/// # Errors
///
/// Returns a storage error if the tail cannot be read.
pub fn read_trailer<B: StorageBackend + ?Sized>(backend: &B, size: u64) -> CoreResult<Option<u64>> {
    if size < (HEADER_SIZE + TRAILER_SIZE) as u64 {
        return Ok(None);
    }

    let tail = backend.read_at(size - TRAILER_SIZE as u64, TRAILER_SIZE)?;
    if tail[8..12] != TRAILER_MAGIC {
        return Ok(None);
    }

    let offset = u64::from_le_bytes([
        tail[0], tail[1], tail[2], tail[3], tail[4], tail[5], tail[6], tail[7],
    ]);
    Ok(Some(offset))
}
