//! Container files: the record store underneath chains and writers.
//!
//! A container file holds any number of named logical record containers
//! plus auxiliary named objects stored next to them.
//!
//! ## Layout
//!
//! ```text
//! | header (16) | frame | frame | ... | directory frame | trailer (12) |
//!
//! header:  | magic "RCHN" (4) | version (2) | reserved (2) | compression (4) | buffer size (4) |
//! frame:   | kind (1) | payload_len (4) | payload (N) | crc32 (4) |
//! trailer: | directory offset (8) | magic "RCHE" (4) |
//! ```
//!
//! Frame kinds are container declarations, records (prefixed with the
//! 4-byte slot of their container), auxiliary objects and, once the file
//! is finalized, the directory listing the offset of every record and
//! object.
//!
//! ## Health
//!
//! - **Zombie**: the header is unreadable, or the trailer leads to a
//!   directory that fails verification. The file does not open.
//! - **Recovered**: there is no trailer, because the writer never
//!   finished. The directory is rebuilt from the frames that made it to
//!   storage, up to the first truncated or damaged frame.
//!
//! Records and objects are CBOR produced by `rowchain_codec`. The
//! compression level in the header is recorded for the reader's
//! information; payloads are stored as written.

mod directory;
mod frame;
mod reader;
mod writer;

pub use directory::{ContainerDecl, ContainerEntry, Directory, ObjectEntry};
pub use frame::{
    compute_crc32, FileHeader, FrameKind, FILE_MAGIC, FORMAT_VERSION, HEADER_SIZE, TRAILER_MAGIC,
    TRAILER_SIZE,
};
pub use reader::ContainerFile;
pub use writer::{ContainerSlot, ContainerWriter, LogicalContainer};
