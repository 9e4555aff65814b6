//! # Rowchain Storage
//!
//! Byte-store backends that sit underneath rowchain container files.
//!
//! A backend knows nothing about headers, frames or records. It only
//! reads at an offset, appends, and makes data durable. The container
//! file engine in `rowchain_core` owns every byte of interpretation.
//!
//! ## Available Backends
//!
//! - [`FileBackend`] - OS files, read-only for chain members or freshly
//!   created (truncated) and buffered for writers
//! - [`InMemoryBackend`] - For tests that build, truncate or corrupt
//!   container images without touching disk
//!
//! ## Example
//!
//! ```rust
//! use rowchain_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"hello world").unwrap();
//! let data = backend.read_at(offset, 11).unwrap();
//! assert_eq!(&data, b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::{FileBackend, DEFAULT_BUFFER_SIZE};
pub use memory::InMemoryBackend;
