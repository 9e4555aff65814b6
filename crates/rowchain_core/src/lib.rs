//! # Rowchain Core
//!
//! Typed record files that read as one sequence across many files.
//!
//! This crate provides:
//! - [`RecordWriter`], which streams records of one type into a container
//!   file, with optional rollover, plus named auxiliary objects
//! - [`ChainReader`], which chains any number of such files into a single
//!   randomly indexable sequence, decoding on demand into one buffer
//! - [`Cursor`], a forward position that knows which reader it belongs to
//! - [`validity`], which screens candidate files before they are chained
//! - [`file`], the container file format underneath
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rowchain_core::{ChainReader, Named, RecordWriter};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct Hit {
//!     channel: u32,
//!     charge: f64,
//! }
//!
//! impl Named for Hit {
//!     const NAME: &'static str = "Hit";
//! }
//!
//! let mut writer = RecordWriter::<Hit>::open("run1.rch")?;
//! writer.fill(&Hit { channel: 3, charge: 0.7 })?;
//! writer.close()?;
//!
//! let mut reader = ChainReader::<Hit>::open(["run1.rch", "run2.rch"])?;
//! let hit = reader.get(0)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod chain;
mod config;
mod cursor;
mod error;
pub mod file;
mod reader;
mod stats;
mod types;
pub mod validity;
mod writer;

pub use chain::ChainElement;
pub use config::{ReaderOptions, WriterOptions, DEFAULT_COMPRESSION};
pub use cursor::{Cursor, Entries};
pub use error::{CoreError, CoreResult};
pub use reader::ChainReader;
pub use stats::{ReaderStats, WriterStats};
pub use types::{Named, ReaderId, Record};
pub use validity::{check_validity, is_valid, Invalidity};
pub use writer::RecordWriter;
