//! # Rowchain Testkit
//!
//! Test utilities for rowchain.
//!
//! This crate provides:
//! - Sample record and object types with temp-dir fixtures
//! - File damage helpers and interrupted-write simulation
//! - Property-based test generators using proptest
//! - Fuzz targets for the container file reader
//! - A chain harness that checks reads against what was written
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rowchain_testkit::prelude::*;
//!
//! #[test]
//! fn reads_back() {
//!     let dir = TestDir::new();
//!     let path = dir.write_hits("a.rch", &sample_hits(0..3));
//!     let mut reader = ChainReader::<Hit>::open_file(&path).unwrap();
//!     assert_eq!(reader.len().unwrap(), 3);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod fuzz;
pub mod generators;
pub mod integration;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::fuzz::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use rowchain_core::{
        ChainReader, CoreError, Cursor, Named, ReaderOptions, RecordWriter, WriterOptions,
    };
}

pub use crash::*;
pub use fixtures::*;
pub use fuzz::*;
pub use generators::*;
pub use integration::*;
