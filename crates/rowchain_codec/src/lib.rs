//! # Rowchain Codec
//!
//! Record serialization for rowchain container files.
//!
//! Records and auxiliary objects are plain serde types. They are written
//! as CBOR through `ciborium`; this crate does not define a format of its
//! own. On top of that it provides [`FieldMask`], which lets a reader
//! skip selected top-level fields of a record, and [`RecordDecoder`],
//! which applies a mask while decoding into a reusable buffer.
//!
//! ## Usage
//!
//! ```
//! use rowchain_codec::{from_cbor, to_cbor};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
//! struct Hit {
//!     channel: u32,
//!     charge: f64,
//! }
//!
//! let bytes = to_cbor(&Hit { channel: 7, charge: 1.5 }).unwrap();
//! let hit: Hit = from_cbor(&bytes).unwrap();
//! assert_eq!(hit.channel, 7);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cbor;
mod error;
mod mask;

pub use cbor::{from_cbor, to_cbor, to_value};
pub use ciborium::Value;
pub use error::{CodecError, CodecResult};
pub use mask::{FieldMask, RecordDecoder};
