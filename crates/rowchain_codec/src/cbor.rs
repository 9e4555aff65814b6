//! serde bridge to CBOR.

use crate::error::{CodecError, CodecResult};
use ciborium::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes a serde value to CBOR bytes.
///
/// # Errors
///
/// Returns an error if the value's `Serialize` impl fails.
pub fn to_cbor<T: Serialize + ?Sized>(value: &T) -> CodecResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(value, &mut bytes)
        .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    Ok(bytes)
}

/// Decodes CBOR bytes into a serde value.
///
/// # Errors
///
/// Returns an error if the bytes are not valid CBOR or do not match `T`.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    ciborium::de::from_reader(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))
}

/// Converts a serde value into a dynamic CBOR [`Value`].
///
/// # Errors
///
/// Returns an error if the value's `Serialize` impl fails.
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> CodecResult<Value> {
    Value::serialized(value).map_err(|e| CodecError::encoding_failed(e.to_string()))
}
