//! Serialization adapter between Rust values and JSON text.
//!
//! Encoding goes through serde: maps become objects, sequences and sets become
//! arrays, and the message types serialize through their wire projection
//! ([`JsonEquivalent`]). Values that serde refuses can fall back to their
//! display string with [`to_json_or_display`]. Decoding yields a plain
//! [`Value`] tree; callers rebuild requests and responses from it explicitly.

use serde::Serialize;
use serde_json::Value;
use std::fmt::Display;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CodecError>;

#[derive(Debug, Error)]
pub enum CodecError {
    /// Input text is not valid JSON
    #[error("JSON parse error: {0}")]
    Parse(#[source] serde_json::Error),

    /// A value could not be represented as JSON
    #[error("JSON encode error: {0}")]
    Encode(#[source] serde_json::Error),

    /// The value refused to produce its wire projection
    #[error("invalid wire projection: {0}")]
    Projection(String),

    /// Valid JSON, but not shaped like the expected message
    #[error("unexpected message shape: {0}")]
    Shape(String),
}

/// Types that know which JSON value represents them on the wire.
pub trait JsonEquivalent {
    fn json_equivalent(&self) -> Result<Value>;
}

/// Project any serializable value into a JSON tree
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(CodecError::Encode)
}

/// Project a value into a JSON tree, falling back to its display string when
/// serde cannot represent it
pub fn to_json_or_display<T: Serialize + Display + ?Sized>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|_| Value::String(value.to_string()))
}

/// Encode a value as compact JSON text
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(CodecError::Encode)
}

/// Encode a value as compact JSON bytes
pub fn encode_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(CodecError::Encode)
}

/// Parse JSON text into a value tree
pub fn decode(text: &[u8]) -> Result<Value> {
    serde_json::from_slice(text).map_err(CodecError::Parse)
}
