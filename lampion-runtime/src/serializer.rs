//! Pluggable payload serialization.
//!
//! The hosting application chooses how event and response payloads map to
//! bytes; [`JsonSerializer`] is what every AWS-managed runtime speaks and is
//! what [`crate::run`] wires in.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Converts typed values to and from invocation payload bytes.
pub trait PayloadSerializer {
    type Error: std::error::Error + Send + Sync + 'static;

    fn serialize<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, Self::Error>;

    fn deserialize<T: DeserializeOwned>(&self, payload: &[u8]) -> Result<T, Self::Error>;
}

/// JSON payloads via `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl PayloadSerializer for JsonSerializer {
    type Error = serde_json::Error;

    fn serialize<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, Self::Error> {
        serde_json::to_vec(value)
    }

    fn deserialize<T: DeserializeOwned>(&self, payload: &[u8]) -> Result<T, Self::Error> {
        serde_json::from_slice(payload)
    }
}
