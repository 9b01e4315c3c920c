//! Construction of typed resources from downloaded bytes
//!
//! A resource type plugs into [`ResourceLoader`](crate::ResourceLoader) by
//! implementing [`FromBytes`]. The loader calls it once per completed transfer
//! (never once per attached caller) and shares the decoded value.
//!
//! Adapters are provided for raw bytes, UTF-8 text and JSON documents:
//!
//! ```
//! use resource_loader::{FromBytes, JsonArray, JsonObject};
//!
//! let object = JsonObject::from_bytes(br#"{"number": 1}"#).unwrap();
//! assert_eq!(object.value["number"], 1);
//!
//! // A top-level array is not an object
//! assert!(JsonObject::from_bytes(b"[1, 2, 3]").is_none());
//! assert_eq!(JsonArray::from_bytes(b"[1, 2, 3]").unwrap().value.len(), 3);
//! ```

use bytes::Bytes;
use serde_json::{Map, Value};

/// A resource that can be built from a complete response body
///
/// Returning `None` means the bytes arrived but could not be interpreted; the
/// loader reports that as [`FetchResult::Empty`](crate::FetchResult::Empty).
/// Implementations must be pure: the same bytes always give the same answer.
pub trait FromBytes: Sized {
    /// Build the resource from raw bytes, or `None` if they are not valid
    fn from_bytes(bytes: &[u8]) -> Option<Self>;
}

impl FromBytes for Vec<u8> {
    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Some(bytes.to_vec())
    }
}

impl FromBytes for Bytes {
    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Some(Bytes::copy_from_slice(bytes))
    }
}

/// UTF-8 text; invalid UTF-8 decodes to `None`
impl FromBytes for String {
    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        std::str::from_utf8(bytes).ok().map(str::to_owned)
    }
}

/// Any JSON document
impl FromBytes for Value {
    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        serde_json::from_slice(bytes).ok()
    }
}

/// A JSON document whose top level is an object
#[derive(Clone, Debug, PartialEq)]
pub struct JsonObject {
    /// The parsed object
    pub value: Map<String, Value>,
}

impl FromBytes for JsonObject {
    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match serde_json::from_slice(bytes).ok()? {
            Value::Object(value) => Some(Self { value }),
            _ => None,
        }
    }
}

/// A JSON document whose top level is an array
#[derive(Clone, Debug, PartialEq)]
pub struct JsonArray {
    /// The parsed elements
    pub value: Vec<Value>,
}

impl FromBytes for JsonArray {
    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match serde_json::from_slice(bytes).ok()? {
            Value::Array(value) => Some(Self { value }),
            _ => None,
        }
    }
}
