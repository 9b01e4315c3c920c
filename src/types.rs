//! Core types for resource-loader

use crate::decode::FromBytes;
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use url::Url;

/// Unique identifier for a request within one loader instance
///
/// Identifiers are allocated from a strictly increasing counter and are never
/// reused, not even after the request is cancelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl RequestId {
    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<RequestId> for u64 {
    fn from(id: RequestId) -> Self {
        id.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle for one caller's request, returned by
/// [`ResourceLoader::fetch`](crate::ResourceLoader::fetch)
///
/// Pass it to [`ResourceLoader::cancel`](crate::ResourceLoader::cancel) to
/// withdraw the request. Two descriptors are equal when their ids are equal.
#[derive(Clone, Debug)]
pub struct RequestDescriptor {
    id: RequestId,
    url: Url,
}

impl RequestDescriptor {
    pub(crate) fn new(id: RequestId, url: Url) -> Self {
        Self { id, url }
    }

    /// Request identifier, unique within the issuing loader
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// The URL that was requested
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl PartialEq for RequestDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RequestDescriptor {}

impl Hash for RequestDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Outcome delivered to a request's callback
///
/// All callers attached to the same transfer receive clones of one value: the
/// resource is decoded once and shared through an `Arc`.
#[derive(Debug)]
pub enum FetchResult<R> {
    /// Bytes were received and decoded into a resource
    Success(Arc<R>),
    /// Bytes were received but the resource type rejected them
    Empty,
    /// The transfer failed before a complete body was received
    Error(Arc<Error>),
}

impl<R> Clone for FetchResult<R> {
    fn clone(&self) -> Self {
        match self {
            FetchResult::Success(resource) => FetchResult::Success(Arc::clone(resource)),
            FetchResult::Empty => FetchResult::Empty,
            FetchResult::Error(error) => FetchResult::Error(Arc::clone(error)),
        }
    }
}

impl<R: FromBytes> FetchResult<R> {
    /// Decode received bytes into `Success` or `Empty`
    pub fn decode(bytes: &[u8]) -> Self {
        match R::from_bytes(bytes) {
            Some(resource) => FetchResult::Success(Arc::new(resource)),
            None => FetchResult::Empty,
        }
    }
}

impl<R> FetchResult<R> {
    /// Returns true for `Success`
    pub fn is_success(&self) -> bool {
        matches!(self, FetchResult::Success(_))
    }

    /// Returns true for `Empty`
    pub fn is_empty(&self) -> bool {
        matches!(self, FetchResult::Empty)
    }

    /// Returns true for `Error`
    pub fn is_error(&self) -> bool {
        matches!(self, FetchResult::Error(_))
    }

    /// The decoded resource, if any
    pub fn resource(&self) -> Option<&R> {
        match self {
            FetchResult::Success(resource) => Some(resource),
            _ => None,
        }
    }

    /// The failure cause, if any
    pub fn error(&self) -> Option<&Error> {
        match self {
            FetchResult::Error(error) => Some(error),
            _ => None,
        }
    }
}

/// Snapshot of cache occupancy and hit statistics
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of stored entries
    pub entries: usize,
    /// Sum of stored payload sizes in bytes
    pub stored_bytes: usize,
    /// Configured capacity in bytes
    pub capacity: usize,
    /// Lookups since the cache was created (seeded at 1)
    pub total_requests: f64,
    /// Hits since the cache was created (seeded at 0.1)
    pub total_hits: f64,
}

impl CacheStats {
    /// Lifetime hit rate, `total_hits / total_requests`
    pub fn hit_rate(&self) -> f64 {
        self.total_hits / self.total_requests
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn descriptor_identity_is_the_id() {
        let a = RequestDescriptor::new(RequestId(7), Url::parse("http://a.test/x").unwrap());
        let b = RequestDescriptor::new(RequestId(7), Url::parse("http://b.test/y").unwrap());
        let c = RequestDescriptor::new(RequestId(8), Url::parse("http://a.test/x").unwrap());

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn decode_distinguishes_success_from_empty() {
        let ok: FetchResult<String> = FetchResult::decode(b"hello");
        assert!(ok.is_success());
        assert_eq!(ok.resource().map(String::as_str), Some("hello"));

        let empty: FetchResult<String> = FetchResult::decode(&[0xff, 0xfe]);
        assert!(empty.is_empty());
        assert!(empty.resource().is_none());
        assert!(empty.error().is_none());
    }

    #[test]
    fn clones_share_the_decoded_resource() {
        let result: FetchResult<Vec<u8>> = FetchResult::decode(b"abc");
        let copy = result.clone();

        match (&result, &copy) {
            (FetchResult::Success(a), FetchResult::Success(b)) => assert!(Arc::ptr_eq(a, b)),
            _ => panic!("expected two successes"),
        }
    }

    #[test]
    fn hit_rate_uses_seeded_counters() {
        let stats = CacheStats {
            entries: 0,
            stored_bytes: 0,
            capacity: 16,
            total_requests: 1.0,
            total_hits: 0.1,
        };
        assert!((stats.hit_rate() - 0.1).abs() < f64::EPSILON);
    }
}
