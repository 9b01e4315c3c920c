//! # resource-loader
//!
//! Asynchronous fetching of URL-addressed resources for applications that
//! request the same assets many times over.
//!
//! ## Design Philosophy
//!
//! resource-loader is designed to be:
//! - **Non-blocking** - `fetch` returns immediately, results arrive through a callback
//! - **Coalescing** - concurrent requests for one URL share a single transfer
//! - **Cancellable** - each request can be withdrawn without disturbing the others
//! - **Cache-aware** - finished bodies are kept in a frequency-weighted memory cache
//!
//! ## Quick Start
//!
//! ```no_run
//! use resource_loader::{Config, FetchResult, ResourceLoader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.cache.capacity_bytes = 8 * 1024 * 1024;
//!
//!     let loader: ResourceLoader<Vec<u8>, &'static str> = ResourceLoader::new(config)?;
//!
//!     let url = "https://example.com/avatar.png".parse()?;
//!     let request = loader.fetch(url, "avatar", |result, descriptor, slot| match result {
//!         FetchResult::Success(bytes) => println!("{slot}: {} bytes", bytes.len()),
//!         FetchResult::Empty => println!("{slot}: nothing usable"),
//!         FetchResult::Error(e) => println!("{slot}: {} failed: {e}", descriptor.url()),
//!     });
//!
//!     // The view went away before the image arrived
//!     loader.cancel(&request);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Frequency-weighted in-memory byte cache
pub mod cache;
/// Configuration types
pub mod config;
/// Turning received bytes into resources
pub mod decode;
/// Where result callbacks run
pub mod delivery;
/// Error types
pub mod error;
/// Request coordination (decomposed into focused submodules)
mod loader;
/// Shared network transfers
mod transfer;
/// Core types
pub mod types;

// Re-export commonly used types
pub use cache::EvictionCache;
pub use config::{CacheConfig, Config, HttpConfig};
pub use decode::{FromBytes, JsonArray, JsonObject};
pub use delivery::{CallbackExecutor, Delivery, InlineExecutor, Job};
pub use error::{Error, Result};
pub use loader::{Callback, ResourceLoader};
pub use types::{CacheStats, FetchResult, RequestDescriptor, RequestId};
