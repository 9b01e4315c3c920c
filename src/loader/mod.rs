//! The public loader, split into focused submodules.
//!
//! - [`control`] - Cancellation, cache maintenance and diagnostics
//! - [`completion`] - Turning finished transfers and cache hits into callbacks
//!
//! `fetch` takes the loader's lock once: it allocates the request id, looks
//! the URL up in the cache and, on a miss, attaches the request to the
//! transfer pool before releasing it.

mod completion;
mod control;

use crate::cache::EvictionCache;
use crate::config::Config;
use crate::decode::FromBytes;
use crate::delivery::{CallbackExecutor, Delivery};
use crate::error::{Error, Result};
use crate::transfer::{TransferManager, build_client};
use crate::types::{FetchResult, RequestDescriptor, RequestId};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use url::Url;

/// Boxed result callback: `(result, descriptor, user_data)`
pub type Callback<R, U> = Box<dyn FnOnce(FetchResult<R>, RequestDescriptor, U) + Send + 'static>;

/// What the loader keeps for each request until it is delivered
pub(crate) struct PendingRequest<R, U> {
    callback: Callback<R, U>,
    user_data: U,
}

/// Bookkeeping guarded by the loader's lock
pub(crate) struct LoaderState {
    /// Last allocated request id
    next_request_id: u64,
    cache: EvictionCache<String>,
    /// Requests whose callback has neither run nor been cancelled
    live: HashSet<RequestId>,
}

impl LoaderState {
    fn new(cache_capacity: usize) -> Self {
        Self {
            next_request_id: 0,
            cache: EvictionCache::new(cache_capacity),
            live: HashSet::new(),
        }
    }
}

fn lock(state: &Mutex<LoaderState>) -> MutexGuard<'_, LoaderState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Asynchronous loader of resources of type `R` identified by URL
///
/// Concurrent requests for the same URL share one network transfer, finished
/// bodies are kept in a frequency-weighted memory cache, and each request can
/// be cancelled on its own. `U` is arbitrary per-request data handed back to
/// the callback untouched.
///
/// The loader is cheap to clone; clones share the cache and the transfers.
///
/// # Examples
///
/// ```no_run
/// use resource_loader::{Config, FetchResult, ResourceLoader};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let loader: ResourceLoader<String> = ResourceLoader::new(Config::default())?;
///
///     let url = "https://example.com/readme.txt".parse()?;
///     match loader.load(url).await {
///         FetchResult::Success(text) => println!("{} characters", text.len()),
///         FetchResult::Empty => println!("not UTF-8"),
///         FetchResult::Error(e) => println!("failed: {e}"),
///     }
///     Ok(())
/// }
/// ```
pub struct ResourceLoader<R, U = ()> {
    state: Arc<Mutex<LoaderState>>,
    transfers: TransferManager<PendingRequest<R, U>>,
    executor: Arc<dyn CallbackExecutor>,
    config: Arc<Config>,
}

impl<R, U> Clone for ResourceLoader<R, U> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            transfers: self.transfers.clone(),
            executor: Arc::clone(&self.executor),
            config: Arc::clone(&self.config),
        }
    }
}

impl<R, U> ResourceLoader<R, U>
where
    R: FromBytes + Send + Sync + 'static,
    U: Send + 'static,
{
    /// Create a loader on the current tokio runtime with ambient delivery
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, if called outside a
    /// tokio runtime, or if the HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_delivery(config, Delivery::default())
    }

    /// Create a loader on the current tokio runtime with the given delivery
    pub fn with_delivery(config: Config, delivery: Delivery) -> Result<Self> {
        let runtime = Handle::try_current()?;
        Self::with_runtime(config, delivery, runtime)
    }

    /// Create a loader whose transfers run on `runtime`
    ///
    /// Unlike [`new`](Self::new) this can be called from any thread.
    pub fn with_runtime(config: Config, delivery: Delivery, runtime: Handle) -> Result<Self> {
        config.validate()?;
        let client = build_client(&config.http)?;

        let state = Arc::new(Mutex::new(LoaderState::new(config.cache.capacity_bytes)));
        let executor = delivery.into_executor(&runtime);
        let sink = completion::sink::<R, U>(Arc::clone(&state), Arc::clone(&executor));
        let transfers = TransferManager::new(client, runtime, config.http.max_redirects, sink);

        tracing::debug!(
            cache_capacity = config.cache.capacity_bytes,
            max_redirects = config.http.max_redirects,
            "Resource loader created"
        );

        Ok(Self {
            state,
            transfers,
            executor,
            config: Arc::new(config),
        })
    }

    /// Start loading `url`; `callback` receives the outcome later
    ///
    /// Never blocks on I/O. The returned descriptor identifies this request
    /// for [`cancel`](Self::cancel). The callback runs at most once, on the
    /// loader's delivery context, and never after the request was cancelled.
    ///
    /// A cached URL is served without touching the network. Otherwise the
    /// request joins the in-flight transfer for the same URL or starts one.
    /// Non-http(s) URLs are answered with
    /// [`Error::UnsupportedScheme`](crate::Error::UnsupportedScheme).
    pub fn fetch<F>(&self, url: Url, user_data: U, callback: F) -> RequestDescriptor
    where
        F: FnOnce(FetchResult<R>, RequestDescriptor, U) + Send + 'static,
    {
        let request = PendingRequest {
            callback: Box::new(callback),
            user_data,
        };

        let mut state = lock(&self.state);
        state.next_request_id += 1;
        let descriptor = RequestDescriptor::new(RequestId(state.next_request_id), url);
        state.live.insert(descriptor.id());

        if !matches!(descriptor.url().scheme(), "http" | "https") {
            drop(state);
            let error = Error::UnsupportedScheme {
                scheme: descriptor.url().scheme().to_string(),
                url: descriptor.url().clone(),
            };
            tracing::debug!(request_id = descriptor.id().0, error = %error, "Request rejected");
            completion::deliver(
                &self.state,
                self.executor.as_ref(),
                descriptor.clone(),
                request,
                completion::Source::Failed(error),
            );
            return descriptor;
        }

        if let Some(bytes) = state.cache.get(descriptor.url().as_str()) {
            drop(state);
            tracing::debug!(
                request_id = descriptor.id().0,
                url = %descriptor.url(),
                bytes = bytes.len(),
                "Cache hit"
            );
            completion::deliver(
                &self.state,
                self.executor.as_ref(),
                descriptor.clone(),
                request,
                completion::Source::Cached(bytes),
            );
            return descriptor;
        }

        let coalesced = self.transfers.attach(descriptor.clone(), request);
        tracing::debug!(
            request_id = descriptor.id().0,
            url = %descriptor.url(),
            coalesced,
            "Cache miss, request attached to transfer"
        );
        descriptor
    }

    /// Parse `url` and [`fetch`](Self::fetch) it
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if `url` does not parse; no request is
    /// created and no id is consumed.
    pub fn fetch_str<F>(&self, url: &str, user_data: U, callback: F) -> Result<RequestDescriptor>
    where
        F: FnOnce(FetchResult<R>, RequestDescriptor, U) + Send + 'static,
    {
        let url = Url::parse(url)?;
        Ok(self.fetch(url, user_data, callback))
    }

    /// Load `url` and wait for the outcome
    ///
    /// Dropping the returned future cancels the request. If the request is
    /// cancelled from elsewhere (e.g. [`cancel_all`](Self::cancel_all)) the
    /// outcome is an [`Error::Cancelled`](crate::Error::Cancelled).
    pub async fn load(&self, url: Url) -> FetchResult<R>
    where
        U: Default,
    {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let descriptor = self.fetch(url, U::default(), move |result, _, _| {
            tx.send(result).ok();
        });

        let mut guard = CancelOnDrop {
            loader: self,
            descriptor: Some(descriptor),
        };
        let result = rx
            .await
            .unwrap_or_else(|_| FetchResult::Error(Arc::new(Error::Cancelled)));
        guard.descriptor = None;
        result
    }

    /// The configuration this loader was built with
    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Cancels an awaited request when its future is dropped early
struct CancelOnDrop<'a, R, U>
where
    R: FromBytes + Send + Sync + 'static,
    U: Send + 'static,
{
    loader: &'a ResourceLoader<R, U>,
    descriptor: Option<RequestDescriptor>,
}

impl<R, U> Drop for CancelOnDrop<'_, R, U>
where
    R: FromBytes + Send + Sync + 'static,
    U: Send + 'static,
{
    fn drop(&mut self) {
        if let Some(descriptor) = self.descriptor.take() {
            self.loader.cancel(&descriptor);
        }
    }
}
