//! Request control: cancellation and cache maintenance.

use super::{ResourceLoader, lock};
use crate::decode::FromBytes;
use crate::types::{CacheStats, RequestDescriptor};

impl<R, U> ResourceLoader<R, U>
where
    R: FromBytes + Send + Sync + 'static,
    U: Send + 'static,
{
    /// Withdraw a request
    ///
    /// The request's callback will not run. Other requests sharing its
    /// transfer are unaffected; if it was the last one, the network operation
    /// is aborted.
    ///
    /// Cancelling a request that was already delivered or cancelled does
    /// nothing.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use resource_loader::ResourceLoader;
    /// # async fn example(loader: ResourceLoader<Vec<u8>>) -> Result<(), url::ParseError> {
    /// let request = loader.fetch("https://example.com/a.png".parse()?, (), |_, _, _| {
    ///     unreachable!("cancelled before delivery");
    /// });
    /// loader.cancel(&request);
    /// loader.cancel(&request); // no-op
    /// # Ok(())
    /// # }
    /// ```
    pub fn cancel(&self, descriptor: &RequestDescriptor) {
        let mut state = lock(&self.state);
        if !state.live.remove(&descriptor.id()) {
            tracing::trace!(
                request_id = descriptor.id().0,
                "Cancel ignored, request already finished"
            );
            return;
        }

        let detached = self.transfers.detach(descriptor.id());
        tracing::debug!(
            request_id = descriptor.id().0,
            url = %descriptor.url(),
            detached,
            "Request cancelled"
        );
    }

    /// Withdraw every outstanding request and abort all transfers
    pub fn cancel_all(&self) {
        let mut state = lock(&self.state);
        let cancelled = state.live.len();
        state.live.clear();

        let detached = self.transfers.detach_all();
        tracing::debug!(cancelled, detached, "All requests cancelled");
    }

    /// Whether `descriptor`'s callback is still due
    pub fn is_pending(&self, descriptor: &RequestDescriptor) -> bool {
        lock(&self.state).live.contains(&descriptor.id())
    }

    /// Number of network transfers currently in flight
    pub fn in_flight(&self) -> usize {
        self.transfers.in_flight()
    }

    /// Drop every cached body; hit statistics are kept
    pub fn flush_cache(&self) {
        let mut state = lock(&self.state);
        let entries = state.cache.len();
        state.cache.flush();
        tracing::debug!(entries, "Cache flushed");
    }

    /// Cache occupancy and hit statistics
    pub fn cache_stats(&self) -> CacheStats {
        lock(&self.state).cache.stats()
    }
}
