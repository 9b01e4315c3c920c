//! Result delivery: cache fill, single decode, callback fan-out.

use super::{LoaderState, PendingRequest, lock};
use crate::decode::FromBytes;
use crate::delivery::CallbackExecutor;
use crate::error::Error;
use crate::transfer::{Attachment, Completion, CompletionSink};
use crate::types::{FetchResult, RequestDescriptor};
use bytes::Bytes;
use std::sync::{Arc, Mutex};

/// Where a single delivery's outcome comes from
pub(super) enum Source {
    /// Bytes served from the cache
    Cached(Bytes),
    /// Request refused before any transfer started
    Failed(Error),
}

/// Build the completion sink handed to the transfer manager
///
/// The closure owns handles to the loader's state and executor, so transfers
/// never need a reference back to the loader itself.
pub(super) fn sink<R, U>(
    state: Arc<Mutex<LoaderState>>,
    executor: Arc<dyn CallbackExecutor>,
) -> CompletionSink<PendingRequest<R, U>>
where
    R: FromBytes + Send + Sync + 'static,
    U: Send + 'static,
{
    Arc::new(move |completion: Completion<PendingRequest<R, U>>| {
        complete(&state, executor.as_ref(), completion)
    })
}

/// Cache the body of a successful transfer and schedule its callbacks
fn complete<R, U>(
    state: &Arc<Mutex<LoaderState>>,
    executor: &dyn CallbackExecutor,
    completion: Completion<PendingRequest<R, U>>,
) where
    R: FromBytes + Send + Sync + 'static,
    U: Send + 'static,
{
    let Completion {
        bytes,
        error,
        attachments,
    } = completion;

    if error.is_none() {
        store(state, &attachments, &bytes);
    }

    let state = Arc::clone(state);
    executor.execute(Box::new(move || {
        let mut error = error;
        let mut result: Option<FetchResult<R>> = None;

        // Claimed one by one, right before each callback, since an earlier
        // callback may cancel a later request
        for Attachment {
            descriptor,
            payload,
        } in attachments
        {
            if !claim(&state, &descriptor) {
                continue;
            }
            let result = result.get_or_insert_with(|| match error.take() {
                Some(error) => FetchResult::Error(Arc::new(error)),
                None => FetchResult::decode(&bytes),
            });
            (payload.callback)(result.clone(), descriptor, payload.user_data);
        }
    }));
}

/// Schedule the callback of one request that never joined a transfer
pub(super) fn deliver<R, U>(
    state: &Arc<Mutex<LoaderState>>,
    executor: &dyn CallbackExecutor,
    descriptor: RequestDescriptor,
    request: PendingRequest<R, U>,
    source: Source,
) where
    R: FromBytes + Send + Sync + 'static,
    U: Send + 'static,
{
    let state = Arc::clone(state);
    executor.execute(Box::new(move || {
        if !claim(&state, &descriptor) {
            return;
        }
        let result = match source {
            Source::Cached(bytes) => FetchResult::decode(&bytes),
            Source::Failed(error) => FetchResult::Error(Arc::new(error)),
        };
        (request.callback)(result, descriptor, request.user_data);
    }));
}

/// Store the body under every distinct URL its requests asked for
fn store<A>(state: &Mutex<LoaderState>, attachments: &[Attachment<A>], bytes: &Bytes) {
    let mut keys: Vec<&str> = attachments
        .iter()
        .map(|attachment| attachment.descriptor.url().as_str())
        .collect();
    keys.sort_unstable();
    keys.dedup();

    let mut state = lock(state);
    for key in keys {
        if !state.cache.set(key.to_string(), bytes.clone()) {
            tracing::debug!(
                url = key,
                bytes = bytes.len(),
                capacity = state.cache.capacity(),
                "Cache rejected payload"
            );
        }
    }
}

/// Mark one request delivered; false if it was cancelled meanwhile
fn claim(state: &Mutex<LoaderState>, descriptor: &RequestDescriptor) -> bool {
    lock(state).live.remove(&descriptor.id())
}
