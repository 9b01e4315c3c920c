//! Network transfers shared between concurrent requests for the same URL.
//!
//! The manager keeps a pool of live transfers, each serving an ordered list of
//! attached requests:
//! - [`TransferManager::attach`] joins an existing transfer for the URL or
//!   starts a new one
//! - [`TransferManager::detach`] removes one request; removing the last one
//!   cancels the network operation
//! - the transfer task (see [`task`]) drives the HTTP exchange, splits the
//!   attachments on redirects and hands the finished body to the completion
//!   sink
//!
//! The pool mutex only guards bookkeeping. HTTP I/O runs in spawned tasks
//! and never holds it.

mod task;

use crate::error::{Error, Result};
use crate::types::{RequestDescriptor, RequestId};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Identifier of one transfer within a manager
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct TransferId(u64);

/// One request attached to a transfer, with whatever the caller needs back
pub(crate) struct Attachment<A> {
    pub(crate) descriptor: RequestDescriptor,
    pub(crate) payload: A,
}

/// Everything a finished transfer hands back
pub(crate) struct Completion<A> {
    /// Body bytes received (possibly partial when `error` is set)
    pub(crate) bytes: Bytes,
    /// Failure that ended the transfer, if any
    pub(crate) error: Option<Error>,
    /// Attached requests in attachment order
    pub(crate) attachments: Vec<Attachment<A>>,
}

/// Receives each completed transfer exactly once
pub(crate) type CompletionSink<A> = Arc<dyn Fn(Completion<A>) + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TransferState {
    /// Request sent, waiting for final response headers
    Pending,
    /// Final headers accepted, body streaming in
    Receiving,
}

struct TransferRecord<A> {
    /// Current URL; changes when the transfer follows a redirect
    url: Url,
    state: TransferState,
    attachments: Vec<Attachment<A>>,
    cancel: CancellationToken,
}

struct Pool<A> {
    next_transfer_id: u64,
    transfers: HashMap<TransferId, TransferRecord<A>>,
    /// Which transfer each attached request currently belongs to
    index: HashMap<RequestId, TransferId>,
}

impl<A> Pool<A> {
    fn find_by_url(&self, url: &Url) -> Option<TransferId> {
        self.transfers
            .iter()
            .find(|(_, record)| record.url == *url)
            .map(|(id, _)| *id)
    }
}

pub(crate) struct Shared<A> {
    client: reqwest::Client,
    runtime: Handle,
    max_redirects: usize,
    pool: Mutex<Pool<A>>,
    sink: CompletionSink<A>,
}

impl<A> Shared<A> {
    fn lock(&self) -> MutexGuard<'_, Pool<A>> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Pool of in-flight transfers keyed by URL
pub(crate) struct TransferManager<A> {
    shared: Arc<Shared<A>>,
}

impl<A> Clone for TransferManager<A> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<A: Send + 'static> TransferManager<A> {
    /// Create a manager whose transfers run on `runtime`
    ///
    /// `client` must not follow redirects itself; the manager handles them so
    /// it can split attachments.
    pub(crate) fn new(
        client: reqwest::Client,
        runtime: Handle,
        max_redirects: usize,
        sink: CompletionSink<A>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                client,
                runtime,
                max_redirects,
                pool: Mutex::new(Pool {
                    next_transfer_id: 0,
                    transfers: HashMap::new(),
                    index: HashMap::new(),
                }),
                sink,
            }),
        }
    }

    /// Attach a request to the live transfer for its URL, starting one if none
    ///
    /// Returns true when the request joined an existing transfer.
    pub(crate) fn attach(&self, descriptor: RequestDescriptor, payload: A) -> bool {
        let mut pool = self.shared.lock();
        let request_id = descriptor.id();

        if let Some(transfer_id) = pool.find_by_url(descriptor.url()) {
            let Pool {
                transfers, index, ..
            } = &mut *pool;
            if let Some(record) = transfers.get_mut(&transfer_id) {
                record.attachments.push(Attachment {
                    descriptor,
                    payload,
                });
                index.insert(request_id, transfer_id);
                tracing::debug!(
                    request_id = request_id.0,
                    transfer_id = transfer_id.0,
                    attached = record.attachments.len(),
                    "Request coalesced into live transfer"
                );
                return true;
            }
        }

        let url = descriptor.url().clone();
        let transfer_id = self.start(
            &mut pool,
            url,
            vec![Attachment {
                descriptor,
                payload,
            }],
        );
        tracing::debug!(
            request_id = request_id.0,
            transfer_id = transfer_id.0,
            "Started new transfer"
        );
        false
    }

    /// Detach one request from whichever transfer currently serves it
    ///
    /// Cancels the transfer when this was its last attachment. Returns false
    /// if the request is not attached anywhere (already delivered, already
    /// detached, or never attached).
    pub(crate) fn detach(&self, request_id: RequestId) -> bool {
        let mut pool = self.shared.lock();
        let Some(transfer_id) = pool.index.remove(&request_id) else {
            return false;
        };
        let Some(record) = pool.transfers.get_mut(&transfer_id) else {
            return false;
        };

        record
            .attachments
            .retain(|attachment| attachment.descriptor.id() != request_id);

        if record.attachments.is_empty()
            && let Some(record) = pool.transfers.remove(&transfer_id)
        {
            if !record.cancel.is_cancelled() {
                record.cancel.cancel();
            }
            tracing::debug!(
                request_id = request_id.0,
                transfer_id = transfer_id.0,
                url = %record.url,
                state = ?record.state,
                "Last request detached, transfer cancelled"
            );
        }
        true
    }

    /// Cancel every transfer and drop all attachments
    ///
    /// Returns the number of requests that were detached.
    pub(crate) fn detach_all(&self) -> usize {
        let mut pool = self.shared.lock();
        let detached = pool.index.len();
        pool.index.clear();
        for (_, record) in pool.transfers.drain() {
            record.cancel.cancel();
        }
        detached
    }

    /// Number of live transfers
    pub(crate) fn in_flight(&self) -> usize {
        self.shared.lock().transfers.len()
    }

    /// Whether `request_id` is attached to a live transfer
    #[cfg(test)]
    pub(crate) fn is_attached(&self, request_id: RequestId) -> bool {
        self.shared.lock().index.contains_key(&request_id)
    }

    /// Register a transfer for `url` carrying `attachments` and spawn its task
    fn start(&self, pool: &mut Pool<A>, url: Url, attachments: Vec<Attachment<A>>) -> TransferId {
        start_transfer(&self.shared, pool, url, attachments)
    }
}

/// Pool insertion shared by `attach` and redirect splitting
fn start_transfer<A: Send + 'static>(
    shared: &Arc<Shared<A>>,
    pool: &mut Pool<A>,
    url: Url,
    attachments: Vec<Attachment<A>>,
) -> TransferId {
    pool.next_transfer_id += 1;
    let transfer_id = TransferId(pool.next_transfer_id);
    let cancel = CancellationToken::new();

    for attachment in &attachments {
        pool.index.insert(attachment.descriptor.id(), transfer_id);
    }
    pool.transfers.insert(
        transfer_id,
        TransferRecord {
            url: url.clone(),
            state: TransferState::Pending,
            attachments,
            cancel: cancel.clone(),
        },
    );

    shared
        .runtime
        .spawn(task::run(Arc::clone(shared), transfer_id, url, cancel));
    transfer_id
}

/// Build an HTTP client suitable for the manager (redirects disabled)
pub(crate) fn build_client(config: &crate::config::HttpConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .connect_timeout(config.connect_timeout)
        .user_agent(config.user_agent.clone());
    if let Some(timeout) = config.request_timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}
