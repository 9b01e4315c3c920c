//! The task behind one transfer: request, redirects, body, hand-off.

use super::{Completion, Shared, TransferId, TransferState, start_transfer};
use crate::error::Error;
use bytes::{Bytes, BytesMut};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Body and terminal error of a finished exchange
struct Outcome {
    bytes: Bytes,
    error: Option<Error>,
}

impl Outcome {
    fn failed(error: Error) -> Self {
        Self {
            bytes: Bytes::new(),
            error: Some(error),
        }
    }
}

/// Drive transfer `id` until it completes or its token is cancelled
pub(super) async fn run<A: Send + 'static>(
    shared: Arc<Shared<A>>,
    id: TransferId,
    url: Url,
    cancel: CancellationToken,
) {
    let outcome = tokio::select! {
        _ = cancel.cancelled() => {
            tracing::debug!(transfer_id = id.0, "Transfer task stopped after cancellation");
            return;
        }
        outcome = exchange(&shared, id, url) => outcome,
    };
    finish(&shared, id, outcome);
}

async fn exchange<A: Send + 'static>(shared: &Arc<Shared<A>>, id: TransferId, mut url: Url) -> Outcome {
    let mut redirects = 0;

    let mut response = loop {
        let response = match shared.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => return Outcome::failed(Error::Network(e)),
        };

        let status = response.status();
        if status.is_redirection() {
            if redirects >= shared.max_redirects {
                return Outcome::failed(Error::TooManyRedirects {
                    url,
                    limit: shared.max_redirects,
                });
            }
            let target = match redirect_target(&url, &response) {
                Ok(target) => target,
                Err(e) => return Outcome::failed(e),
            };
            redirects += 1;
            split_on_redirect(shared, id, &url, &target, status.as_u16());
            url = target;
            continue;
        }

        // Anything but 2xx ends the transfer at header time; the body is never read
        if !status.is_success() {
            return Outcome::failed(Error::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }

        break response;
    };

    mark_receiving(shared, id);

    let mut body = BytesMut::new();
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => body.extend_from_slice(&chunk),
            Ok(None) => break,
            Err(e) => {
                return Outcome {
                    bytes: body.freeze(),
                    error: Some(Error::Network(e)),
                };
            }
        }
    }

    Outcome {
        bytes: body.freeze(),
        error: None,
    }
}

/// Resolve the `Location` of a 3xx response against the current URL
fn redirect_target(current: &Url, response: &reqwest::Response) -> Result<Url, Error> {
    let invalid = |reason: String| Error::InvalidRedirect {
        url: current.clone(),
        reason,
    };

    let location = response
        .headers()
        .get(reqwest::header::LOCATION)
        .ok_or_else(|| invalid("missing Location header".to_string()))?
        .to_str()
        .map_err(|_| invalid("Location header is not valid ASCII".to_string()))?;

    let target = current
        .join(location)
        .map_err(|e| invalid(format!("cannot parse Location '{location}': {e}")))?;

    if !matches!(target.scheme(), "http" | "https") {
        return Err(invalid(format!(
            "unsupported scheme '{}' in Location",
            target.scheme()
        )));
    }
    Ok(target)
}

/// Keep the first request on this transfer and move the rest to a new one
///
/// Both transfers continue against `target`: this one by following the
/// redirect itself, the new one from scratch.
fn split_on_redirect<A: Send + 'static>(
    shared: &Arc<Shared<A>>,
    id: TransferId,
    from: &Url,
    target: &Url,
    status: u16,
) {
    let mut pool = shared.lock();
    let Some(record) = pool.transfers.get_mut(&id) else {
        return;
    };
    record.url = target.clone();
    let tail = if record.attachments.len() > 1 {
        record.attachments.split_off(1)
    } else {
        Vec::new()
    };

    if tail.is_empty() {
        tracing::debug!(
            transfer_id = id.0,
            status,
            from = %from,
            to = %target,
            "Following redirect"
        );
        return;
    }

    let moved = tail.len();
    let new_id = start_transfer(shared, &mut pool, target.clone(), tail);
    tracing::info!(
        transfer_id = id.0,
        new_transfer_id = new_id.0,
        status,
        from = %from,
        to = %target,
        moved,
        "Redirect split: trailing requests moved to a new transfer"
    );
}

fn mark_receiving<A>(shared: &Shared<A>, id: TransferId) {
    if let Some(record) = shared.lock().transfers.get_mut(&id) {
        record.state = TransferState::Receiving;
    }
}

/// Remove the transfer from the pool and hand its requests to the sink
fn finish<A>(shared: &Shared<A>, id: TransferId, outcome: Outcome) {
    let record = {
        let mut pool = shared.lock();
        let Some(record) = pool.transfers.remove(&id) else {
            tracing::debug!(
                transfer_id = id.0,
                "Transfer finished after all requests detached"
            );
            return;
        };
        for attachment in &record.attachments {
            pool.index.remove(&attachment.descriptor.id());
        }
        record
    };

    match &outcome.error {
        Some(e) => tracing::warn!(
            transfer_id = id.0,
            url = %record.url,
            requests = record.attachments.len(),
            error = %e,
            "Transfer failed"
        ),
        None => tracing::debug!(
            transfer_id = id.0,
            url = %record.url,
            requests = record.attachments.len(),
            bytes = outcome.bytes.len(),
            "Transfer completed"
        ),
    }

    (shared.sink)(Completion {
        bytes: outcome.bytes,
        error: outcome.error,
        attachments: record.attachments,
    });
}
