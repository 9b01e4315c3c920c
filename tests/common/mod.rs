//! Common test utilities for resource-loader integration tests

#![allow(dead_code)]

use resource_loader::{Config, FetchResult, RequestDescriptor};
use std::time::Duration;
use tokio::sync::mpsc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// What a callback saw, forwarded through a channel
pub type Delivered<R, U> = (FetchResult<R>, RequestDescriptor, U);

/// Default configuration with the given cache capacity
pub fn config_with_capacity(capacity_bytes: usize) -> Config {
    let mut config = Config::default();
    config.cache.capacity_bytes = capacity_bytes;
    config
}

/// Serve `body` at `at` with status 200 after `delay`
pub async fn mount_body(server: &MockServer, at: &str, body: &[u8], delay: Duration) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(body.to_vec())
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

/// Number of requests the server received for `at`
pub async fn hits(server: &MockServer, at: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == at)
        .count()
}

/// Wait up to five seconds for the next callback
pub async fn next<R, U>(rx: &mut mpsc::UnboundedReceiver<Delivered<R, U>>) -> Delivered<R, U> {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for callback")
        .expect("callback channel closed")
}
