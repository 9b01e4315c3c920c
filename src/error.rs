//! Error types for resource-loader
//!
//! Failures fall into two groups:
//! - Transfer failures (transport errors, HTTP error statuses, broken redirects)
//!   which are delivered to every caller attached to the failed transfer as
//!   [`FetchResult::Error`](crate::FetchResult::Error)
//! - Setup failures (bad configuration, malformed URLs, no runtime) which are
//!   returned directly from the call that caused them

use thiserror::Error;
use url::Url;

/// Result type alias for resource-loader operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for resource-loader
///
/// Errors produced by a transfer are shared by all callers attached to it, so
/// they reach callbacks wrapped in an `Arc`.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level failure (DNS, connect, timeout, connection reset)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Server answered with a final status outside 2xx; the body was never read
    #[error("HTTP status {status} for {url}")]
    HttpStatus {
        /// The HTTP status code received
        status: u16,
        /// The URL that produced the status (after any redirects)
        url: Url,
    },

    /// Redirect chain exceeded the configured hop limit
    #[error("too many redirects ({limit}) while fetching {url}")]
    TooManyRedirects {
        /// The URL at which the limit was hit
        url: Url,
        /// The configured hop limit
        limit: usize,
    },

    /// A 3xx response without a usable `Location` header
    #[error("invalid redirect from {url}: {reason}")]
    InvalidRedirect {
        /// The URL that answered with the redirect
        url: Url,
        /// Why the redirect target could not be resolved
        reason: String,
    },

    /// The URL string could not be parsed
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Only http and https URLs can be fetched
    #[error("unsupported URL scheme '{scheme}' in {url}")]
    UnsupportedScheme {
        /// The rejected scheme
        scheme: String,
        /// The full URL
        url: Url,
    },

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "http.user_agent")
        key: Option<String>,
    },

    /// The loader was created outside of a tokio runtime
    #[error("no tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    /// The request was cancelled before a result was produced
    ///
    /// Callbacks never receive this; it is only returned by
    /// [`ResourceLoader::load`](crate::ResourceLoader::load) when the request
    /// is cancelled out from under the awaiting future (e.g. by `cancel_all`).
    #[error("request cancelled")]
    Cancelled,
}

impl Error {
    /// HTTP status code carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::HttpStatus { status, .. } => Some(*status),
            Error::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns true for failures that happened while talking to the server
    ///
    /// Setup errors (configuration, URL parsing, missing runtime) and
    /// cancellation are not transfer failures.
    pub fn is_transfer_failure(&self) -> bool {
        matches!(
            self,
            Error::Network(_)
                | Error::HttpStatus { .. }
                | Error::TooManyRedirects { .. }
                | Error::InvalidRedirect { .. }
        )
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn http_status_error_reports_status_and_url() {
        let err = Error::HttpStatus {
            status: 404,
            url: url("http://example.com/missing.png"),
        };

        assert_eq!(err.status(), Some(404));
        assert!(err.is_transfer_failure());
        assert_eq!(
            err.to_string(),
            "HTTP status 404 for http://example.com/missing.png"
        );
    }

    #[test]
    fn setup_errors_are_not_transfer_failures() {
        let parse = Url::parse("not a url").unwrap_err();
        let err = Error::from(parse);
        assert!(matches!(err, Error::InvalidUrl(_)));
        assert!(!err.is_transfer_failure());
        assert_eq!(err.status(), None);

        let err = Error::Config {
            message: "user agent must not be empty".to_string(),
            key: Some("http.user_agent".to_string()),
        };
        assert!(!err.is_transfer_failure());
        assert!(err.to_string().contains("user agent"));

        assert!(!Error::Cancelled.is_transfer_failure());
    }

    #[test]
    fn redirect_errors_are_transfer_failures() {
        let err = Error::TooManyRedirects {
            url: url("http://example.com/loop"),
            limit: 10,
        };
        assert!(err.is_transfer_failure());
        assert!(err.to_string().contains("(10)"));

        let err = Error::InvalidRedirect {
            url: url("http://example.com/moved"),
            reason: "missing Location header".to_string(),
        };
        assert!(err.is_transfer_failure());
        assert!(err.to_string().contains("missing Location header"));
    }
}
