use thiserror::Error;

/// Failures reported by a [`SearchBackend`](super::SearchBackend) or
/// [`BulkSink`](super::BulkSink).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum BackendError {
    /// The backend answered with an error status.
    #[error("request to {url} failed with status {status}: {message}")]
    Http {
        /// Fully qualified request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Error description from the transport or response body.
        message: String,
    },
    /// The backend could not be reached.
    #[error("network error contacting {url}: {message}")]
    Network {
        /// Fully qualified request URL.
        url: String,
        /// Transport error description.
        message: String,
    },
    /// The request did not complete in time.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout {
        /// Fully qualified request URL.
        url: String,
        /// Configured timeout in seconds.
        timeout_secs: u64,
    },
    /// The response body did not match the expected contract.
    #[error("malformed response from {url}: {message}")]
    MalformedResponse {
        /// Fully qualified request URL.
        url: String,
        /// Parser error description.
        message: String,
    },
    /// A document could not be encoded for submission.
    #[error("failed to encode document: {message}")]
    Encode {
        /// Serializer error description.
        message: String,
    },
    /// The sink was already closed.
    #[error("bulk sink is closed")]
    Closed,
}
