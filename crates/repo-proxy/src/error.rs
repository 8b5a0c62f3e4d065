use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;

/// Coarse classification of a [`ProxyError`].
///
/// Callers use this to pick a retry policy: rejections and local timeouts
/// are about load on this node, fetch failures are about the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Admission was denied because the cooperation budget is exhausted.
    CooperationRejected,
    /// This caller gave up waiting for somebody else's fetch.
    CooperationTimeout,
    /// The primary fetch ran past the active timeout.
    FetchTimeout,
    /// The fetch path itself failed (network, status, storage, ...).
    Fetch,
}

// Every variant is cheap to clone so that one resolved outcome can be
// handed to all waiters of a cooperating fetch.
#[derive(Debug, thiserror::Error, Clone)]
pub enum ProxyError {
    #[error("Cooperation rejected for {key}: {limit} callers already cooperating")]
    CooperationRejected { key: String, limit: usize },

    #[error("Timed out after {waited:?} waiting for in-flight fetch of {key}")]
    CooperationTimeout {
        key: String,
        waited: Duration,
        /// Staggered delay before this caller should try again.
        retry_after: Duration,
    },

    #[error("Fetch of {key} did not complete within {timeout:?}")]
    FetchTimeout { key: String, timeout: Duration },

    #[error("Fetch of {key} was abandoned before completing")]
    Cancelled { key: String },

    #[error("Recursive cooperation on {key} would deadlock")]
    RecursiveCooperation { key: String },

    #[error("HTTP error: {source}")]
    Http {
        #[from]
        source: Arc<reqwest::Error>,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: Arc<std::io::Error>,
    },

    #[error("Upstream {url} returned status code {status}")]
    Status { url: String, status: StatusCode },

    #[error("Not found upstream: {url}")]
    NotFound { url: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl ProxyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProxyError::CooperationRejected { .. } | ProxyError::RecursiveCooperation { .. } => {
                ErrorKind::CooperationRejected
            }
            ProxyError::CooperationTimeout { .. } => ErrorKind::CooperationTimeout,
            ProxyError::FetchTimeout { .. } => ErrorKind::FetchTimeout,
            _ => ErrorKind::Fetch,
        }
    }

    /// Whether this error came out of the fetch path (as opposed to the
    /// cooperation machinery refusing or abandoning the caller).
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self.kind(), ErrorKind::Fetch | ErrorKind::FetchTimeout)
    }
}

// Manual implementation of From<reqwest::Error> for ProxyError
// because of the Arc wrapping.
impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        ProxyError::Http {
            source: Arc::new(err),
        }
    }
}

impl From<std::io::Error> for ProxyError {
    fn from(err: std::io::Error) -> Self {
        ProxyError::Io {
            source: Arc::new(err),
        }
    }
}

pub type ProxyResult<T> = Result<T, ProxyError>;
