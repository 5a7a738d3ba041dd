use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// A failed round trip to the chat backend.
///
/// The synchronization state machines log these and carry on; nothing in the
/// core turns a `TransportError` into user-visible output.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {endpoint} failed: {source}")]
    Request {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned status {status}")]
    Status { endpoint: String, status: StatusCode },

    #[error("could not decode response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("could not read {}: {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TransportError {
    pub fn is_status(&self) -> bool {
        matches!(self, TransportError::Status { .. })
    }
}
