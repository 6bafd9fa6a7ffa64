// src/error.rs
use std::time::Duration;

use thiserror::Error;

use crate::media::MediaType;

/// Source unreachable or talking nonsense. Fatal to the run; the cursor is
/// still persisted at whatever point was reached.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("source request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("source returned status {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("malformed source response: {0}")]
    Malformed(String),
}

/// Media resolution problems are scoped to a single item, never the run.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("unsupported media type {0:?}")]
    Unsupported(MediaType),
    #[error("media download failed: {0}")]
    Io(String),
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The channel asked us to slow down. The channel adapter waits and
    /// retries before surfacing this; if it still comes out, the run fails.
    #[error("rate limited by delivery channel, retry after {0:?}")]
    RateLimited(Duration),
    #[error("delivery failed: {0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("cursor store is closed")]
    Closed,
    #[error("reading cursor for {kind}: {source}")]
    Read {
        kind: &'static str,
        source: std::io::Error,
    },
    #[error("writing cursor for {kind}: {source}")]
    Write {
        kind: &'static str,
        source: std::io::Error,
    },
    #[error("decoding cursor for {kind}: {source}")]
    Decode {
        kind: &'static str,
        source: serde_json::Error,
    },
    #[error("encoding cursor for {kind}: {source}")]
    Encode {
        kind: &'static str,
        source: serde_json::Error,
    },
}

/// Everything a forwarding run can die from.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
