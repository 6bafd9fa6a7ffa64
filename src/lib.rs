// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod app;
pub mod compose;
pub mod config;
pub mod cursor;
pub mod download;
pub mod error;
pub mod forward;
pub mod media;
pub mod ports;
pub mod sanitize;
pub mod sources;
pub mod telegram;
pub mod window;

// ---- Re-exports for stable public API ----
pub use crate::compose::OutboundMessage;
pub use crate::cursor::{CursorState, CursorStore};
pub use crate::error::{
    DeliveryError, ForwardError, MediaError, StorageError, TransportError,
};
pub use crate::forward::{Forwarder, Source};
pub use crate::window::{collect_new, FeedItem, Window};
