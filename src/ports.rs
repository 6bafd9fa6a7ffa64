// src/ports.rs
// Capability contracts consumed by the forwarding core. Concrete
// implementations live in `download` and `telegram`; tests plug in mocks.

use async_trait::async_trait;

use crate::error::{DeliveryError, MediaError};
use crate::media::{MediaFile, Medium};

#[async_trait]
pub trait MediaDownloader: Send + Sync {
    /// Resolve media references into local files. May legitimately return
    /// fewer files than references (skipped client errors).
    async fn download(&self, media: &[Medium]) -> Result<Vec<MediaFile>, MediaError>;
}

#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn send_text(&self, text: &str, html: bool) -> Result<(), DeliveryError>;

    async fn send_images(
        &self,
        files: &[MediaFile],
        caption: Option<&str>,
        html: bool,
    ) -> Result<(), DeliveryError>;

    async fn send_documents(
        &self,
        files: &[MediaFile],
        caption: Option<&str>,
        file_name: Option<&str>,
    ) -> Result<(), DeliveryError>;
}
