// src/forward.rs
// One generic forwarding run shared by every source: load cursor, stream
// newest-first, window against the cursor, then deliver oldest-first with
// per-item cursor advancement and unconditional cursor persistence on exit.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;

use crate::compose::OutboundMessage;
use crate::cursor::{CursorState, CursorStore};
use crate::error::{ForwardError, MediaError, TransportError};
use crate::media::Medium;
use crate::ports::{DeliveryChannel, MediaDownloader};
use crate::window::{collect_new, FeedItem, Window};

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("forward_runs_total", "Forwarding runs started.");
        describe_counter!(
            "forward_items_total",
            "Items delivered to the channel."
        );
        describe_counter!(
            "forward_dropped_total",
            "Items dropped without delivery."
        );
        describe_counter!(
            "forward_source_errors_total",
            "Source fetch/parse errors."
        );
        describe_gauge!(
            "forward_last_run_ts",
            "Unix ts when a forwarding run last started."
        );
    });
}

/// Per-source policy: what to read, which items to accept, how the cursor
/// maps to a window position, and how an item turns into messages.
#[async_trait]
pub trait Source: Send {
    const NAME: &'static str;

    type Item: FeedItem + Send + Sync;
    type Cursor: CursorState;

    /// One-time per-run setup: session restore, account lookups. Runs before
    /// the item stream is opened and may cache tokens into the cursor.
    async fn prepare(&mut self, _cursor: &mut Self::Cursor) -> Result<(), TransportError> {
        Ok(())
    }

    /// Called once right before the cursor is persisted, success or failure.
    /// Sources with sessions write them back here.
    fn checkpoint(&self, _cursor: &mut Self::Cursor) {}

    /// Newest-first candidate stream. Must be cheap to drop mid-way.
    fn items(&self) -> BoxStream<'_, Result<Self::Item, TransportError>>;

    /// Window position derived from the cursor, including the first-run cap.
    fn window(&self, cursor: &Self::Cursor) -> Window<<Self::Item as FeedItem>::Id>;

    /// Content predicate. Failing items are skipped without counting against
    /// the first-run cap; stop conditions are checked first.
    fn accepts(&self, _item: &Self::Item) -> bool {
        true
    }

    /// Record `item` as forwarded. Called only after every message for the
    /// item was accepted by the channel.
    fn advance(&self, cursor: &mut Self::Cursor, item: &Self::Item);

    /// Media references attached to `item`.
    fn attachments(&self, _item: &Self::Item) -> Vec<Medium> {
        Vec::new()
    }

    /// Compose the outbound messages for one item. An empty vec drops the
    /// item. `files` holds the resolved attachments, possibly fewer than
    /// requested.
    fn compose(
        &self,
        item: &Self::Item,
        files: Vec<crate::media::MediaFile>,
    ) -> Vec<OutboundMessage>;
}

pub struct Forwarder<S> {
    source: S,
    store: Arc<CursorStore>,
    downloader: Arc<dyn MediaDownloader>,
    channel: Arc<dyn DeliveryChannel>,
}

impl<S: Source> Forwarder<S> {
    pub fn new(
        source: S,
        store: Arc<CursorStore>,
        downloader: Arc<dyn MediaDownloader>,
        channel: Arc<dyn DeliveryChannel>,
    ) -> Self {
        Self {
            source,
            store,
            downloader,
            channel,
        }
    }

    /// Execute one forwarding run. The cursor is persisted exactly once,
    /// whether the run succeeds or dies mid-loop; advancement recorded for
    /// already-processed items survives a later failure.
    pub async fn run(mut self) -> Result<(), ForwardError> {
        ensure_metrics_described();
        counter!("forward_runs_total", "source" => S::NAME).increment(1);
        gauge!("forward_last_run_ts").set(chrono::Utc::now().timestamp().max(0) as f64);

        let mut cursor = self.store.load::<S::Cursor>().await?;

        let result = self.run_with_cursor(&mut cursor).await;

        if let Err(e) = &result {
            counter!("forward_source_errors_total", "source" => S::NAME).increment(1);
            tracing::error!(source = S::NAME, error = ?e, "forwarding run failed");
        }

        self.source.checkpoint(&mut cursor);
        tracing::debug!(source = S::NAME, "storing cursor");
        self.store.store(&cursor).await?;

        result
    }

    async fn run_with_cursor(&mut self, cursor: &mut S::Cursor) -> Result<(), ForwardError> {
        self.source.prepare(cursor).await?;

        tracing::info!(source = S::NAME, "reading items");
        let window = self.source.window(cursor);
        let source = &self.source;
        let items = collect_new(source.items(), window, |item| source.accepts(item)).await?;

        if items.is_empty() {
            tracing::info!(source = S::NAME, "no new items");
            return Ok(());
        }

        tracing::info!(source = S::NAME, count = items.len(), "forwarding items");
        for item in &items {
            self.process_item(item).await?;
            self.source.advance(cursor, item);
        }

        Ok(())
    }

    /// Deliver one item, or drop it. Media trouble is scoped to the item;
    /// only delivery failures abort the run.
    async fn process_item(&self, item: &S::Item) -> Result<(), ForwardError> {
        let attachments = self.source.attachments(item);

        let files = if attachments.is_empty() {
            Vec::new()
        } else {
            match self.downloader.download(&attachments).await {
                Ok(files) => files,
                Err(MediaError::Unsupported(media_type)) => {
                    tracing::warn!(
                        source = S::NAME,
                        ?media_type,
                        "no downloader supports attachment"
                    );
                    Vec::new()
                }
                Err(MediaError::Io(detail)) => {
                    tracing::warn!(source = S::NAME, %detail, "media download failed");
                    Vec::new()
                }
            }
        };

        if !attachments.is_empty() && files.is_empty() {
            // An item that should carry media but has none deliverable is
            // incomplete; don't degrade it to text.
            tracing::info!(source = S::NAME, "dropping item with no deliverable media");
            counter!("forward_dropped_total", "source" => S::NAME).increment(1);
            return Ok(());
        }

        let messages = self.source.compose(item, files);
        if messages.is_empty() {
            tracing::info!(source = S::NAME, "dropping item with neither text nor media");
            counter!("forward_dropped_total", "source" => S::NAME).increment(1);
            return Ok(());
        }

        for message in &messages {
            self.send(message).await?;
        }
        counter!("forward_items_total", "source" => S::NAME).increment(1);
        Ok(())
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), ForwardError> {
        match message {
            OutboundMessage::Text { body, html } => {
                self.channel.send_text(body, *html).await?
            }
            OutboundMessage::ImageGroup {
                files,
                caption,
                html,
            } => {
                self.channel
                    .send_images(files, caption.as_deref(), *html)
                    .await?
            }
            OutboundMessage::DocumentGroup {
                files,
                caption,
                file_name,
            } => {
                self.channel
                    .send_documents(files, caption.as_deref(), file_name.as_deref())
                    .await?
            }
        }
        Ok(())
    }
}
