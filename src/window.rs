// src/window.rs
// The "new item" determination: given a newest-first item stream and the
// persisted cursor position, collect everything strictly newer, bounded by a
// first-run cap, and hand it back oldest-first.

use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};

/// Anything the windowing filter can slide over.
pub trait FeedItem {
    type Id: PartialEq;

    fn item_id(&self) -> &Self::Id;
    fn published_at(&self) -> DateTime<Utc>;
}

/// The cursor position a collection run starts from.
#[derive(Debug, Clone)]
pub struct Window<Id> {
    /// ID of the last forwarded item. `None` on the first run ever.
    pub last_id: Option<Id>,
    /// Timestamp of the last forwarded item. Bounds the scan when the item
    /// behind `last_id` was deleted upstream and never shows up by ID.
    pub last_time: Option<DateTime<Utc>>,
    /// Cap applied only while `last_id` is `None`, so the first run doesn't
    /// flood the channel with the source's entire history.
    pub first_run_cap: usize,
}

/// Collect the items that are new since `window`, in chronological order.
///
/// `items` must yield newest-first. Iteration stops, without including the
/// current item, at the first item whose ID equals `window.last_id` or whose
/// timestamp is older than `window.last_time`. The stop conditions are
/// checked before `accepts`, so a filtered-out cursor item still closes the
/// window. Items failing `accepts` are skipped and do not count against the
/// first-run cap. The stream is dropped as soon as the window closes, so
/// paginated sources stop fetching early.
pub async fn collect_new<S, I, E>(
    items: S,
    window: Window<I::Id>,
    mut accepts: impl FnMut(&I) -> bool,
) -> Result<Vec<I>, E>
where
    I: FeedItem,
    S: Stream<Item = Result<I, E>>,
{
    futures::pin_mut!(items);

    let mut collected: Vec<I> = Vec::new();
    while let Some(item) = items.next().await {
        let item = item?;

        if let Some(last_id) = &window.last_id {
            if item.item_id() == last_id {
                break;
            }
        }
        if let Some(last_time) = window.last_time {
            if item.published_at() < last_time {
                tracing::debug!("stopping collection at item older than cursor");
                break;
            }
        }

        if !accepts(&item) {
            continue;
        }

        collected.push(item);
        if window.last_id.is_none() && collected.len() >= window.first_run_cap {
            tracing::debug!(
                cap = window.first_run_cap,
                "stopping collection at first-run cap"
            );
            break;
        }
    }

    // Reverse reverse-chronological: deliveries go out oldest-first so the
    // cursor always ends up on the true most-recent item.
    collected.reverse();
    Ok(collected)
}
