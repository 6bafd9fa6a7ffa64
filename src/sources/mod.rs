// src/sources/mod.rs
pub mod bluesky;
pub mod mail;
pub mod mastodon;
pub mod reddit;
pub mod releases;
pub mod rss;

use futures::stream::{Stream, TryStreamExt};
use std::future::Future;

use crate::error::TransportError;

/// Decode a JSON response body, mapping HTTP failures to transport errors.
pub(crate) async fn ok_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, TransportError> {
    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        return Err(TransportError::Status {
            status: status.as_u16(),
            detail,
        });
    }
    response
        .json()
        .await
        .map_err(|e| TransportError::Malformed(e.to_string()))
}

/// Turn a page-fetching function into a lazy newest-first item stream.
/// `fetch` receives the continuation token (`None` for the first page) and
/// returns the page plus the next token; `None` ends the stream. Pages are
/// only requested while the consumer keeps pulling, so a closing window
/// stops pagination early.
pub(crate) fn paged<T, F, Fut>(
    mut fetch: F,
) -> impl Stream<Item = Result<T, TransportError>>
where
    T: Send,
    F: FnMut(Option<String>) -> Fut + Send,
    Fut: Future<Output = Result<(Vec<T>, Option<String>), TransportError>> + Send,
{
    // State: None = exhausted, Some(token) = next page to fetch.
    futures::stream::try_unfold(Some(None::<String>), move |state| {
        let page = state.map(|token| fetch(token));
        async move {
            match page {
                None => Ok::<_, TransportError>(None),
                Some(fut) => {
                    let (items, next_token) = fut.await?;
                    let next_state = next_token.map(Some);
                    Ok(Some((
                        futures::stream::iter(items.into_iter().map(Ok)),
                        next_state,
                    )))
                }
            }
        }
    })
    .try_flatten()
}

/// Single-fetch variant for sources without pagination.
pub(crate) fn single_page<T, Fut>(
    fetch: Fut,
) -> impl Stream<Item = Result<T, TransportError>>
where
    T: Send,
    Fut: Future<Output = Result<Vec<T>, TransportError>> + Send,
{
    futures::stream::once(fetch)
        .map_ok(|items| futures::stream::iter(items.into_iter().map(Ok)))
        .try_flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn paged_flattens_pages_and_stops_on_none_token() {
        let pages = std::sync::Mutex::new(vec![
            (vec![1, 2], Some("next".to_string())),
            (vec![3], None),
        ]);
        let stream = paged(move |_token| {
            let page = pages.lock().unwrap().remove(0);
            async move { Ok(page) }
        });
        let items: Vec<i32> = stream.map(|r| r.unwrap()).collect().await;
        assert_eq!(items, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn paged_is_lazy() {
        // Only the first page may be fetched when the consumer stops early.
        let calls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = calls.clone();
        let stream = paged(move |_token| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async move { Ok((vec![1, 2], Some("more".to_string()))) }
        });
        futures::pin_mut!(stream);
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first, 1);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
