// tests/window_filter.rs
// The windowing contract, exercised through the public API.

use chrono::{DateTime, TimeZone, Utc};
use futures::stream::BoxStream;
use futures::StreamExt;

use feedgram::error::TransportError;
use feedgram::window::{collect_new, FeedItem, Window};

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    id: String,
    at: DateTime<Utc>,
}

impl FeedItem for Entry {
    type Id = String;

    fn item_id(&self) -> &String {
        &self.id
    }

    fn published_at(&self) -> DateTime<Utc> {
        self.at
    }
}

fn entry(id: &str, minute: u32) -> Entry {
    Entry {
        id: id.to_string(),
        at: Utc.with_ymd_and_hms(2025, 6, 1, 12, minute, 0).unwrap(),
    }
}

fn stream_of(entries: &[Entry]) -> BoxStream<'static, Result<Entry, TransportError>> {
    futures::stream::iter(entries.to_vec().into_iter().map(Ok)).boxed()
}

fn window(last_id: Option<&str>, last_minute: Option<u32>, cap: usize) -> Window<String> {
    Window {
        last_id: last_id.map(ToString::to_string),
        last_time: last_minute.map(|m| Utc.with_ymd_and_hms(2025, 6, 1, 12, m, 0).unwrap()),
        first_run_cap: cap,
    }
}

#[tokio::test]
async fn known_cursor_id_yields_only_newer_items() {
    let entries = [entry("item5", 50), entry("item4", 40), entry("item3", 30)];
    let out = collect_new(stream_of(&entries), window(Some("item3"), None, 10), |_| true)
        .await
        .unwrap();
    assert_eq!(out, vec![entry("item4", 40), entry("item5", 50)]);
}

#[tokio::test]
async fn first_run_cap_keeps_the_newest() {
    let entries = [entry("item3", 30), entry("item2", 20), entry("item1", 10)];
    let out = collect_new(stream_of(&entries), window(None, None, 2), |_| true)
        .await
        .unwrap();
    assert_eq!(out, vec![entry("item2", 20), entry("item3", 30)]);
}

#[tokio::test]
async fn never_returns_cursor_item_or_older() {
    let entries = [
        entry("e", 50),
        entry("d", 40),
        entry("cursor", 30),
        entry("b", 20),
        entry("a", 10),
    ];
    let out = collect_new(
        stream_of(&entries),
        window(Some("cursor"), Some(30), 10),
        |_| true,
    )
    .await
    .unwrap();

    assert!(out.iter().all(|e| e.id != "cursor"));
    assert!(out
        .iter()
        .all(|e| e.at > Utc.with_ymd_and_hms(2025, 6, 1, 12, 30, 0).unwrap()));
    assert_eq!(out, vec![entry("d", 40), entry("e", 50)]);
}

#[tokio::test]
async fn filtering_twice_gives_the_same_result() {
    let entries = [entry("c", 30), entry("b", 20), entry("a", 10)];
    let first = collect_new(stream_of(&entries), window(Some("a"), Some(10), 10), |_| true)
        .await
        .unwrap();
    let second = collect_new(stream_of(&entries), window(Some("a"), Some(10), 10), |_| true)
        .await
        .unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn upstream_error_propagates() {
    let results: Vec<Result<Entry, TransportError>> = vec![
        Ok(entry("b", 20)),
        Err(TransportError::Malformed("truncated page".into())),
    ];
    let out = collect_new(
        futures::stream::iter(results).boxed(),
        window(None, None, 10),
        |_| true,
    )
    .await;
    assert!(out.is_err());
}
