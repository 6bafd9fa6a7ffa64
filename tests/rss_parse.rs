// tests/rss_parse.rs
use chrono::{TimeZone, Utc};

use feedgram::config::RssOrder;
use feedgram::sources::rss::parse_feed;

const FEED_XML: &str = include_str!("fixtures/feed.xml");

#[test]
fn fixture_feed_parses_newest_first() {
    let items = parse_feed(FEED_XML, None).unwrap();

    // The undated item is skipped; the rest are sorted newest-first.
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].id, "news-2025-06-03");
    assert_eq!(items[1].id, "news-2025-06-02");
    assert_eq!(items[2].id, "news-2025-06-01");

    assert_eq!(
        items[0].published_at,
        Utc.with_ymd_and_hms(2025, 6, 3, 9, 30, 0).unwrap()
    );
    assert_eq!(items[0].title, "Version 2.1 released");
    assert_eq!(items[0].links, vec!["https://news.example.test/2025/06/version-2-1"]);
}

#[test]
fn html_entities_in_descriptions_are_scrubbed() {
    let items = parse_feed(FEED_XML, None).unwrap();
    assert_eq!(
        items[0].synopsis.as_deref(),
        Some("Bug fixes - and a \"faster\" importer.")
    );
    assert_eq!(
        items[1].synopsis.as_deref(),
        Some("Short downtime on Saturday night.")
    );
}

#[test]
fn declared_reverse_chronological_order_is_trusted() {
    let items = parse_feed(FEED_XML, Some(RssOrder::ReverseChronological)).unwrap();
    assert_eq!(items[0].id, "news-2025-06-03");
}

#[test]
fn declared_chronological_order_is_reversed() {
    // This fixture is actually newest-first, so reversing flips it; the
    // point is that the declared order is applied, not inferred.
    let items = parse_feed(FEED_XML, Some(RssOrder::Chronological)).unwrap();
    assert_eq!(items[0].id, "news-2025-06-01");
    assert_eq!(items.last().unwrap().id, "news-2025-06-03");
}
