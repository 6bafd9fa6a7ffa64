// src/sources/rss.rs
// Forwards entries from one RSS feed. Feeds disagree about item order, so
// the configured order (or, failing that, a sort on the publication date)
// normalizes the channel to newest-first before windowing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use futures::StreamExt;
use quick_xml::de::from_str;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::compose::OutboundMessage;
use crate::config::{RssConfig, RssOrder};
use crate::cursor::CursorState;
use crate::error::TransportError;
use crate::forward::Source;
use crate::sanitize::{escape, sanitize};
use crate::sources::single_page;
use crate::window::{FeedItem, Window};

const FIRST_RUN_CAP: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct RssItem {
    pub id: String,
    pub title: String,
    pub links: Vec<String>,
    pub published_at: DateTime<Utc>,
    pub synopsis: Option<String>,
}

impl FeedItem for RssItem {
    type Id = String;

    fn item_id(&self) -> &String {
        &self.id
    }

    fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RssCursor {
    pub last_item_id: Option<String>,
    pub last_item_time: Option<DateTime<Utc>>,
}

impl CursorState for RssCursor {
    const KIND: &'static str = "rss";
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<Guid>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Guid {
    #[serde(rename = "$text")]
    value: Option<String>,
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(ts.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a feed document into items, normalized to newest-first.
pub fn parse_feed(xml: &str, order: Option<RssOrder>) -> Result<Vec<RssItem>, TransportError> {
    let xml_clean = scrub_html_entities_for_xml(xml);
    let rss: Rss = from_str(&xml_clean)
        .map_err(|e| TransportError::Malformed(format!("parsing feed xml: {e}")))?;

    let mut items = Vec::with_capacity(rss.channel.item.len());
    for it in rss.channel.item {
        let id = it
            .guid
            .and_then(|g| g.value)
            .or_else(|| it.link.clone());
        let (Some(id), Some(published_at)) =
            (id, it.pub_date.as_deref().and_then(parse_rfc2822))
        else {
            tracing::warn!("skipping feed item without guid or pubDate");
            continue;
        };

        items.push(RssItem {
            id,
            title: it.title.unwrap_or_default(),
            links: it.link.into_iter().collect(),
            published_at,
            synopsis: it.description.filter(|d| !d.trim().is_empty()),
        });
    }

    match order {
        Some(RssOrder::ReverseChronological) => {}
        Some(RssOrder::Chronological) => items.reverse(),
        None => items.sort_by(|a, b| b.published_at.cmp(&a.published_at)),
    }
    Ok(items)
}

pub struct RssSource {
    config: RssConfig,
    client: Client,
}

impl RssSource {
    pub fn new(config: RssConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    async fn fetch_items(&self) -> Result<Vec<RssItem>, TransportError> {
        let response = self.client.get(&self.config.feed_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                detail,
            });
        }
        let body = response.text().await?;
        parse_feed(&body, self.config.order)
    }
}

#[async_trait]
impl Source for RssSource {
    const NAME: &'static str = "rss";

    type Item = RssItem;
    type Cursor = RssCursor;

    fn items(&self) -> BoxStream<'_, Result<RssItem, TransportError>> {
        single_page(self.fetch_items()).boxed()
    }

    fn window(&self, cursor: &RssCursor) -> Window<String> {
        Window {
            last_id: cursor.last_item_id.clone(),
            last_time: cursor.last_item_time,
            first_run_cap: FIRST_RUN_CAP,
        }
    }

    fn advance(&self, cursor: &mut RssCursor, item: &RssItem) {
        cursor.last_item_id = Some(item.id.clone());
        cursor.last_item_time = Some(item.published_at);
    }

    fn compose(
        &self,
        item: &RssItem,
        _files: Vec<crate::media::MediaFile>,
    ) -> Vec<OutboundMessage> {
        let mut body = escape(&sanitize(&item.title));
        if let Some(synopsis) = &item.synopsis {
            body.push_str("\n\n");
            body.push_str(&escape(&sanitize(synopsis)));
        }
        if !item.links.is_empty() {
            body.push('\n');
            body.push_str(&item.links.join("\n"));
        }

        let body = body.trim().to_string();
        if body.is_empty() {
            return Vec::new();
        }
        vec![OutboundMessage::Text { body, html: true }]
    }
}
