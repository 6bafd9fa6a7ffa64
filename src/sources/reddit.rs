// src/sources/reddit.rs
// Forwards one redditor's submissions, via the public listing endpoint.
// Pages newest-first with the listing's `after` token. An optional
// subreddit allowlist decides which posts are forwarded; the allowlist is
// applied after the stop conditions, so posts outside it never count
// against the first-run cap.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::compose::OutboundMessage;
use crate::config::RedditConfig;
use crate::cursor::CursorState;
use crate::error::TransportError;
use crate::forward::Source;
use crate::sources::{ok_json, paged};
use crate::window::{FeedItem, Window};

const PAGE_LIMIT: usize = 100;
const FIRST_RUN_CAP: usize = 10;
const USER_AGENT: &str = concat!("feedgram/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct RedditPost {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub url: String,
    pub subreddit_name: String,
}

impl FeedItem for RedditPost {
    type Id = String;

    fn item_id(&self) -> &String {
        &self.id
    }

    fn published_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RedditCursor {
    pub last_post_id: Option<String>,
    pub last_created_at: Option<DateTime<Utc>>,
}

impl CursorState for RedditCursor {
    const KIND: &'static str = "reddit";
}

#[derive(Debug, Deserialize)]
struct RawListing {
    data: RawListingData,
}

#[derive(Debug, Deserialize)]
struct RawListingData {
    after: Option<String>,
    children: Vec<RawChild>,
}

#[derive(Debug, Deserialize)]
struct RawChild {
    data: RawSubmission,
}

#[derive(Debug, Deserialize)]
struct RawSubmission {
    id: String,
    created_utc: f64,
    title: String,
    url: String,
    subreddit: String,
}

fn build_post(raw: RawSubmission) -> RedditPost {
    RedditPost {
        created_at: Utc
            .timestamp_opt(raw.created_utc as i64, 0)
            .single()
            .unwrap_or_else(|| Utc.timestamp_opt(0, 0).unwrap()),
        id: raw.id,
        title: raw.title,
        url: raw.url,
        subreddit_name: raw.subreddit,
    }
}

pub struct RedditSource {
    config: RedditConfig,
    client: Client,
}

impl RedditSource {
    pub fn new(config: RedditConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Source for RedditSource {
    const NAME: &'static str = "reddit";

    type Item = RedditPost;
    type Cursor = RedditCursor;

    fn items(&self) -> BoxStream<'_, Result<RedditPost, TransportError>> {
        let client = self.client.clone();
        let url = format!(
            "https://www.reddit.com/user/{}/submitted.json",
            self.config.source_username
        );

        paged(move |after| {
            let client = client.clone();
            let url = url.clone();
            async move {
                let mut query: Vec<(&str, String)> = vec![
                    ("raw_json", "1".to_string()),
                    ("limit", PAGE_LIMIT.to_string()),
                    ("sort", "new".to_string()),
                ];
                if let Some(after) = after {
                    query.push(("after", after));
                }

                let response = client
                    .get(&url)
                    .header(reqwest::header::USER_AGENT, USER_AGENT)
                    .query(&query)
                    .send()
                    .await?;
                let listing: RawListing = ok_json(response).await?;

                let next_token = if listing.data.children.is_empty() {
                    None
                } else {
                    listing.data.after
                };
                let posts = listing
                    .data
                    .children
                    .into_iter()
                    .map(|child| build_post(child.data))
                    .collect();
                Ok((posts, next_token))
            }
        })
        .boxed()
    }

    fn window(&self, cursor: &RedditCursor) -> Window<String> {
        Window {
            last_id: cursor.last_post_id.clone(),
            last_time: cursor.last_created_at,
            first_run_cap: FIRST_RUN_CAP,
        }
    }

    fn accepts(&self, item: &RedditPost) -> bool {
        let allowed = &self.config.subreddits;
        allowed.is_empty()
            || allowed
                .iter()
                .any(|s| s.eq_ignore_ascii_case(&item.subreddit_name))
    }

    fn advance(&self, cursor: &mut RedditCursor, item: &RedditPost) {
        cursor.last_post_id = Some(item.id.clone());
        cursor.last_created_at = Some(item.created_at);
    }

    fn compose(
        &self,
        item: &RedditPost,
        _files: Vec<crate::media::MediaFile>,
    ) -> Vec<OutboundMessage> {
        vec![OutboundMessage::Text {
            body: format!("{}\n{}", item.title, item.url),
            html: false,
        }]
    }
}
