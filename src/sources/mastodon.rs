// src/sources/mastodon.rs
// Forwards toots from one Mastodon account. The account is resolved to an
// ID per run; statuses are paged newest-first with `max_id`, and `since_id`
// lets the server pre-trim everything at or before the cursor.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;

use crate::compose::OutboundMessage;
use crate::config::MastodonConfig;
use crate::cursor::CursorState;
use crate::error::TransportError;
use crate::forward::Source;
use crate::media::{MediaType, Medium};
use crate::sanitize::{escape, sanitize};
use crate::sources::{ok_json, paged};
use crate::window::{FeedItem, Window};

const PAGE_LIMIT: usize = 40;
const FIRST_RUN_CAP: usize = 10;

#[derive(Debug, Clone)]
pub struct Toot {
    pub id: String,
    pub url: Option<String>,
    /// Toot content, as HTML.
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
    pub media_attachments: Vec<Medium>,
}

impl FeedItem for Toot {
    type Id = String;

    fn item_id(&self) -> &String {
        &self.id
    }

    fn published_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Default, serde::Serialize, Deserialize)]
pub struct MastodonCursor {
    pub last_toot_id: Option<String>,
}

impl CursorState for MastodonCursor {
    const KIND: &'static str = "mastodon";
}

#[derive(Debug, Deserialize)]
struct RawAccount {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RawStatus {
    id: String,
    url: Option<String>,
    content: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    media_attachments: Vec<RawAttachment>,
}

#[derive(Debug, Deserialize)]
struct RawAttachment {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    url: Option<String>,
}

fn parse_medium(raw: RawAttachment) -> Option<Medium> {
    let media_type = match raw.kind.as_str() {
        "image" => MediaType::Photo,
        "video" => MediaType::Video,
        "gifv" => MediaType::Gif,
        other => {
            tracing::warn!(kind = other, "unsupported attachment type");
            return None;
        }
    };
    let url = raw.url?;
    Some(Medium {
        media_type,
        id: raw.id,
        url,
    })
}

fn build_toot(raw: RawStatus) -> Toot {
    Toot {
        id: raw.id,
        url: raw.url,
        content: raw.content.filter(|c| !c.is_empty()),
        created_at: raw.created_at,
        media_attachments: raw
            .media_attachments
            .into_iter()
            .filter_map(parse_medium)
            .collect(),
    }
}

pub struct MastodonSource {
    config: MastodonConfig,
    client: Client,
    user_id: Option<String>,
    since_id: Option<String>,
}

impl MastodonSource {
    pub fn new(config: MastodonConfig) -> Self {
        Self {
            config,
            client: Client::new(),
            user_id: None,
            since_id: None,
        }
    }
}

#[async_trait]
impl Source for MastodonSource {
    const NAME: &'static str = "mastodon";

    type Item = Toot;
    type Cursor = MastodonCursor;

    async fn prepare(&mut self, cursor: &mut MastodonCursor) -> Result<(), TransportError> {
        self.since_id = cursor.last_toot_id.clone();

        tracing::debug!(
            account = %self.config.source_account,
            "looking up account ID"
        );
        let url = format!("{}/api/v1/accounts/lookup", self.config.api_base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("acct", self.config.source_account.as_str())])
            .send()
            .await?;
        let account: RawAccount = ok_json(response).await?;
        self.user_id = Some(account.id);
        Ok(())
    }

    fn items(&self) -> BoxStream<'_, Result<Toot, TransportError>> {
        let client = self.client.clone();
        let base = self.config.api_base_url.clone();
        let user_id = self.user_id.clone().unwrap_or_default();
        let since_id = self.since_id.clone();

        paged(move |max_id| {
            let client = client.clone();
            let url = format!("{base}/api/v1/accounts/{user_id}/statuses");
            let since_id = since_id.clone();
            async move {
                let mut query: Vec<(&str, String)> = vec![
                    ("exclude_replies", "true".to_string()),
                    ("exclude_reblogs", "true".to_string()),
                    ("limit", PAGE_LIMIT.to_string()),
                ];
                if let Some(since_id) = since_id {
                    query.push(("since_id", since_id));
                }
                if let Some(max_id) = max_id {
                    query.push(("max_id", max_id));
                }

                let response = client.get(&url).query(&query).send().await?;
                let statuses: Vec<RawStatus> = ok_json(response).await?;

                let next_token = if statuses.len() < PAGE_LIMIT {
                    None
                } else {
                    statuses.last().map(|s| s.id.clone())
                };
                let toots = statuses.into_iter().map(build_toot).collect();
                Ok((toots, next_token))
            }
        })
        .boxed()
    }

    fn window(&self, cursor: &MastodonCursor) -> Window<String> {
        Window {
            last_id: cursor.last_toot_id.clone(),
            last_time: None,
            first_run_cap: FIRST_RUN_CAP,
        }
    }

    fn advance(&self, cursor: &mut MastodonCursor, item: &Toot) {
        cursor.last_toot_id = Some(item.id.clone());
    }

    fn attachments(&self, item: &Toot) -> Vec<Medium> {
        item.media_attachments.clone()
    }

    fn compose(&self, item: &Toot, files: Vec<crate::media::MediaFile>) -> Vec<OutboundMessage> {
        let caption = item
            .content
            .as_deref()
            .map(|c| escape(&sanitize(c)))
            .filter(|c| !c.is_empty());

        if !item.media_attachments.is_empty() {
            vec![OutboundMessage::ImageGroup {
                files,
                caption,
                html: true,
            }]
        } else if let Some(body) = caption {
            vec![OutboundMessage::Text { body, html: true }]
        } else {
            Vec::new()
        }
    }
}
