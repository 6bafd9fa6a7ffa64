// src/sources/bluesky.rs
// Forwards posts from one Bluesky author feed. Session tokens live in the
// cursor so a run can skip the login handshake: restore, refresh, and fall
// back to a fresh login only when the refresh token has gone stale. The
// session is written back on every exit, including failed runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::compose::OutboundMessage;
use crate::config::BlueskyConfig;
use crate::cursor::CursorState;
use crate::error::TransportError;
use crate::forward::Source;
use crate::media::{MediaType, Medium};
use crate::sources::{ok_json, paged};
use crate::window::{FeedItem, Window};

const PAGE_LIMIT: usize = 50;
const FIRST_RUN_CAP: usize = 5;

#[derive(Debug, Clone)]
pub struct BlueskyPost {
    pub id: String,
    pub text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub images: Vec<Medium>,
}

impl FeedItem for BlueskyPost {
    type Id = String;

    fn item_id(&self) -> &String {
        &self.id
    }

    fn published_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueskySession {
    pub access_jwt: String,
    pub refresh_jwt: String,
    pub did: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BlueskyCursor {
    pub last_post_id: Option<String>,
    pub session: Option<BlueskySession>,
}

impl CursorState for BlueskyCursor {
    const KIND: &'static str = "bluesky";
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSession {
    access_jwt: String,
    refresh_jwt: String,
    did: String,
}

#[derive(Debug, Deserialize)]
struct RawFeedPage {
    cursor: Option<String>,
    feed: Vec<RawFeedItem>,
}

#[derive(Debug, Deserialize)]
struct RawFeedItem {
    post: RawPostView,
}

#[derive(Debug, Deserialize)]
struct RawPostView {
    cid: String,
    author: RawAuthor,
    record: Value,
}

#[derive(Debug, Deserialize)]
struct RawAuthor {
    did: String,
}

/// Pull the image blob CIDs out of a post record's embed, if it has one.
fn embed_image_cids(record: &Value) -> Vec<String> {
    let Some(embed) = record.get("embed") else {
        return Vec::new();
    };
    if embed.get("$type").and_then(Value::as_str) != Some("app.bsky.embed.images") {
        return Vec::new();
    }
    embed
        .get("images")
        .and_then(Value::as_array)
        .map(|images| {
            images
                .iter()
                .filter_map(|image| {
                    image
                        .get("image")?
                        .get("ref")?
                        .get("$link")?
                        .as_str()
                        .map(ToString::to_string)
                })
                .collect()
        })
        .unwrap_or_default()
}

fn blob_url(service: &str, did: &str, cid: &str) -> String {
    format!("{service}/xrpc/com.atproto.sync.getBlob?did={did}&cid={cid}")
}

fn build_post(service: &str, view: RawPostView) -> Result<BlueskyPost, TransportError> {
    let created_at = view
        .record
        .get("createdAt")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| TransportError::Malformed("post record without createdAt".into()))?;

    let text = view
        .record
        .get("text")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(ToString::to_string);

    let images = embed_image_cids(&view.record)
        .into_iter()
        .map(|cid| Medium {
            media_type: MediaType::Photo,
            url: blob_url(service, &view.author.did, &cid),
            id: cid,
        })
        .collect();

    Ok(BlueskyPost {
        id: view.cid,
        text,
        created_at,
        images,
    })
}

pub struct BlueskySource {
    config: BlueskyConfig,
    client: Client,
    session: Option<BlueskySession>,
}

impl BlueskySource {
    pub fn new(config: BlueskyConfig) -> Self {
        Self {
            config,
            client: Client::new(),
            session: None,
        }
    }

    async fn create_session(&self) -> Result<BlueskySession, TransportError> {
        tracing::info!("creating new session");
        let url = format!(
            "{}/xrpc/com.atproto.server.createSession",
            self.config.service
        );
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "identifier": self.config.handle,
                "password": self.config.password,
            }))
            .send()
            .await?;
        let raw: RawSession = ok_json(response).await?;
        Ok(BlueskySession {
            access_jwt: raw.access_jwt,
            refresh_jwt: raw.refresh_jwt,
            did: raw.did,
        })
    }

    async fn refresh_session(
        &self,
        session: &BlueskySession,
    ) -> Result<BlueskySession, TransportError> {
        let url = format!(
            "{}/xrpc/com.atproto.server.refreshSession",
            self.config.service
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&session.refresh_jwt)
            .send()
            .await?;
        let raw: RawSession = ok_json(response).await?;
        Ok(BlueskySession {
            access_jwt: raw.access_jwt,
            refresh_jwt: raw.refresh_jwt,
            did: raw.did,
        })
    }
}

#[async_trait]
impl Source for BlueskySource {
    const NAME: &'static str = "bluesky";

    type Item = BlueskyPost;
    type Cursor = BlueskyCursor;

    async fn prepare(&mut self, cursor: &mut BlueskyCursor) -> Result<(), TransportError> {
        let session = match &cursor.session {
            Some(session) => match self.refresh_session(session).await {
                Ok(refreshed) => refreshed,
                Err(e) => {
                    tracing::warn!(error = ?e, "session expired, logging in again");
                    self.create_session().await?
                }
            },
            None => self.create_session().await?,
        };
        self.session = Some(session);
        Ok(())
    }

    fn checkpoint(&self, cursor: &mut BlueskyCursor) {
        tracing::debug!("extracting session");
        cursor.session = self.session.clone();
    }

    fn items(&self) -> BoxStream<'_, Result<BlueskyPost, TransportError>> {
        let client = self.client.clone();
        let service = self.config.service.clone();
        let author = self.config.author.clone();
        let access_jwt = self
            .session
            .as_ref()
            .map(|s| s.access_jwt.clone())
            .unwrap_or_default();

        paged(move |page_cursor| {
            let client = client.clone();
            let service = service.clone();
            let author = author.clone();
            let access_jwt = access_jwt.clone();
            async move {
                let url = format!("{service}/xrpc/app.bsky.feed.getAuthorFeed");
                let mut query: Vec<(&str, String)> = vec![
                    ("actor", author),
                    ("limit", PAGE_LIMIT.to_string()),
                    ("filter", "posts_no_replies".to_string()),
                ];
                if let Some(page_cursor) = page_cursor {
                    query.push(("cursor", page_cursor));
                }

                let response = client
                    .get(&url)
                    .bearer_auth(&access_jwt)
                    .query(&query)
                    .send()
                    .await?;
                let page: RawFeedPage = ok_json(response).await?;

                let next_token = if page.feed.is_empty() {
                    None
                } else {
                    page.cursor
                };
                let posts = page
                    .feed
                    .into_iter()
                    .map(|item| build_post(&service, item.post))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((posts, next_token))
            }
        })
        .boxed()
    }

    fn window(&self, cursor: &BlueskyCursor) -> Window<String> {
        Window {
            last_id: cursor.last_post_id.clone(),
            last_time: None,
            first_run_cap: FIRST_RUN_CAP,
        }
    }

    fn advance(&self, cursor: &mut BlueskyCursor, item: &BlueskyPost) {
        cursor.last_post_id = Some(item.id.clone());
    }

    fn attachments(&self, item: &BlueskyPost) -> Vec<Medium> {
        item.images.clone()
    }

    fn compose(
        &self,
        item: &BlueskyPost,
        files: Vec<crate::media::MediaFile>,
    ) -> Vec<OutboundMessage> {
        if !item.images.is_empty() {
            vec![OutboundMessage::ImageGroup {
                files,
                caption: item.text.clone(),
                html: false,
            }]
        } else if let Some(text) = &item.text {
            vec![OutboundMessage::Text {
                body: text.clone(),
                html: false,
            }]
        } else {
            Vec::new()
        }
    }
}
