// src/sources/releases.rs
// Forwards Xcode releases from the xcodereleases.com data feed. The feed
// lists every build newest-first; betas and release candidates are filtered
// out by the content predicate, and the build string is the item identity
// (version numbers repeat across betas, builds don't).

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::compose::OutboundMessage;
use crate::config::ReleasesConfig;
use crate::cursor::CursorState;
use crate::error::TransportError;
use crate::forward::Source;
use crate::sources::{ok_json, single_page};
use crate::window::{FeedItem, Window};

const FIRST_RUN_CAP: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct XcodeRelease {
    pub name: String,
    pub version_number: String,
    pub version_build: String,
    pub release_date: NaiveDate,
    pub release_notes: Option<String>,
    /// False for betas and release candidates.
    pub is_release: bool,
}

impl FeedItem for XcodeRelease {
    type Id = String;

    fn item_id(&self) -> &String {
        &self.version_build
    }

    fn published_at(&self) -> DateTime<Utc> {
        self.release_date
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default()
            .and_utc()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ReleasesCursor {
    pub last_build: Option<String>,
    pub last_release_date: Option<NaiveDate>,
}

impl CursorState for ReleasesCursor {
    const KIND: &'static str = "releases";
}

#[derive(Debug, Deserialize)]
struct RawRelease {
    name: Option<String>,
    version: RawVersion,
    date: RawDate,
    links: Option<RawLinks>,
}

#[derive(Debug, Deserialize)]
struct RawVersion {
    number: Option<String>,
    build: Option<String>,
    release: RawChannel,
}

#[derive(Debug, Deserialize)]
struct RawChannel {
    #[serde(default)]
    release: bool,
}

#[derive(Debug, Deserialize)]
struct RawDate {
    year: i32,
    month: u32,
    day: u32,
}

#[derive(Debug, Deserialize)]
struct RawLinks {
    notes: Option<RawLink>,
}

#[derive(Debug, Deserialize)]
struct RawLink {
    url: String,
}

fn build_release(raw: RawRelease) -> Option<XcodeRelease> {
    let release_date = NaiveDate::from_ymd_opt(raw.date.year, raw.date.month, raw.date.day)?;
    Some(XcodeRelease {
        name: raw.name.unwrap_or_else(|| "Xcode".to_string()),
        version_number: raw.version.number?,
        version_build: raw.version.build?,
        release_date,
        release_notes: raw.links.and_then(|l| l.notes).map(|n| n.url),
        is_release: raw.version.release.release,
    })
}

pub struct ReleasesSource {
    config: ReleasesConfig,
    client: Client,
}

impl ReleasesSource {
    pub fn new(config: ReleasesConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    async fn fetch_releases(&self) -> Result<Vec<XcodeRelease>, TransportError> {
        let response = self
            .client
            .get(&self.config.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let raw: Vec<RawRelease> = ok_json(response).await?;
        Ok(raw.into_iter().filter_map(build_release).collect())
    }
}

#[async_trait]
impl Source for ReleasesSource {
    const NAME: &'static str = "releases";

    type Item = XcodeRelease;
    type Cursor = ReleasesCursor;

    fn items(&self) -> BoxStream<'_, Result<XcodeRelease, TransportError>> {
        single_page(self.fetch_releases()).boxed()
    }

    fn window(&self, cursor: &ReleasesCursor) -> Window<String> {
        Window {
            last_id: cursor.last_build.clone(),
            last_time: cursor
                .last_release_date
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc()),
            first_run_cap: FIRST_RUN_CAP,
        }
    }

    fn accepts(&self, item: &XcodeRelease) -> bool {
        item.is_release
    }

    fn advance(&self, cursor: &mut ReleasesCursor, item: &XcodeRelease) {
        cursor.last_build = Some(item.version_build.clone());
        cursor.last_release_date = Some(item.release_date);
    }

    fn compose(
        &self,
        item: &XcodeRelease,
        _files: Vec<crate::media::MediaFile>,
    ) -> Vec<OutboundMessage> {
        let mut body = format!(
            "{} {} ({})",
            item.name, item.version_number, item.version_build
        );
        if let Some(notes) = &item.release_notes {
            body.push('\n');
            body.push_str(notes);
        }
        vec![OutboundMessage::Text { body, html: false }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: &str = r#"[
        {
            "name": "Xcode",
            "version": {"number": "15.0", "build": "15A5161b", "release": {"beta": 2}},
            "date": {"year": 2023, "month": 6, "day": 21},
            "links": {"notes": {"url": "https://e.test/beta"}}
        },
        {
            "name": "Xcode",
            "version": {"number": "14.3.1", "build": "14E300c", "release": {"release": true}},
            "date": {"year": 2023, "month": 5, "day": 30},
            "links": {"notes": {"url": "https://e.test/notes"}}
        }
    ]"#;

    fn releases() -> Vec<XcodeRelease> {
        let raw: Vec<RawRelease> = serde_json::from_str(DATA).unwrap();
        raw.into_iter().filter_map(build_release).collect()
    }

    #[test]
    fn betas_are_parsed_but_not_accepted() {
        let releases = releases();
        assert_eq!(releases.len(), 2);
        assert!(!releases[0].is_release);
        assert!(releases[1].is_release);

        let source = ReleasesSource::new(ReleasesConfig {
            url: "https://e.test/data.json".into(),
        });
        assert!(!source.accepts(&releases[0]));
        assert!(source.accepts(&releases[1]));
    }

    #[test]
    fn identity_is_the_build_string() {
        let release = &releases()[1];
        assert_eq!(release.item_id(), "14E300c");
    }

    #[test]
    fn compose_renders_version_and_notes() {
        let source = ReleasesSource::new(ReleasesConfig {
            url: "https://e.test/data.json".into(),
        });
        let out = source.compose(&releases()[1], Vec::new());
        assert_eq!(
            out,
            vec![OutboundMessage::Text {
                body: "Xcode 14.3.1 (14E300c)\nhttps://e.test/notes".into(),
                html: false,
            }]
        );
    }
}
