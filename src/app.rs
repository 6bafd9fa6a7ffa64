// src/app.rs
// Composition root. Shared ports (cursor store, delivery channel, media
// downloader) are built once; each forwarding command constructs its source
// from config and runs one orchestrator.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::{
    BlueskyConfig, DownloadConfig, Env, MailConfig, MastodonConfig, RedditConfig, ReleasesConfig,
    RssConfig, StateConfig, TelegramConfig,
};
use crate::cursor::CursorStore;
use crate::download::HttpMediaDownloader;
use crate::forward::{Forwarder, Source};
use crate::ports::{DeliveryChannel, MediaDownloader};
use crate::sources::bluesky::BlueskySource;
use crate::sources::mail::MailSource;
use crate::sources::mastodon::MastodonSource;
use crate::sources::reddit::RedditSource;
use crate::sources::releases::ReleasesSource;
use crate::sources::rss::RssSource;
use crate::telegram::TelegramChannel;

pub struct App {
    env: Env,
    store: Arc<CursorStore>,
    downloader: Arc<dyn MediaDownloader>,
    channel: Arc<dyn DeliveryChannel>,
}

impl App {
    pub fn from_env() -> Result<Self> {
        let env = Env::load();

        let state = StateConfig::from_env(&env);
        let download = DownloadConfig::from_env(&env);
        let telegram = TelegramConfig::from_env(&env).context("telegram configuration")?;

        Ok(Self {
            store: Arc::new(CursorStore::new(state.state_dir)),
            downloader: Arc::new(HttpMediaDownloader::new(download.download_dir)),
            channel: Arc::new(TelegramChannel::new(&telegram)),
            env,
        })
    }

    async fn run<S: Source>(&self, source: S) -> Result<()> {
        Forwarder::new(
            source,
            Arc::clone(&self.store),
            Arc::clone(&self.downloader),
            Arc::clone(&self.channel),
        )
        .run()
        .await?;
        Ok(())
    }

    pub async fn forward_toots(&self) -> Result<()> {
        let config = MastodonConfig::from_env(&self.env).context("mastodon configuration")?;
        self.run(MastodonSource::new(config)).await
    }

    pub async fn forward_posts(&self) -> Result<()> {
        let config = BlueskyConfig::from_env(&self.env).context("bluesky configuration")?;
        self.run(BlueskySource::new(config)).await
    }

    pub async fn forward_mails(&self) -> Result<()> {
        let config = MailConfig::from_env(&self.env).context("mail configuration")?;
        self.run(MailSource::new(config)).await
    }

    pub async fn forward_reddit(&self) -> Result<()> {
        let config = RedditConfig::from_env(&self.env).context("reddit configuration")?;
        self.run(RedditSource::new(config)).await
    }

    pub async fn forward_rss(&self) -> Result<()> {
        let config = RssConfig::from_env(&self.env).context("rss configuration")?;
        self.run(RssSource::new(config)).await
    }

    pub async fn forward_releases(&self) -> Result<()> {
        let config = ReleasesConfig::from_env(&self.env);
        self.run(ReleasesSource::new(config)).await
    }

    pub async fn close(&self) {
        self.store.close().await;
    }
}
