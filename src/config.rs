// src/config.rs
// Configuration comes from the process environment (plus `.env` in dev).
// Each subcommand loads only the config structs it needs, so a mail-only
// deployment doesn't have to configure Mastodon credentials.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};

/// Snapshot of the environment, taken once at startup.
pub struct Env {
    values: HashMap<String, String>,
}

impl Env {
    /// Load `.env` if present (no-op in production), then snapshot the
    /// process environment.
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();
        Self {
            values: std::env::vars().collect(),
        }
    }

    #[cfg(test)]
    pub fn from_values(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    pub fn required(&self, key: &str) -> Result<String> {
        let value = self
            .values
            .get(key)
            .with_context(|| format!("value for {key} is missing"))?;
        if value.trim().is_empty() {
            bail!("value for {key} is blank");
        }
        Ok(value.clone())
    }

    pub fn optional(&self, key: &str) -> Option<String> {
        self.values
            .get(key)
            .filter(|v| !v.trim().is_empty())
            .cloned()
    }

    pub fn string_or(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    pub fn int(&self, key: &str) -> Result<i64> {
        self.required(key)?
            .trim()
            .parse()
            .with_context(|| format!("value for {key} is not an integer"))
    }

    /// Comma-separated list; missing or blank means empty.
    pub fn list(&self, key: &str) -> Vec<String> {
        self.optional(key)
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct StateConfig {
    pub state_dir: String,
}

impl StateConfig {
    pub fn from_env(env: &Env) -> Self {
        Self {
            state_dir: env.string_or("STATE_DIR", "state"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub download_dir: String,
}

impl DownloadConfig {
    pub fn from_env(env: &Env) -> Self {
        Self {
            download_dir: env.string_or("DOWNLOAD_DIR", "/tmp/feedgram"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub token: String,
    pub target_chat: i64,
}

impl TelegramConfig {
    pub fn from_env(env: &Env) -> Result<Self> {
        Ok(Self {
            token: env.required("TELEGRAM_TOKEN")?,
            target_chat: env.int("TELEGRAM_TARGET_CHAT_ID")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct MastodonConfig {
    pub api_base_url: String,
    pub source_account: String,
}

impl MastodonConfig {
    pub fn from_env(env: &Env) -> Result<Self> {
        Ok(Self {
            api_base_url: env.required("MASTODON_API_BASE_URL")?,
            source_account: env.required("MASTODON_SOURCE_ACCOUNT")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct BlueskyConfig {
    pub service: String,
    pub handle: String,
    pub password: String,
    /// The account whose feed is forwarded; defaults to the login handle.
    pub author: String,
}

impl BlueskyConfig {
    pub fn from_env(env: &Env) -> Result<Self> {
        let handle = env.required("BLUESKY_HANDLE")?;
        Ok(Self {
            service: env.string_or("BLUESKY_SERVICE", "https://bsky.social"),
            author: env.string_or("BLUESKY_AUTHOR", &handle),
            password: env.required("BLUESKY_PASSWORD")?,
            handle,
        })
    }
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_host: String,
    pub token: String,
    pub mailbox_name: String,
}

impl MailConfig {
    pub fn from_env(env: &Env) -> Result<Self> {
        Ok(Self {
            api_host: env.required("MAIL_API_HOST")?,
            token: env.required("MAIL_TOKEN")?,
            mailbox_name: env.required("MAIL_MAILBOX_NAME")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RedditConfig {
    pub source_username: String,
    /// Only posts in these subreddits are forwarded; empty allows all.
    pub subreddits: Vec<String>,
}

impl RedditConfig {
    pub fn from_env(env: &Env) -> Result<Self> {
        Ok(Self {
            source_username: env.required("REDDIT_SOURCE_USERNAME")?,
            subreddits: env.list("REDDIT_SUBREDDITS"),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ReleasesConfig {
    pub url: String,
}

impl ReleasesConfig {
    pub fn from_env(env: &Env) -> Self {
        Self {
            url: env.string_or("RELEASES_URL", "https://xcodereleases.com/data.json"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RssOrder {
    Chronological,
    ReverseChronological,
}

#[derive(Debug, Clone)]
pub struct RssConfig {
    pub feed_url: String,
    /// Declared feed order; unset feeds are sorted by publication date.
    pub order: Option<RssOrder>,
}

impl RssConfig {
    pub fn from_env(env: &Env) -> Result<Self> {
        let order = match env.optional("RSS_ORDER").as_deref() {
            None => None,
            Some("chronological") => Some(RssOrder::Chronological),
            Some("reverse_chronological") => Some(RssOrder::ReverseChronological),
            Some(other) => bail!("unknown RSS_ORDER value: {other}"),
        };
        Ok(Self {
            feed_url: env.required("RSS_FEED_URL")?,
            order,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> Env {
        Env::from_values(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn required_rejects_blank_values() {
        let env = env_of(&[("TELEGRAM_TOKEN", "   ")]);
        assert!(env.required("TELEGRAM_TOKEN").is_err());
        assert!(env.required("MISSING").is_err());
    }

    #[test]
    fn list_splits_and_trims() {
        let env = env_of(&[("REDDIT_SUBREDDITS", " rust , programming ,,")]);
        assert_eq!(env.list("REDDIT_SUBREDDITS"), vec!["rust", "programming"]);
        assert!(env.list("MISSING").is_empty());
    }

    #[test]
    fn rss_order_is_validated() {
        let env = env_of(&[("RSS_FEED_URL", "https://e.test/feed"), ("RSS_ORDER", "sideways")]);
        assert!(RssConfig::from_env(&env).is_err());

        let env = env_of(&[
            ("RSS_FEED_URL", "https://e.test/feed"),
            ("RSS_ORDER", "reverse_chronological"),
        ]);
        let config = RssConfig::from_env(&env).unwrap();
        assert_eq!(config.order, Some(RssOrder::ReverseChronological));
    }

    #[test]
    fn bluesky_author_defaults_to_handle() {
        let env = env_of(&[
            ("BLUESKY_HANDLE", "bot.example.com"),
            ("BLUESKY_PASSWORD", "hunter2"),
        ]);
        let config = BlueskyConfig::from_env(&env).unwrap();
        assert_eq!(config.author, "bot.example.com");
        assert_eq!(config.service, "https://bsky.social");
    }
}
