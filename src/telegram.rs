// src/telegram.rs
// Telegram Bot API delivery channel. All sends are silent (no notification)
// and link previews are off, matching how a forwarding bot should behave in
// a busy channel. A 429 from the API carries `parameters.retry_after`; each
// call waits that long and retries the same request, bounded.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::json;

use crate::config::TelegramConfig;
use crate::error::DeliveryError;
use crate::media::{MediaFile, MediaType};
use crate::ports::DeliveryChannel;

const API_BASE: &str = "https://api.telegram.org";

pub struct TelegramChannel {
    token: String,
    target_chat: i64,
    client: Client,
    timeout: Duration,
    max_attempts: u8,
}

impl TelegramChannel {
    pub fn new(config: &TelegramConfig) -> Self {
        Self {
            token: config.token.clone(),
            target_chat: config.target_chat,
            client: Client::new(),
            timeout: Duration::from_secs(180),
            max_attempts: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_attempts(mut self, attempts: u8) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{API_BASE}/bot{}/{method}", self.token)
    }

    async fn interpret(response: reqwest::Response) -> Result<(), DeliveryError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if status.as_u16() == 429 {
            let retry_after = parse_retry_after(&body).unwrap_or(Duration::from_secs(5));
            return Err(DeliveryError::RateLimited(retry_after));
        }
        Err(DeliveryError::Failed(format!(
            "telegram returned {status}: {body}"
        )))
    }

    async fn call_json(
        &self,
        method: &str,
        payload: serde_json::Value,
    ) -> Result<(), DeliveryError> {
        let mut attempt = 0u8;
        loop {
            attempt += 1;
            let result = self
                .client
                .post(self.method_url(method))
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            match result {
                Ok(response) => match Self::interpret(response).await {
                    Err(DeliveryError::RateLimited(wait)) if attempt < self.max_attempts => {
                        tracing::debug!(
                            method,
                            seconds = wait.as_secs(),
                            "rate limited, waiting before retry"
                        );
                        tokio::time::sleep(wait).await;
                    }
                    other => return other,
                },
                Err(e) => return Err(DeliveryError::Failed(format!("{method} request: {e}"))),
            }
        }
    }

    /// Multipart variant of `call_json`; the form is rebuilt per attempt from
    /// the prepared fields since `Form` is single-use.
    async fn call_multipart(
        &self,
        method: &str,
        texts: &[(String, String)],
        parts: &[(String, PreparedPart)],
    ) -> Result<(), DeliveryError> {
        let mut attempt = 0u8;
        loop {
            attempt += 1;

            let mut form = Form::new();
            for (name, value) in texts {
                form = form.text(name.clone(), value.clone());
            }
            for (name, prepared) in parts {
                form = form.part(name.clone(), prepared.to_part()?);
            }

            let result = self
                .client
                .post(self.method_url(method))
                .timeout(self.timeout)
                .multipart(form)
                .send()
                .await;

            match result {
                Ok(response) => match Self::interpret(response).await {
                    Err(DeliveryError::RateLimited(wait)) if attempt < self.max_attempts => {
                        tracing::debug!(
                            method,
                            seconds = wait.as_secs(),
                            "rate limited, waiting before retry"
                        );
                        tokio::time::sleep(wait).await;
                    }
                    other => return other,
                },
                Err(e) => return Err(DeliveryError::Failed(format!("{method} request: {e}"))),
            }
        }
    }

    async fn prepare_part(file: &MediaFile) -> Result<PreparedPart, DeliveryError> {
        let bytes = tokio::fs::read(&file.path)
            .await
            .map_err(|e| DeliveryError::Failed(format!("reading {}: {e}", file.path.display())))?;
        let file_name = file
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.medium.id.clone());
        Ok(PreparedPart {
            bytes,
            file_name,
            mime_type: file.mime_type.clone(),
        })
    }

    /// Single file: direct sendPhoto/sendVideo/sendAnimation with caption.
    async fn send_single(
        &self,
        file: &MediaFile,
        caption: Option<&str>,
        html: bool,
    ) -> Result<(), DeliveryError> {
        let (method, field) = match file.medium.media_type {
            MediaType::Photo => ("sendPhoto", "photo"),
            MediaType::Video => ("sendVideo", "video"),
            MediaType::Gif => ("sendAnimation", "animation"),
        };

        let mut texts = vec![
            ("chat_id".to_string(), self.target_chat.to_string()),
            ("disable_notification".to_string(), "true".to_string()),
        ];
        if let Some(caption) = caption {
            texts.push(("caption".to_string(), caption.to_string()));
            if html {
                texts.push(("parse_mode".to_string(), "HTML".to_string()));
            }
        }

        let part = Self::prepare_part(file).await?;
        self.call_multipart(method, &texts, &[(field.to_string(), part)])
            .await
    }

    /// Several files: caption as its own message, then one media group with
    /// `attach://` references.
    async fn send_group(
        &self,
        files: &[MediaFile],
        caption: Option<&str>,
        html: bool,
    ) -> Result<(), DeliveryError> {
        if let Some(caption) = caption {
            self.send_text(caption, html).await?;
        }

        let mut media = Vec::new();
        let mut parts = Vec::new();
        for (i, file) in files.iter().enumerate() {
            let name = format!("file{i}");
            let kind = match file.medium.media_type {
                MediaType::Photo => "photo",
                MediaType::Video | MediaType::Gif => "video",
            };
            media.push(json!({
                "type": kind,
                "media": format!("attach://{name}"),
            }));
            parts.push((name, Self::prepare_part(file).await?));
        }

        let texts = vec![
            ("chat_id".to_string(), self.target_chat.to_string()),
            ("disable_notification".to_string(), "true".to_string()),
            (
                "media".to_string(),
                serde_json::to_string(&media)
                    .map_err(|e| DeliveryError::Failed(format!("encoding media group: {e}")))?,
            ),
        ];
        self.call_multipart("sendMediaGroup", &texts, &parts).await
    }
}

struct PreparedPart {
    bytes: Vec<u8>,
    file_name: String,
    mime_type: String,
}

impl PreparedPart {
    fn to_part(&self) -> Result<Part, DeliveryError> {
        Part::bytes(self.bytes.clone())
            .file_name(self.file_name.clone())
            .mime_str(&self.mime_type)
            .map_err(|e| DeliveryError::Failed(format!("invalid mime {}: {e}", self.mime_type)))
    }
}

fn parse_retry_after(body: &str) -> Option<Duration> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let seconds = value.get("parameters")?.get("retry_after")?.as_u64()?;
    Some(Duration::from_secs(seconds))
}

#[async_trait]
impl DeliveryChannel for TelegramChannel {
    async fn send_text(&self, text: &str, html: bool) -> Result<(), DeliveryError> {
        let mut payload = json!({
            "chat_id": self.target_chat,
            "text": text,
            "disable_notification": true,
            "disable_web_page_preview": true,
        });
        if html {
            payload["parse_mode"] = json!("HTML");
        }
        self.call_json("sendMessage", payload).await
    }

    async fn send_images(
        &self,
        files: &[MediaFile],
        caption: Option<&str>,
        html: bool,
    ) -> Result<(), DeliveryError> {
        match files {
            [] => Err(DeliveryError::Failed("empty image group".to_string())),
            [single] => self.send_single(single, caption, html).await,
            _ => self.send_group(files, caption, html).await,
        }
    }

    async fn send_documents(
        &self,
        files: &[MediaFile],
        caption: Option<&str>,
        file_name: Option<&str>,
    ) -> Result<(), DeliveryError> {
        for (i, file) in files.iter().enumerate() {
            let mut texts = vec![
                ("chat_id".to_string(), self.target_chat.to_string()),
                ("disable_notification".to_string(), "true".to_string()),
            ];
            // Caption goes on the first document only.
            if i == 0 {
                if let Some(caption) = caption {
                    texts.push(("caption".to_string(), caption.to_string()));
                }
            }

            let mut part = Self::prepare_part(file).await?;
            if let Some(name) = file_name {
                part.file_name = name.to_string();
            }
            self.call_multipart("sendDocument", &texts, &[("document".to_string(), part)])
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_is_parsed_from_429_body() {
        let body = r#"{"ok":false,"error_code":429,"parameters":{"retry_after":7}}"#;
        assert_eq!(parse_retry_after(body), Some(Duration::from_secs(7)));
    }

    #[test]
    fn missing_retry_after_yields_none() {
        assert_eq!(parse_retry_after(r#"{"ok":false}"#), None);
        assert_eq!(parse_retry_after("not json"), None);
    }
}
