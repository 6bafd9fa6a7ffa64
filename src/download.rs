// src/download.rs
// Plain HTTP media downloader. Photos only; anything else needs a smarter
// tool than a GET request.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::MediaError;
use crate::media::{MediaFile, MediaType, Medium};
use crate::ports::MediaDownloader;

pub struct HttpMediaDownloader {
    directory: PathBuf,
    client: Client,
}

impl HttpMediaDownloader {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            client: Client::new(),
        }
    }
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        "video/mp4" => ".mp4",
        _ => "",
    }
}

#[async_trait]
impl MediaDownloader for HttpMediaDownloader {
    async fn download(&self, media: &[Medium]) -> Result<Vec<MediaFile>, MediaError> {
        for medium in media {
            if medium.media_type != MediaType::Photo {
                return Err(MediaError::Unsupported(medium.media_type));
            }
        }

        // Fresh subdirectory per batch so concurrent runs never collide.
        let directory = self.directory.join(uuid::Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&directory)
            .await
            .map_err(|e| MediaError::Io(format!("creating {}: {e}", directory.display())))?;

        let mut result = Vec::new();
        for medium in media {
            let response = self
                .client
                .get(&medium.url)
                .timeout(Duration::from_secs(120))
                .send()
                .await
                .map_err(|e| MediaError::Io(format!("fetching {}: {e}", medium.url)))?;

            let status = response.status();
            if status.is_client_error() {
                tracing::error!(status = status.as_u16(), url = %medium.url, "skipping medium");
                continue;
            }
            if status.is_server_error() {
                return Err(MediaError::Io(format!(
                    "server error {status} for {}",
                    medium.url
                )));
            }

            let mime_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
                .unwrap_or_else(|| "application/octet-stream".to_string());

            let bytes = response
                .bytes()
                .await
                .map_err(|e| MediaError::Io(format!("reading {}: {e}", medium.url)))?;

            let path = directory.join(format!("{}{}", medium.id, extension_for(&mime_type)));
            tokio::fs::write(&path, &bytes)
                .await
                .map_err(|e| MediaError::Io(format!("writing {}: {e}", path.display())))?;

            result.push(MediaFile {
                medium: medium.clone(),
                path,
                mime_type,
            });
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_mime_types_map_to_extensions() {
        assert_eq!(extension_for("image/jpeg"), ".jpg");
        assert_eq!(extension_for("video/mp4"), ".mp4");
        assert_eq!(extension_for("application/pdf"), "");
    }

    #[tokio::test]
    async fn non_photo_media_are_unsupported() {
        let downloader = HttpMediaDownloader::new("/tmp/feedgram-test");
        let media = vec![Medium {
            media_type: MediaType::Video,
            id: "v1".into(),
            url: "https://example.test/v.mp4".into(),
        }];
        match downloader.download(&media).await {
            Err(MediaError::Unsupported(MediaType::Video)) => {}
            other => panic!("expected unsupported error, got {other:?}"),
        }
    }
}
