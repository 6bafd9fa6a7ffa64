// src/media.rs
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Photo,
    Video,
    Gif,
}

/// A reference to remote media content, prior to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Medium {
    pub media_type: MediaType,
    pub id: String,
    pub url: String,
}

/// A medium resolved to a local file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub medium: Medium,
    pub path: PathBuf,
    pub mime_type: String,
}
