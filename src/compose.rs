// src/compose.rs
use crate::media::MediaFile;

/// Channel message length limit; longer bodies are sliced and sent as
/// sequential messages.
pub const TEXT_CHUNK_LEN: usize = 4096;

/// What one item turns into on the wire. One item produces zero or more of
/// these; zero means the item is dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Text {
        body: String,
        html: bool,
    },
    ImageGroup {
        files: Vec<MediaFile>,
        caption: Option<String>,
        html: bool,
    },
    DocumentGroup {
        files: Vec<MediaFile>,
        caption: Option<String>,
        file_name: Option<String>,
    },
}

/// Split `text` into chunks of at most `max_chars` characters, preserving
/// character boundaries. Empty input yields no chunks.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    assert!(max_chars > 0);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0usize;

    for ch in text.chars() {
        if count == max_chars {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
        current.push(ch);
        count += 1;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Long plain text as a sequence of independently sendable messages.
pub fn chunked_text_messages(text: &str) -> Vec<OutboundMessage> {
    chunk_text(text, TEXT_CHUNK_LEN)
        .into_iter()
        .map(|body| OutboundMessage::Text { body, html: false })
        .collect()
}
