// tests/compose_messages.rs
use feedgram::compose::{chunk_text, chunked_text_messages, OutboundMessage, TEXT_CHUNK_LEN};

#[test]
fn body_at_the_limit_is_a_single_message() {
    let text = "a".repeat(TEXT_CHUNK_LEN);
    assert_eq!(chunk_text(&text, TEXT_CHUNK_LEN).len(), 1);
}

#[test]
fn body_over_the_limit_splits_into_sequential_messages() {
    let text = "a".repeat(TEXT_CHUNK_LEN + 100);
    let messages = chunked_text_messages(&text);

    assert_eq!(messages.len(), 2);
    match &messages[0] {
        OutboundMessage::Text { body, html } => {
            assert_eq!(body.len(), TEXT_CHUNK_LEN);
            assert!(!html);
        }
        other => panic!("expected text message, got {other:?}"),
    }
    match &messages[1] {
        OutboundMessage::Text { body, .. } => assert_eq!(body.len(), 100),
        other => panic!("expected text message, got {other:?}"),
    }
}

#[test]
fn chunks_reassemble_to_the_original() {
    let text = "lorem ipsum ".repeat(1000);
    let chunks = chunk_text(&text, TEXT_CHUNK_LEN);
    assert_eq!(chunks.concat(), text);
}
