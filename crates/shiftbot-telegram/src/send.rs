//! Message sending helpers for the Telegram adapter.
//!
//! Telegram's message limit is 4096 characters. We use 4090 for safety.
//! Report text is user input, so everything goes out as plain text.

use std::time::Duration;

use teloxide::prelude::*;
use tracing::warn;

/// Maximum characters per Telegram message (limit is 4096; we use 4090 for safety).
const CHUNK_MAX: usize = 4090;

/// Split `text` into messages of at most [`CHUNK_MAX`] characters.
///
/// Prefers blank-line boundaries so a listed report is never split across
/// two messages, then single newlines, then spaces. Lengths are counted in
/// chars; a cut never lands inside a multi-byte character.
pub fn split_chunks(text: &str) -> Vec<String> {
    if text.chars().count() <= CHUNK_MAX {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for block in text.split("\n\n") {
        let block_len = block.chars().count();
        let cost = if current.is_empty() { block_len } else { 2 + block_len };

        if !current.is_empty() && current_len + cost > CHUNK_MAX {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if block_len > CHUNK_MAX {
            // Oversized single block: flush and hard-split it.
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            chunks.extend(force_split(block));
            continue;
        }

        if !current.is_empty() {
            current.push_str("\n\n");
            current_len += 2;
        }
        current.push_str(block);
        current_len += block_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Cut one oversized block at the last newline or space before the limit.
fn force_split(block: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut remaining = block;

    while remaining.chars().count() > CHUNK_MAX {
        // Byte offset of the CHUNK_MAX-th char.
        let limit = remaining
            .char_indices()
            .nth(CHUNK_MAX)
            .map(|(i, _)| i)
            .unwrap_or(remaining.len());
        let window = &remaining[..limit];
        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(limit);
        out.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }
    if !remaining.is_empty() {
        out.push(remaining.to_string());
    }
    out
}

/// Send `text` to `chat_id` in chunked plain-text messages.
///
/// A 100ms delay is inserted between consecutive chunks to avoid hitting rate limits.
pub async fn send_response(bot: &Bot, chat_id: ChatId, text: &str) {
    let chunks = split_chunks(text);
    for (i, chunk) in chunks.iter().enumerate() {
        if let Err(e) = bot.send_message(chat_id, chunk).await {
            warn!(error = %e, chunk_index = i, "Telegram: failed to send message chunk");
        }

        if i + 1 < chunks.len() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_single_chunk() {
        let chunks = split_chunks("Hello, world!");
        assert_eq!(chunks, vec!["Hello, world!"]);
    }

    #[test]
    fn exactly_chunk_max_is_single_chunk() {
        let text = "a".repeat(CHUNK_MAX);
        assert_eq!(split_chunks(&text).len(), 1);
    }

    #[test]
    fn splits_between_report_blocks() {
        let block = format!("Shift A\n{}\n2024-10-19 10:00", "x".repeat(1500));
        let text = vec![block.clone(); 5].join("\n\n");
        let chunks = split_chunks(&text);
        assert!(chunks.len() >= 2);
        for c in &chunks {
            assert!(c.chars().count() <= CHUNK_MAX, "chunk too large: {}", c.len());
            // Every chunk holds whole blocks only.
            assert!(c.split("\n\n").all(|b| b == block));
        }
    }

    #[test]
    fn very_long_single_line_force_splits() {
        let text = "x".repeat(9000);
        let chunks = split_chunks(&text);
        assert_eq!(chunks.len(), 3);
        for c in &chunks {
            assert!(c.chars().count() <= CHUNK_MAX);
        }
    }

    #[test]
    fn multibyte_text_is_split_on_char_boundaries() {
        let text = "àèìòù ".repeat(2000);
        let chunks = split_chunks(&text);
        assert!(chunks.len() >= 2);
        let rejoined: usize = chunks.iter().map(|c| c.chars().filter(|ch| *ch != ' ').count()).sum();
        assert_eq!(rejoined, 10_000);
    }
}
