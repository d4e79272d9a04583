//! Stable identifiers and content fingerprints.
//!
//! Every identifier minted here is deterministic: re-deriving from the same
//! inputs yields the same value, which is what makes re-ingest idempotent.

use sha2::{Digest, Sha256};

/// Upper bound on the content bytes folded into a fingerprint.
pub const FINGERPRINT_CONTENT_MAX: usize = 1024;

/// Character budget for text folded into a generated message id.
const GENERATED_ID_TEXT_MAX: usize = 100;

/// Content fingerprint: SHA-256 hex of `sender_id | timestamp | content`.
///
/// Two messages with equal fingerprints are the same logical message.
pub fn message_fingerprint(sender_id: &str, timestamp: i64, content_text: &str) -> String {
    let content = truncate_chars(content_text, FINGERPRINT_CONTENT_MAX);
    let mut hasher = Sha256::new();
    hasher.update(sender_id.as_bytes());
    hasher.update(b"|");
    hasher.update(timestamp.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Derived id for a synthetic `tool_call` event.
pub fn tool_call_event_id(parent_id: &str, tool_block_id: &str) -> String {
    format!("{}_tool_{}", parent_id, tool_block_id)
}

/// Derived id for a synthetic `thinking_block` event.
pub fn thinking_event_id(parent_id: &str) -> String {
    format!("{}_thinking", parent_id)
}

/// Derived id for a synthetic `usage_stats` event.
pub fn usage_event_id(parent_id: &str) -> String {
    format!("{}_usage", parent_id)
}

/// Mint an id for a source record that has none (external imports).
///
/// Truncated hash of timestamp, sender and the head of the text; the `gen-`
/// prefix keeps generated ids visually distinct from upstream ones.
pub fn generated_message_id(timestamp: i64, sender_id: &str, content_text: &str) -> String {
    let text = truncate_chars(content_text, GENERATED_ID_TEXT_MAX);
    let mut hasher = Sha256::new();
    hasher.update(timestamp.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(sender_id.as_bytes());
    hasher.update(b"|");
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        hex.push_str(&format!("{:02x}", byte));
    }
    format!("gen-{}", hex)
}

/// Channel-prefixed deterministic id for imported messages whose source
/// assigns none, e.g. `whatsapp_1a2b3c4d5e6f7a8b`.
pub fn channel_message_id(
    channel: &str,
    timestamp: i64,
    sender_id: &str,
    content_text: &str,
) -> String {
    let generated = generated_message_id(timestamp, sender_id, content_text);
    format!("{}_{}", channel, &generated["gen-".len()..])
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
