//! Parsers for historical chat exports.
//!
//! Every parser yields the same normalized message shape with a
//! deterministic, channel-prefixed message id, so importing the same
//! export twice is idempotent.

pub mod discord;
pub mod telegram;
pub mod whatsapp;

use chatvault_types::{AttachmentRecord, MessageRecord};
use serde_json::Value;

/// One normalized message plus the attachments it owns.
#[derive(Debug, Clone)]
pub struct ImportedMessage {
    pub record: MessageRecord,
    pub attachments: Vec<AttachmentRecord>,
}

impl ImportedMessage {
    pub fn new(record: MessageRecord) -> Self {
        Self {
            record,
            attachments: Vec::new(),
        }
    }
}

/// Export ids arrive as numbers or strings depending on the source tool.
pub(crate) fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
