//! Wire shapes for the append-only event log.
//!
//! One JSON object per line; the `type` field discriminates. Unknown record
//! and content-block types deserialize to `Unknown` so a newer log never
//! aborts an older parser.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub(crate) enum LogRecord {
    Session(SessionHeader),
    ModelChange(ModelChangeRecord),
    ThinkingLevelChange(ThinkingLevelChangeRecord),
    Custom(CustomRecord),
    Message(MessageWire),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SessionHeader {
    pub id: String,
    #[serde(default)]
    pub version: Option<i64>,
    pub timestamp: String,
    #[serde(default)]
    pub cwd: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ModelChangeRecord {
    pub id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub timestamp: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ThinkingLevelChangeRecord {
    pub id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub timestamp: String,
    #[serde(default)]
    pub thinking_level: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CustomRecord {
    pub id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub timestamp: String,
    pub custom_type: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MessageWire {
    pub id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub timestamp: String,
    pub message: MessageBody,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MessageBody {
    pub role: String,
    #[serde(default, deserialize_with = "string_or_blocks")]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub usage: Option<UsageBody>,
}

/// Content arrives either as a plain string or as an array of typed blocks.
fn string_or_blocks<'de, D>(deserializer: D) -> Result<Vec<ContentBlock>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrBlocks {
        String(String),
        Blocks(Vec<ContentBlock>),
    }

    match StringOrBlocks::deserialize(deserializer)? {
        StringOrBlocks::String(text) => Ok(vec![ContentBlock::Text { text }]),
        StringOrBlocks::Blocks(blocks) => Ok(blocks),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub(crate) enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "toolCall", alias = "toolUse", alias = "tool_call", alias = "tool_use")]
    ToolCall {
        id: String,
        name: String,
        #[serde(default, alias = "input")]
        arguments: Value,
    },

    #[serde(rename = "thinking")]
    Thinking {
        thinking: String,
        #[serde(default)]
        signature: Option<String>,
    },

    #[serde(rename = "toolResult", alias = "tool_result")]
    ToolResult {
        #[serde(default, alias = "toolCallId", alias = "tool_use_id")]
        tool_call_id: Option<String>,
        #[serde(default)]
        content: Value,
        #[serde(default, alias = "isError")]
        is_error: bool,
    },

    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UsageBody {
    #[serde(default)]
    pub input: i64,
    #[serde(default)]
    pub output: i64,
    #[serde(default)]
    pub cache_read: i64,
    #[serde(default)]
    pub cache_write: i64,
    #[serde(default)]
    pub total_tokens: i64,
    #[serde(default)]
    pub cost: Option<CostBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CostBody {
    #[serde(default)]
    pub input: f64,
    #[serde(default)]
    pub output: f64,
    #[serde(default)]
    pub cache_read: f64,
    #[serde(default)]
    pub cache_write: f64,
    #[serde(default)]
    pub total: f64,
}
