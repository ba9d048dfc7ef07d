//! Anthropic Messages API usage
//!
//! In a stream, `message_start` carries the input figures and each
//! `message_delta` the running output count.

use serde::{Deserialize, Serialize};

use crate::usage::{UsageDelta, UsageReport};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_creation_input_tokens: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub usage: Usage,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaUsage {
    #[serde(default)]
    pub output_tokens: u64,
}

/// Server-sent stream event; events without usage collapse into `Other`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    MessageStart { message: Message },
    MessageDelta { usage: DeltaUsage },
    #[serde(other)]
    Other,
}

impl UsageReport for Message {
    fn usage(&self) -> Option<UsageDelta> {
        Some(
            UsageDelta::default()
                .input(self.usage.input_tokens)
                .output(self.usage.output_tokens)
                .cached(self.usage.cache_read_input_tokens.unwrap_or(0)),
        )
    }
}

impl UsageReport for StreamEvent {
    fn usage(&self) -> Option<UsageDelta> {
        match self {
            StreamEvent::MessageStart { message } => Some(
                UsageDelta::default()
                    .input(message.usage.input_tokens)
                    .cached(message.usage.cache_read_input_tokens.unwrap_or(0)),
            ),
            StreamEvent::MessageDelta { usage } => Some(UsageDelta::default().output(usage.output_tokens)),
            StreamEvent::Other => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::UsageAccumulator;
    use agentracer_types::TokenUsage;
    use serde_json::json;

    #[test]
    fn test_message_usage_includes_cache_reads() {
        let message: Message = serde_json::from_value(json!({
            "id": "msg_1",
            "type": "message",
            "model": "claude-sonnet-4",
            "content": [{ "type": "text", "text": "hello" }],
            "usage": { "input_tokens": 900, "output_tokens": 52, "cache_read_input_tokens": 800 }
        }))
        .unwrap();

        assert_eq!(message.usage().unwrap(), UsageDelta::from(TokenUsage::new(900, 52).with_cached(800)));
    }

    #[test]
    fn test_stream_events_fold_into_one_usage() {
        let events: Vec<StreamEvent> = [
            json!({ "type": "message_start", "message": { "id": "msg_1", "model": "claude", "usage": { "input_tokens": 25, "output_tokens": 1 } } }),
            json!({ "type": "content_block_start", "index": 0, "content_block": { "type": "text", "text": "" } }),
            json!({ "type": "content_block_delta", "index": 0, "delta": { "type": "text_delta", "text": "Hi" } }),
            json!({ "type": "message_delta", "delta": { "stop_reason": "end_turn" }, "usage": { "output_tokens": 15 } }),
            json!({ "type": "message_stop" }),
        ]
        .into_iter()
        .map(|event| serde_json::from_value(event).unwrap())
        .collect();

        assert!(matches!(events[1], StreamEvent::Other));

        let mut acc = UsageAccumulator::new();
        for event in &events {
            acc.observe_report(event);
        }
        assert_eq!(acc.total(), TokenUsage::new(25, 15));
    }
}
