//! OpenAI chat completion usage
//!
//! Streaming completions only report usage when the request opts in with
//! `stream_options.include_usage`; [`include_stream_usage`] sets it.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::usage::{UsageDelta, UsageReport};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens_details: Option<PromptTokensDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTokensDetails {
    #[serde(default)]
    pub cached_tokens: u64,
}

/// Non-streaming response body, reduced to what telemetry needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub usage: Option<CompletionUsage>,
}

/// One `chat.completion.chunk`; only the final chunk carries usage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub usage: Option<CompletionUsage>,
}

impl UsageReport for CompletionUsage {
    fn usage(&self) -> Option<UsageDelta> {
        let cached = self
            .prompt_tokens_details
            .as_ref()
            .map(|details| details.cached_tokens)
            .unwrap_or(0);
        Some(
            UsageDelta::default()
                .input(self.prompt_tokens)
                .output(self.completion_tokens)
                .cached(cached),
        )
    }
}

impl UsageReport for ChatCompletion {
    fn usage(&self) -> Option<UsageDelta> {
        self.usage.usage()
    }
}

impl UsageReport for ChatCompletionChunk {
    fn usage(&self) -> Option<UsageDelta> {
        self.usage.usage()
    }
}

/// Ask for a usage chunk at the end of a streaming request
///
/// Leaves non-streaming requests and other `stream_options` keys alone.
pub fn include_stream_usage(request: &mut Value) {
    let streaming = request.get("stream").and_then(Value::as_bool).unwrap_or(false);
    let Some(body) = request.as_object_mut().filter(|_| streaming) else {
        return;
    };

    let options = body.entry("stream_options").or_insert_with(|| json!({}));
    if let Some(options) = options.as_object_mut() {
        options.insert("include_usage".to_string(), Value::Bool(true));
    } else {
        *options = json!({ "include_usage": true });
    }
}
