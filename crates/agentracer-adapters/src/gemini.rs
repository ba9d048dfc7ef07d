//! Gemini `generateContent` usage metadata
//!
//! Streamed chunks repeat cumulative counts, so the last chunk wins.

use serde::{Deserialize, Serialize};

use crate::usage::{UsageDelta, UsageReport};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u64,
    #[serde(default)]
    pub candidates_token_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_content_token_count: Option<u64>,
    #[serde(default)]
    pub total_token_count: u64,
}

/// Response body (or one streamed chunk) of `generateContent`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

impl UsageReport for UsageMetadata {
    fn usage(&self) -> Option<UsageDelta> {
        Some(
            UsageDelta::default()
                .input(self.prompt_token_count)
                .output(self.candidates_token_count)
                .cached(self.cached_content_token_count.unwrap_or(0)),
        )
    }
}

impl UsageReport for GenerateContentResponse {
    fn usage(&self) -> Option<UsageDelta> {
        self.usage_metadata.usage()
    }
}
