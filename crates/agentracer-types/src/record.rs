use serde::{Deserialize, Serialize};

/// Telemetry for a single LLM invocation, posted to [`Endpoint::Ingest`](crate::Endpoint::Ingest)
///
/// Constructed, transmitted and discarded; never persisted locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub project_id: String,
    pub provider: String,
    pub model: String,
    pub feature_tag: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default)]
    pub cached_tokens: u64,
    pub latency_ms: f64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_index: Option<u64>,
    pub environment: String,
}
