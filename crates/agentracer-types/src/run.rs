use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal status of an agent run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Completed => f.write_str("completed"),
            RunStatus::Failed => f.write_str("failed"),
        }
    }
}

/// Kind of work a run step represents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    #[default]
    LlmCall,
    ToolCall,
}

/// Posted to `/api/runs/start` when a run scope is entered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStartEvent {
    pub run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_name: Option<String>,
    pub feature_tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_user_id: Option<String>,
}

/// Posted to `/api/runs/step` for every call attributed to an active run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStepEvent {
    pub run_id: String,
    pub step_index: u64,
    #[serde(default)]
    pub step_type: StepType,
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
    pub tool_name: Option<String>,
    #[serde(default)]
    pub is_retry: bool,
}

/// Posted to `/api/runs/end` exactly once when a run scope is left
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEndEvent {
    pub run_id: String,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_value(RunStatus::Completed).unwrap(), json!("completed"));
        assert_eq!(serde_json::to_value(RunStatus::Failed).unwrap(), json!("failed"));
        assert_eq!(RunStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn test_step_type_defaults_to_llm_call() {
        assert_eq!(StepType::default(), StepType::LlmCall);
        assert_eq!(serde_json::to_value(StepType::LlmCall).unwrap(), json!("llm_call"));
        assert_eq!(serde_json::to_value(StepType::ToolCall).unwrap(), json!("tool_call"));
    }

    #[test]
    fn test_end_event_omits_error_when_completed() {
        let event = RunEndEvent {
            run_id: "run-1".to_string(),
            status: RunStatus::Completed,
            error_type: None,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json, json!({ "run_id": "run-1", "status": "completed" }));
    }

    #[test]
    fn test_step_event_parses_minimal_body() {
        let body = json!({
            "run_id": "run-1",
            "step_index": 2,
            "provider": "anthropic",
            "model": "claude-sonnet",
            "feature_tag": "bot",
            "input_tokens": 10,
            "output_tokens": 5,
            "latency_ms": 50.0,
            "success": true
        });

        let event: RunStepEvent = serde_json::from_value(body).unwrap();
        assert_eq!(event.step_type, StepType::LlmCall);
        assert_eq!(event.cached_tokens, 0);
        assert!(!event.is_retry);
        assert!(event.tool_name.is_none());
    }
}
