use agentracer_types::{
    Endpoint, RunStepEvent, StepType, TelemetryRecord, TokenUsage, DEFAULT_ENVIRONMENT,
    DEFAULT_PROVIDER, UNKNOWN_FEATURE_TAG,
};

use crate::context::{current_feature_tag, current_run};
use crate::tracker::Tracker;

/// Measured outcome of one LLM call, with optional overrides
#[derive(Debug, Clone, PartialEq)]
pub struct TrackRequest {
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub latency_ms: f64,
    pub cached_tokens: u64,
    /// Overrides the ambient feature tag
    pub feature_tag: Option<String>,
    /// Overrides the configured environment label
    pub environment: Option<String>,
    pub provider: String,
    pub success: bool,
    pub error_type: Option<String>,
    pub end_user_id: Option<String>,
    /// Attributes the call to a run explicitly; disables ambient run attachment
    pub run_id: Option<String>,
    pub step_index: Option<u64>,
    pub step_type: StepType,
    pub tool_name: Option<String>,
    pub is_retry: bool,
}

impl TrackRequest {
    pub fn new(model: impl Into<String>, input_tokens: u64, output_tokens: u64, latency_ms: f64) -> Self {
        Self {
            model: model.into(),
            input_tokens,
            output_tokens,
            latency_ms,
            cached_tokens: 0,
            feature_tag: None,
            environment: None,
            provider: DEFAULT_PROVIDER.to_string(),
            success: true,
            error_type: None,
            end_user_id: None,
            run_id: None,
            step_index: None,
            step_type: StepType::LlmCall,
            tool_name: None,
            is_retry: false,
        }
    }

    pub fn usage(mut self, usage: TokenUsage) -> Self {
        self.input_tokens = usage.input_tokens;
        self.output_tokens = usage.output_tokens;
        self.cached_tokens = usage.cached_tokens;
        self
    }

    pub fn cached_tokens(mut self, tokens: u64) -> Self {
        self.cached_tokens = tokens;
        self
    }

    pub fn feature_tag(mut self, tag: impl Into<String>) -> Self {
        self.feature_tag = Some(tag.into());
        self
    }

    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    /// Mark the call as failed with the given error kind
    pub fn failed(mut self, error_type: impl Into<String>) -> Self {
        self.success = false;
        self.error_type = Some(error_type.into());
        self
    }

    pub fn end_user_id(mut self, end_user_id: impl Into<String>) -> Self {
        self.end_user_id = Some(end_user_id.into());
        self
    }

    pub fn run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn step_index(mut self, index: u64) -> Self {
        self.step_index = Some(index);
        self
    }

    pub fn step_type(mut self, step_type: StepType) -> Self {
        self.step_type = step_type;
        self
    }

    pub fn tool_name(mut self, name: impl Into<String>) -> Self {
        self.tool_name = Some(name.into());
        self
    }

    pub fn retry(mut self, is_retry: bool) -> Self {
        self.is_retry = is_retry;
        self
    }
}

impl Tracker {
    /// Report one completed LLM call through this tracker
    ///
    /// Without an explicit `run_id`, a call made inside an active run becomes
    /// that run's next step: the step counter advances, and a run-step event is
    /// sent alongside the generic record. The step event always goes through
    /// the run's own tracker so a run's timeline stays in one place. Nothing
    /// here blocks or fails; when disabled only the step counter moves.
    pub fn track(&self, request: TrackRequest) {
        let step = match request.run_id {
            Some(_) => None,
            None => current_run().map(|run| {
                let index = run.next_step_index();
                (run, index)
            }),
        };

        let step_active = step
            .as_ref()
            .is_some_and(|(run, _)| run.tracker().dispatcher().is_active());
        if !self.dispatcher().is_active() && !step_active {
            return;
        }

        let feature_tag = request
            .feature_tag
            .or_else(current_feature_tag)
            .unwrap_or_else(|| UNKNOWN_FEATURE_TAG.to_string());
        let environment = request
            .environment
            .or_else(|| Some(self.config().environment.clone()).filter(|env| !env.is_empty()))
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());
        let end_user_id = request
            .end_user_id
            .or_else(|| step.as_ref().and_then(|(run, _)| run.end_user_id().map(str::to_string)));
        let (run_id, step_index) = match &step {
            Some((run, index)) => (Some(run.run_id().to_string()), Some(*index)),
            None => (request.run_id, request.step_index),
        };

        let record = TelemetryRecord {
            project_id: self.config().project_id.clone(),
            provider: request.provider,
            model: request.model,
            feature_tag,
            input_tokens: request.input_tokens,
            output_tokens: request.output_tokens,
            cached_tokens: request.cached_tokens,
            latency_ms: request.latency_ms,
            success: request.success,
            error_type: request.error_type,
            end_user_id,
            run_id,
            step_index,
            environment,
        };

        if let Some((run, index)) = step {
            run.tracker().dispatcher().send(
                Endpoint::RunStep,
                &RunStepEvent {
                    run_id: run.run_id().to_string(),
                    step_index: index,
                    step_type: request.step_type,
                    provider: record.provider.clone(),
                    model: record.model.clone(),
                    feature_tag: record.feature_tag.clone(),
                    input_tokens: record.input_tokens,
                    output_tokens: record.output_tokens,
                    cached_tokens: record.cached_tokens,
                    latency_ms: record.latency_ms,
                    success: record.success,
                    error_type: record.error_type.clone(),
                    tool_name: request.tool_name,
                    is_retry: request.is_retry,
                },
            );
        }

        self.dispatcher().send(Endpoint::Ingest, &record);
    }
}
