//! # agentracer
//!
//! Non-blocking telemetry for applications that call LLM provider APIs.
//!
//! - [`track`] reports one LLM call (tokens, latency, success) to the ingestion API
//! - [`feature_context`] / [`with_feature_tag`] attach a feature tag to every call
//!   made inside a scope, sync or async
//! - [`AgentRun`] groups the calls of one multi-step agent execution into an
//!   ordered, numbered run
//!
//! Delivery is fire-and-forget: nothing here blocks the caller or returns a
//! transmission error.
//!
//! ```rust,no_run
//! use agentracer::{feature_context, TrackRequest, TrackerConfig};
//!
//! agentracer::init(TrackerConfig::new("tracker-key", "proj-1"));
//!
//! feature_context("search", || {
//!     // ... call the provider, measure it ...
//!     agentracer::track(TrackRequest::new("gpt-4o", 512, 64, 740.0).provider("openai"));
//! });
//! ```

pub mod config;
pub mod context;
pub mod dispatch;
pub mod global;
pub mod run;
pub mod track;
pub mod tracker;
pub mod transport;

pub use config::TrackerConfig;
pub use context::{
    current_feature_tag, current_run, feature_context, observe, observe_async, with_feature_tag,
    FeatureTagExt,
};
pub use dispatch::Dispatcher;
pub use global::{current_config, global, init, set_global, track};
pub use run::{error_kind, error_kind_of, AgentRun, RunHandle};
pub use track::TrackRequest;
pub use tracker::Tracker;
pub use transport::{HttpTransport, MemoryTransport, Transport, TransportError};

pub use agentracer_types as types;
pub use agentracer_types::{
    Endpoint, RunEndEvent, RunStartEvent, RunStatus, RunStepEvent, StepType, TelemetryRecord,
    TokenUsage,
};
