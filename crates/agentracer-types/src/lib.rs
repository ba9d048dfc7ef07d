pub mod endpoint;
pub mod record;
pub mod run;
pub mod usage;

pub use endpoint::Endpoint;
pub use record::TelemetryRecord;
pub use run::{RunEndEvent, RunStartEvent, RunStatus, RunStepEvent, StepType};
pub use usage::TokenUsage;

/// Feature tag reported when neither the caller nor the ambient context supplies one
pub const UNKNOWN_FEATURE_TAG: &str = "unknown";

/// Environment label used when neither the caller nor the configuration supplies one
pub const DEFAULT_ENVIRONMENT: &str = "production";

/// Provider name reported for calls that are not made through an adapter
pub const DEFAULT_PROVIDER: &str = "custom";
