use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::config::TrackerConfig;
use crate::context::current_run;
use crate::track::TrackRequest;
use crate::tracker::Tracker;

static GLOBAL: RwLock<Option<Arc<Tracker>>> = RwLock::new(None);
static UNCONFIGURED: OnceLock<Arc<Tracker>> = OnceLock::new();

/// Configure the process-wide tracker
///
/// Replaces any previous configuration as a whole; the last call wins.
/// Never fails: if the HTTP client cannot be built the configuration is still
/// installed, but nothing will be transmitted.
pub fn init(config: TrackerConfig) {
    let tracker = match Tracker::new(config.clone()) {
        Ok(tracker) => tracker,
        Err(e) => {
            tracing::error!(target: "agentracer", "Failed to create telemetry transport: {}", e);
            Tracker::unconfigured(config)
        }
    };
    set_global(tracker);
}

/// Install a pre-built tracker as the process-wide one
pub fn set_global(tracker: Tracker) {
    let mut slot = GLOBAL.write().unwrap_or_else(PoisonError::into_inner);
    *slot = Some(Arc::new(tracker));
}

/// Current process-wide tracker
///
/// Before [`init`] this is an unconfigured tracker that transmits nothing.
pub fn global() -> Arc<Tracker> {
    let slot = GLOBAL.read().unwrap_or_else(PoisonError::into_inner);
    match slot.as_ref() {
        Some(tracker) => Arc::clone(tracker),
        None => Arc::clone(
            UNCONFIGURED.get_or_init(|| Arc::new(Tracker::unconfigured(TrackerConfig::default()))),
        ),
    }
}

/// Snapshot of the process-wide configuration
pub fn current_config() -> TrackerConfig {
    global().config().clone()
}

/// Report one completed LLM call
///
/// Inside an active run (and without an explicit `run_id`) the call goes
/// through the tracker that run was started with; otherwise through the
/// process-wide one. See [`Tracker::track`].
pub fn track(request: TrackRequest) {
    let run_tracker = match request.run_id {
        Some(_) => None,
        None => current_run().map(|run| Arc::clone(run.tracker())),
    };
    run_tracker.unwrap_or_else(global).track(request)
}
