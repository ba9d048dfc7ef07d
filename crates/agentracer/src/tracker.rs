use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use agentracer_types::Endpoint;

use crate::config::TrackerConfig;
use crate::dispatch::Dispatcher;
use crate::run::AgentRun;
use crate::transport::{HttpTransport, Transport, TransportError};

/// A configuration bundle together with the dispatcher it feeds
///
/// The process-wide instance is managed by [`crate::init`]; independent
/// instances are handy when telemetry must go through a custom [`Transport`].
pub struct Tracker {
    config: TrackerConfig,
    dispatcher: Dispatcher,
}

impl Tracker {
    /// Create a tracker that posts to `config.host` over HTTP
    pub fn new(config: TrackerConfig) -> anyhow::Result<Self> {
        let transport = HttpTransport::new(config.api_key.clone(), config.host.clone())?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: TrackerConfig, transport: Arc<dyn Transport>) -> Self {
        let dispatcher = Dispatcher::new(transport, &config);
        Self { config, dispatcher }
    }

    /// Tracker standing in before [`crate::init`]; it never transmits
    pub(crate) fn unconfigured(config: TrackerConfig) -> Self {
        Self::with_transport(config, Arc::new(Discard))
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Start building a run whose lifecycle events go through this tracker
    pub fn agent_run(self: &Arc<Self>) -> AgentRun {
        AgentRun::new().with_tracker(Arc::clone(self))
    }
}

struct Discard;

#[async_trait]
impl Transport for Discard {
    async fn post(&self, _endpoint: Endpoint, _body: Value) -> Result<(), TransportError> {
        Ok(())
    }
}
