use futures::{Stream, StreamExt};
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use agentracer::{current_feature_tag, error_kind_of, TrackRequest, Tracker};
use agentracer_types::TokenUsage;

use crate::usage::{UsageAccumulator, UsageReport};

/// Where an instrumented call goes and how it is attributed
///
/// The ambient feature tag is captured when the call site is created, so a
/// stream consumed later is still reported under the tag of its request.
#[derive(Clone)]
pub struct CallSite {
    provider: String,
    model: String,
    feature_tag: Option<String>,
    tracker: Option<Arc<Tracker>>,
}

impl CallSite {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            feature_tag: current_feature_tag(),
            tracker: None,
        }
    }

    /// Report under `tag` regardless of the ambient one
    pub fn with_feature_tag(mut self, tag: impl Into<String>) -> Self {
        self.feature_tag = Some(tag.into());
        self
    }

    /// Report through `tracker` instead of the ambient run's or the process-wide one
    pub fn with_tracker(mut self, tracker: Arc<Tracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn feature_tag(&self) -> Option<&str> {
        self.feature_tag.as_deref()
    }

    fn report(&self, usage: TokenUsage, started: Instant, error_type: Option<String>) {
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        let mut request = TrackRequest::new(self.model.clone(), 0, 0, latency_ms)
            .usage(usage)
            .provider(self.provider.clone());
        if let Some(tag) = &self.feature_tag {
            request = request.feature_tag(tag.clone());
        }
        if let Some(kind) = error_type {
            request = request.failed(kind);
        }

        tracing::trace!(
            target: "agentracer",
            provider = %self.provider,
            model = %self.model,
            latency_ms,
            "instrumented call finished"
        );

        match &self.tracker {
            Some(tracker) => tracker.track(request),
            None => agentracer::track(request),
        }
    }
}

impl std::fmt::Debug for CallSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallSite")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("feature_tag", &self.feature_tag)
            .finish()
    }
}

/// Await `call`, report it, and hand back its result untouched
///
/// A successful response is reported with the usage it carries; an error is
/// reported as a failure named after the error type, with zero tokens.
pub async fn track_call<T, E, Fut>(site: CallSite, call: Fut) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
    T: UsageReport,
    E: Debug,
{
    let started = Instant::now();
    let result = call.await;

    match &result {
        Ok(response) => {
            let mut usage = UsageAccumulator::new();
            usage.observe_report(response);
            site.report(usage.total(), started, None);
        }
        Err(e) => site.report(TokenUsage::default(), started, Some(error_kind_of(e))),
    }

    result
}

/// Pass every item of `stream` through, reporting the call once it is exhausted
///
/// Usage is folded from the chunks as they go by. If any item was an error the
/// call is reported as failed. A stream dropped before its end is not reported.
pub fn track_stream<S, T, E>(site: CallSite, stream: S) -> impl Stream<Item = Result<T, E>>
where
    S: Stream<Item = Result<T, E>>,
    T: UsageReport,
    E: Debug,
{
    let started = Instant::now();

    async_stream::stream! {
        let mut stream = Box::pin(stream);
        let mut usage = UsageAccumulator::new();
        let mut failure = None;

        while let Some(item) = stream.next().await {
            match &item {
                Ok(chunk) => usage.observe_report(chunk),
                Err(e) => failure = Some(error_kind_of(e)),
            }
            yield item;
        }

        site.report(usage.total(), started, failure);
    }
}
