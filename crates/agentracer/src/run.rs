use std::fmt::Debug;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use agentracer_types::{Endpoint, RunEndEvent, RunStartEvent, RunStatus, UNKNOWN_FEATURE_TAG};

use crate::context::{self, current_feature_tag};
use crate::global;
use crate::tracker::Tracker;

/// State shared between a running [`AgentRun`] and the ambient context
pub(crate) struct RunState {
    run_id: String,
    run_name: Option<String>,
    feature_tag: Option<String>,
    end_user_id: Option<String>,
    steps: AtomicU64,
    tracker: Arc<Tracker>,
}

impl RunState {
    fn next_step_index(&self) -> u64 {
        self.steps.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Read access to an active run, obtained through [`crate::current_run`]
#[derive(Clone)]
pub struct RunHandle {
    state: Arc<RunState>,
}

impl RunHandle {
    pub(crate) fn from_state(state: Arc<RunState>) -> Self {
        Self { state }
    }

    pub fn run_id(&self) -> &str {
        &self.state.run_id
    }

    pub fn run_name(&self) -> Option<&str> {
        self.state.run_name.as_deref()
    }

    pub fn feature_tag(&self) -> Option<&str> {
        self.state.feature_tag.as_deref()
    }

    pub fn end_user_id(&self) -> Option<&str> {
        self.state.end_user_id.as_deref()
    }

    /// Number of steps recorded so far
    pub fn step_count(&self) -> u64 {
        self.state.steps.load(Ordering::SeqCst)
    }

    /// Make this run ambient inside `future`
    ///
    /// Spawned tasks start without ambient context; wrap the spawned future
    /// to have its calls counted as steps of this run.
    pub fn instrument<F: Future>(&self, future: F) -> impl Future<Output = F::Output> {
        let tag = self.state.feature_tag.clone().or_else(current_feature_tag);
        context::scope_run(Arc::downgrade(&self.state), context::scope_tag(tag, future))
    }

    /// Allocate the next step index (1-based, unique per run)
    pub(crate) fn next_step_index(&self) -> u64 {
        self.state.next_step_index()
    }

    /// Tracker that carries this run's lifecycle and step events
    pub(crate) fn tracker(&self) -> &Arc<Tracker> {
        &self.state.tracker
    }
}

impl std::fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunHandle")
            .field("run_id", &self.state.run_id)
            .field("run_name", &self.state.run_name)
            .field("steps", &self.step_count())
            .finish()
    }
}

/// One multi-step agent execution
///
/// Building a run emits nothing. [`AgentRun::run`] and [`AgentRun::run_async`]
/// consume it: entering emits a `start` event and makes the run ambient, every
/// [`crate::track`] call inside becomes a numbered step, and leaving emits a
/// single `end` event with the outcome of the body.
///
/// ```rust,no_run
/// use agentracer::{AgentRun, TrackRequest};
///
/// # async fn example() -> Result<(), std::io::Error> {
/// AgentRun::new()
///     .with_name("support-bot")
///     .with_feature_tag("bot")
///     .run_async(async {
///         agentracer::track(TrackRequest::new("gpt-4o", 120, 40, 830.0));
///         Ok::<_, std::io::Error>(())
///     })
///     .await
/// # }
/// ```
pub struct AgentRun {
    run_id: String,
    run_name: Option<String>,
    feature_tag: Option<String>,
    end_user_id: Option<String>,
    tracker: Option<Arc<Tracker>>,
}

impl AgentRun {
    pub fn new() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            run_name: None,
            feature_tag: None,
            end_user_id: None,
            tracker: None,
        }
    }

    /// Use a caller-supplied identifier instead of a random one
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.run_name = Some(name.into());
        self
    }

    /// Feature tag made ambient for the duration of the run
    pub fn with_feature_tag(mut self, tag: impl Into<String>) -> Self {
        self.feature_tag = Some(tag.into());
        self
    }

    pub fn with_end_user_id(mut self, end_user_id: impl Into<String>) -> Self {
        self.end_user_id = Some(end_user_id.into());
        self
    }

    /// Emit through `tracker` instead of the process-wide one
    pub fn with_tracker(mut self, tracker: Arc<Tracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Execute a synchronous body inside the run scope
    ///
    /// The body's result is returned untouched; an `Err` marks the run failed.
    pub fn run<T, E, F>(self, body: F) -> Result<T, E>
    where
        E: Debug,
        F: FnOnce() -> Result<T, E>,
    {
        let (mut scope, tag) = self.enter();
        let run = Arc::downgrade(&scope.state);

        let result = context::scope_run_sync(run, || context::scope_tag_sync(tag, body));

        scope.exit(&result);
        result
    }

    /// Execute an asynchronous body inside the run scope
    ///
    /// Same bookkeeping as [`AgentRun::run`]. Dropping the returned future
    /// before it completes closes the run as failed with kind `cancelled`.
    pub async fn run_async<T, E, Fut>(self, body: Fut) -> Result<T, E>
    where
        E: Debug,
        Fut: Future<Output = Result<T, E>>,
    {
        let (mut scope, tag) = self.enter();
        let run = Arc::downgrade(&scope.state);

        let result = context::scope_run(run, context::scope_tag(tag, body)).await;

        scope.exit(&result);
        result
    }

    fn enter(self) -> (RunScope, Option<String>) {
        let tracker = self.tracker.unwrap_or_else(global::global);
        let feature_tag = self.feature_tag.or_else(current_feature_tag);

        let state = Arc::new(RunState {
            run_id: self.run_id,
            run_name: self.run_name,
            feature_tag: feature_tag.clone(),
            end_user_id: self.end_user_id,
            steps: AtomicU64::new(0),
            tracker,
        });

        tracing::debug!(target: "agentracer", run_id = %state.run_id, "agent run started");
        state.tracker.dispatcher().send(
            Endpoint::RunStart,
            &RunStartEvent {
                run_id: state.run_id.clone(),
                run_name: state.run_name.clone(),
                feature_tag: feature_tag
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_FEATURE_TAG.to_string()),
                end_user_id: state.end_user_id.clone(),
            },
        );

        (RunScope { state, closed: false }, feature_tag)
    }
}

impl Default for AgentRun {
    fn default() -> Self {
        Self::new()
    }
}

/// Exit bookkeeping shared by the sync and async entry points
struct RunScope {
    state: Arc<RunState>,
    closed: bool,
}

impl RunScope {
    fn exit<T, E: Debug>(&mut self, result: &Result<T, E>) {
        match result {
            Ok(_) => self.close(RunStatus::Completed, None),
            Err(e) => self.close(RunStatus::Failed, Some(error_kind_of(e))),
        }
    }

    fn close(&mut self, status: RunStatus, error_type: Option<String>) {
        if self.closed {
            return;
        }
        self.closed = true;

        tracing::debug!(
            target: "agentracer",
            run_id = %self.state.run_id,
            %status,
            steps = self.state.steps.load(Ordering::SeqCst),
            "agent run ended"
        );
        self.state.tracker.dispatcher().send(
            Endpoint::RunEnd,
            &RunEndEvent {
                run_id: self.state.run_id.clone(),
                status,
                error_type,
            },
        );
    }
}

impl Drop for RunScope {
    fn drop(&mut self) {
        if !self.closed {
            let kind = if std::thread::panicking() { "panic" } else { "cancelled" };
            self.close(RunStatus::Failed, Some(kind.to_string()));
        }
    }
}

/// Smart pointers looked through when naming an error type
const POINTERS: &[&str] = &["Box", "Arc", "Rc"];

/// Concrete types that hide the error they carry
const ERASED: &[&str] = &["anyhow::Error", "eyre::Report"];

/// Name of an error type without its module path or generic arguments
///
/// `my_app::errors::RateLimited` becomes `RateLimited`, and so does
/// `Box<RateLimited>`. Type-erased errors such as `Box<dyn Error>` only yield
/// the trait or wrapper name here; use [`error_kind_of`] when a value is at hand.
pub fn error_kind<E: ?Sized>() -> String {
    classify(std::any::type_name::<E>()).0.to_string()
}

/// Kind of an error value
///
/// Same as [`error_kind`] for concrete types. For type-erased errors
/// (`Box<dyn Error>`, `anyhow::Error`) the kind is read from the leading type
/// name of the value's `Debug` output, which forwards to the wrapped error.
pub fn error_kind_of<E: Debug + ?Sized>(error: &E) -> String {
    let (kind, erased) = classify(std::any::type_name::<E>());
    if erased {
        if let Some(inner) = debug_kind(error) {
            return inner;
        }
    }
    kind.to_string()
}

/// Short type name plus whether the concrete error is hidden behind it
fn classify(type_name: &str) -> (&str, bool) {
    let mut name = type_name.trim();
    loop {
        name = name.trim_start_matches('&').trim_start();
        if let Some(rest) = name.strip_prefix("mut ") {
            name = rest;
            continue;
        }
        let Some((path, args)) = name.split_once('<') else {
            break;
        };
        if !POINTERS.contains(&last_segment(path)) {
            break;
        }
        name = first_generic_arg(args);
    }

    if let Some(bound) = name.strip_prefix("dyn ") {
        let path = bound.split(['+', '<', ' ']).next().unwrap_or(bound);
        return (last_segment(path), true);
    }

    let path = name.split('<').next().unwrap_or(name);
    (last_segment(path), ERASED.contains(&path))
}

fn last_segment(path: &str) -> &str {
    let path = path.trim();
    path.rsplit("::").next().unwrap_or(path)
}

/// First top-level argument of a generic list, given the text after its `<`
fn first_generic_arg(args: &str) -> &str {
    let mut depth = 0usize;
    for (i, c) in args.char_indices() {
        match c {
            '<' => depth += 1,
            '>' if depth == 0 => return args[..i].trim(),
            '>' => depth -= 1,
            ',' if depth == 0 => return args[..i].trim(),
            _ => {}
        }
    }
    args.trim()
}

/// Leading type name of a `Debug` rendering, if it starts with one
fn debug_kind<E: Debug + ?Sized>(error: &E) -> Option<String> {
    let rendered = format!("{:#?}", error);
    let ident_len = rendered
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(rendered.len());
    let (ident, rest) = rendered.split_at(ident_len);

    let is_type_name = ident.chars().next().is_some_and(char::is_uppercase);
    let ends_cleanly = rest.is_empty() || rest.starts_with([' ', '(', '{', '\n']);
    (is_type_name && ends_cleanly).then(|| ident.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[derive(Debug)]
    struct ToolFailure;

    impl std::fmt::Display for ToolFailure {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "tool failed")
        }
    }

    impl std::error::Error for ToolFailure {}

    #[derive(Debug)]
    enum Wrapped<T> {
        #[allow(dead_code)]
        Inner(T),
    }

    #[derive(Debug)]
    struct Timeout {
        after_ms: u64,
    }

    impl std::fmt::Display for Timeout {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "timed out after {}ms", self.after_ms)
        }
    }

    impl std::error::Error for Timeout {}

    fn state() -> Arc<RunState> {
        Arc::new(RunState {
            run_id: "run-1".to_string(),
            run_name: None,
            feature_tag: None,
            end_user_id: None,
            steps: AtomicU64::new(0),
            tracker: Arc::new(Tracker::unconfigured(crate::TrackerConfig::default())),
        })
    }

    #[test]
    fn test_error_kind_strips_path_and_generics() {
        assert_eq!(error_kind::<ToolFailure>(), "ToolFailure");
        assert_eq!(error_kind::<Wrapped<ToolFailure>>(), "Wrapped");
        assert_eq!(error_kind::<std::io::Error>(), "Error");
        assert_eq!(error_kind_of(&ToolFailure), "ToolFailure");
    }

    #[test]
    fn test_error_kind_looks_through_pointers() {
        assert_eq!(error_kind::<Box<ToolFailure>>(), "ToolFailure");
        assert_eq!(error_kind::<&Arc<ToolFailure>>(), "ToolFailure");
        assert_eq!(error_kind::<Box<Wrapped<ToolFailure>>>(), "Wrapped");
        assert_eq!(error_kind_of(&Arc::new(Timeout { after_ms: 5 })), "Timeout");
    }

    #[test]
    fn test_error_kind_of_type_erased_errors() {
        let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(ToolFailure);
        assert_eq!(error_kind_of(&boxed), "ToolFailure");

        let boxed: Box<dyn std::error::Error> = Box::new(Timeout { after_ms: 30 });
        assert_eq!(error_kind_of(&boxed), "Timeout");

        assert_eq!(error_kind_of(&anyhow::Error::new(ToolFailure)), "ToolFailure");
        assert_eq!(error_kind_of(&anyhow::Error::new(Timeout { after_ms: 1 })), "Timeout");
    }

    #[test]
    fn test_error_kind_of_falls_back_to_wrapper_name() {
        assert_eq!(error_kind_of(&anyhow::anyhow!("upstream refused the request")), "Error");

        let message: Box<dyn std::error::Error> = "plain message".into();
        assert_eq!(error_kind_of(&message), "Error");
    }

    #[test]
    fn test_step_indices_start_at_one() {
        let handle = RunHandle::from_state(state());

        assert_eq!(handle.step_count(), 0);
        assert_eq!(handle.next_step_index(), 1);
        assert_eq!(handle.next_step_index(), 2);
        assert_eq!(handle.step_count(), 2);
    }

    #[test]
    fn test_concurrent_step_allocation_is_unique() {
        let handle = RunHandle::from_state(state());

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let handle = handle.clone();
                std::thread::spawn(move || (0..100).map(|_| handle.next_step_index()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for thread in threads {
            for index in thread.join().unwrap() {
                assert!(seen.insert(index), "step index {} issued twice", index);
            }
        }

        assert_eq!(seen.len(), 800);
        assert_eq!(seen.iter().max(), Some(&800));
        assert_eq!(handle.step_count(), 800);
    }

    #[test]
    fn test_builder_keeps_supplied_run_id() {
        let run = AgentRun::new().with_run_id("run-fixed").with_name("demo");

        assert_eq!(run.run_id(), "run-fixed");
        assert_ne!(AgentRun::new().run_id(), AgentRun::new().run_id());
    }
}
