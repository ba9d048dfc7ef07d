//! Ambient, task-scoped state: the current feature tag and the active run.
//!
//! Both slots live in tokio task-locals, so a value set around a future travels
//! with that future across `.await` points and worker threads, while tasks
//! spawned from inside the scope start with nothing set. Synchronous code uses
//! the same slots through closure scopes, which restore the previous value when
//! the closure returns, returns early, or unwinds.

use std::future::Future;
use std::sync::Weak;
use tokio::task::futures::TaskLocalFuture;

use crate::run::{RunHandle, RunState};

tokio::task_local! {
    static FEATURE_TAG: Option<String>;
    static ACTIVE_RUN: Option<Weak<RunState>>;
}

/// Feature tag of the innermost active scope, if any
pub fn current_feature_tag() -> Option<String> {
    FEATURE_TAG.try_with(Clone::clone).ok().flatten()
}

/// Run whose scope is currently active on this task, if any
pub fn current_run() -> Option<RunHandle> {
    ACTIVE_RUN
        .try_with(|run| run.as_ref().and_then(Weak::upgrade))
        .ok()
        .flatten()
        .map(RunHandle::from_state)
}

/// Run `f` with `tag` as the ambient feature tag
///
/// ```rust
/// use agentracer::{current_feature_tag, feature_context};
///
/// feature_context("search", || {
///     assert_eq!(current_feature_tag().as_deref(), Some("search"));
/// });
/// assert_eq!(current_feature_tag(), None);
/// ```
pub fn feature_context<F, R>(tag: impl Into<String>, f: F) -> R
where
    F: FnOnce() -> R,
{
    FEATURE_TAG.sync_scope(Some(tag.into()), f)
}

/// Wrap `future` so that `tag` is the ambient feature tag whenever it is polled
pub fn with_feature_tag<F>(tag: impl Into<String>, future: F) -> TaskLocalFuture<Option<String>, F>
where
    F: Future,
{
    FEATURE_TAG.scope(Some(tag.into()), future)
}

/// Extension for attaching a feature tag to any future
pub trait FeatureTagExt: Future + Sized {
    fn with_feature_tag(self, tag: impl Into<String>) -> TaskLocalFuture<Option<String>, Self> {
        with_feature_tag(tag, self)
    }
}

impl<F: Future> FeatureTagExt for F {}

/// Decorate a synchronous callable so every invocation runs under `tag`
///
/// Multiple arguments can be passed as a tuple.
pub fn observe<A, R, F>(tag: impl Into<String>, f: F) -> impl Fn(A) -> R
where
    F: Fn(A) -> R,
{
    let tag = tag.into();
    move |arg| feature_context(tag.clone(), || f(arg))
}

/// Decorate a callable returning a future so every invocation runs under `tag`
pub fn observe_async<A, Fut, F>(
    tag: impl Into<String>,
    f: F,
) -> impl Fn(A) -> TaskLocalFuture<Option<String>, Fut>
where
    F: Fn(A) -> Fut,
    Fut: Future,
{
    let tag = tag.into();
    move |arg| {
        // Work done before the future is returned sees the tag as well.
        let future = feature_context(tag.clone(), || f(arg));
        with_feature_tag(tag.clone(), future)
    }
}

pub(crate) fn scope_tag_sync<F, R>(tag: Option<String>, f: F) -> R
where
    F: FnOnce() -> R,
{
    FEATURE_TAG.sync_scope(tag, f)
}

pub(crate) fn scope_tag<F: Future>(tag: Option<String>, future: F) -> TaskLocalFuture<Option<String>, F> {
    FEATURE_TAG.scope(tag, future)
}

pub(crate) fn scope_run_sync<F, R>(run: Weak<RunState>, f: F) -> R
where
    F: FnOnce() -> R,
{
    ACTIVE_RUN.sync_scope(Some(run), f)
}

pub(crate) fn scope_run<F: Future>(
    run: Weak<RunState>,
    future: F,
) -> TaskLocalFuture<Option<Weak<RunState>>, F> {
    ACTIVE_RUN.scope(Some(run), future)
}
