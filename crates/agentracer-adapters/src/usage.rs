use agentracer_types::TokenUsage;

/// Token figures carried by one response or stream chunk
///
/// Providers spread usage over several stream events, so every field is
/// optional: `None` means "this chunk says nothing about it".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageDelta {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub cached_tokens: Option<u64>,
}

impl UsageDelta {
    pub fn input(mut self, tokens: u64) -> Self {
        self.input_tokens = Some(tokens);
        self
    }

    pub fn output(mut self, tokens: u64) -> Self {
        self.output_tokens = Some(tokens);
        self
    }

    pub fn cached(mut self, tokens: u64) -> Self {
        self.cached_tokens = Some(tokens);
        self
    }
}

impl From<TokenUsage> for UsageDelta {
    fn from(usage: TokenUsage) -> Self {
        Self {
            input_tokens: Some(usage.input_tokens),
            output_tokens: Some(usage.output_tokens),
            cached_tokens: Some(usage.cached_tokens),
        }
    }
}

/// Anything that may carry token usage
pub trait UsageReport {
    fn usage(&self) -> Option<UsageDelta>;
}

impl UsageReport for TokenUsage {
    fn usage(&self) -> Option<UsageDelta> {
        Some((*self).into())
    }
}

impl<T: UsageReport + ?Sized> UsageReport for &T {
    fn usage(&self) -> Option<UsageDelta> {
        (**self).usage()
    }
}

impl<T: UsageReport + ?Sized> UsageReport for Box<T> {
    fn usage(&self) -> Option<UsageDelta> {
        (**self).usage()
    }
}

impl<T: UsageReport> UsageReport for Option<T> {
    fn usage(&self) -> Option<UsageDelta> {
        self.as_ref().and_then(UsageReport::usage)
    }
}

/// Folds the usage of a stream of chunks into a single [`TokenUsage`]
///
/// Providers report running totals, so the last value seen for each field wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsageAccumulator {
    latest: UsageDelta,
}

impl UsageAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, delta: UsageDelta) {
        if delta.input_tokens.is_some() {
            self.latest.input_tokens = delta.input_tokens;
        }
        if delta.output_tokens.is_some() {
            self.latest.output_tokens = delta.output_tokens;
        }
        if delta.cached_tokens.is_some() {
            self.latest.cached_tokens = delta.cached_tokens;
        }
    }

    pub fn observe_report<R: UsageReport + ?Sized>(&mut self, report: &R) {
        if let Some(delta) = report.usage() {
            self.observe(delta);
        }
    }

    pub fn total(&self) -> TokenUsage {
        TokenUsage::new(
            self.latest.input_tokens.unwrap_or(0),
            self.latest.output_tokens.unwrap_or(0),
        )
        .with_cached(self.latest.cached_tokens.unwrap_or(0))
    }
}
