//! Instrumentation helpers for provider SDK calls
//!
//! The core [`agentracer::track`] API takes measured figures; this crate does
//! the measuring. Wrap a request future with [`track_call`] or a streaming
//! response with [`track_stream`] and the latency, token usage and outcome are
//! reported automatically, attributed to the feature tag that was ambient when
//! the [`CallSite`] was created.
//!
//! Usage is read through the [`UsageReport`] trait, implemented here for the
//! response and stream-chunk shapes of the OpenAI, Anthropic and Gemini APIs.
//!
//! ```rust,no_run
//! use agentracer_adapters::{openai, track_call, CallSite};
//!
//! # async fn send() -> Result<openai::ChatCompletion, std::io::Error> { unimplemented!() }
//! # async fn example() -> Result<(), std::io::Error> {
//! let _completion = track_call(CallSite::new("openai", "gpt-4o"), send()).await?;
//! # Ok(())
//! # }
//! ```

pub mod anthropic;
pub mod call;
pub mod gemini;
pub mod openai;
pub mod usage;

pub use call::{track_call, track_stream, CallSite};
pub use usage::{UsageAccumulator, UsageDelta, UsageReport};
