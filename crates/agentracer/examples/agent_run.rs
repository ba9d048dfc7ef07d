//! Run with `AGENTRACER_API_KEY=... AGENTRACER_PROJECT_ID=... cargo run --example agent_run`.
//! Without a key the tracker stays inactive and the example only logs locally.

use std::time::{Duration, Instant};

use agentracer::{current_run, feature_context, AgentRun, StepType, TrackRequest, TrackerConfig};
use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug)]
struct ToolFailure;

impl std::fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tool failed")
    }
}

impl std::error::Error for ToolFailure {}

async fn fake_llm_call(prompt: &str) -> (u64, u64) {
    tokio::time::sleep(Duration::from_millis(30)).await;
    (prompt.len() as u64 * 3, 42)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,agentracer=debug"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = TrackerConfig::load()
        .context("Failed to load configuration")?
        .with_debug(true);
    tracing::info!("Tracker active: {}", config.is_active());
    agentracer::init(config);

    // A single call outside any run
    feature_context("classify", || {
        agentracer::track(TrackRequest::new("gpt-4o-mini", 80, 3, 120.0).provider("openai"));
    });

    let result = AgentRun::new()
        .with_name("research-agent")
        .with_feature_tag("research")
        .with_end_user_id("user-42")
        .run_async(async {
            for prompt in ["plan the search", "summarize findings"] {
                let started = Instant::now();
                let (input, output) = fake_llm_call(prompt).await;
                agentracer::track(
                    TrackRequest::new("claude-sonnet", input, output, started.elapsed().as_secs_f64() * 1000.0)
                        .provider("anthropic"),
                );
            }

            agentracer::track(
                TrackRequest::new("web_search", 0, 0, 12.0)
                    .step_type(StepType::ToolCall)
                    .tool_name("web_search"),
            );

            if let Some(run) = current_run() {
                tracing::info!("Run {} recorded {} steps", run.run_id(), run.step_count());
            }
            Ok::<_, ToolFailure>("done")
        })
        .await;

    tracing::info!("Run finished: {:?}", result);

    // Give in-flight telemetry a moment before the runtime shuts down
    tokio::time::sleep(Duration::from_millis(500)).await;
    Ok(())
}
