use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::{Builder, Handle};

use agentracer_types::Endpoint;

use crate::config::TrackerConfig;
use crate::transport::{Transport, TransportError, SEND_TIMEOUT};

/// Non-blocking, best-effort delivery of telemetry payloads
///
/// Inside a tokio runtime the transmission is spawned as a detached task on
/// that runtime; anywhere else it runs on a detached background thread. The
/// caller never waits and never sees a transmission error.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    active: bool,
    debug: bool,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, config: &TrackerConfig) -> Self {
        Self {
            transport,
            active: config.is_active(),
            debug: config.debug,
        }
    }

    /// Whether payloads leave the process at all
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Fire-and-forget `payload` to `endpoint`
    pub fn send<T>(&self, endpoint: Endpoint, payload: &T)
    where
        T: Serialize + ?Sized,
    {
        if !self.active {
            return;
        }

        let body = match serde_json::to_value(payload) {
            Ok(body) => body,
            Err(e) => {
                report_failure(self.debug, endpoint, &TransportError::from(e));
                return;
            }
        };

        if self.debug {
            tracing::info!(target: "agentracer", %endpoint, payload = %body, "dispatching telemetry");
        }

        let transport = Arc::clone(&self.transport);
        let debug = self.debug;
        spawn_detached(async move {
            let outcome = match tokio::time::timeout(SEND_TIMEOUT, transport.post(endpoint, body)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout(SEND_TIMEOUT)),
            };

            if let Err(e) = outcome {
                report_failure(debug, endpoint, &e);
            }
        });
    }
}

/// Run `task` to completion without the caller ever waiting on it
fn spawn_detached<F>(task: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(handle) = Handle::try_current() {
        // The JoinHandle is dropped on purpose: nobody awaits telemetry.
        handle.spawn(task);
        return;
    }

    let spawned = std::thread::Builder::new()
        .name("agentracer-dispatch".to_string())
        .spawn(move || match Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime.block_on(task),
            Err(e) => {
                tracing::trace!(target: "agentracer", "Failed to build dispatch runtime: {}", e);
            }
        });

    if let Err(e) = spawned {
        tracing::trace!(target: "agentracer", "Failed to spawn dispatch thread: {}", e);
    }
}

fn report_failure(debug: bool, endpoint: Endpoint, error: &TransportError) {
    if debug {
        tracing::warn!(target: "agentracer", %endpoint, "Failed to send telemetry: {}", error);
    } else {
        tracing::trace!(target: "agentracer", %endpoint, "Failed to send telemetry: {}", error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use async_trait::async_trait;
    use serde::Serializer;
    use serde_json::{json, Value};
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tracing_subscriber::fmt::MakeWriter;

    /// Log sink shared between a test and its subscriber
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            let bytes = self.0.lock().unwrap();
            String::from_utf8_lossy(&bytes).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn logs_while(debug: bool, payload: Value) -> (String, MemoryTransport) {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .finish();

        let transport = MemoryTransport::new();
        let dispatcher = Dispatcher::new(Arc::new(transport.clone()), &config().with_debug(debug));
        tracing::subscriber::with_default(subscriber, || {
            dispatcher.send(Endpoint::Ingest, &payload);
        });

        (logs.contents(), transport)
    }

    struct FailingTransport {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl Transport for FailingTransport {
        async fn post(&self, _endpoint: Endpoint, _body: Value) -> Result<(), TransportError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::Other(anyhow::anyhow!("connection refused")))
        }
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("refused"))
        }
    }

    fn config() -> TrackerConfig {
        TrackerConfig::new("key-123", "proj-1")
    }

    #[tokio::test]
    async fn test_runtime_path_delivers() {
        let transport = MemoryTransport::new();
        let dispatcher = Dispatcher::new(Arc::new(transport.clone()), &config());

        dispatcher.send(Endpoint::Ingest, &json!({ "model": "gpt-4o" }));

        assert!(transport.wait_for(1, Duration::from_secs(1)).await);
        assert_eq!(transport.bodies(Endpoint::Ingest), vec![json!({ "model": "gpt-4o" })]);
    }

    #[test]
    fn test_send_from_block_on_uses_that_runtime() {
        let transport = MemoryTransport::new();
        let dispatcher = Dispatcher::new(Arc::new(transport.clone()), &config());

        let delivered = tokio_test::block_on(async {
            dispatcher.send(Endpoint::RunStep, &json!({ "step_index": 1 }));
            transport.wait_for(1, Duration::from_secs(1)).await
        });

        assert!(delivered);
    }

    #[test]
    fn test_thread_path_delivers_without_runtime() {
        assert!(Handle::try_current().is_err());

        let transport = MemoryTransport::new();
        let dispatcher = Dispatcher::new(Arc::new(transport.clone()), &config());

        dispatcher.send(Endpoint::RunStart, &json!({ "run_id": "run-1" }));

        assert!(transport.wait_for_blocking(1, Duration::from_secs(2)));
        assert_eq!(transport.sent()[0].0, Endpoint::RunStart);
    }

    #[tokio::test]
    async fn test_disabled_sends_nothing() {
        let transport = MemoryTransport::new();
        let dispatcher = Dispatcher::new(Arc::new(transport.clone()), &config().with_enabled(false));

        dispatcher.send(Endpoint::Ingest, &json!({}));

        assert!(!dispatcher.is_active());
        assert!(!transport.wait_for(1, Duration::from_millis(50)).await);
    }

    #[tokio::test]
    async fn test_missing_credential_sends_nothing() {
        let transport = MemoryTransport::new();
        let dispatcher = Dispatcher::new(Arc::new(transport.clone()), &TrackerConfig::default());

        dispatcher.send(Endpoint::Ingest, &json!({}));

        assert!(!transport.wait_for(1, Duration::from_millis(50)).await);
    }

    #[tokio::test]
    async fn test_transport_failures_are_swallowed() {
        let transport = Arc::new(FailingTransport {
            attempts: AtomicUsize::new(0),
        });
        let dispatcher = Dispatcher::new(transport.clone(), &config().with_debug(true));

        dispatcher.send(Endpoint::Ingest, &json!({}));
        dispatcher.send(Endpoint::RunEnd, &json!({}));

        for _ in 0..100 {
            if transport.attempts.load(Ordering::SeqCst) == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_serialization_failure_is_swallowed() {
        let transport = MemoryTransport::new();
        let dispatcher = Dispatcher::new(Arc::new(transport.clone()), &config());

        dispatcher.send(Endpoint::Ingest, &Unserializable);

        assert!(!transport.wait_for(1, Duration::from_millis(50)).await);
    }

    #[test]
    fn test_debug_mode_logs_payload_before_sending() {
        let (logs, transport) = logs_while(true, json!({ "model": "gpt-4o-debug" }));

        assert!(logs.contains("INFO"), "unexpected logs: {}", logs);
        assert!(logs.contains("dispatching telemetry"));
        assert!(logs.contains("gpt-4o-debug"));
        assert!(logs.contains("/api/ingest"));
        assert!(transport.wait_for_blocking(1, Duration::from_secs(2)));
    }

    #[test]
    fn test_payload_not_logged_without_debug() {
        let (logs, transport) = logs_while(false, json!({ "model": "gpt-4o-quiet" }));

        assert!(!logs.contains("gpt-4o-quiet"), "unexpected logs: {}", logs);
        assert!(transport.wait_for_blocking(1, Duration::from_secs(2)));
    }
}
