//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::field::{Field, Visit};
use tracing::Level;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

use task_host::{HttpServer, RouteRegistry, ServerConfig, Shutdown, TaskGroup};

/// A server bound to an ephemeral port, running in the background.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Arc<Shutdown>,
    pub tasks: Arc<TaskGroup>,
}

/// Start a server with the default config on an ephemeral port.
pub async fn start_server(registry: RouteRegistry) -> TestServer {
    start_server_with_config(ServerConfig::default(), registry).await
}

#[allow(dead_code)]
pub async fn start_server_with_config(
    config: ServerConfig,
    registry: RouteRegistry,
) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Arc::new(Shutdown::new());
    let server = HttpServer::new(config, registry);
    let tasks = server.task_group();
    let shutdown_rx = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, shutdown_rx).await;
    });

    TestServer {
        addr,
        shutdown,
        tasks,
    }
}

pub fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{addr}{path}")
}

/// Poll `predicate` until it holds or the timeout elapses.
pub async fn wait_until<F: Fn() -> bool>(predicate: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    predicate()
}

/// One captured log event, flattened to text for assertions.
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub text: String,
}

/// Tracing layer that records every event emitted on the test thread.
///
/// Tests run on the current-thread runtime, so events from spawned
/// request-tasks land on the same thread and are captured too.
#[derive(Clone, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl LogCapture {
    /// Install this capture as the thread-default subscriber. Keep the guard
    /// alive for the duration of the test.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::registry().with(self.clone());
        tracing::subscriber::set_default(subscriber)
    }

    pub fn warnings(&self) -> Vec<CapturedEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.level == Level::WARN)
            .cloned()
            .collect()
    }

    #[allow(dead_code)]
    pub fn warnings_containing(&self, needle: &str) -> usize {
        self.warnings()
            .iter()
            .filter(|event| event.text.contains(needle))
            .count()
    }
}

impl<S: tracing::Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = TextVisitor::default();
        event.record(&mut visitor);
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            text: visitor.0,
        });
    }
}

#[derive(Default)]
struct TextVisitor(String);

impl Visit for TextVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        use std::fmt::Write;
        let _ = write!(self.0, "{}={:?} ", field.name(), value);
    }
}
