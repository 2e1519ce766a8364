//! HTTP server setup.
//!
//! # Responsibilities
//! - Compile the route registry into the Axum dispatch table
//! - Wire up middleware (tracing, optional CORS)
//! - Own the task group that scopes every request-task
//! - Serve with graceful shutdown: stop accepting, cancel outstanding
//!   request-tasks, drain
//!
//! # Design Decisions
//! - The dispatch table is built once at startup and never mutated
//! - The task group is closed the moment the shutdown signal fires, so
//!   connection draining never waits on a request-task that would only stop
//!   when cancelled

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Request;
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::routing::{get, MethodRouter};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::schema::ServerConfig;
use crate::http::dispatch::dispatch;
use crate::routing::registry::{method_filter, RouteRegistry};
use crate::task::TaskGroup;

/// HTTP server hosting request-scoped tasks.
pub struct HttpServer {
    app: Router,
    config: ServerConfig,
    tasks: Arc<TaskGroup>,
    route_count: usize,
}

impl HttpServer {
    /// Build a server from a validated config and a populated registry.
    pub fn new(config: ServerConfig, registry: RouteRegistry) -> Self {
        let tasks = Arc::new(TaskGroup::new());
        let route_count = registry.len();
        let app = Self::build_router(&config, registry, Arc::clone(&tasks));
        Self {
            app,
            config,
            tasks,
            route_count,
        }
    }

    /// The task group scoping this server's request-tasks.
    pub fn task_group(&self) -> Arc<TaskGroup> {
        Arc::clone(&self.tasks)
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Compile the registry into the Axum router.
    fn build_router(config: &ServerConfig, registry: RouteRegistry, tasks: Arc<TaskGroup>) -> Router {
        let has_health = registry.has_path("/health");

        let mut by_path: HashMap<String, MethodRouter> = HashMap::new();
        for route in registry.into_routes() {
            // Registration rejected methods without a filter.
            let Some(filter) = method_filter(route.method()) else {
                continue;
            };
            let path = route.path().to_string();
            let route = Arc::new(route);
            let tasks = Arc::clone(&tasks);
            let handler = move |request: Request| {
                let tasks = Arc::clone(&tasks);
                let route = Arc::clone(&route);
                async move { dispatch(tasks, route, request).await }
            };

            let method_router = match by_path.remove(&path) {
                Some(existing) => existing.on(filter, handler),
                None => MethodRouter::new().on(filter, handler),
            };
            by_path.insert(path, method_router);
        }

        let mut router = Router::new();
        for (path, method_router) in by_path {
            router = router.route(&path, method_router);
        }

        if !has_health {
            let tasks = Arc::clone(&tasks);
            let health = move || {
                let tasks = Arc::clone(&tasks);
                async move {
                    Json(serde_json::json!({
                        "status": "ok",
                        "in_flight": tasks.active_count(),
                    }))
                }
            };
            router = router.route("/health", get(health));
        }

        let router = router.layer(TraceLayer::new_for_http());

        match cors_layer(config) {
            Some(cors) => router.layer(cors),
            None => router,
        }
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Returns after the shutdown broadcast fires and the task group has
    /// drained.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> std::io::Result<()> {
        let Self {
            app,
            config,
            tasks,
            route_count,
        } = self;

        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = route_count,
            "HTTP server starting"
        );

        let graceful = {
            let tasks = Arc::clone(&tasks);
            async move {
                let _ = shutdown.recv().await;
                tracing::info!("shutdown signal received; closing request-task scope");
                // Cancelling now lets in-flight dispatches resolve instead of
                // holding connection draining hostage to their tasks.
                tasks.close();
            }
        };

        axum::serve(listener, app)
            .with_graceful_shutdown(graceful)
            .await?;

        tasks
            .shutdown(Duration::from_secs(config.shutdown.drain_timeout_secs))
            .await;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the CORS layer from config, mirroring the allowed origin, methods,
/// and headers a browser client needs.
fn cors_layer(config: &ServerConfig) -> Option<CorsLayer> {
    if !config.cors.enabled {
        return None;
    }

    let origin = match config.cors.allowed_origin.parse::<HeaderValue>() {
        Ok(origin) => origin,
        Err(error) => {
            tracing::error!(
                origin = %config.cors.allowed_origin,
                error = %error,
                "invalid CORS origin; CORS layer not installed"
            );
            return None;
        }
    };

    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([
                header::CONTENT_TYPE,
                header::AUTHORIZATION,
                HeaderName::from_static("x-requested-with"),
            ])
            .allow_credentials(true)
            .max_age(Duration::from_secs(86_400)),
    )
}
