//! Server binary.
//!
//! Recipe wiring for the library: load config, register routes, bind the
//! listener, install signal handlers, serve until shutdown.

use std::path::PathBuf;
use std::sync::Arc;

use axum::http::Method;
use axum::Json;
use clap::Parser;
use tokio::net::TcpListener;

use task_host::config::loader;
use task_host::lifecycle::signals;
use task_host::observability::{logging, metrics};
use task_host::routing::handler::{HandlerError, RequestContext, ResponseWriter};
use task_host::{HttpServer, RouteRegistry, Shutdown};

#[derive(Parser)]
#[command(name = "task-host")]
#[command(about = "HTTP server hosting request-scoped cancellable tasks", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => loader::load_config(path)?,
        None => loader::load_default()?,
    };

    tracing::info!(
        bind_address = %config.listener.bind_address,
        drain_timeout_secs = config.shutdown.drain_timeout_secs,
        "configuration loaded"
    );

    if config.observability.metrics_enabled {
        // Validation guaranteed the address parses.
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        }
    }

    let registry = build_routes()?;

    let shutdown = Arc::new(Shutdown::new());
    signals::install(Arc::clone(&shutdown));

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "listening for connections");

    let server = HttpServer::new(config, registry);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("shutdown complete");
    Ok(())
}

/// Demo routes exercising the request-task adapter.
fn build_routes() -> Result<RouteRegistry, Box<dyn std::error::Error>> {
    let mut registry = RouteRegistry::new();

    registry.register([Method::GET], "/", hello_world)?;
    registry.register([Method::GET], "/hello", hello)?;
    registry.register([Method::POST], "/echo", echo)?;

    Ok(registry)
}

async fn hello_world(
    _ctx: RequestContext,
    mut writer: ResponseWriter,
) -> Result<(), HandlerError> {
    writer.send(Json(serde_json::json!({ "message": "Hello, World!" })))?;
    Ok(())
}

async fn hello(_ctx: RequestContext, mut writer: ResponseWriter) -> Result<(), HandlerError> {
    writer.send(Json(serde_json::json!({ "message": "Hello, Hello!" })))?;
    Ok(())
}

/// Echo the request body back, capped at 1 MiB.
async fn echo(mut ctx: RequestContext, mut writer: ResponseWriter) -> Result<(), HandlerError> {
    let body = axum::body::to_bytes(ctx.take_body(), 1024 * 1024)
        .await
        .map_err(HandlerError::other)?;
    writer.send(body)?;
    Ok(())
}
