//! # Call Coach Backend - Main Application Entry Point
//!
//! This is the main entry point for the call-coach-backend web server.
//! It sets up an Actix-web HTTP server that follows live sales calls: transcript
//! fragments come in, an AI model reads the conversation and answers with a
//! pulse reading, and each finished call is summarized for the dashboard.
//!
//! ## Key Rust Concepts Used:
//! - **async/await**: The entire application is asynchronous, AI round-trips never block a worker
//! - **modules**: Code is organized into separate modules (mod statements)
//! - **Result<T, E>**: Error handling using Rust's Result type
//! - **Arc & RwLock**: Thread-safe shared state management
//! - **trait objects**: The session store and AI gateway sit behind traits
//!
//! ## Application Architecture:
//! - **config**: Handles application configuration (defaults + environment variables)
//! - **state**: Manages shared application state and metrics
//! - **calls**: Call sessions, transcripts, summaries and the call lifecycle
//! - **ai**: Coaching prompts and the chat completion client
//! - **handlers**: HTTP request handlers for the call and dashboard endpoints
//! - **websocket**: Streaming transcript fragments over a WebSocket
//! - **routes**: The route table
//! - **health**: Provides system health monitoring endpoints
//! - **middleware**: Custom request processing logic (logging, metrics)
//! - **error**: Custom error types and HTTP error responses

// Module declarations - These tell Rust about our other source files
mod ai; // AI prompts, completion client and gateway (ai/ directory)
mod calls; // Call lifecycle (calls/ directory)
mod config; // Configuration management (config.rs)
mod error; // Error handling types (error.rs)
mod handlers; // HTTP request handlers (handlers/ directory)
mod health; // Health check endpoints (health.rs)
mod middleware; // Custom middleware (middleware/ directory)
mod routes; // Route table (routes.rs)
mod state; // Application state management (state.rs)
mod websocket; // Transcript streaming (websocket.rs)

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Result;
use config::AppConfig;
use state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Global shutdown signal, set once SIGTERM or SIGINT arrives.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

/// The main application entry point.
///
/// ## What this function does:
/// 1. **Loads configuration** from defaults and environment variables
/// 2. **Sets up logging** for debugging and monitoring
/// 3. **Creates shared application state**: session store, AI gateway, ledger
/// 4. **Configures the HTTP server** with middleware and routes
/// 5. **Handles graceful shutdown** when receiving system signals
///
/// ## Key Rust Concepts:
/// - `#[actix_web::main]`: This macro sets up the async runtime
/// - `?`: The question mark operator returns early if there's an error
///
/// A missing API key is not fatal: the server starts, and analyze / end-call
/// answer with an upstream error until a key is configured.
#[actix_web::main]
async fn main() -> Result<()> {
    // .ok() means "ignore errors" - it's fine if there's no .env file
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting call-coach-backend v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);
    info!("AI model: {} via {}", config.ai.model, config.ai.base_url);
    if !config.ai.has_api_key() {
        warn!("No AI API key configured (set GROQ_API_KEY); analysis and summaries will fail");
    }

    let app_state = AppState::new(config.clone());
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    setup_signal_handlers();

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        // The dashboard is served from another origin
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            // Middleware executes in reverse order for responses
            .wrap(cors)
            .wrap(TracingLogger::default())
            .wrap(middleware::MetricsMiddleware)
            .wrap(middleware::RequestLogging)
            .configure(routes::configure)
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    // Wait for either the server to finish OR a shutdown signal
    tokio::select! {
        result = server_task => {
            match result {
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task error: {}", e),
                Ok(Ok(())) => {}
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Initialize the tracing (logging) system for the application.
///
/// ## Environment Variables:
/// - `RUST_LOG`: Controls what gets logged (e.g., "debug", "call_coach_backend=trace")
/// - If not set, defaults to "call_coach_backend=debug,actix_web=info"
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "call_coach_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}

/// Set up signal handlers for graceful shutdown.
///
/// Listens for SIGTERM and SIGINT (Ctrl+C) and sets the global shutdown flag
/// when either arrives. In-flight requests finish before the server stops.
fn setup_signal_handlers() {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async {
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    error!("Failed to install signal handlers: {}", e);
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }

        // SeqCst ensures this change is visible to all threads
        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

/// Wait for the shutdown signal to be set, polling every 100ms.
async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
