//! # Voice Gateway - Main Application Entry Point
//!
//! WebSocket front end for a voice assistant. Small devices stream one spoken
//! utterance as raw PCM, the gateway turns it into a WAVE file, has it
//! transcribed, asks a chat model for a short answer and sends that answer back
//! as a single text message.
//!
//! ## Key Rust Concepts Used:
//! - **async/await**: Every connection is served without blocking a thread
//! - **actors**: One actix actor per WebSocket connection owns the socket
//! - **traits**: Transcription and response generation sit behind traits, so
//!   sessions can be tested with stubs
//! - **Result<T, E>**: Error handling using Rust's Result type
//!
//! ## Application Architecture:
//! - **config**: Handles application configuration (TOML files + environment variables)
//! - **audio**: Marker scanning, WAVE container assembly and temporary spooling
//! - **session**: Per-connection state machine driving one utterance to one reply
//! - **websocket**: The `/ws` endpoint and its connection actor
//! - **transcription** / **response**: Clients for the two external services
//! - **health**: Liveness endpoint
//! - **error**: Error types for each stage of a session

// Module declarations - These tell Rust about our other source files
mod audio;          // PCM handling (audio/ directory)
mod config;         // Configuration management (config.rs)
mod error;          // Error types (error.rs)
mod health;         // Health check endpoint (health.rs)
mod response;       // Reply generation (response/ directory)
mod session;        // Session state machine (session/ directory)
mod state;          // Shared application state (state.rs)
mod transcription;  // Speech recognition (transcription/ directory)
mod websocket;      // WebSocket endpoint (websocket.rs)

#[cfg(test)]
mod testing;        // Test doubles

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Result;
use crate::config::AppConfig;
use crate::state::{AppState, Collaborators};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Set once SIGTERM or SIGINT arrives.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

/// The main application entry point.
///
/// ## What this function does:
/// 1. **Loads configuration** from files and environment variables
/// 2. **Sets up logging** for debugging and monitoring
/// 3. **Builds the collaborator clients** shared by every session
/// 4. **Configures the HTTP server** with the WebSocket and health routes
/// 5. **Handles graceful shutdown** when receiving system signals
#[actix_web::main]
async fn main() -> Result<()> {
    // .ok() means "ignore errors" - it's fine if there's no .env file
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting voice-gateway v{}", env!("CARGO_PKG_VERSION"));
    info!(
        host = %config.server.host,
        port = config.server.port,
        audio = %config.audio.format(),
        transcription_model = %config.collaborators.transcription_model,
        chat_model = %config.collaborators.chat_model,
        "Configuration loaded"
    );
    if config.collaborators.api_key.is_empty() {
        warn!("No collaborator API key configured (set GROQ_API_KEY); every request will be rejected upstream");
    }

    let collaborators = Collaborators::from_config(&config)?;
    let app_state = AppState::new(config.clone(), collaborators);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    setup_signal_handlers();

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(TracingLogger::default())
            .configure(health::configure_routes)
            .configure(websocket::configure_routes)
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    // Whichever finishes first wins
    tokio::select! {
        result = server_task => {
            match result {
                Ok(server_result) => {
                    if let Err(e) = server_result {
                        error!("Server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Server task error: {}", e);
                }
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
/// - `RUST_LOG`: Controls what gets logged (e.g., "debug", "voice_gateway=trace")
/// - If not set, defaults to "voice_gateway=debug,actix_web=info"
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voice_gateway=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

/// Listen for SIGTERM and SIGINT and raise the shutdown flag.
fn setup_signal_handlers() {
    tokio::spawn(async {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
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

        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

/// Wait for the shutdown flag, polling every 100ms.
async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
