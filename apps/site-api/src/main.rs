//! Consulting site API
//!
//! Thin server endpoints behind the marketing site's landing pages:
//!
//! - File uploads proxied to blob storage
//! - Feedback, document-intake and survey submissions persisted to the KV store
//! - The AI chat assistant (chat completion plus optional web search)
//! - Exchange rates for the currency converter
//! - Service catalog and locale routing
//!
//! ## Architecture
//!
//! Every upstream collaborator sits behind a trait in [`backends`]. When its
//! credentials are missing the server falls back to a local stand-in, so the
//! API can run without any hosted service.

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use clap::Parser;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{self, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod backends;
mod config;
mod error;
mod locale;
mod state;

use config::Args;
use error::ApiError;
use state::AppState;

/// Room for a full 10MB file; larger bodies are refused before the handler runs
const UPLOAD_BODY_LIMIT: usize = intake_core::MAX_FILE_SIZE as usize + 1024 * 1024;

/// Unexpected handler failures become a generic 500 JSON body
fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("handler panicked");
    ApiError::Internal(detail.to_string()).into_response()
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(api::handle_health))
        // API endpoints
        .route(
            "/api/upload",
            post(api::handle_upload).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/submit", post(api::handle_submit))
        .route("/api/submit-survey", post(api::handle_submit_survey))
        .route("/api/chat", post(api::handle_chat))
        .route("/api/exchange-rate", get(api::handle_exchange_rate))
        .route("/api/services", get(api::handle_list_services))
        .route("/api/services/fields", get(api::handle_service_fields))
        // Objects kept by the in-memory blob store
        .route("/blobs/*pathname", get(api::handle_blob))
        // Locale pages
        .route("/", get(api::handle_root))
        .route("/:locale", get(api::handle_locale_home))
        .route("/:locale/services", get(api::handle_locale_services))
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting site API on {}:{}", args.host, args.port);

    let state = AppState::from_args(&args)?;

    // Create rate limiter configuration
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(args.rate_limit.into())
            .burst_size(args.rate_limit * 2)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limit: {}", args.rate_limit))?,
    );

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(cors::Any)
        .allow_methods(cors::Any)
        .allow_headers(cors::Any);

    let app = router(state)
        .layer(GovernorLayer {
            config: governor_conf,
        })
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Rate limit: {} requests/second per IP", args.rate_limit);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
