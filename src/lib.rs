//! # lyricast: Audio to LRC Transcription Relay
//!
//! `lyricast` turns an audio file into timestamped lyrics in the LRC format.
//! It serves a single-page upload form, accepts the file together with a
//! caller-supplied Google AI API key, relays the audio to the Generative
//! Language API (file store + `generateContent`), and hands the generated
//! transcript back for download.
//!
//! ## Overview
//!
//! The heavy lifting happens at the provider: this service is the glue between
//! a browser form and a hosted generative model. It holds no state — every
//! request is self-contained, and the uploaded audio only ever exists as a
//! scoped temporary file that is removed again on every exit path, success or
//! failure.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for
//! the HTTP layer and [reqwest](https://github.com/seanmonstar/reqwest) for
//! the outbound provider calls.
//!
//! ### Request Flow
//!
//! A browser submits `POST /process-audio` as `multipart/form-data` with two
//! fields: `apiKey` (the caller's provider credential) and `file` (the audio
//! bytes). The handler parses the form, spools the file part to a temporary
//! file, uploads the bytes to the provider's file store, issues a single
//! `generateContent` call referencing the uploaded file plus a fixed
//! transcription prompt, and responds with `{"lrcContent": "..."}`. Any
//! parse, upload, or generation failure collapses into a single
//! `{"error": "..."}` response; details are logged server-side.
//!
//! The form itself (HTML, JS, CSS) is embedded in the binary and served for
//! every path the API does not claim.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use lyricast::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Parse CLI arguments and load configuration
//!     let args = lyricast::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     // Initialize structured logging
//!     lyricast::telemetry::init_telemetry()?;
//!
//!     // Create and start the application
//!     let app = Application::new(config)?;
//!
//!     // Run with graceful shutdown on Ctrl+C
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     }).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod config;
pub mod errors;
pub mod gemini;
mod openapi;
mod static_assets;
pub mod telemetry;

use crate::gemini::GeminiClient;
use crate::openapi::ApiDoc;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::{
    Router,
    routing::{get, post},
};
pub use config::Config;
use config::CorsOrigin;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

/// Application state shared across all request handlers.
///
/// Holds the loaded configuration and the provider client. Both are cheap to
/// clone; there is no other shared mutable state between requests.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub transcriber: GeminiClient,
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors = &config.cors;
    let has_wildcard = cors.allowed_origins.iter().any(|origin| matches!(origin, CorsOrigin::Wildcard));

    let mut layer = CorsLayer::new();
    if has_wildcard {
        // Wildcard with credentials is rejected at config validation
        layer = layer.allow_origin(tower_http::cors::Any);
    } else {
        let mut origins = Vec::new();
        for origin in &cors.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                // Origin headers carry no trailing slash
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        layer = layer.allow_origin(origins).allow_credentials(cors.allow_credentials);
    }

    if let Some(max_age) = cors.max_age {
        layer = layer.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(layer)
}

/// Build the application router with all endpoints and middleware.
///
/// This constructs the complete Axum router with:
/// - The transcription relay endpoint (with its own body limit)
/// - Embedded static asset serving for the upload form
/// - API documentation at `/docs`
/// - CORS configuration
/// - Tracing middleware
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    // Relay route with the configured upload body limit
    let max_upload_size = state.config.files.max_upload_size;
    let api_routes = Router::new()
        .route(
            "/process-audio",
            post(api::handlers::transcribe::process_audio).layer(DefaultBodyLimit::max(max_upload_size as usize)),
        )
        .with_state(state.clone());

    // Serve the embedded upload form for everything the API does not claim
    let fallback = get(api::handlers::static_assets::serve_embedded_asset);

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .merge(api_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .fallback_service(fallback);

    // Create CORS layer from config
    let cors_layer = create_cors_layer(&state.config)?;

    // Add tracing layer
    let router = router.layer(cors_layer).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Main application struct that owns the router and configuration.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] builds the provider client and router
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: When the shutdown signal resolves, in-flight requests drain and the server exits
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance
    pub fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting transcription relay with configuration: {:#?}", config);

        let transcriber = GeminiClient::new(&config.transcription);

        let state = AppState {
            config: config.clone(),
            transcriber,
        };

        let router = build_router(&state)?;

        Ok(Self { router, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Transcription relay listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        // Run the server with graceful shutdown
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn test_app() -> axum_test::TestServer {
        Application::new(Config::default())
            .expect("Failed to create application")
            .into_test_server()
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        let server = test_app();

        let response = server.get("/healthz").await;

        response.assert_status_ok();
        assert_eq!(response.text(), "OK");
    }

    #[tokio::test]
    async fn docs_are_served() {
        let server = test_app();

        let response = server.get("/docs").await;

        response.assert_status_ok();
    }

    #[tokio::test]
    async fn root_serves_the_upload_form() {
        let server = test_app();

        let response = server.get("/").await;

        response.assert_status_ok();
        assert!(response.text().contains("Audio to LRC Converter"));
    }

    #[test]
    fn cors_layer_accepts_explicit_origins() {
        let mut config = Config::default();
        config.cors.allowed_origins = vec![CorsOrigin::Url("https://app.example.com".parse().unwrap())];
        config.cors.allow_credentials = true;
        assert!(config.validate().is_ok());
        assert!(create_cors_layer(&config).is_ok());
    }
}
