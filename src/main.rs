//! Civic Incidents Backend
//!
//! REST backend for reporting, browsing and analysing civic incidents, with
//! SQLite persistence, Google Maps routing and Gemini-powered AI flows.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod flows;
mod geo;
mod models;
mod services;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::Repository;
use services::{GeminiClient, MapsClient};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub maps: Arc<MapsClient>,
    pub gemini: Arc<GeminiClient>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Civic Incidents Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (CIVIC_API_PSK). Authentication is disabled!");
    }
    if config.maps.api_key.is_none() {
        tracing::warn!("GOOGLE_MAPS_API_KEY is not set. Places, directions and geocoding are disabled");
    }
    if config.gemini.api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY is not set. AI features are disabled");
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;

    let state = AppState {
        repo: Arc::new(Repository::new(pool)),
        maps: Arc::new(MapsClient::new(&config.maps)?),
        gemini: Arc::new(GeminiClient::new(&config.gemini)?),
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let psk = state.config.api_psk.clone();

    let api_routes = Router::new()
        // Incidents
        .route(
            "/incidents",
            get(api::list_incidents).post(api::create_incident),
        )
        .route(
            "/incidents/{id}",
            get(api::get_incident).delete(api::delete_incident),
        )
        .route("/incidents/{id}/upvote", post(api::upvote_incident))
        .route(
            "/incidents/{id}/comments",
            get(api::list_comments).post(api::add_comment),
        )
        // Reports and AI flows
        .route(
            "/reports",
            post(api::submit_report).layer(DefaultBodyLimit::max(flows::MAX_MEDIA_REQUEST_BYTES)),
        )
        .route(
            "/ai/analyze",
            post(api::analyze_media).layer(DefaultBodyLimit::max(flows::MAX_MEDIA_REQUEST_BYTES)),
        )
        .route("/ai/route-alerts", post(api::route_alerts))
        .route("/ai/trends", get(api::trends))
        .route("/ai/speech", post(api::speech))
        .route("/live-incidents", get(api::live_incidents))
        .route("/analytics", get(api::analytics))
        // Maps
        .route("/places/autocomplete", get(api::autocomplete))
        .route("/places/nearby", get(api::nearby_places))
        .route("/places/{place_id}", get(api::place_details))
        .route("/geocode/reverse", get(api::reverse_geocode))
        .route("/directions", get(api::directions))
        .route("/client-config", get(api::client_config))
        // Apply PSK auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
