//! Axum server setup and configuration

use crate::api::routes;
use crate::services::ClaimService;
use crate::{Config, Database};
use anyhow::Result;
use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub config: Arc<Config>,
    pub claims: Arc<ClaimService>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self> {
        let db = Arc::new(Database::new(&config.database_path).await?);
        let config = Arc::new(config);
        let claims = Arc::new(ClaimService::from_config(config.clone(), db.clone()));

        Ok(Self { db, config, claims })
    }

    /// State around an existing claim service
    pub fn from_service(claims: Arc<ClaimService>) -> Self {
        Self {
            db: claims.db().clone(),
            config: Arc::new(claims.config().clone()),
            claims,
        }
    }
}

/// Create the Axum application with all routes
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let api_routes = Router::new()
        .route("/claims/status", get(routes::claims::get_status))
        .route("/claims/history", get(routes::claims::get_history))
        .route("/claims/run", post(routes::claims::run_claim))
        .route("/claims/auto", post(routes::claims::set_auto_claim));

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
