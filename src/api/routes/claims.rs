//! Claim status and admin endpoints

use crate::api::server::AppState;
use crate::error::ClaimError;
use crate::types::{ClaimRun, ClaimTrigger};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

const DEFAULT_HISTORY_LIMIT: i64 = 20;
const MAX_HISTORY_LIMIT: i64 = 100;

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: error.into() }))
}

/// Current claimer state
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub strategy: &'static str,
    pub wallet_address: Option<String>,
    pub auto_claim_enabled: bool,
    pub interval_seconds: u64,
    pub running: bool,
    pub last_run: Option<ClaimRun>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AutoClaimRequest {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoClaimResponse {
    pub auto_claim_enabled: bool,
}

/// Admin routes are open when no ADMIN_TOKEN is configured
fn require_admin(
    state: &AppState,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<(), ApiError> {
    let Some(expected) = state.config.admin_token.as_deref() else {
        return Ok(());
    };

    match auth {
        Some(TypedHeader(auth)) if auth.token() == expected => Ok(()),
        Some(_) => Err(api_error(StatusCode::UNAUTHORIZED, "Invalid admin token")),
        None => Err(api_error(StatusCode::UNAUTHORIZED, "Missing admin token")),
    }
}

pub async fn get_status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let last_run = state.db.last_claim_run().await.map_err(|e| {
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Database error: {}", e),
        )
    })?;

    Ok(Json(StatusResponse {
        strategy: state.claims.strategy_name(),
        wallet_address: state.config.wallet_address.clone(),
        auto_claim_enabled: state.claims.auto_claim_enabled().await,
        interval_seconds: state.config.auto_claim_interval_seconds,
        running: state.claims.is_running(),
        last_run,
    }))
}

pub async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ClaimRun>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    let runs = state.db.recent_claim_runs(limit).await.map_err(|e| {
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Database error: {}", e),
        )
    })?;

    Ok(Json(runs))
}

/// Run a manual claim and return the recorded run
pub async fn run_claim(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<Json<ClaimRun>, ApiError> {
    require_admin(&state, auth)?;

    match state.claims.run_claim(ClaimTrigger::Manual).await {
        Ok(run) => Ok(Json(run)),
        Err(ClaimError::AlreadyRunning) => Err(api_error(
            StatusCode::CONFLICT,
            ClaimError::AlreadyRunning.to_string(),
        )),
        Err(e) => {
            warn!("[API] Manual claim failed: {}", e);
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

pub async fn set_auto_claim(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Json(req): Json<AutoClaimRequest>,
) -> Result<Json<AutoClaimResponse>, ApiError> {
    require_admin(&state, auth)?;

    state.claims.set_auto_claim(req.enabled).await.map_err(|e| {
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Database error: {}", e),
        )
    })?;

    Ok(Json(AutoClaimResponse {
        auto_claim_enabled: req.enabled,
    }))
}

#[cfg(test)]
mod tests {
    use crate::api::{create_app, AppState};
    use crate::error::Result;
    use crate::services::{ClaimService, PositionSource};
    use crate::types::Position;
    use crate::{Config, Database};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct NoPositions;

    #[async_trait]
    impl PositionSource for NoPositions {
        async fn get_positions(&self, _address: &str, _limit: usize) -> Result<Vec<Position>> {
            Ok(vec![])
        }
    }

    async fn app(vars: &[(&str, &str)]) -> Router {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let config = Arc::new(Config::from_lookup(|name| map.get(name).cloned()).unwrap());
        let db = Arc::new(Database::new("sqlite::memory:").await.unwrap());
        let service = Arc::new(ClaimService::new(config, db, Arc::new(NoPositions)));
        create_app(AppState::from_service(service))
    }

    fn claimable() -> Vec<(&'static str, &'static str)> {
        vec![
            (
                "POLYMARKET_PRIVATE_KEY",
                "0x0101010101010101010101010101010101010101010101010101010101010101",
            ),
            ("POLYMARKET_WALLET_ADDRESS", "0x1111111111111111111111111111111111111111"),
            ("ADMIN_TOKEN", "s3cret"),
        ]
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post(uri: &str, token: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(&[]).await.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_status_defaults() {
        let response = app(&claimable()).await.oneshot(get("/api/claims/status")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["strategy"], "direct");
        assert_eq!(body["walletAddress"], "0x1111111111111111111111111111111111111111");
        assert_eq!(body["autoClaimEnabled"], false);
        assert_eq!(body["intervalSeconds"], 300);
        assert_eq!(body["running"], false);
        assert!(body["lastRun"].is_null());
    }

    #[tokio::test]
    async fn test_run_requires_admin_token() {
        let app = app(&claimable()).await;

        let missing = app.clone().oneshot(post("/api/claims/run", None, "")).await.unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let wrong = app
            .oneshot(post("/api/claims/run", Some("nope"), ""))
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(wrong).await["error"], "Invalid admin token");
    }

    #[tokio::test]
    async fn test_manual_run_then_history() {
        let app = app(&claimable()).await;

        let response = app
            .clone()
            .oneshot(post("/api/claims/run", Some("s3cret"), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let run = json_body(response).await;
        assert_eq!(run["trigger"], "manual");
        assert_eq!(run["result"]["claimed"], 0);
        assert!(run["error"].is_null());

        let history = json_body(
            app.clone()
                .oneshot(get("/api/claims/history?limit=500"))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(history.as_array().unwrap().len(), 1);
        assert_eq!(history[0]["id"], run["id"]);

        let status = json_body(app.oneshot(get("/api/claims/status")).await.unwrap()).await;
        assert_eq!(status["lastRun"]["id"], run["id"]);
    }

    #[tokio::test]
    async fn test_toggle_auto_claim() {
        let app = app(&claimable()).await;

        let response = app
            .clone()
            .oneshot(post("/api/claims/auto", Some("s3cret"), r#"{"enabled":true}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["autoClaimEnabled"], true);

        let status = json_body(app.oneshot(get("/api/claims/status")).await.unwrap()).await;
        assert_eq!(status["autoClaimEnabled"], true);
    }

    #[tokio::test]
    async fn test_open_admin_without_token() {
        let response = app(&[])
            .await
            .oneshot(post("/api/claims/auto", None, r#"{"enabled":false}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
