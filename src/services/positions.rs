//! Position discovery
//!
//! The reconciler only sees the `PositionSource` trait; the Data API client
//! below is the production implementation.

use crate::error::{ClaimError, Result};
use crate::types::Position;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Upper bound on positions fetched per claim run
pub const POSITION_FETCH_LIMIT: usize = 200;

/// Anything that can list a wallet's current positions.
///
/// Transport failures must come back as `Err`, never as an empty list, so a
/// dead data source is not mistaken for "nothing to claim".
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn get_positions(&self, address: &str, limit: usize) -> Result<Vec<Position>>;
}

/// Polymarket Data API `/positions` client
#[derive(Clone)]
pub struct DataApiPositions {
    client: reqwest::Client,
    base_url: String,
}

impl DataApiPositions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl PositionSource for DataApiPositions {
    async fn get_positions(&self, address: &str, limit: usize) -> Result<Vec<Position>> {
        let url = format!("{}/positions", self.base_url);
        let limit = limit.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[("user", address), ("limit", limit.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClaimError::PositionSource {
                status: status.as_u16(),
                body,
            });
        }

        let positions: Vec<Position> = response.json().await?;
        debug!(
            "[Positions] {} positions for {}",
            positions.len(),
            crate::services::condition::short_id(address)
        );
        Ok(positions)
    }
}
