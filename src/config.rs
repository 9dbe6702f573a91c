//! Configuration management for the claimer
//!
//! Everything is read once from the environment into an explicit `Config`
//! value. Credentials that have two accepted names are resolved primary
//! first, then fallback; blank values count as unset.

use crate::services::strategy::ExecutionStrategy;
use anyhow::Result;
use std::env;
use tracing::warn;

const DEFAULT_RPC_URL: &str = "https://polygon-rpc.com";
const DEFAULT_RELAYER_URL: &str = "https://relayer-v2.polymarket.com";
const DEFAULT_DATA_API_URL: &str = "https://data-api.polymarket.com";

/// Lower bound for the auto-claim interval, keeps the relayer from being hammered
const MIN_AUTO_CLAIM_INTERVAL_SECONDS: u64 = 30;

/// Claimer configuration loaded from environment
#[derive(Debug, Clone)]
pub struct Config {
    /// Signing key for redemptions (EOA that owns the proxy wallet)
    pub private_key: Option<String>,

    /// Wallet whose positions are claimed (proxy wallet for the relay path)
    pub wallet_address: Option<String>,

    /// Polygon RPC URL for the direct redeem path
    pub polygon_rpc_url: String,

    /// Polymarket Builder credentials (for relay service)
    pub builder_api_key: Option<String>,
    pub builder_secret: Option<String>,
    pub builder_passphrase: Option<String>,

    pub relayer_url: String,
    pub data_api_url: String,

    /// Path to SQLite database
    pub database_path: String,

    /// Auto-claim default when nothing is persisted yet
    pub auto_claim_enabled: bool,
    pub auto_claim_interval_seconds: u64,

    pub server_port: u16,

    /// Bearer token for admin routes; open when unset
    pub admin_token: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Resolve configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| non_empty(lookup(name));
        let get_either = |primary: &str, fallback: &str| get(primary).or_else(|| get(fallback));

        let private_key = get_either("POLYMARKET_PRIVATE_KEY", "PRIVATE_KEY");
        let wallet_address = get_either("POLYMARKET_WALLET_ADDRESS", "PROXY_WALLET");

        let polygon_rpc_url = get_either("POLYGON_RPC_URL", "RPC_URL")
            .unwrap_or_else(|| DEFAULT_RPC_URL.to_string());

        // Builder credentials for relay service
        let builder_api_key = get_either("POLY_BUILDER_API_KEY", "BUILDER_API_KEY");
        let builder_secret = get_either("POLY_BUILDER_SECRET", "BUILDER_SECRET");
        let builder_passphrase = get_either("POLY_BUILDER_PASSPHRASE", "BUILDER_PASS_PHRASE");

        let relayer_url = get("RELAYER_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_RELAYER_URL.to_string());
        let data_api_url = get("DATA_API_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_DATA_API_URL.to_string());

        let database_path = get("DATABASE_PATH").unwrap_or_else(|| "claims.db".to_string());

        let auto_claim_enabled = get("AUTO_CLAIM_ENABLED")
            .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false);

        let requested_interval = get("AUTO_CLAIM_INTERVAL_SECONDS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(300);
        if requested_interval < MIN_AUTO_CLAIM_INTERVAL_SECONDS {
            warn!(
                "AUTO_CLAIM_INTERVAL_SECONDS={} too low, using {}",
                requested_interval, MIN_AUTO_CLAIM_INTERVAL_SECONDS
            );
        }
        let auto_claim_interval_seconds = requested_interval.max(MIN_AUTO_CLAIM_INTERVAL_SECONDS);

        let server_port = match get("SERVER_PORT") {
            Some(v) => v
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid SERVER_PORT {}: {}", v, e))?,
            None => 3001,
        };

        let admin_token = get("ADMIN_TOKEN");

        Ok(Self {
            private_key,
            wallet_address,
            polygon_rpc_url,
            builder_api_key,
            builder_secret,
            builder_passphrase,
            relayer_url,
            data_api_url,
            database_path,
            auto_claim_enabled,
            auto_claim_interval_seconds,
            server_port,
            admin_token,
        })
    }

    /// Redemption path implied by the configured builder credentials
    pub fn execution_strategy(&self) -> ExecutionStrategy {
        ExecutionStrategy::select(
            self.builder_api_key.as_deref(),
            self.builder_secret.as_deref(),
            self.builder_passphrase.as_deref(),
        )
    }

    /// Whether a claim can run at all
    pub fn can_claim(&self) -> bool {
        self.private_key.is_some() && self.wallet_address.is_some()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
