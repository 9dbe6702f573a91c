//! Claim runs: guard, persistence, and the auto-claim scheduler
//!
//! At most one run is active per process. Manual, CLI, and scheduled runs all
//! go through `run_claim`, which records every attempt in the run history.

use crate::config::Config;
use crate::db::{Database, AUTO_CLAIM_ENABLED_KEY};
use crate::error::{ClaimError, Result};
use crate::services::positions::{DataApiPositions, PositionSource};
use crate::services::reconciler::{ClaimReconciler, ReconcilerSettings};
use crate::types::{ClaimRun, ClaimTrigger};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub struct ClaimService {
    config: Arc<Config>,
    db: Arc<Database>,
    reconciler: ClaimReconciler,
    run_lock: Mutex<()>,
}

impl ClaimService {
    pub fn new(config: Arc<Config>, db: Arc<Database>, source: Arc<dyn PositionSource>) -> Self {
        let reconciler = ClaimReconciler::new(source, ReconcilerSettings::from(&*config));
        Self {
            config,
            db,
            reconciler,
            run_lock: Mutex::new(()),
        }
    }

    /// Service backed by the Polymarket Data API
    pub fn from_config(config: Arc<Config>, db: Arc<Database>) -> Self {
        let source = Arc::new(DataApiPositions::new(config.data_api_url.clone()));
        Self::new(config, db, source)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn strategy_name(&self) -> &'static str {
        self.reconciler.strategy().name()
    }

    pub fn is_running(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }

    /// Run one reconciliation and record it.
    ///
    /// Only `AlreadyRunning` comes back as an error; run-fatal failures are
    /// recorded on the returned `ClaimRun`.
    pub async fn run_claim(&self, trigger: ClaimTrigger) -> Result<ClaimRun> {
        let _guard = self.run_lock.try_lock().map_err(|_| ClaimError::AlreadyRunning)?;

        info!("[ClaimService] Starting {} claim run", trigger);
        let started_at = Utc::now();
        let outcome = self.execute().await;
        let finished_at = Utc::now();

        let run = match outcome {
            Ok(result) => ClaimRun {
                id: Uuid::new_v4(),
                trigger,
                strategy: Some(self.strategy_name().to_string()),
                started_at,
                finished_at,
                result: Some(result),
                error: None,
            },
            Err(e) => {
                let strategy = match e {
                    ClaimError::Config(_) => None,
                    _ => Some(self.strategy_name().to_string()),
                };
                error!("[ClaimService] {} claim run failed: {}", trigger, e);
                ClaimRun {
                    id: Uuid::new_v4(),
                    trigger,
                    strategy,
                    started_at,
                    finished_at,
                    result: None,
                    error: Some(e.to_string()),
                }
            }
        };

        if let Err(e) = self.db.record_claim_run(&run).await {
            warn!("[ClaimService] Failed to record claim run {}: {:#}", run.id, e);
        }

        Ok(run)
    }

    async fn execute(&self) -> Result<crate::types::ClaimResult> {
        let private_key = self
            .config
            .private_key
            .as_deref()
            .ok_or_else(|| ClaimError::config("POLYMARKET_PRIVATE_KEY is not set"))?;
        let wallet_address = self
            .config
            .wallet_address
            .as_deref()
            .ok_or_else(|| ClaimError::config("POLYMARKET_WALLET_ADDRESS is not set"))?;

        self.reconciler.claim_winnings(private_key, wallet_address).await
    }

    /// Persisted toggle, falling back to the environment default
    pub async fn auto_claim_enabled(&self) -> bool {
        match self.db.get_bool_setting(AUTO_CLAIM_ENABLED_KEY).await {
            Ok(Some(enabled)) => enabled,
            Ok(None) => self.config.auto_claim_enabled,
            Err(e) => {
                warn!("[ClaimService] Failed to read auto-claim setting: {:#}", e);
                self.config.auto_claim_enabled
            }
        }
    }

    pub async fn set_auto_claim(&self, enabled: bool) -> anyhow::Result<()> {
        self.db
            .set_setting(AUTO_CLAIM_ENABLED_KEY, if enabled { "true" } else { "false" })
            .await?;
        info!(
            "[ClaimService] Auto-claim {}",
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    /// One scheduler tick. Returns the run when one happened.
    pub async fn scheduled_tick(&self) -> Option<ClaimRun> {
        if !self.auto_claim_enabled().await {
            debug!("[ClaimService] Auto-claim disabled, skipping tick");
            return None;
        }

        match self.run_claim(ClaimTrigger::Scheduled).await {
            Ok(run) => Some(run),
            Err(ClaimError::AlreadyRunning) => {
                debug!("[ClaimService] Claim run in progress, skipping tick");
                None
            }
            Err(e) => {
                warn!("[ClaimService] Scheduled claim failed: {}", e);
                None
            }
        }
    }

    /// Tick forever at the configured interval
    pub async fn run_scheduler(self: Arc<Self>) {
        let interval = Duration::from_secs(self.config.auto_claim_interval_seconds);
        info!(
            "[ClaimService] Scheduler started, interval {}s",
            interval.as_secs()
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if let Some(run) = self.scheduled_tick().await {
                match &run.result {
                    Some(result) if !result.is_empty() => {
                        info!("[ClaimService] Scheduled run: {}", result)
                    }
                    Some(_) => debug!("[ClaimService] Scheduled run: nothing to claim"),
                    None => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Position;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use tokio::sync::Notify;

    const TEST_KEY: &str = "0x0101010101010101010101010101010101010101010101010101010101010101";

    fn config(vars: &[(&str, &str)]) -> Arc<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Arc::new(Config::from_lookup(|name| map.get(name).cloned()).unwrap())
    }

    fn claimable_config() -> Arc<Config> {
        config(&[
            ("POLYMARKET_PRIVATE_KEY", TEST_KEY),
            ("POLYMARKET_WALLET_ADDRESS", "0x1111111111111111111111111111111111111111"),
            ("POLYGON_RPC_URL", "http://127.0.0.1:9"),
        ])
    }

    struct StaticSource(Vec<Position>);

    #[async_trait]
    impl PositionSource for StaticSource {
        async fn get_positions(&self, _address: &str, _limit: usize) -> Result<Vec<Position>> {
            Ok(self.0.clone())
        }
    }

    struct DownSource;

    #[async_trait]
    impl PositionSource for DownSource {
        async fn get_positions(&self, _address: &str, _limit: usize) -> Result<Vec<Position>> {
            Err(ClaimError::PositionSource {
                status: 502,
                body: "bad gateway".to_string(),
            })
        }
    }

    /// Blocks until released so a run can be held open
    struct GatedSource {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl PositionSource for GatedSource {
        async fn get_positions(&self, _address: &str, _limit: usize) -> Result<Vec<Position>> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(vec![])
        }
    }

    async fn service(config: Arc<Config>, source: Arc<dyn PositionSource>) -> ClaimService {
        let db = Arc::new(Database::new("sqlite::memory:").await.unwrap());
        ClaimService::new(config, db, source)
    }

    #[tokio::test]
    async fn test_empty_run_recorded() {
        let svc = service(claimable_config(), Arc::new(StaticSource(vec![]))).await;

        let run = svc.run_claim(ClaimTrigger::Manual).await.unwrap();

        assert!(run.is_success());
        assert_eq!(run.strategy.as_deref(), Some("direct"));
        assert_eq!(run.result, Some(Default::default()));

        let stored = svc.db().last_claim_run().await.unwrap().unwrap();
        assert_eq!(stored.id, run.id);
        assert_eq!(stored.trigger, ClaimTrigger::Manual);
    }

    #[tokio::test]
    async fn test_non_claimable_positions_do_nothing() {
        let positions = vec![Position {
            condition_id: Some("0xabc".to_string()),
            size: dec!(4),
            redeemable: false,
        }];
        let svc = service(claimable_config(), Arc::new(StaticSource(positions))).await;

        let run = svc.run_claim(ClaimTrigger::Cli).await.unwrap();
        assert!(run.result.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_source_failure_recorded_as_run_error() {
        let svc = service(claimable_config(), Arc::new(DownSource)).await;

        let run = svc.run_claim(ClaimTrigger::Scheduled).await.unwrap();

        assert!(!run.is_success());
        assert!(run.result.is_none());
        assert!(run.error.unwrap().contains("502"));
        assert!(svc.db().last_claim_run().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_missing_key_is_config_error() {
        let svc = service(config(&[]), Arc::new(StaticSource(vec![]))).await;

        let run = svc.run_claim(ClaimTrigger::Manual).await.unwrap();

        assert!(run.strategy.is_none());
        assert!(run.error.unwrap().contains("POLYMARKET_PRIVATE_KEY"));
    }

    #[tokio::test]
    async fn test_concurrent_run_rejected() {
        let source = Arc::new(GatedSource {
            entered: Notify::new(),
            release: Notify::new(),
        });
        let svc = Arc::new(service(claimable_config(), source.clone()).await);

        let first = tokio::spawn({
            let svc = svc.clone();
            async move { svc.run_claim(ClaimTrigger::Manual).await }
        });
        source.entered.notified().await;

        assert!(svc.is_running());
        let second = svc.run_claim(ClaimTrigger::Manual).await;
        assert!(matches!(second, Err(ClaimError::AlreadyRunning)));
        assert!(svc.scheduled_tick().await.is_none());

        source.release.notify_one();
        assert!(first.await.unwrap().unwrap().is_success());
        assert!(!svc.is_running());
    }

    #[tokio::test]
    async fn test_auto_claim_toggle_overrides_env_default() {
        let svc = service(claimable_config(), Arc::new(StaticSource(vec![]))).await;
        assert!(!svc.auto_claim_enabled().await);
        assert!(svc.scheduled_tick().await.is_none());

        svc.set_auto_claim(true).await.unwrap();
        assert!(svc.auto_claim_enabled().await);

        let run = svc.scheduled_tick().await.unwrap();
        assert_eq!(run.trigger, ClaimTrigger::Scheduled);
    }
}
