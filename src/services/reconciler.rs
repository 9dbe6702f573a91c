//! Claim reconciliation
//!
//! One run: fetch positions, keep the redeemable ones, collapse them to
//! unique condition ids, pick the redemption path once, then fold every
//! condition through the chosen `Redeemer` into a `ClaimResult`.
//!
//! Only position discovery can fail a run. Each condition's outcome, good or
//! bad, lands in the result, and a failed condition stays redeemable at the
//! source, so the next run retries it.

use crate::config::Config;
use crate::error::Result;
use crate::services::condition::short_id;
use crate::services::positions::{PositionSource, POSITION_FETCH_LIMIT};
use crate::services::redeem::{DirectRedeemer, Redeemer, RelayedRedeemer};
use crate::services::strategy::ExecutionStrategy;
use crate::types::{ClaimResult, Position};
use alloy::primitives::Address;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Characters of the condition id kept in an error record
const ERROR_ID_CHARS: usize = 10;
/// Characters of the error message kept in an error record
const ERROR_MESSAGE_CHARS: usize = 80;

/// Everything the reconciler needs besides the per-run key and wallet
#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    pub strategy: ExecutionStrategy,
    pub relayer_url: String,
    pub rpc_url: String,
}

impl From<&Config> for ReconcilerSettings {
    fn from(config: &Config) -> Self {
        Self {
            strategy: config.execution_strategy(),
            relayer_url: config.relayer_url.clone(),
            rpc_url: config.polygon_rpc_url.clone(),
        }
    }
}

pub struct ClaimReconciler {
    source: Arc<dyn PositionSource>,
    settings: ReconcilerSettings,
}

impl ClaimReconciler {
    pub fn new(source: Arc<dyn PositionSource>, settings: ReconcilerSettings) -> Self {
        Self { source, settings }
    }

    pub fn strategy(&self) -> &ExecutionStrategy {
        &self.settings.strategy
    }

    /// Redeem every resolved position held by `wallet_address`.
    ///
    /// Errors only when positions cannot be fetched.
    pub async fn claim_winnings(&self, signing_key: &str, wallet_address: &str) -> Result<ClaimResult> {
        let conditions = self.discover(wallet_address).await?;
        if conditions.is_empty() {
            info!("[Claim] No redeemable positions for {}", short_id(wallet_address));
            return Ok(ClaimResult::default());
        }

        info!(
            "[Claim] {} redeemable condition(s) for {} via {} path",
            conditions.len(),
            short_id(wallet_address),
            self.settings.strategy
        );

        let result = match self.build_redeemer(signing_key, wallet_address) {
            Ok(redeemer) => redeem_all(redeemer.as_ref(), &conditions).await,
            Err(e) => {
                warn!("[Claim] Cannot build {} redeemer: {:#}", self.settings.strategy, e);
                let message = format!("{:#}", e);
                conditions.iter().fold(ClaimResult::default(), |acc, condition_id| {
                    apply_outcome(acc, condition_id, Err(anyhow::anyhow!(message.clone())))
                })
            }
        };

        info!("[Claim] Run finished for {}: {}", short_id(wallet_address), result);
        Ok(result)
    }

    /// Same as `claim_winnings` but with a caller-supplied redeemer
    pub async fn claim_with(&self, wallet_address: &str, redeemer: &dyn Redeemer) -> Result<ClaimResult> {
        let conditions = self.discover(wallet_address).await?;
        if conditions.is_empty() {
            return Ok(ClaimResult::default());
        }
        Ok(redeem_all(redeemer, &conditions).await)
    }

    async fn discover(&self, wallet_address: &str) -> Result<Vec<String>> {
        let positions = self
            .source
            .get_positions(wallet_address, POSITION_FETCH_LIMIT)
            .await?;
        Ok(redeemable_conditions(&positions))
    }

    fn build_redeemer(&self, signing_key: &str, wallet_address: &str) -> anyhow::Result<Box<dyn Redeemer>> {
        match &self.settings.strategy {
            ExecutionStrategy::Relayed(credentials) => {
                let redeemer =
                    RelayedRedeemer::new(&self.settings.relayer_url, credentials.clone(), signing_key)?;
                if wallet_address.parse::<Address>().ok() != Some(redeemer.proxy_wallet()) {
                    warn!(
                        "[Claim] Wallet {} is not the signer's proxy wallet {:?}; relayed redemptions run from the proxy",
                        wallet_address,
                        redeemer.proxy_wallet()
                    );
                }
                Ok(Box::new(redeemer))
            }
            ExecutionStrategy::Direct => Ok(Box::new(DirectRedeemer::new(
                signing_key,
                self.settings.rpc_url.as_str(),
            )?)),
        }
    }
}

/// Unique condition ids of claimable positions, in first-seen order.
/// Blank or missing ids are dropped.
pub fn redeemable_conditions(positions: &[Position]) -> Vec<String> {
    let mut seen = HashSet::new();
    positions
        .iter()
        .filter(|p| p.is_claimable())
        .filter_map(|p| p.condition_id.as_deref())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .filter(|id| seen.insert(id.to_string()))
        .map(str::to_string)
        .collect()
}

/// Fold one condition's outcome into the accumulated result
pub fn apply_outcome(
    mut acc: ClaimResult,
    condition_id: &str,
    outcome: anyhow::Result<String>,
) -> ClaimResult {
    match outcome {
        Ok(tx_hash) => {
            info!("[Claim] Redeemed {}: {}", short_id(condition_id), tx_hash);
            acc.claimed += 1;
            acc.tx_hashes.push(tx_hash);
        }
        Err(e) => {
            let message = format!("{:#}", e);
            warn!("[Claim] Redeem failed for {}: {}", short_id(condition_id), message);
            acc.failed += 1;
            acc.errors.push(format_error(condition_id, &message));
        }
    }
    acc
}

/// `<first 10 chars of id>: <first 80 chars of message>`
pub fn format_error(condition_id: &str, message: &str) -> String {
    let id: String = condition_id.chars().take(ERROR_ID_CHARS).collect();
    let msg: String = message.chars().take(ERROR_MESSAGE_CHARS).collect();
    format!("{}: {}", id, msg)
}

/// Redeem conditions one at a time, never more than one in flight
pub async fn redeem_all(redeemer: &dyn Redeemer, conditions: &[String]) -> ClaimResult {
    let mut result = ClaimResult::default();
    for condition_id in conditions {
        let outcome = redeemer.redeem(condition_id).await;
        result = apply_outcome(result, condition_id, outcome);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClaimError;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn position(id: &str, size: Decimal, redeemable: bool) -> Position {
        Position {
            condition_id: Some(id.to_string()),
            size,
            redeemable,
        }
    }

    struct FakeSource {
        positions: Vec<Position>,
        fail: bool,
        calls: AtomicU32,
    }

    impl FakeSource {
        fn with(positions: Vec<Position>) -> Arc<Self> {
            Arc::new(Self {
                positions,
                fail: false,
                calls: AtomicU32::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                positions: vec![],
                fail: true,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl PositionSource for FakeSource {
        async fn get_positions(&self, _address: &str, limit: usize) -> Result<Vec<Position>> {
            assert_eq!(limit, POSITION_FETCH_LIMIT);
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ClaimError::PositionSource {
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
            Ok(self.positions.clone())
        }
    }

    #[derive(Default)]
    struct FakeRedeemer {
        calls: Mutex<Vec<String>>,
        fail_on: HashSet<String>,
    }

    #[async_trait]
    impl Redeemer for FakeRedeemer {
        async fn redeem(&self, condition_id: &str) -> anyhow::Result<String> {
            self.calls.lock().unwrap().push(condition_id.to_string());
            if self.fail_on.contains(condition_id) {
                anyhow::bail!("execution reverted for {}", condition_id);
            }
            Ok(format!("0xhash-{}", condition_id))
        }
    }

    fn reconciler(source: Arc<FakeSource>) -> ClaimReconciler {
        ClaimReconciler::new(
            source,
            ReconcilerSettings {
                strategy: ExecutionStrategy::Direct,
                relayer_url: "http://127.0.0.1:9".to_string(),
                rpc_url: "http://127.0.0.1:9".to_string(),
            },
        )
    }

    #[test]
    fn test_example_scenario_filters_and_dedupes() {
        let positions = vec![
            position("abc", dec!(5), true),
            position("abc", dec!(3), true),
            position("def", dec!(0), true),
            position("ghi", dec!(2), false),
        ];
        assert_eq!(redeemable_conditions(&positions), vec!["abc".to_string()]);
    }

    #[test]
    fn test_blank_and_missing_ids_dropped() {
        let mut missing = position("x", dec!(1), true);
        missing.condition_id = None;
        let positions = vec![missing, position("  ", dec!(1), true), position("0x1", dec!(1), true)];
        assert_eq!(redeemable_conditions(&positions), vec!["0x1".to_string()]);
    }

    #[test]
    fn test_first_seen_order_kept() {
        let positions = vec![
            position("c", dec!(1), true),
            position("a", dec!(1), true),
            position("c", dec!(2), true),
            position("b", dec!(1), true),
        ];
        assert_eq!(redeemable_conditions(&positions), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_format_error_truncates() {
        let id = format!("0x{}", "a".repeat(64));
        let message = "x".repeat(200);
        let record = format_error(&id, &message);
        assert_eq!(record, format!("0xaaaaaaaa: {}", "x".repeat(80)));
    }

    #[test]
    fn test_format_error_short_inputs_untouched() {
        assert_eq!(format_error("abc", "boom"), "abc: boom");
    }

    #[test]
    fn test_apply_outcome() {
        let acc = apply_outcome(ClaimResult::default(), "a", Ok("0x1".to_string()));
        let acc = apply_outcome(acc, "b", Err(anyhow::anyhow!("relay down")));
        assert_eq!(acc.claimed, 1);
        assert_eq!(acc.failed, 1);
        assert_eq!(acc.tx_hashes, vec!["0x1"]);
        assert_eq!(acc.errors, vec!["b: relay down"]);
    }

    #[tokio::test]
    async fn test_empty_set_skips_redeemer() {
        let source = FakeSource::with(vec![
            position("def", dec!(0), true),
            position("ghi", dec!(2), false),
        ]);
        let redeemer = FakeRedeemer::default();

        let result = reconciler(source.clone()).claim_with("0xwallet", &redeemer).await.unwrap();

        assert_eq!(result, ClaimResult::default());
        assert!(redeemer.calls.lock().unwrap().is_empty());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_set_claim_winnings_needs_no_valid_key() {
        let source = FakeSource::with(vec![]);
        let result = reconciler(source).claim_winnings("garbage", "0xwallet").await.unwrap();
        assert_eq!(result, ClaimResult::default());
    }

    #[tokio::test]
    async fn test_one_attempt_per_condition() {
        let source = FakeSource::with(vec![
            position("abc", dec!(5), true),
            position("abc", dec!(3), true),
            position("def", dec!(1), true),
        ]);
        let redeemer = FakeRedeemer::default();

        let result = reconciler(source).claim_with("0xwallet", &redeemer).await.unwrap();

        assert_eq!(*redeemer.calls.lock().unwrap(), vec!["abc", "def"]);
        assert_eq!(result.claimed, 2);
    }

    #[tokio::test]
    async fn test_partial_failure_isolated() {
        let source = FakeSource::with(vec![
            position("c1", dec!(1), true),
            position("c2", dec!(1), true),
            position("c3", dec!(1), true),
        ]);
        let redeemer = FakeRedeemer {
            fail_on: HashSet::from(["c2".to_string()]),
            ..Default::default()
        };

        let result = reconciler(source).claim_with("0xwallet", &redeemer).await.unwrap();

        assert_eq!(result.claimed, 2);
        assert_eq!(result.failed, 1);
        assert_eq!(result.tx_hashes, vec!["0xhash-c1", "0xhash-c3"]);
        assert_eq!(result.errors, vec!["c2: execution reverted for c2"]);
        assert_eq!(redeemer.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_source_failure_is_fatal() {
        let redeemer = FakeRedeemer::default();
        let err = reconciler(FakeSource::failing())
            .claim_with("0xwallet", &redeemer)
            .await
            .unwrap_err();
        assert!(matches!(err, ClaimError::PositionSource { status: 503, .. }));
        assert!(redeemer.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unbuildable_redeemer_fails_each_condition() {
        let source = FakeSource::with(vec![
            position("c1", dec!(1), true),
            position("c2", dec!(1), true),
        ]);

        let result = reconciler(source).claim_winnings("not-a-key", "0xwallet").await.unwrap();

        assert_eq!(result.claimed, 0);
        assert_eq!(result.failed, 2);
        assert!(result.errors[0].starts_with("c1: Failed to parse private key"));
        assert!(result.errors[1].starts_with("c2: "));
    }
}
