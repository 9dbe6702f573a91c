//! Core types for the claim reconciliation engine

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// One held outcome-token balance, as reported by the Data API.
///
/// Only the fields the reconciler needs are decoded; everything else in the
/// Data API payload (titles, prices, asset ids) is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Market condition this balance belongs to. Absent or null ids are
    /// tolerated here and discarded by the reconciler.
    #[serde(default)]
    pub condition_id: Option<String>,
    /// Held token amount (whole shares)
    #[serde(default)]
    pub size: Decimal,
    /// Whether the market resolved and this balance can be redeemed
    #[serde(default)]
    pub redeemable: bool,
}

impl Position {
    /// Redeemable with a positive balance
    pub fn is_claimable(&self) -> bool {
        self.redeemable && self.size > Decimal::ZERO
    }
}

/// Aggregated outcome of one reconciliation run.
///
/// Serialized with the camelCase keys the status API and run history expose:
/// `{claimed, failed, errors, txHashes}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimResult {
    pub claimed: u32,
    pub failed: u32,
    pub errors: Vec<String>,
    pub tx_hashes: Vec<String>,
}

impl ClaimResult {
    /// Number of conditions a redemption was attempted for
    pub fn attempted(&self) -> u32 {
        self.claimed + self.failed
    }

    /// True when nothing was attempted (no redeemable positions)
    pub fn is_empty(&self) -> bool {
        self.attempted() == 0
    }
}

impl fmt::Display for ClaimResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "claimed {}, failed {}", self.claimed, self.failed)
    }
}

/// What started a claim run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimTrigger {
    Manual,
    Scheduled,
    Cli,
}

impl ClaimTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimTrigger::Manual => "manual",
            ClaimTrigger::Scheduled => "scheduled",
            ClaimTrigger::Cli => "cli",
        }
    }
}

impl fmt::Display for ClaimTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClaimTrigger {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(ClaimTrigger::Manual),
            "scheduled" => Ok(ClaimTrigger::Scheduled),
            "cli" => Ok(ClaimTrigger::Cli),
            other => anyhow::bail!("Unknown claim trigger: {}", other),
        }
    }
}

/// Persisted record of one reconciliation run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRun {
    pub id: Uuid,
    pub trigger: ClaimTrigger,
    /// "relayed" or "direct"; None when the run failed before selecting a path
    pub strategy: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Per-condition outcomes; None when the run failed outright
    pub result: Option<ClaimResult>,
    /// Run-fatal error (position discovery or configuration)
    pub error: Option<String>,
}

impl ClaimRun {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Wall-clock duration of the run in milliseconds
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
