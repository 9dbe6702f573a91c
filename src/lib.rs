//! Polymarket Winnings Claimer Library
//!
//! Finds resolved Polymarket positions held by a wallet and redeems them for
//! collateral, one condition at a time:
//!
//! 1. **Relayed**: gasless meta-transactions through the Polymarket builder
//!    relayer, executed from the wallet's Safe proxy. Used when builder
//!    credentials are configured.
//!
//! 2. **Direct**: a signed `redeemPositions` call straight to the CTF
//!    contract, paid for by the signing key.
//!
//! A failed condition never aborts the run; it is reported and retried on the
//! next run because it stays redeemable at the source.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod services;
pub mod types;

pub use config::Config;
pub use db::Database;
pub use error::ClaimError;
pub use services::{ClaimReconciler, ClaimService, ExecutionStrategy};
pub use types::{ClaimResult, ClaimRun, ClaimTrigger, Position};
