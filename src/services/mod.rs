//! Claim services: discovery, strategy, redemption, and run orchestration

pub mod claim_service;
pub mod condition;
pub mod positions;
pub mod reconciler;
pub mod redeem;
pub mod relay;
pub mod relay_errors;
pub mod safe_proxy;
pub mod strategy;

pub use claim_service::ClaimService;
pub use condition::{condition_bytes, normalize_condition_id};
pub use positions::{DataApiPositions, PositionSource, POSITION_FETCH_LIMIT};
pub use reconciler::{
    apply_outcome, format_error, redeem_all, redeemable_conditions, ClaimReconciler,
    ReconcilerSettings,
};
pub use redeem::{DirectRedeemer, Redeemer, RelayedRedeemer};
pub use relay::{CallDescriptor, RelayClient, SafeOperation};
pub use relay_errors::RelayError;
pub use safe_proxy::derive_safe_wallet;
pub use strategy::{BuilderCredentials, ExecutionStrategy};
