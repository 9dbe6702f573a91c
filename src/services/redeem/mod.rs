//! Redemption backends
//!
//! Both paths call `CTF.redeemPositions(USDC, 0x0, conditionId, [1, 2])`;
//! they differ only in who signs and pays for the transaction.

pub mod direct;
pub mod relayed;

pub use direct::DirectRedeemer;
pub use relayed::RelayedRedeemer;

use crate::services::condition::condition_bytes;
use alloy::primitives::{address, Address, B256, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use anyhow::Result;
use async_trait::async_trait;

/// CTF contract on Polygon
pub const CTF_ADDRESS: Address = address!("4d97dcd97ec945f40cf65f87097ace5ea0476045");
/// USDC.e collateral on Polygon
pub const USDC_ADDRESS: Address = address!("2791bca1f2de4661ed88a30c99a7a9449aa84174");
/// Both outcomes of a binary market
pub const BINARY_INDEX_SETS: [u64; 2] = [1, 2];

sol! {
    function redeemPositions(
        address collateralToken,
        bytes32 parentCollectionId,
        bytes32 conditionId,
        uint256[] indexSets
    );
}

/// Redeems a single condition and reports the transaction hash.
///
/// Implementations may fail freely; the reconciler turns every error into a
/// failed entry in the claim report.
#[async_trait]
pub trait Redeemer: Send + Sync {
    async fn redeem(&self, condition_id: &str) -> Result<String>;
}

/// ABI-encoded `redeemPositions` call for one condition
pub fn redeem_calldata(condition_id: &str) -> Result<Vec<u8>> {
    let call = redeemPositionsCall {
        collateralToken: USDC_ADDRESS,
        parentCollectionId: B256::ZERO,
        conditionId: condition_bytes(condition_id)?,
        indexSets: BINARY_INDEX_SETS.iter().map(|&i| U256::from(i)).collect(),
    };
    Ok(call.abi_encode())
}
