//! Direct on-chain redemption
//!
//! The signing key itself sends `redeemPositions` to the CTF and pays gas.
//! Only useful when the EOA holds the outcome tokens (no proxy wallet).

use super::{redeem_calldata, Redeemer, CTF_ADDRESS};
use crate::services::condition::short_id;
use alloy::primitives::{Address, Bytes, TxKind, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::eth::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info};

pub struct DirectRedeemer {
    signer: PrivateKeySigner,
    rpc_url: String,
}

impl DirectRedeemer {
    pub fn new(private_key: &str, rpc_url: impl Into<String>) -> Result<Self> {
        let signer: PrivateKeySigner = private_key
            .parse()
            .context("Failed to parse private key")?;
        Ok(Self {
            signer,
            rpc_url: rpc_url.into(),
        })
    }

    pub fn signer_address(&self) -> Address {
        self.signer.address()
    }
}

#[async_trait]
impl Redeemer for DirectRedeemer {
    async fn redeem(&self, condition_id: &str) -> Result<String> {
        let calldata = redeem_calldata(condition_id)?;

        let provider = ProviderBuilder::new()
            .wallet(self.signer.clone())
            .connect(&self.rpc_url)
            .await
            .context("Failed to connect to Polygon RPC")?;

        // nonce, gas and chain id come from the provider fillers
        let tx_request = TransactionRequest {
            to: Some(TxKind::Call(CTF_ADDRESS)),
            input: Bytes::from(calldata).into(),
            value: Some(U256::ZERO),
            ..Default::default()
        };

        let pending_tx = provider
            .send_transaction(tx_request)
            .await
            .context("Failed to send redeem transaction")?;

        let tx_hash = *pending_tx.tx_hash();
        debug!(
            "[Redeem] direct {} sent {:?}, waiting for receipt",
            short_id(condition_id),
            tx_hash
        );

        let receipt = pending_tx
            .get_receipt()
            .await
            .context("Failed to get transaction receipt")?;

        if !receipt.status() {
            anyhow::bail!("Redeem transaction reverted: {:?}", tx_hash);
        }

        info!(
            "[Redeem] direct {} mined in block {:?}",
            short_id(condition_id),
            receipt.block_number
        );
        Ok(format!("{:?}", receipt.transaction_hash))
    }
}
