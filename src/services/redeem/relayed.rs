//! Gasless redemption through the builder relayer
//!
//! For wallets whose outcome tokens sit in the Polymarket Safe proxy. The
//! relayer pays gas and executes the CTF call from the Safe.

use super::{redeem_calldata, Redeemer, CTF_ADDRESS};
use crate::services::condition::short_id;
use crate::services::relay::{CallDescriptor, RelayClient};
use crate::services::strategy::BuilderCredentials;
use alloy::primitives::{Address, U256};
use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

/// Memo attached to every relayed redemption
pub const REDEEM_MEMO: &str = "Redeem winnings";

pub struct RelayedRedeemer {
    relay: RelayClient,
}

impl RelayedRedeemer {
    pub fn new(relayer_url: &str, credentials: BuilderCredentials, private_key: &str) -> Result<Self> {
        Ok(Self {
            relay: RelayClient::new(relayer_url, credentials, private_key)?,
        })
    }

    /// Safe proxy wallet redemptions execute from
    pub fn proxy_wallet(&self) -> Address {
        self.relay.proxy_wallet()
    }
}

#[async_trait]
impl Redeemer for RelayedRedeemer {
    async fn redeem(&self, condition_id: &str) -> Result<String> {
        let call = CallDescriptor {
            to: CTF_ADDRESS,
            data: redeem_calldata(condition_id)?,
            value: U256::ZERO,
        };

        let handle = self.relay.execute(&[call], REDEEM_MEMO).await?;
        info!(
            "[Redeem] relayed {} as tx_id={}",
            short_id(condition_id),
            handle.transaction_id()
        );

        match handle.wait().await? {
            Some(tx_hash) => Ok(tx_hash),
            None => anyhow::bail!("Relay confirmed without a transaction hash"),
        }
    }
}
