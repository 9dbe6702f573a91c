//! Polymarket builder relayer client
//!
//! Executes contract calls from the signer's Safe proxy wallet without the
//! signer paying gas. The relayer has no per-operation endpoints: calls are
//! wrapped in an EIP-712 Safe transaction, signed by the owning EOA and
//! posted to `/submit`, then tracked through `/transaction` until mined.
//!
//! Every request carries builder HMAC headers derived from the
//! `BuilderCredentials`.

use crate::services::relay_errors::RelayError;
use crate::services::safe_proxy::derive_safe_wallet;
use crate::services::strategy::BuilderCredentials;
use alloy::primitives::{address, keccak256, Address, Signature, B256, U256};
use alloy::signers::{local::PrivateKeySigner, Signer};
use alloy::sol;
use alloy::sol_types::SolCall;
use anyhow::{Context, Result};
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, info, warn};

type HmacSha256 = Hmac<Sha256>;

const CHAIN_ID: u64 = 137;
const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";
/// Safe MultiSend on Polygon, target of batched relay transactions
const SAFE_MULTISEND: Address = address!("a238cbeb142c10ef7ad8442c6d1f9e89e07e7761");

const POLL_ATTEMPTS: u32 = 30;
const POLL_INTERVAL: Duration = Duration::from_secs(2);

sol! {
    function multiSend(bytes transactions);
}

/// Safe transaction operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafeOperation {
    Call = 0,
    DelegateCall = 1,
}

/// One contract call to run from the proxy wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallDescriptor {
    pub to: Address,
    pub data: Vec<u8>,
    pub value: U256,
}

/// The single Safe transaction a batch of calls is submitted as
#[derive(Debug, Clone, PartialEq, Eq)]
struct SafeTransaction {
    to: Address,
    value: U256,
    data: Vec<u8>,
    operation: SafeOperation,
}

/// Relayer transaction status as returned by `/transaction`
#[derive(Debug, Clone, Deserialize)]
struct RelayTransaction {
    #[serde(default)]
    state: String,
    #[serde(default, rename = "transactionHash")]
    transaction_hash: Option<String>,
}

/// What one `/transaction` poll told us
#[derive(Debug, PartialEq, Eq)]
enum PollOutcome {
    Pending,
    Confirmed(Option<String>),
    Failed(RelayError),
}

/// Builder-authenticated relayer client bound to one signing key
pub struct RelayClient {
    client: reqwest::Client,
    base_url: String,
    credentials: BuilderCredentials,
    signer: PrivateKeySigner,
    safe_address: Address,
}

impl RelayClient {
    pub fn new(
        base_url: impl Into<String>,
        credentials: BuilderCredentials,
        private_key: &str,
    ) -> Result<Self> {
        let signer: PrivateKeySigner = private_key
            .parse()
            .context("Failed to parse private key")?;
        let safe_address = derive_safe_wallet(signer.address());

        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(90))
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.into(),
            credentials,
            signer,
            safe_address,
        })
    }

    /// Safe proxy wallet the relayer executes from
    pub fn proxy_wallet(&self) -> Address {
        self.safe_address
    }

    pub fn signer_address(&self) -> Address {
        self.signer.address()
    }

    /// Submit `calls` as one Safe transaction tagged with `memo`.
    ///
    /// Returns once the relayer has accepted the submission; await
    /// `RelayHandle::wait` for the on-chain outcome.
    pub async fn execute(&self, calls: &[CallDescriptor], memo: &str) -> Result<RelayHandle<'_>> {
        let safe_tx = pack_calls(calls)?;
        let eoa = format!("{:?}", self.signer.address());

        info!(
            "[Relay] EOA={} Safe={:?} target={:?} calls={} memo={:?}",
            eoa,
            self.safe_address,
            safe_tx.to,
            calls.len(),
            memo
        );

        let nonce = self.get_nonce(&eoa).await?;
        debug!("[Relay] nonce: {}", nonce);

        let tx_hash = compute_safe_tx_hash(self.safe_address, &safe_tx, nonce);

        // personal_sign over the Safe tx hash (Safe reads v > 30 as eth_sign style)
        let signature = self
            .signer
            .sign_message(tx_hash.as_slice())
            .await
            .context("Failed to sign Safe transaction")?;

        let tx_request = serde_json::json!({
            "type": "SAFE",
            "from": eoa,
            "to": format!("{:?}", safe_tx.to),
            "proxyWallet": format!("{:?}", self.safe_address),
            "data": format!("0x{}", hex::encode(&safe_tx.data)),
            "signature": pack_safe_signature(&signature),
            "value": safe_tx.value.to_string(),
            "nonce": nonce.to_string(),
            "signatureParams": {
                "gasPrice": "0",
                "operation": (safe_tx.operation as u8).to_string(),
                "safeTxnGas": "0",
                "baseGas": "0",
                "gasToken": ZERO_ADDRESS,
                "refundReceiver": ZERO_ADDRESS
            },
            "metadata": memo
        });
        let body = serde_json::to_string(&tx_request)?;

        let response = self
            .signed(self.client.post(format!("{}/submit", self.base_url)), "POST", "/submit", &body)?
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .context("Failed to send relay request")?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_body = response.text().await.unwrap_or_default();
            warn!("[Relay] submit failed: {} - {}", status, error_body);
            return Err(RelayError::from_response(status, &error_body).into());
        }

        #[derive(Debug, Deserialize)]
        struct SubmitResponse {
            #[serde(default, rename = "transactionID")]
            transaction_id: Option<String>,
        }

        let submit_resp: SubmitResponse = response
            .json()
            .await
            .context("Failed to parse submit response")?;

        let transaction_id = submit_resp
            .transaction_id
            .filter(|id| !id.is_empty())
            .ok_or(RelayError::MissingTransactionId)?;
        info!("[Relay] submitted: tx_id={}, nonce={}", transaction_id, nonce);

        Ok(RelayHandle {
            relay: self,
            transaction_id,
        })
    }

    /// Get the Safe nonce for the signer from the relayer
    async fn get_nonce(&self, eoa_address: &str) -> Result<U256> {
        let path = format!("/nonce?address={}&type=SAFE", eoa_address);
        let response = self
            .signed(self.client.get(format!("{}{}", self.base_url, path)), "GET", &path, "")?
            .send()
            .await
            .context("Failed to get nonce from relay")?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let err = response.text().await.unwrap_or_default();
            return Err(RelayError::from_response(status, &err).into());
        }

        #[derive(Deserialize)]
        struct NonceResponse {
            nonce: serde_json::Value,
        }

        let resp: NonceResponse = response
            .json()
            .await
            .context("Failed to parse nonce response")?;

        parse_nonce(&resp.nonce)
    }

    /// Poll `/transaction` until the relayer reports a terminal state
    async fn poll_transaction(&self, tx_id: &str) -> Result<Option<String>> {
        let path = format!("/transaction?id={}", tx_id);

        for attempt in 0..POLL_ATTEMPTS {
            tokio::time::sleep(POLL_INTERVAL).await;

            let request = self.signed(
                self.client.get(format!("{}{}", self.base_url, path)),
                "GET",
                &path,
                "",
            )?;

            let txns = match request.send().await {
                Ok(resp) => match resp.json::<Vec<RelayTransaction>>().await {
                    Ok(txns) => txns,
                    Err(e) => {
                        debug!("[Relay] unreadable status for {}: {}", tx_id, e);
                        continue;
                    }
                },
                Err(e) => {
                    debug!("[Relay] status request for {} failed: {}", tx_id, e);
                    continue;
                }
            };

            let Some(txn) = txns.first() else {
                continue;
            };

            match interpret_transaction(txn) {
                PollOutcome::Confirmed(hash) => {
                    info!("[Relay] confirmed: tx_id={} hash={:?}", tx_id, hash);
                    return Ok(hash);
                }
                PollOutcome::Failed(err) => {
                    warn!("[Relay] tx_id={} failed: {}", tx_id, err);
                    return Err(err.into());
                }
                PollOutcome::Pending => {
                    if attempt % 5 == 0 {
                        debug!(
                            "[Relay] polling: state={}, attempt {}/{}",
                            txn.state,
                            attempt + 1,
                            POLL_ATTEMPTS
                        );
                    }
                }
            }
        }

        warn!("[Relay] polling timed out for tx_id={}", tx_id);
        Err(RelayError::Timeout {
            tx_id: tx_id.to_string(),
            seconds: POLL_INTERVAL.as_secs() * POLL_ATTEMPTS as u64,
        }
        .into())
    }

    /// Attach builder auth headers for `method` + `path` + `body`
    fn signed(
        &self,
        request: reqwest::RequestBuilder,
        method: &str,
        path: &str,
        body: &str,
    ) -> Result<reqwest::RequestBuilder> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let sig_payload = format!("{}{}{}{}", timestamp, method, path, body);
        let hmac_sig = compute_hmac(&self.credentials.secret, &sig_payload)?;

        Ok(request
            .header("POLY_BUILDER_TIMESTAMP", timestamp)
            .header("POLY_BUILDER_SIGNATURE", hmac_sig)
            .header("POLY_BUILDER_API_KEY", &self.credentials.api_key)
            .header("POLY_BUILDER_PASSPHRASE", &self.credentials.passphrase))
    }
}

/// An accepted relay submission
pub struct RelayHandle<'a> {
    relay: &'a RelayClient,
    transaction_id: String,
}

impl RelayHandle<'_> {
    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    /// Wait for the relayer to mine the transaction; yields its hash if reported
    pub async fn wait(self) -> Result<Option<String>> {
        self.relay.poll_transaction(&self.transaction_id).await
    }
}

/// Collapse calls into one Safe transaction: a plain call for one, a
/// MultiSend delegatecall for several
fn pack_calls(calls: &[CallDescriptor]) -> Result<SafeTransaction> {
    match calls {
        [] => anyhow::bail!("No calls to relay"),
        [call] => Ok(SafeTransaction {
            to: call.to,
            value: call.value,
            data: call.data.clone(),
            operation: SafeOperation::Call,
        }),
        many => {
            // Packed encoding: operation(1) ++ to(20) ++ value(32) ++ len(32) ++ data
            let mut packed = Vec::new();
            for call in many {
                packed.push(SafeOperation::Call as u8);
                packed.extend_from_slice(call.to.as_slice());
                packed.extend_from_slice(&call.value.to_be_bytes::<32>());
                packed.extend_from_slice(&U256::from(call.data.len()).to_be_bytes::<32>());
                packed.extend_from_slice(&call.data);
            }
            let data = multiSendCall {
                transactions: packed.into(),
            }
            .abi_encode();

            Ok(SafeTransaction {
                to: SAFE_MULTISEND,
                value: U256::ZERO,
                data,
                operation: SafeOperation::DelegateCall,
            })
        }
    }
}

/// Compute EIP-712 Safe transaction hash
fn compute_safe_tx_hash(safe_address: Address, tx: &SafeTransaction, nonce: U256) -> B256 {
    // Domain separator: keccak256(abi.encode(typehash, chainId, verifyingContract))
    let domain_typehash = keccak256(b"EIP712Domain(uint256 chainId,address verifyingContract)");
    let mut domain_data = Vec::with_capacity(96);
    domain_data.extend_from_slice(domain_typehash.as_slice());
    domain_data.extend_from_slice(&U256::from(CHAIN_ID).to_be_bytes::<32>());
    domain_data.extend_from_slice(safe_address.into_word().as_slice());
    let domain_separator = keccak256(&domain_data);

    let safe_tx_typehash = keccak256(
        b"SafeTx(address to,uint256 value,bytes data,uint8 operation,uint256 safeTxGas,uint256 baseGas,uint256 gasPrice,address gasToken,address refundReceiver,uint256 nonce)"
    );

    // abi.encode all fields: typehash + 10 fields = 352 bytes
    let mut struct_data = Vec::with_capacity(352);
    struct_data.extend_from_slice(safe_tx_typehash.as_slice());
    struct_data.extend_from_slice(tx.to.into_word().as_slice());
    struct_data.extend_from_slice(&tx.value.to_be_bytes::<32>());
    // bytes are encoded as their hash
    struct_data.extend_from_slice(keccak256(&tx.data).as_slice());
    struct_data.extend_from_slice(&U256::from(tx.operation as u8).to_be_bytes::<32>());
    // safeTxGas, baseGas, gasPrice = 0; gasToken, refundReceiver = address(0)
    for _ in 0..5 {
        struct_data.extend_from_slice(&[0u8; 32]);
    }
    struct_data.extend_from_slice(&nonce.to_be_bytes::<32>());

    let struct_hash = keccak256(&struct_data);

    // Final EIP-712 hash: 0x19 0x01 + domainSeparator + structHash
    let mut final_data = Vec::with_capacity(66);
    final_data.push(0x19);
    final_data.push(0x01);
    final_data.extend_from_slice(domain_separator.as_slice());
    final_data.extend_from_slice(struct_hash.as_slice());

    keccak256(&final_data)
}

/// Pack r ++ s ++ v with the Safe eth_sign adjustment (v = 27/28 + 4)
fn pack_safe_signature(signature: &Signature) -> String {
    let v: u8 = if signature.v() { 32 } else { 31 };

    let mut packed = Vec::with_capacity(65);
    packed.extend_from_slice(&signature.r().to_be_bytes::<32>());
    packed.extend_from_slice(&signature.s().to_be_bytes::<32>());
    packed.push(v);
    format!("0x{}", hex::encode(&packed))
}

fn parse_nonce(value: &serde_json::Value) -> Result<U256> {
    let raw = match value {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.clone(),
        _ => return Err(RelayError::InvalidResponse(format!("nonce {}", value)).into()),
    };
    U256::from_str_radix(&raw, 10)
        .map_err(|_| RelayError::InvalidResponse(format!("nonce {}", raw)).into())
}

fn interpret_transaction(txn: &RelayTransaction) -> PollOutcome {
    let hash = txn
        .transaction_hash
        .as_ref()
        .filter(|h| !h.is_empty())
        .cloned();

    match txn.state.as_str() {
        "STATE_MINED" | "STATE_CONFIRMED" => PollOutcome::Confirmed(hash),
        "STATE_FAILED" | "STATE_INVALID" => PollOutcome::Failed(RelayError::TransactionFailed {
            state: txn.state.clone(),
            hash,
        }),
        _ => PollOutcome::Pending,
    }
}

/// Compute HMAC-SHA256 signature for builder auth
fn compute_hmac(secret: &str, payload: &str) -> Result<String> {
    let secret_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(secret)
        .or_else(|_| base64::engine::general_purpose::URL_SAFE.decode(secret))
        .or_else(|_| base64::engine::general_purpose::STANDARD.decode(secret))
        .context("Failed to decode builder secret")?;

    let mut mac = HmacSha256::new_from_slice(&secret_bytes).context("Invalid HMAC key")?;
    mac.update(payload.as_bytes());
    Ok(base64::engine::general_purpose::URL_SAFE.encode(mac.finalize().into_bytes()))
}
