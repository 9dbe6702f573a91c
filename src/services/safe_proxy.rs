//! Polymarket Safe Proxy wallet derivation
//!
//! Derives the Gnosis Safe proxy wallet address from an EOA using CREATE2.

use alloy::primitives::{address, b256, keccak256, Address, B256};

/// Safe Proxy Factory address on Polygon
const SAFE_FACTORY: Address = address!("aacfeea03eb1561c4e67d661e40682bd20e3541b");
/// Init code hash for Safe proxy
const SAFE_INIT_CODE_HASH: B256 =
    b256!("2bce2127ff07fb632d16c8347c4ebf501f4841168bed00d9e6ef715ddb6fcecf");

/// Derive the Polymarket Safe proxy wallet address from an EOA address.
/// Uses CREATE2: address = keccak256(0xff ++ factory ++ salt ++ init_code_hash)[12:]
pub fn derive_safe_wallet(eoa: Address) -> Address {
    // Salt = keccak256(abi.encode(address)) - address padded to 32 bytes (left-padded with zeros)
    let mut padded = [0u8; 32];
    padded[12..32].copy_from_slice(eoa.as_slice());
    let salt = keccak256(padded);

    SAFE_FACTORY.create2(salt, SAFE_INIT_CODE_HASH)
}
