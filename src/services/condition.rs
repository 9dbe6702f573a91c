//! Condition id normalization
//!
//! The CTF contract takes condition ids as `bytes32`. Position sources hand
//! them out in assorted shapes (missing `0x`, upper case, unpadded), so every
//! id goes through `normalize_condition_id` before it is ABI-encoded.

use alloy::primitives::B256;
use anyhow::{Context, Result};

/// Hex digits in a bytes32 value
const CONDITION_HEX_LEN: usize = 64;

/// Canonicalize a condition id to `0x` + 64 lowercase hex digits.
///
/// Strips one optional `0x`/`0X` prefix, left-pads with `0` and keeps the
/// last 64 characters, so short and over-long inputs both come out at the
/// right width. Total and idempotent.
pub fn normalize_condition_id(condition_id: &str) -> String {
    let body = condition_id
        .strip_prefix("0x")
        .or_else(|| condition_id.strip_prefix("0X"))
        .unwrap_or(condition_id)
        .to_ascii_lowercase();

    let chars: Vec<char> = body.chars().collect();
    let digits: String = if chars.len() >= CONDITION_HEX_LEN {
        chars[chars.len() - CONDITION_HEX_LEN..].iter().collect()
    } else {
        let mut padded = "0".repeat(CONDITION_HEX_LEN - chars.len());
        padded.push_str(&body);
        padded
    };

    format!("0x{}", digits)
}

/// Normalize and decode a condition id into the `bytes32` the CTF expects
pub fn condition_bytes(condition_id: &str) -> Result<B256> {
    let normalized = normalize_condition_id(condition_id);
    normalized
        .parse::<B256>()
        .with_context(|| format!("Invalid condition ID hex: {}", condition_id))
}

/// Short form for log lines
pub(crate) fn short_id(id: &str) -> &str {
    match id.char_indices().nth(12) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}
