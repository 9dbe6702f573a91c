//! Run-level error types.
//!
//! Only failures that abort a whole claim run live here. Per-condition
//! redemption failures never surface as errors; they are folded into the
//! `ClaimResult` by the reconciler.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClaimError {
    #[error("Position request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Position source returned {status}: {body}")]
    PositionSource { status: u16, body: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("A claim run is already in progress")]
    AlreadyRunning,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ClaimError {
    pub fn config(message: impl Into<String>) -> Self {
        ClaimError::Config(message.into())
    }
}

pub type Result<T> = std::result::Result<T, ClaimError>;
