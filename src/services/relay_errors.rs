//! Builder relay error classification
//!
//! Parses relayer error responses and transaction states into structured
//! types so failures read well in claim reports.

use serde::Deserialize;
use thiserror::Error;

/// Structured relay error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// Rate limited by the relayer
    #[error("Relay rate limited")]
    RateLimited,
    /// Builder API key, passphrase or HMAC signature rejected
    #[error("Relay authentication failed (check builder credentials)")]
    AuthenticationFailed,
    /// Relayer refused the request
    #[error("Relay error {status}: {body}")]
    Rejected { status: u16, body: String },
    /// Transaction reached a terminal failure state on the relayer
    #[error("Relay transaction {state} (hash={hash:?})")]
    TransactionFailed { state: String, hash: Option<String> },
    /// Relayer accepted the submission but never reported a final state
    #[error("Relay transaction {tx_id} not confirmed after {seconds}s")]
    Timeout { tx_id: String, seconds: u64 },
    /// Submission succeeded without a transaction id to track
    #[error("Relay returned no transaction ID")]
    MissingTransactionId,
    /// Unexpected payload shape
    #[error("Unexpected relay response: {0}")]
    InvalidResponse(String),
}

/// Relayer error response format
#[derive(Debug, Deserialize)]
struct RelayErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl RelayError {
    /// Parse a non-success relayer response into a structured error
    pub fn from_response(status: u16, body: &str) -> Self {
        let error_msg = match serde_json::from_str::<RelayErrorResponse>(body) {
            Ok(parsed) => parsed
                .error
                .or(parsed.message)
                .unwrap_or_else(|| body.to_string()),
            Err(_) => body.to_string(),
        };

        let msg_lower = error_msg.to_lowercase();

        if status == 429 || msg_lower.contains("rate limit") || msg_lower.contains("too many requests") {
            return RelayError::RateLimited;
        }

        if status == 401
            || status == 403
            || msg_lower.contains("unauthorized")
            || msg_lower.contains("invalid api key")
            || msg_lower.contains("invalid signature")
        {
            return RelayError::AuthenticationFailed;
        }

        RelayError::Rejected {
            status,
            body: error_msg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited() {
        assert_eq!(RelayError::from_response(429, ""), RelayError::RateLimited);
    }

    #[test]
    fn test_auth_failed() {
        let err = RelayError::from_response(401, r#"{"error":"invalid authorization"}"#);
        assert_eq!(err, RelayError::AuthenticationFailed);

        let err = RelayError::from_response(400, r#"{"message":"Invalid signature"}"#);
        assert_eq!(err, RelayError::AuthenticationFailed);
    }

    #[test]
    fn test_rejected_uses_json_error_field() {
        let err = RelayError::from_response(400, r#"{"error":"nonce too low"}"#);
        assert_eq!(
            err,
            RelayError::Rejected {
                status: 400,
                body: "nonce too low".to_string()
            }
        );
        assert_eq!(err.to_string(), "Relay error 400: nonce too low");
    }

    #[test]
    fn test_rejected_plain_text_body() {
        let err = RelayError::from_response(502, "Bad Gateway");
        assert!(matches!(err, RelayError::Rejected { status: 502, .. }));
    }
}
