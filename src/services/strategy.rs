//! Execution strategy selection
//!
//! Relayed (gasless, through the builder relayer for the proxy wallet) when
//! the full builder credential triple is configured, direct on-chain
//! otherwise. Chosen once per run.

use std::fmt;

/// Builder relayer API credentials
#[derive(Clone, PartialEq, Eq)]
pub struct BuilderCredentials {
    pub api_key: String,
    pub secret: String,
    pub passphrase: String,
}

impl fmt::Debug for BuilderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuilderCredentials")
            .field("api_key", &self.api_key)
            .field("secret", &"<redacted>")
            .field("passphrase", &"<redacted>")
            .finish()
    }
}

/// How a claim run submits its redemptions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStrategy {
    /// Meta-transactions through the builder relayer for the Safe proxy wallet
    Relayed(BuilderCredentials),
    /// Signed transactions straight to the CTF contract from the signing key
    Direct,
}

impl ExecutionStrategy {
    /// Relayed iff all three secrets are present and non-empty
    pub fn select(
        api_key: Option<&str>,
        secret: Option<&str>,
        passphrase: Option<&str>,
    ) -> Self {
        let present = |v: Option<&str>| v.filter(|s| !s.trim().is_empty()).map(str::to_string);

        match (present(api_key), present(secret), present(passphrase)) {
            (Some(api_key), Some(secret), Some(passphrase)) => {
                ExecutionStrategy::Relayed(BuilderCredentials {
                    api_key,
                    secret,
                    passphrase,
                })
            }
            _ => ExecutionStrategy::Direct,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExecutionStrategy::Relayed(_) => "relayed",
            ExecutionStrategy::Direct => "direct",
        }
    }
}

impl fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_present_selects_relayed() {
        let strategy = ExecutionStrategy::select(Some("key"), Some("secret"), Some("pass"));
        match strategy {
            ExecutionStrategy::Relayed(creds) => {
                assert_eq!(creds.api_key, "key");
                assert_eq!(creds.secret, "secret");
                assert_eq!(creds.passphrase, "pass");
            }
            ExecutionStrategy::Direct => panic!("expected relayed"),
        }
    }

    #[test]
    fn test_any_single_missing_flips_to_direct() {
        let cases = [
            (None, Some("s"), Some("p")),
            (Some("k"), None, Some("p")),
            (Some("k"), Some("s"), None),
            (Some(""), Some("s"), Some("p")),
            (Some("k"), Some(""), Some("p")),
            (Some("k"), Some("s"), Some("")),
            (Some("k"), Some("s"), Some("  ")),
        ];
        for (key, secret, pass) in cases {
            assert_eq!(
                ExecutionStrategy::select(key, secret, pass),
                ExecutionStrategy::Direct,
                "{:?} {:?} {:?}",
                key,
                secret,
                pass
            );
        }
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = BuilderCredentials {
            api_key: "key".to_string(),
            secret: "topsecret".to_string(),
            passphrase: "hunter2".to_string(),
        };
        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("topsecret"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_names() {
        assert_eq!(ExecutionStrategy::Direct.to_string(), "direct");
        let relayed = ExecutionStrategy::select(Some("k"), Some("s"), Some("p"));
        assert_eq!(relayed.name(), "relayed");
    }
}
