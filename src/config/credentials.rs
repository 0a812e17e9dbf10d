//! Venue API credentials

use crate::error::ExecError;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;

/// Credential set for one venue account.
///
/// Which fields matter depends on the venue: HMAC venues use
/// `api_key`/`api_secret` (plus `passphrase` for OKX and Bitget); the
/// wallet-signed venues use `wallet_address` plus `private_key`; Lighter
/// additionally carries an `api_key_index` registered on-venue.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct VenueCredentials {
    /// REST API key
    pub api_key: Option<String>,
    /// REST API secret
    pub api_secret: Option<String>,
    /// Passphrase (OKX, Bitget)
    pub passphrase: Option<String>,
    /// L1 wallet address (Hyperliquid, Aster, Lighter)
    pub wallet_address: Option<String>,
    /// Signing private key, hex; leading 0x tolerated
    pub private_key: Option<String>,
    /// Registered API-key slot (Lighter)
    pub api_key_index: Option<u32>,
}

impl VenueCredentials {
    /// Load from `PERP_EXEC_*` environment variables.
    pub fn from_env() -> Result<Self, ExecError> {
        dotenv::dotenv().ok();
        Ok(Self {
            api_key: env::var("PERP_EXEC_API_KEY").ok(),
            api_secret: env::var("PERP_EXEC_API_SECRET").ok(),
            passphrase: env::var("PERP_EXEC_PASSPHRASE").ok(),
            wallet_address: env::var("PERP_EXEC_WALLET_ADDRESS").ok(),
            private_key: env::var("PERP_EXEC_PRIVATE_KEY").ok(),
            api_key_index: env::var("PERP_EXEC_API_KEY_INDEX")
                .ok()
                .and_then(|v| v.parse().ok()),
        })
    }

    /// API key + secret, or an auth error naming what is missing
    pub fn require_hmac(&self) -> Result<(&str, &str), ExecError> {
        match (self.api_key.as_deref(), self.api_secret.as_deref()) {
            (Some(k), Some(s)) if !k.is_empty() && !s.is_empty() => Ok((k, s)),
            _ => Err(ExecError::Auth("API key/secret not configured".to_string())),
        }
    }

    /// Passphrase, or an auth error
    pub fn require_passphrase(&self) -> Result<&str, ExecError> {
        self.passphrase
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ExecError::Auth("passphrase not configured".to_string()))
    }

    /// Private key with any `0x`/`0X` prefix stripped, or an auth error
    pub fn require_private_key(&self) -> Result<String, ExecError> {
        let key = self
            .private_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ExecError::Auth("private key not configured".to_string()))?;
        Ok(strip_hex_prefix(key).to_string())
    }

    /// Wallet address, or an auth error
    pub fn require_wallet(&self) -> Result<&str, ExecError> {
        self.wallet_address
            .as_deref()
            .filter(|w| !w.is_empty())
            .ok_or_else(|| ExecError::Auth("wallet address not configured".to_string()))
    }
}

/// Strip a leading `0x`/`0X` from a hex key
pub fn strip_hex_prefix(key: &str) -> &str {
    key.strip_prefix("0x")
        .or_else(|| key.strip_prefix("0X"))
        .unwrap_or(key)
}

// Secrets never reach logs: Debug prints presence only.
impl fmt::Debug for VenueCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VenueCredentials")
            .field("api_key", &self.api_key.as_deref().map(|_| "***"))
            .field("api_secret", &self.api_secret.as_deref().map(|_| "***"))
            .field("passphrase", &self.passphrase.as_deref().map(|_| "***"))
            .field("wallet_address", &self.wallet_address)
            .field("private_key", &self.private_key.as_deref().map(|_| "***"))
            .field("api_key_index", &self.api_key_index)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_hex_prefix() {
        assert_eq!(strip_hex_prefix("0xabc123"), "abc123");
        assert_eq!(strip_hex_prefix("0Xabc123"), "abc123");
        assert_eq!(strip_hex_prefix("abc123"), "abc123");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = VenueCredentials {
            api_key: Some("key".into()),
            api_secret: Some("super-secret".into()),
            private_key: Some("deadbeef".into()),
            ..Default::default()
        };
        let dbg = format!("{creds:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(!dbg.contains("deadbeef"));
    }

    #[test]
    fn test_require_hmac_missing() {
        let creds = VenueCredentials::default();
        assert!(creds.require_hmac().is_err());
    }
}
