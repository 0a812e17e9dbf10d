//! Request signing primitives shared by the venue drivers
//!
//! Three families: HMAC digests for the CEX venues, the Hyperliquid
//! action-hash EIP-712 agent scheme, and plain keccak/ECDSA digest signing
//! for Aster.

use crate::error::ExecError;
use base64::Engine;
use ethers_core::types::transaction::eip712::EIP712Domain;
use ethers_core::types::{Address, H256, U256};
use ethers_core::utils::keccak256;
use ethers_signers::{LocalWallet, Signer};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use std::str::FromStr;

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// HMAC-SHA256 as lowercase hex (Binance, Bybit, Aster REST fallback)
pub fn hmac_sha256_hex(secret: &str, payload: &str) -> Result<String, ExecError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ExecError::Auth(format!("invalid API secret: {e}")))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// HMAC-SHA256 as Base64 (OKX, Bitget)
pub fn hmac_sha256_b64(secret: &str, payload: &str) -> Result<String, ExecError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ExecError::Auth(format!("invalid API secret: {e}")))?;
    mac.update(payload.as_bytes());
    Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

/// HMAC-SHA512 as lowercase hex (Gate.io)
pub fn hmac_sha512_hex(secret: &str, payload: &str) -> Result<String, ExecError> {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .map_err(|e| ExecError::Auth(format!("invalid API secret: {e}")))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// SHA-512 of a request body as lowercase hex (Gate.io payload hash)
pub fn sha512_hex(payload: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

/// ECDSA signature in the r/s/v wire form the on-chain venues expect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireSignature {
    /// r component, 0x-prefixed 32-byte hex
    pub r: String,
    /// s component, 0x-prefixed 32-byte hex
    pub s: String,
    /// recovery id
    pub v: u8,
}

/// Hyperliquid action hash: msgpack bytes + big-endian nonce + vault marker.
pub fn action_hash(msgpack: &[u8], nonce: u64, vault_address: Option<&str>) -> [u8; 32] {
    let mut buf = msgpack.to_vec();
    buf.extend_from_slice(&nonce.to_be_bytes());
    match vault_address {
        None => buf.push(0x00),
        Some(addr) => {
            buf.push(0x01);
            let clean = addr.strip_prefix("0x").unwrap_or(addr);
            if let Ok(bytes) = hex::decode(clean) {
                buf.extend_from_slice(&bytes);
            }
        }
    }
    keccak256(&buf)
}

/// Sign a Hyperliquid action hash via the phantom-agent EIP-712 scheme.
///
/// Domain `Exchange/1` on chain id 1337; message is
/// `Agent(string source, bytes32 connectionId)` with source `a` on mainnet
/// and `b` on testnet.
pub fn sign_agent(
    private_key: &str,
    connection_id: [u8; 32],
    mainnet: bool,
) -> Result<WireSignature, ExecError> {
    let wallet =
        LocalWallet::from_str(private_key).map_err(|e| ExecError::Auth(e.to_string()))?;

    let domain = EIP712Domain {
        name: Some("Exchange".to_string()),
        version: Some("1".to_string()),
        chain_id: Some(U256::from(1337)),
        verifying_contract: Some(Address::zero()),
        salt: None,
    };
    let domain_hash = domain.separator();

    let agent_type_hash = keccak256("Agent(string source,bytes32 connectionId)".as_bytes());
    let source = if mainnet { "a" } else { "b" };
    let source_hash = keccak256(source.as_bytes());

    let mut encoded = Vec::new();
    encoded.extend_from_slice(&agent_type_hash);
    encoded.extend_from_slice(&source_hash);
    encoded.extend_from_slice(&connection_id);
    let struct_hash = keccak256(&encoded);

    let mut payload = Vec::new();
    payload.extend_from_slice(&[0x19, 0x01]);
    payload.extend_from_slice(&domain_hash);
    payload.extend_from_slice(&struct_hash);
    let digest = H256::from(keccak256(&payload));

    sign_digest(&wallet, digest)
}

/// Sign a raw keccak digest with a wallet key (Aster request signing)
pub fn sign_keccak_digest(private_key: &str, digest: [u8; 32]) -> Result<WireSignature, ExecError> {
    let wallet =
        LocalWallet::from_str(private_key).map_err(|e| ExecError::Auth(e.to_string()))?;
    sign_digest(&wallet, H256::from(digest))
}

fn sign_digest(wallet: &LocalWallet, digest: H256) -> Result<WireSignature, ExecError> {
    let sig = wallet
        .sign_hash(digest)
        .map_err(|e| ExecError::Auth(e.to_string()))?;
    Ok(WireSignature {
        r: format!("0x{:0>64x}", sig.r),
        s: format!("0x{:0>64x}", sig.s),
        v: sig.v as u8,
    })
}

/// Address derived from a hex private key, 0x-prefixed lowercase
pub fn wallet_address(private_key: &str) -> Result<String, ExecError> {
    let wallet =
        LocalWallet::from_str(private_key).map_err(|e| ExecError::Auth(e.to_string()))?;
    Ok(format!("{:#x}", wallet.address()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    #[test]
    fn test_hmac_sha256_hex_stable() {
        let a = hmac_sha256_hex("secret", "payload").unwrap();
        let b = hmac_sha256_hex("secret", "payload").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(hmac_sha256_hex("other", "payload").unwrap(), a);
    }

    #[test]
    fn test_hmac_b64_differs_from_hex() {
        let hex = hmac_sha256_hex("s", "p").unwrap();
        let b64 = hmac_sha256_b64("s", "p").unwrap();
        assert_ne!(hex, b64);
    }

    #[test]
    fn test_action_hash_sensitive_to_nonce_and_vault() {
        let bytes = b"msgpack-bytes";
        let h1 = action_hash(bytes, 1, None);
        let h2 = action_hash(bytes, 2, None);
        let h3 = action_hash(bytes, 1, Some("0x1111111111111111111111111111111111111111"));
        assert_ne!(h1, h2);
        assert_ne!(h1, h3);
    }

    #[test]
    fn test_sign_agent_mainnet_vs_testnet() {
        let hash = action_hash(b"x", 7, None);
        let main = sign_agent(TEST_KEY, hash, true).unwrap();
        let test = sign_agent(TEST_KEY, hash, false).unwrap();
        assert_ne!(main.r, test.r);
        assert!(main.r.starts_with("0x"));
        assert_eq!(main.r.len(), 66);
    }

    #[test]
    fn test_wallet_address_shape() {
        let addr = wallet_address(TEST_KEY).unwrap();
        assert!(addr.starts_with("0x"));
        assert_eq!(addr.len(), 42);
    }
}
