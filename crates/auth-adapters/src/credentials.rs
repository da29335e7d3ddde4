//! Random credential material and its one-way digest.

use domains::error::{DomainError, Result};
use domains::ports::{CredentialIssuer, IssuedKey};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

/// 32 random bytes, hex encoded to 64 chars.
pub const API_KEY_BYTES: usize = 32;
/// 12 random bytes, hex encoded to 24 chars.
pub const CLAIM_CODE_BYTES: usize = 12;

/// Issues keys from the OS CSPRNG and hashes them with unsalted SHA-256,
/// which doubles as the lookup index.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCredentialIssuer;

impl RandomCredentialIssuer {
    pub fn new() -> Self {
        Self
    }
}

fn random_hex<const N: usize>() -> Result<String> {
    let mut buf = [0u8; N];
    getrandom::getrandom(&mut buf).map_err(|e| {
        tracing::error!(error = %e, "OS random source unavailable");
        DomainError::Internal(format!("random source: {e}"))
    })?;
    let encoded = hex::encode(buf);
    buf.zeroize();
    Ok(encoded)
}

pub fn sha256_hex(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

impl CredentialIssuer for RandomCredentialIssuer {
    fn issue_api_key(&self) -> Result<IssuedKey> {
        let raw = random_hex::<API_KEY_BYTES>()?;
        let hash = sha256_hex(&raw);
        Ok(IssuedKey { raw, hash })
    }

    fn issue_claim_code(&self) -> Result<String> {
        random_hex::<CLAIM_CODE_BYTES>()
    }

    fn hash_api_key(&self, raw: &str) -> String {
        sha256_hex(raw)
    }
}
