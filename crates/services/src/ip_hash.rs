//! One-way address hashing for vote de-duplication.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Keyed SHA-256 of a client address, hex encoded (64 chars).
///
/// With an empty key this is plain SHA-256 of the address. Changing the key
/// changes every hash, which resets vote de-duplication.
#[derive(Clone)]
pub struct AddressHasher {
    key: Vec<u8>,
}

impl AddressHasher {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    pub fn hash(&self, address: &str) -> String {
        if self.key.is_empty() {
            return hex::encode(Sha256::digest(address.as_bytes()));
        }
        // HMAC accepts keys of any length
        let mut mac = match HmacSha256::new_from_slice(&self.key) {
            Ok(mac) => mac,
            Err(_) => return hex::encode(Sha256::digest(address.as_bytes())),
        };
        mac.update(address.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

impl std::fmt::Debug for AddressHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressHasher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unkeyed_hash_is_plain_sha256() {
        let h = AddressHasher::new(Vec::new()).hash("127.0.0.1");
        assert_eq!(h.len(), 64);
        assert_eq!(h, hex::encode(Sha256::digest(b"127.0.0.1")));
    }

    #[test]
    fn keyed_hash_differs_and_is_stable() {
        let a = AddressHasher::new("pepper");
        let b = AddressHasher::new("other");
        assert_eq!(a.hash("10.0.0.1"), a.hash("10.0.0.1"));
        assert_ne!(a.hash("10.0.0.1"), b.hash("10.0.0.1"));
        assert_ne!(a.hash("10.0.0.1"), a.hash("10.0.0.2"));
    }
}
