//! Operator credential check for the admin routes.

use argon2::password_hash::{PasswordHash, PasswordVerifier};
use argon2::Argon2;
use async_trait::async_trait;
use domains::ports::AdminAuthenticator;
use secrecy::{ExposeSecret, SecretString};

/// Verifies the presented key against an argon2 PHC string.
/// Without a configured hash every attempt fails.
pub struct Argon2AdminVerifier {
    phc: Option<SecretString>,
}

impl Argon2AdminVerifier {
    pub fn new(phc: Option<SecretString>) -> Self {
        let phc = phc.filter(|p| !p.expose_secret().trim().is_empty());
        if phc.is_none() {
            tracing::warn!("no admin key hash configured; admin routes are disabled");
        }
        Self { phc }
    }
}

fn verify(presented: &str, phc: &str) -> bool {
    let parsed = match PasswordHash::new(phc) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %e, "configured admin key hash is not a valid PHC string");
            return false;
        }
    };
    Argon2::default()
        .verify_password(presented.as_bytes(), &parsed)
        .is_ok()
}

#[async_trait]
impl AdminAuthenticator for Argon2AdminVerifier {
    async fn verify_admin_key(&self, presented: &str) -> bool {
        let Some(phc) = &self.phc else {
            return false;
        };
        if presented.is_empty() {
            return false;
        }
        let presented = presented.to_string();
        let phc = phc.expose_secret().to_string();
        // argon2 verification blocks for tens of milliseconds
        tokio::task::spawn_blocking(move || verify(&presented, &phc))
            .await
            .unwrap_or(false)
    }
}

/// PHC hash for a new operator key, used by the seed tool.
pub fn hash_admin_key(raw: &str) -> Result<String, argon2::password_hash::Error> {
    use argon2::password_hash::{PasswordHasher, SaltString};

    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|_| argon2::password_hash::Error::Crypto)?;
    let salt = SaltString::encode_b64(&salt_bytes)?;
    Ok(Argon2::default()
        .hash_password(raw.as_bytes(), &salt)?
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn accepts_only_the_hashed_key() {
        let phc = hash_admin_key("operator-secret").unwrap();
        let verifier = Argon2AdminVerifier::new(Some(SecretString::from(phc)));
        assert!(verifier.verify_admin_key("operator-secret").await);
        assert!(!verifier.verify_admin_key("guess").await);
        assert!(!verifier.verify_admin_key("").await);
    }

    #[tokio::test]
    async fn unconfigured_rejects_everything() {
        let verifier = Argon2AdminVerifier::new(None);
        assert!(!verifier.verify_admin_key("anything").await);
        let blank = Argon2AdminVerifier::new(Some(SecretString::from("  ".to_string())));
        assert!(!blank.verify_admin_key("anything").await);
    }

    #[tokio::test]
    async fn malformed_hash_rejects() {
        let verifier = Argon2AdminVerifier::new(Some(SecretString::from("not-a-phc".to_string())));
        assert!(!verifier.verify_admin_key("anything").await);
    }
}
