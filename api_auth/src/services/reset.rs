use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::Res;
use db::models::user::User;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Bytes of entropy in a reset secret.
const RESET_SECRET_BYTES: usize = 32;

/// Generates a reset secret and the digest that gets stored in its place.
///
/// # Returns
///
/// Tuple of (hex-encoded secret, hex-encoded SHA-256 digest)
pub fn generate_reset_secret() -> (String, String) {
    let mut bytes = [0u8; RESET_SECRET_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let secret = hex::encode(bytes);
    let digest = hash_reset_secret(&secret);
    (secret, digest)
}

/// SHA-256 of the presented secret. A lookup key, not a password hash.
pub fn hash_reset_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

/// Out-of-band channel carrying the plaintext reset secret to the account owner.
#[async_trait]
pub trait ResetTokenSender: Send + Sync {
    async fn deliver(&self, user: &User, secret: &str, expires_at: DateTime<Utc>) -> Res<()>;
}

/// Records that a reset was issued. Never writes the secret anywhere.
pub struct LogResetTokenSender;

#[async_trait]
impl ResetTokenSender for LogResetTokenSender {
    async fn deliver(&self, user: &User, _secret: &str, expires_at: DateTime<Utc>) -> Res<()> {
        // TODO: hand the secret to a mail transport once one is configured
        log::info!(
            "Password reset issued for user {} (expires {})",
            user.id,
            expires_at
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_has_256_bits_and_matches_digest() {
        let (secret, digest) = generate_reset_secret();
        assert_eq!(secret.len(), 64);
        assert_eq!(digest.len(), 64);
        assert_ne!(secret, digest);
        assert_eq!(hash_reset_secret(&secret), digest);
    }

    #[test]
    fn secrets_are_unique() {
        let (a, _) = generate_reset_secret();
        let (b, _) = generate_reset_secret();
        assert_ne!(a, b);
    }
}
