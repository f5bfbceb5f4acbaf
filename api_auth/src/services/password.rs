use argon2::{
    Algorithm, Argon2, Params, ParamsBuilder, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use common::error::{AppError, Res};

/// Argon2id hashing with a configurable time cost.
///
/// Both operations run on the blocking thread pool.
#[derive(Debug, Clone)]
pub struct PasswordService {
    params: Params,
}

impl PasswordService {
    /// `cost` is the Argon2 time cost (passes over memory). Memory and
    /// parallelism stay at the library defaults.
    pub fn new(cost: u32) -> Res<Self> {
        let params = ParamsBuilder::new()
            .t_cost(cost.max(1))
            .build()
            .map_err(|e| AppError::Internal(format!("Invalid password hash parameters: {}", e)))?;
        Ok(PasswordService { params })
    }

    fn argon2(params: Params) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    }

    /// Hashes a plaintext password into a PHC string.
    pub async fn hash(&self, plaintext: &str) -> Res<String> {
        let params = self.params.clone();
        let plaintext = plaintext.to_owned();

        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            Self::argon2(params)
                .hash_password(plaintext.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
        })
        .await
        .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
    }

    /// Returns `false` on mismatch and on a malformed stored hash.
    pub async fn verify(&self, plaintext: &str, hash: &str) -> bool {
        let params = self.params.clone();
        let plaintext = plaintext.to_owned();
        let hash = hash.to_owned();

        tokio::task::spawn_blocking(move || {
            let Ok(parsed) = PasswordHash::new(&hash) else {
                return false;
            };
            Self::argon2(params)
                .verify_password(plaintext.as_bytes(), &parsed)
                .is_ok()
        })
        .await
        .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_then_verify() {
        let service = PasswordService::new(1).unwrap();
        let hash = service.hash("correct horse").await.unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("correct horse"));
        assert!(service.verify("correct horse", &hash).await);
        assert!(!service.verify("wrong horse", &hash).await);
    }

    #[tokio::test]
    async fn same_password_gets_distinct_salts() {
        let service = PasswordService::new(1).unwrap();
        let first = service.hash("secret-pass").await.unwrap();
        let second = service.hash("secret-pass").await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn malformed_hash_does_not_verify() {
        let service = PasswordService::new(1).unwrap();
        assert!(!service.verify("anything", "not-a-phc-string").await);
    }
}
