use std::sync::Arc;

use chrono::Duration;
use common::{
    clock::Clock,
    env_config::JwtConfig,
    error::{AppError, Res},
    http::MessageResponse,
    jwt::{self, ClaimsSpec},
};
use db::{dtos::user::UserResponse, store::UserStore};
use limiter::attempts::{AttemptCounter, AttemptPolicy};

use crate::{
    dtos::auth::{AuthResponse, ForgotPasswordRequest, LoginRequest, ResetPasswordRequest},
    services::{
        password::PasswordService,
        reset::{self, ResetTokenSender},
    },
};

pub const FORGOT_PASSWORD_MESSAGE: &str =
    "If the email exists, you will receive instructions to reset your password.";

/// Attempt budgets for the unauthenticated flows.
#[derive(Debug, Clone)]
pub struct AttemptPolicies {
    pub login: AttemptPolicy,
    pub forgot_password: AttemptPolicy,
}

/// Login and the password-reset protocol.
pub struct AuthService {
    users: Arc<dyn UserStore>,
    passwords: PasswordService,
    jwt_config: JwtConfig,
    clock: Arc<dyn Clock>,
    reset_ttl: Duration,
    sender: Arc<dyn ResetTokenSender>,
    counter: Arc<dyn AttemptCounter>,
    policies: AttemptPolicies,
}

impl AuthService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        users: Arc<dyn UserStore>,
        passwords: PasswordService,
        jwt_config: JwtConfig,
        clock: Arc<dyn Clock>,
        reset_ttl: Duration,
        sender: Arc<dyn ResetTokenSender>,
        counter: Arc<dyn AttemptCounter>,
        policies: AttemptPolicies,
    ) -> Self {
        AuthService {
            users,
            passwords,
            jwt_config,
            clock,
            reset_ttl,
            sender,
            counter,
            policies,
        }
    }

    /// Authenticates with email and password and issues a session token.
    /// Unknown email and wrong password fail identically.
    ///
    /// # Arguments
    ///
    /// * `req` - The login credentials.
    ///
    /// # Returns
    ///
    /// The signed token and the public account fields.
    pub async fn login(&self, req: LoginRequest) -> Res<AuthResponse> {
        self.policies
            .login
            .check(self.counter.as_ref(), &req.email)
            .await?;

        let invalid = || AppError::Forbidden("Invalid credentials".to_string());

        let user = self
            .users
            .get_user_by_email(&req.email)
            .await?
            .ok_or_else(invalid)?;

        if !self.passwords.verify(&req.password, &user.password_hash).await {
            return Err(invalid());
        }

        self.policies
            .login
            .reset(self.counter.as_ref(), &req.email)
            .await?;

        let token = jwt::generate_jwt(
            ClaimsSpec {
                user_id: user.id,
                email: user.email.clone(),
                name: user.name.clone(),
                role: user.role,
            },
            &self.jwt_config,
        )?;

        log::info!("User {} logged in", user.id);
        Ok(AuthResponse {
            token,
            user: UserResponse::from(&user),
        })
    }

    /// Starts a password reset. The response is the same whether or not the
    /// email belongs to an account, and an unknown email causes no writes.
    pub async fn forgot_password(&self, req: ForgotPasswordRequest) -> Res<MessageResponse> {
        self.policies
            .forgot_password
            .check(self.counter.as_ref(), &req.email)
            .await?;

        let Some(user) = self.users.get_user_by_email(&req.email).await? else {
            return Ok(MessageResponse::new(FORGOT_PASSWORD_MESSAGE));
        };

        let (secret, digest) = reset::generate_reset_secret();
        let expires_at = self.clock.now() + self.reset_ttl;

        self.users.set_reset_token(user.id, &digest, expires_at).await?;
        // The stored digest is left to expire; the sweep job clears it.
        if let Err(e) = self.sender.deliver(&user, &secret, expires_at).await {
            log::error!("Failed to deliver password reset for user {}: {}", user.id, e);
        }

        Ok(MessageResponse::new(FORGOT_PASSWORD_MESSAGE))
    }

    /// Redeems a reset secret. Wrong and expired secrets fail identically.
    pub async fn reset_password(&self, req: ResetPasswordRequest) -> Res<MessageResponse> {
        let digest = reset::hash_reset_secret(&req.token);

        let user = self
            .users
            .find_by_reset_token(&digest, self.clock.now())
            .await?
            .ok_or(AppError::InvalidOrExpiredToken)?;

        let password_hash = self.passwords.hash(&req.new_password).await?;
        self.users
            .complete_password_reset(user.id, &password_hash)
            .await?;

        log::info!("Password reset completed for user {}", user.id);
        Ok(MessageResponse::new("Password reset successfully!"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use common::{clock::ManualClock, misc::Role};
    use db::{dtos::user::UserCreateRequest, memory::MemoryStore, models::user::User};
    use limiter::attempts::MemoryAttemptCounter;

    use super::*;

    /// Captures delivered secrets so tests can redeem them.
    #[derive(Default)]
    struct CapturingSender {
        secrets: Mutex<Vec<String>>,
    }

    impl CapturingSender {
        fn last(&self) -> Option<String> {
            self.secrets.lock().unwrap().last().cloned()
        }
        fn count(&self) -> usize {
            self.secrets.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ResetTokenSender for CapturingSender {
        async fn deliver(&self, _user: &User, secret: &str, _expires_at: DateTime<Utc>) -> Res<()> {
            self.secrets.lock().unwrap().push(secret.to_string());
            Ok(())
        }
    }

    struct Fixture {
        store: MemoryStore,
        clock: Arc<ManualClock>,
        sender: Arc<CapturingSender>,
        passwords: PasswordService,
        service: AuthService,
    }

    fn fixture_with(login_max: u64, forgot_max: u64) -> Fixture {
        let store = MemoryStore::new();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let sender = Arc::new(CapturingSender::default());
        let passwords = PasswordService::new(1).unwrap();
        let window = std::time::Duration::from_secs(900);

        let service = AuthService::new(
            Arc::new(store.clone()),
            passwords.clone(),
            JwtConfig {
                secret: "test-secret".into(),
                expiration_minutes: 60,
            },
            clock.clone(),
            Duration::minutes(10),
            sender.clone(),
            Arc::new(MemoryAttemptCounter::new()),
            AttemptPolicies {
                login: AttemptPolicy::new("login", login_max, window),
                forgot_password: AttemptPolicy::new("forgot_password", forgot_max, window),
            },
        );

        Fixture {
            store,
            clock,
            sender,
            passwords,
            service,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(5, 3)
    }

    async fn seed_user(f: &Fixture, email: &str, password: &str) -> User {
        let password_hash = f.passwords.hash(password).await.unwrap();
        f.store
            .insert_user(UserCreateRequest {
                name: "Ada".into(),
                email: email.into(),
                password_hash,
                role: Role::User,
            })
            .await
            .unwrap()
    }

    fn login(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.into(),
            password: password.into(),
        }
    }

    fn forgot(email: &str) -> ForgotPasswordRequest {
        ForgotPasswordRequest {
            email: email.into(),
        }
    }

    fn reset(token: &str, new_password: &str) -> ResetPasswordRequest {
        ResetPasswordRequest {
            token: token.into(),
            new_password: new_password.into(),
        }
    }

    #[tokio::test]
    async fn login_issues_token_with_identity_claims() {
        let f = fixture();
        let user = seed_user(&f, "ada@example.com", "first-password").await;

        let auth = f.service.login(login("ada@example.com", "first-password")).await.unwrap();
        let claims = jwt::validate_jwt(&auth.token, "test-secret").unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, "ada@example.com");
        assert_eq!(claims.role, Role::User);
        assert_eq!(auth.user.id, user.id);
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_fail_alike() {
        let f = fixture();
        seed_user(&f, "ada@example.com", "first-password").await;

        let wrong = f.service.login(login("ada@example.com", "nope")).await.unwrap_err();
        let unknown = f.service.login(login("who@example.com", "nope")).await.unwrap_err();
        assert_eq!(wrong.to_string(), unknown.to_string());
        assert!(matches!(wrong, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn login_is_throttled_and_success_resets_budget() {
        let f = fixture_with(2, 3);
        seed_user(&f, "ada@example.com", "first-password").await;

        f.service.login(login("ada@example.com", "nope")).await.unwrap_err();
        f.service.login(login("ada@example.com", "first-password")).await.unwrap();

        f.service.login(login("ada@example.com", "nope")).await.unwrap_err();
        f.service.login(login("ada@example.com", "nope")).await.unwrap_err();
        assert!(matches!(
            f.service.login(login("ada@example.com", "first-password")).await,
            Err(AppError::TooManyRequests(_))
        ));
    }

    #[tokio::test]
    async fn forgot_password_response_is_identical_for_unknown_email() {
        let f = fixture();
        seed_user(&f, "ada@example.com", "first-password").await;

        let known = f.service.forgot_password(forgot("ada@example.com")).await.unwrap();
        let unknown = f.service.forgot_password(forgot("who@example.com")).await.unwrap();
        assert_eq!(known, unknown);
        assert_eq!(known.message, FORGOT_PASSWORD_MESSAGE);
        assert_eq!(f.sender.count(), 1);
    }

    struct FailingSender;

    #[async_trait]
    impl ResetTokenSender for FailingSender {
        async fn deliver(&self, _: &User, _: &str, _: DateTime<Utc>) -> Res<()> {
            Err(AppError::Internal("mail transport down".into()))
        }
    }

    #[tokio::test]
    async fn delivery_failure_does_not_reveal_the_account() {
        let store = MemoryStore::new();
        let window = std::time::Duration::from_secs(900);
        let service = AuthService::new(
            Arc::new(store.clone()),
            PasswordService::new(1).unwrap(),
            JwtConfig {
                secret: "test-secret".into(),
                expiration_minutes: 60,
            },
            Arc::new(ManualClock::new(Utc::now())),
            Duration::minutes(10),
            Arc::new(FailingSender),
            Arc::new(MemoryAttemptCounter::new()),
            AttemptPolicies {
                login: AttemptPolicy::new("login", 5, window),
                forgot_password: AttemptPolicy::new("forgot_password", 3, window),
            },
        );
        store
            .insert_user(UserCreateRequest {
                name: "Ada".into(),
                email: "ada@example.com".into(),
                password_hash: "hash".into(),
                role: Role::User,
            })
            .await
            .unwrap();

        let known = service.forgot_password(forgot("ada@example.com")).await.unwrap();
        let unknown = service.forgot_password(forgot("who@example.com")).await.unwrap();
        assert_eq!(known, unknown);
        assert_eq!(known.message, FORGOT_PASSWORD_MESSAGE);
    }

    #[tokio::test]
    async fn forgot_password_for_unknown_email_writes_nothing() {
        let f = fixture();
        let user = seed_user(&f, "ada@example.com", "first-password").await;

        f.service.forgot_password(forgot("who@example.com")).await.unwrap();

        let stored = f.store.get_user_by_id(user.id).await.unwrap().unwrap();
        assert!(stored.reset_password_token.is_none());
        assert_eq!(stored.updated_at, user.updated_at);
        assert_eq!(f.sender.count(), 0);
    }

    #[tokio::test]
    async fn only_the_digest_is_stored() {
        let f = fixture();
        let user = seed_user(&f, "ada@example.com", "first-password").await;

        f.service.forgot_password(forgot("ada@example.com")).await.unwrap();
        let secret = f.sender.last().unwrap();

        let stored = f.store.get_user_by_id(user.id).await.unwrap().unwrap();
        let token = stored.reset_password_token.unwrap();
        assert_ne!(token, secret);
        assert_eq!(token, reset::hash_reset_secret(&secret));
        assert_eq!(
            stored.reset_password_expires.unwrap(),
            f.clock.now() + Duration::minutes(10)
        );
    }

    #[tokio::test]
    async fn reset_succeeds_once_and_clears_fields() {
        let f = fixture();
        let user = seed_user(&f, "ada@example.com", "first-password").await;
        f.service.forgot_password(forgot("ada@example.com")).await.unwrap();
        let secret = f.sender.last().unwrap();

        let msg = f.service.reset_password(reset(&secret, "second-password")).await.unwrap();
        assert_eq!(msg.message, "Password reset successfully!");

        let stored = f.store.get_user_by_id(user.id).await.unwrap().unwrap();
        assert!(stored.reset_password_token.is_none());
        assert!(stored.reset_password_expires.is_none());
        assert_ne!(stored.password_hash, user.password_hash);
        assert!(f.passwords.verify("second-password", &stored.password_hash).await);

        assert!(matches!(
            f.service.reset_password(reset(&secret, "third-password")).await,
            Err(AppError::InvalidOrExpiredToken)
        ));
    }

    #[tokio::test]
    async fn wrong_and_expired_secrets_fail_identically() {
        let f = fixture();
        seed_user(&f, "ada@example.com", "first-password").await;
        f.service.forgot_password(forgot("ada@example.com")).await.unwrap();
        let secret = f.sender.last().unwrap();

        let wrong = f
            .service
            .reset_password(reset("deadbeef", "second-password"))
            .await
            .unwrap_err();

        f.clock.advance(Duration::minutes(10));
        let expired = f
            .service
            .reset_password(reset(&secret, "second-password"))
            .await
            .unwrap_err();

        assert!(matches!(wrong, AppError::InvalidOrExpiredToken));
        assert!(matches!(expired, AppError::InvalidOrExpiredToken));
        assert_eq!(wrong.to_string(), expired.to_string());
    }

    #[tokio::test]
    async fn forgot_password_is_throttled_for_any_email() {
        let f = fixture_with(5, 1);
        f.service.forgot_password(forgot("who@example.com")).await.unwrap();
        assert!(matches!(
            f.service.forgot_password(forgot("who@example.com")).await,
            Err(AppError::TooManyRequests(_))
        ));
    }
}
