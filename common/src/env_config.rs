use std::{env, str::FromStr, sync::Arc};

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{0} must be a valid number")]
    Invalid(&'static str),
}

#[derive(Clone, Debug)]
/// Configuration struct for the server.
///
/// Holds the database and Redis connection details, session token settings,
/// server host and port, worker count, CORS and logging preferences, the
/// payment provider credentials and the account security knobs (reset token
/// lifetime, sweep interval, password hash cost, attempt limits).
pub struct Config {
    // environment
    pub environment: String, // development or production
    /// The URL of the database to connect to.
    pub database_url: String,
    /// The URL of the Redis server backing the attempt counters.
    /// When absent, counters live in process memory.
    pub redis_url: Option<String>,
    /// Configuration for JWT (JSON Web Token) authentication.
    pub jwt_config: JwtConfig,
    /// The hostname or IP address the server will bind to.
    pub server_host: String,
    /// The port number the server will listen on.
    pub server_port: u16,
    /// The number of worker threads to spawn for handling requests.
    pub num_workers: usize,
    /// The allowed origin for CORS (Cross-Origin Resource Sharing).
    pub cors_allowed_origin: String,
    /// A boolean indicating whether console logging is enabled.
    pub console_logging_enabled: bool,
    /// Stripe credentials.
    pub stripe: StripeConfig,
    /// Password reset and hashing settings.
    pub security: SecurityConfig,
    /// Login and forgot-password throttling.
    pub attempts: AttemptConfig,
    /// Process-wide request budget.
    pub global_permits_per_second: u32,
    /// Administrator created at startup when missing.
    pub admin_seed: Option<AdminSeed>,
}

#[derive(Clone, Debug)]
/// Configuration for JSON Web Token (JWT) authentication.
///
/// This struct contains the secret key used to sign JWTs and
/// the expiration time in minutes for issued tokens.
pub struct JwtConfig {
    /// The secret key used to sign and verify JWTs.
    pub secret: String,
    /// The expiration time for JWTs in minutes.
    pub expiration_minutes: i64,
}

#[derive(Clone, Debug)]
pub struct StripeConfig {
    pub secret_key: String,
    /// Informational only, the client library pins its own API version.
    pub api_version: String,
    pub webhook_secret: String,
}

#[derive(Clone, Debug)]
pub struct SecurityConfig {
    pub reset_token_ttl_minutes: i64,
    pub reset_sweep_interval_secs: u64,
    /// Argon2 time cost.
    pub password_hash_cost: u32,
}

#[derive(Clone, Debug)]
pub struct AttemptConfig {
    pub login_max_attempts: u64,
    pub forgot_password_max_attempts: u64,
    pub window_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
    pub name: String,
}

fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn or_default<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).unwrap_or_else(|| default.to_string())
}

fn number<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

impl JwtConfig {
    /// Reads the JWT configuration:
    /// - `JWT_SECRET`: Required. The secret key for JWT signing.
    /// - `JWT_EXPIRATION_MINUTES`: Optional. Defaults to 60 minutes.
    pub fn from_vars<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(JwtConfig {
            secret: required(lookup, "JWT_SECRET")?,
            expiration_minutes: number(lookup, "JWT_EXPIRATION_MINUTES", 60)?,
        })
    }
}

impl Config {
    /// Creates a new `Config` from the process environment, reading `.env` first.
    ///
    /// # Environment Variables
    ///
    /// Required:
    /// - `DATABASE_URL`: Connection string for the database
    /// - `JWT_SECRET`: Secret key for JWT signing
    /// - `STRIPE_SECRET_KEY`, `STRIPE_WEBHOOK_SECRET`: payment provider credentials
    ///
    /// Optional (with defaults):
    /// - `ENVIRONMENT`: (default: "development")
    /// - `REDIS_URL`: attempt counter store (default: in-memory)
    /// - `IP`: Server host (default: "127.0.0.1")
    /// - `PORT`: Server port (default: 8080)
    /// - `WORKERS`: Number of worker threads (default: 4)
    /// - `CORS_ALLOWED_ORIGIN`: Comma-separated allowed CORS origins (default: "http://localhost:3000")
    /// - `ENABLE_CONSOLE_LOGGING`: Whether to enable console logging (default: true)
    /// - `STRIPE_API_VERSION`: (default: "2024-12-18.acacia")
    /// - `RESET_TOKEN_TTL_MINUTES` (10), `RESET_SWEEP_INTERVAL_SECS` (3600), `PASSWORD_HASH_COST` (12)
    /// - `LOGIN_MAX_ATTEMPTS` (5), `FORGOT_PASSWORD_MAX_ATTEMPTS` (3), `ATTEMPT_WINDOW_SECS` (900)
    /// - `GLOBAL_PERMITS_PER_SECOND` (10)
    /// - `ADMIN_EMAIL`, `ADMIN_PASSWORD`, `ADMIN_NAME`: bootstrap administrator
    pub fn from_env() -> Result<Arc<Self>, ConfigError> {
        dotenvy::dotenv().ok();

        Config::from_vars(|key| env::var(key).ok()).map(Arc::new)
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let admin_seed = match (lookup("ADMIN_EMAIL"), lookup("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminSeed {
                email,
                password,
                name: or_default(&lookup, "ADMIN_NAME", "Administrator"),
            }),
            _ => None,
        };

        Ok(Config {
            environment: or_default(&lookup, "ENVIRONMENT", "development"),
            database_url: required(&lookup, "DATABASE_URL")?,
            redis_url: lookup("REDIS_URL").filter(|url| !url.trim().is_empty()),
            jwt_config: JwtConfig::from_vars(&lookup)?,
            server_host: or_default(&lookup, "IP", "127.0.0.1"),
            server_port: number(&lookup, "PORT", 8080)?,
            num_workers: number(&lookup, "WORKERS", 4)?,
            cors_allowed_origin: or_default(&lookup, "CORS_ALLOWED_ORIGIN", "http://localhost:3000"),
            console_logging_enabled: or_default(&lookup, "ENABLE_CONSOLE_LOGGING", "true")
                .to_lowercase()
                == "true",
            stripe: StripeConfig {
                secret_key: required(&lookup, "STRIPE_SECRET_KEY")?,
                api_version: or_default(&lookup, "STRIPE_API_VERSION", "2024-12-18.acacia"),
                webhook_secret: required(&lookup, "STRIPE_WEBHOOK_SECRET")?,
            },
            security: SecurityConfig {
                reset_token_ttl_minutes: number(&lookup, "RESET_TOKEN_TTL_MINUTES", 10)?,
                reset_sweep_interval_secs: number(&lookup, "RESET_SWEEP_INTERVAL_SECS", 3600)?,
                password_hash_cost: number(&lookup, "PASSWORD_HASH_COST", 12)?,
            },
            attempts: AttemptConfig {
                login_max_attempts: number(&lookup, "LOGIN_MAX_ATTEMPTS", 5)?,
                forgot_password_max_attempts: number(&lookup, "FORGOT_PASSWORD_MAX_ATTEMPTS", 3)?,
                window_secs: number(&lookup, "ATTEMPT_WINDOW_SECS", 900)?,
            },
            global_permits_per_second: number(&lookup, "GLOBAL_PERMITS_PER_SECOND", 10)?,
            admin_seed,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const BASE: [(&str, &str); 4] = [
        ("DATABASE_URL", "postgres://localhost/accounts"),
        ("JWT_SECRET", "secret"),
        ("STRIPE_SECRET_KEY", "sk_test"),
        ("STRIPE_WEBHOOK_SECRET", "whsec_test"),
    ];

    #[test]
    fn defaults_are_applied() {
        let config = Config::from_vars(vars(&BASE)).unwrap();

        assert_eq!(config.jwt_config.expiration_minutes, 60);
        assert_eq!(config.security.reset_token_ttl_minutes, 10);
        assert_eq!(config.security.reset_sweep_interval_secs, 3600);
        assert_eq!(config.security.password_hash_cost, 12);
        assert_eq!(config.attempts.login_max_attempts, 5);
        assert_eq!(config.attempts.forgot_password_max_attempts, 3);
        assert_eq!(config.stripe.api_version, "2024-12-18.acacia");
        assert!(config.redis_url.is_none());
        assert!(config.admin_seed.is_none());
        assert!(!config.is_production());
    }

    #[test]
    fn missing_jwt_secret_fails_fast() {
        let pairs: Vec<_> = BASE.into_iter().filter(|(k, _)| *k != "JWT_SECRET").collect();
        let error = Config::from_vars(vars(&pairs)).unwrap_err();
        assert_eq!(error, ConfigError::Missing("JWT_SECRET"));
    }

    #[test]
    fn blank_jwt_secret_is_treated_as_missing() {
        let pairs: Vec<_> = BASE
            .into_iter()
            .map(|(k, v)| if k == "JWT_SECRET" { (k, "  ") } else { (k, v) })
            .collect();
        let error = Config::from_vars(vars(&pairs)).unwrap_err();
        assert_eq!(error, ConfigError::Missing("JWT_SECRET"));
    }

    #[test]
    fn malformed_number_is_rejected() {
        let mut pairs = BASE.to_vec();
        pairs.push(("PASSWORD_HASH_COST", "twelve"));
        let error = Config::from_vars(vars(&pairs)).unwrap_err();
        assert_eq!(error, ConfigError::Invalid("PASSWORD_HASH_COST"));
    }

    #[test]
    fn admin_seed_requires_email_and_password() {
        let mut pairs = BASE.to_vec();
        pairs.push(("ADMIN_EMAIL", "admin@example.com"));
        assert!(Config::from_vars(vars(&pairs)).unwrap().admin_seed.is_none());

        pairs.push(("ADMIN_PASSWORD", "Sup3rSecret!"));
        let seed = Config::from_vars(vars(&pairs)).unwrap().admin_seed.unwrap();
        assert_eq!(seed.email, "admin@example.com");
        assert_eq!(seed.name, "Administrator");
    }
}
