use std::{sync::Arc, time::Duration};

use actix_web::{Responder, get, web};
use api_auth::services::{
    auth::{AttemptPolicies, AuthService},
    password::PasswordService,
    reset::ResetTokenSender,
    user::UserService,
};
use api_subs::{
    provider::PaymentProvider,
    services::{sub::SubscriptionService, webhook::WebhookService},
};
use chrono::{DateTime, Utc};
use common::{clock::Clock, env_config::Config, error::Res, http::Success};
use db::store::{SubscriptionStore, UserStore};
use limiter::attempts::{AttemptCounter, AttemptPolicy, FORGOT_PASSWORD_SCOPE, LOGIN_SCOPE};
use serde::{Deserialize, Serialize};

/// External collaborators the services are built on.
pub struct Backends {
    pub users: Arc<dyn UserStore>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub provider: Arc<dyn PaymentProvider>,
    pub counter: Arc<dyn AttemptCounter>,
    pub clock: Arc<dyn Clock>,
    pub sender: Arc<dyn ResetTokenSender>,
}

/// Services shared by every worker.
#[derive(Clone)]
pub struct Services {
    pub users: web::Data<UserService>,
    pub auth: web::Data<AuthService>,
    pub subscriptions: web::Data<SubscriptionService>,
    pub webhooks: web::Data<WebhookService>,
}

impl Services {
    pub fn build(config: &Config, backends: Backends) -> Res<Self> {
        let passwords = PasswordService::new(config.security.password_hash_cost)?;
        let window = Duration::from_secs(config.attempts.window_secs);

        let users = UserService::new(
            backends.users.clone(),
            backends.subscriptions.clone(),
            passwords.clone(),
        );
        let auth = AuthService::new(
            backends.users.clone(),
            passwords,
            config.jwt_config.clone(),
            backends.clock.clone(),
            chrono::Duration::minutes(config.security.reset_token_ttl_minutes),
            backends.sender,
            backends.counter,
            AttemptPolicies {
                login: AttemptPolicy::new(LOGIN_SCOPE, config.attempts.login_max_attempts, window),
                forgot_password: AttemptPolicy::new(
                    FORGOT_PASSWORD_SCOPE,
                    config.attempts.forgot_password_max_attempts,
                    window,
                ),
            },
        );
        let subscriptions = SubscriptionService::new(
            backends.users,
            backends.subscriptions.clone(),
            backends.provider.clone(),
            backends.clock,
        );
        let webhooks = WebhookService::new(backends.subscriptions, backends.provider);

        Ok(Services {
            users: web::Data::new(users),
            auth: web::Data::new(auth),
            subscriptions: web::Data::new(subscriptions),
            webhooks: web::Data::new(webhooks),
        })
    }

    pub fn register(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.users.clone())
            .app_data(self.auth.clone())
            .app_data(self.subscriptions.clone())
            .app_data(self.webhooks.clone());
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

#[get("/health")]
pub async fn get_health() -> Res<impl Responder> {
    Success::ok(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now(),
    })
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(get_health)
            .service(api_auth::mount_auth())
            .service(api_auth::mount_user())
            .service(api_auth::mount_admin())
            .service(api_subs::mount_payment())
            .service(api_subs::mount_premium()),
    );
}
