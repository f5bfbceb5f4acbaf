use stripe::Client;

use crate::env_config::StripeConfig;

pub fn create_client(config: &StripeConfig) -> Client {
    log::info!(
        "Stripe client configured (requested API version {})",
        config.api_version
    );
    Client::new(config.secret_key.clone())
}
