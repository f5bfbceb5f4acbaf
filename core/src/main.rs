mod app;
mod cors;
mod redis;

use std::{sync::Arc, time::Duration};

use actix_web::{App, HttpServer};
use api_auth::services::{reset::LogResetTokenSender, sweep::ResetTokenSweeper};
use api_subs::provider::stripe_provider::StripeProvider;
use app::{Backends, Services};
use common::{clock::SystemClock, env_config::Config};
use db::pg::PgStore;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // get env vars
    let config = Config::from_env().expect("Invalid configuration");

    // init logger
    if config.console_logging_enabled {
        logger::setup(logger::level_for_environment(config.is_production()))
            .expect("Failed to set up logger");
    }

    // init db connection
    let pool = db::setup(&config.database_url, config.is_production())
        .await
        .expect("Failed to set up database");
    let store = Arc::new(PgStore::new(pool));

    // init Redis, attempt counters fall back to memory without it
    let redis_pool = config
        .redis_url
        .as_deref()
        .map(redis::setup_redis)
        .transpose()
        .expect("Failed to create pool of Redis connections");

    let clock = Arc::new(SystemClock);
    let services = Services::build(
        &config,
        Backends {
            users: store.clone(),
            subscriptions: store.clone(),
            provider: Arc::new(StripeProvider::new(&config.stripe)),
            counter: limiter::attempt_counter(redis_pool),
            clock: clock.clone(),
            sender: Arc::new(LogResetTokenSender),
        },
    )
    .expect("Failed to build services");

    if let Some(seed) = &config.admin_seed {
        services
            .users
            .seed_admin(seed)
            .await
            .expect("Failed to seed administrator");
    }

    let sweeper = ResetTokenSweeper::new(
        store,
        clock,
        Duration::from_secs(config.security.reset_sweep_interval_secs),
    )
    .start();

    let config_data = config.clone();
    let global_limiter = limiter::global_middleware(config.global_permits_per_second);
    let result = HttpServer::new(move || {
        let services = services.clone();
        App::new()
            .configure(|cfg| services.register(cfg))
            .wrap(global_limiter.clone()) // 4th
            .wrap(logger::middleware(config_data.console_logging_enabled)) // 3rd
            .wrap(extractor::middleware(&config_data.jwt_config.secret)) // 2nd
            .wrap(cors::middleware(&config_data.cors_allowed_origin)) // 1st
            .configure(app::routes)
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .workers(config.num_workers)
    .run()
    .await;

    sweeper.stop().await;
    result
}
