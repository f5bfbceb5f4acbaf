use actix_web::{dev::HttpServiceFactory, web};
use middleware::gate::SubscriptionGate;

pub mod provider;
pub mod routes {
    pub mod premium;
    pub mod sub;
    pub mod webhook;
}
pub mod services {
    pub mod sub;
    pub mod webhook;
}
pub mod dtos {
    pub mod sub;
}
pub mod middleware {
    pub mod gate;
}

pub fn subscription_gate() -> SubscriptionGate {
    SubscriptionGate
}

// Webhook is public, subscription management needs a session
pub fn mount_payment() -> actix_web::Scope {
    web::scope("/payment")
        .service(routes::webhook::post_webhook)
        .service(
            web::scope("/subscription")
                .wrap(api_auth::auth_middleware())
                .service(routes::sub::post_subscription)
                .service(routes::sub::post_test_subscription)
                .service(routes::sub::get_subscription)
                .service(routes::sub::get_subscription_status)
                .service(routes::sub::delete_subscription),
        )
}

pub fn mount_premium() -> impl HttpServiceFactory {
    web::scope("/premium-feature")
        .wrap(subscription_gate())
        .wrap(api_auth::auth_middleware())
        .service(routes::premium::get_premium_feature)
}
