use actix_web::web;
use middleware::auth::AuthMiddleware;

pub mod policy;
pub mod dtos {
    pub mod auth;
    pub mod user;
}
pub mod middleware {
    pub mod auth;
}
pub mod routes {
    pub mod admin;
    pub mod auth;
    pub mod user;
}
pub mod services {
    pub mod auth;
    pub mod password;
    pub mod reset;
    pub mod sweep;
    pub mod user;
}

// Auth middleware
pub fn auth_middleware() -> AuthMiddleware {
    AuthMiddleware
}

// Public login and reset routes
pub fn mount_auth() -> actix_web::Scope {
    web::scope("/auth")
        .service(routes::auth::post_login)
        .service(routes::auth::post_forgot_password)
        .service(routes::auth::post_reset_password)
}

// Registration is public, everything else under /user needs a session
pub fn mount_user() -> actix_web::Scope {
    web::scope("/user").service(routes::user::post_register).service(
        web::scope("")
            .wrap(auth_middleware())
            .service(routes::user::get_profile)
            .service(routes::user::put_profile)
            .service(routes::user::put_change_password)
            .service(routes::user::delete_account),
    )
}

pub fn mount_admin() -> actix_web::Scope {
    web::scope("/admin").service(
        web::scope("/users")
            .wrap(auth_middleware())
            .service(routes::admin::get_users)
            .service(routes::admin::post_user)
            .service(routes::admin::post_admin)
            .service(routes::admin::get_user)
            .service(routes::admin::put_user)
            .service(routes::admin::put_user_password)
            .service(routes::admin::post_promote)
            .service(routes::admin::post_demote)
            .service(routes::admin::delete_user),
    )
}
