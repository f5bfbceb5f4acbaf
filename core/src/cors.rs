use actix_cors::Cors;
use actix_web::http::header::{self, HeaderName};

/// `origins` is a comma-separated list; blank entries are ignored.
pub fn middleware(origins: &str) -> Cors {
    origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static("stripe-signature"),
        ])
        .max_age(3600)
}
