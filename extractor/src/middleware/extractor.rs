use std::{future::Future, pin::Pin, rc::Rc, sync::Arc};

use actix_web::{
    Error, HttpMessage,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use futures::future::{Ready, ok};

use common::{
    error::Res,
    jwt::{self, JwtClaims},
};

/// Parses `Authorization: Bearer <token>` and stores the validation result in
/// the request extensions. Never rejects; guards decide what a missing or bad
/// token means for their routes.
pub struct ExtractionMiddleware {
    secret: Arc<str>,
}

impl ExtractionMiddleware {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: Arc::from(secret),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ExtractionMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Transform = ExtractionMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(ExtractionMiddlewareService {
            service: Rc::new(service),
            secret: Arc::clone(&self.secret),
        })
    }
}

pub struct ExtractionMiddlewareService<S> {
    service: Rc<S>,
    secret: Arc<str>,
}

pub fn bearer_token(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_owned())
        .filter(|token| !token.is_empty())
}

impl<S, B> Service<ServiceRequest> for ExtractionMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let token = bearer_token(&req);
        let secret = Arc::clone(&self.secret);
        let srv = Rc::clone(&self.service);

        Box::pin(async move {
            if let Some(token) = token {
                let claims_res = jwt::validate_jwt(&token, &secret);
                req.extensions_mut().insert::<Res<JwtClaims>>(claims_res);
            }
            srv.call(req).await.map(|res| res.map_into_boxed_body())
        })
    }
}

#[cfg(test)]
mod tests {
    use actix_web::{App, HttpRequest, HttpResponse, test, web};
    use common::{
        env_config::JwtConfig,
        jwt::{ClaimsSpec, generate_jwt},
        misc::Role,
    };
    use uuid::Uuid;

    use super::*;

    const SECRET: &str = "extractor-test-secret";

    async fn describe(req: HttpRequest) -> HttpResponse {
        let body = match req.extensions().get::<Res<JwtClaims>>() {
            None => "none".to_string(),
            Some(Ok(claims)) => claims.email.clone(),
            Some(Err(e)) => e.to_string(),
        };
        HttpResponse::Ok().body(body)
    }

    fn token() -> String {
        generate_jwt(
            ClaimsSpec {
                user_id: Uuid::new_v4(),
                email: "ada@example.com".into(),
                name: "Ada".into(),
                role: Role::User,
            },
            &JwtConfig {
                secret: SECRET.into(),
                expiration_minutes: 5,
            },
        )
        .unwrap()
    }

    #[actix_web::test]
    async fn stores_validation_result_per_request() {
        let app = test::init_service(
            App::new()
                .wrap(ExtractionMiddleware::new(SECRET))
                .route("/", web::get().to(describe)),
        )
        .await;

        let req = test::TestRequest::get().uri("/").to_request();
        assert_eq!(test::call_and_read_body(&app, req).await, "none");

        let req = test::TestRequest::get()
            .uri("/")
            .insert_header(("Authorization", format!("Bearer {}", token())))
            .to_request();
        assert_eq!(test::call_and_read_body(&app, req).await, "ada@example.com");

        let req = test::TestRequest::get()
            .uri("/")
            .insert_header(("Authorization", "Bearer not-a-token"))
            .to_request();
        assert_eq!(test::call_and_read_body(&app, req).await, "Invalid token");

        let req = test::TestRequest::get()
            .uri("/")
            .insert_header(("Authorization", "Basic abc"))
            .to_request();
        assert_eq!(test::call_and_read_body(&app, req).await, "none");
    }
}
