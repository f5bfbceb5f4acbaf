use std::{future::Future, pin::Pin, rc::Rc};

use actix_web::{
    Error,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    web,
};
use common::{error::AppError, jwt};

use crate::services::sub::SubscriptionService;

/// Lets a request through only when the caller holds an active subscription.
pub struct SubscriptionGate;

impl<S, B> Transform<S, ServiceRequest> for SubscriptionGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Transform = SubscriptionGateService<S>;
    type InitError = ();
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(SubscriptionGateService {
            service: Rc::new(service),
        }))
    }
}

pub struct SubscriptionGateService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for SubscriptionGateService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = Rc::clone(&self.service);

        Box::pin(async move {
            let claims = match jwt::get_jwt_claims_or_error(&req) {
                Ok(claims) => claims,
                Err(response) => return Ok(req.into_response(response)),
            };

            let subscriptions = match req.app_data::<web::Data<SubscriptionService>>() {
                Some(service) => service.clone(),
                None => {
                    return Ok(req.error_response(AppError::Internal(
                        "Subscription service is not configured".to_string(),
                    )));
                }
            };

            if let Err(e) = subscriptions.require_active(claims.sub).await {
                log::debug!("Premium access refused for {}: {}", claims.sub, e);
                return Ok(req.error_response(e));
            }

            srv.call(req).await.map(|res| res.map_into_boxed_body())
        })
    }
}
