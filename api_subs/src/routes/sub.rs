use actix_web::{Responder, delete, get, post, web};
use common::{error::Res, http::Success, jwt::JwtClaims};
use validator::Validate;

use crate::{dtos::sub::CreateSubscriptionRequest, services::sub::SubscriptionService};

/// Subscribes the authenticated user to a price.
///
/// # Input
/// - `req`: JSON payload `{ "priceId": "price_..." }`
///
/// # Output
/// - Success: 201 Created with the local subscription record
/// - Error: 409 if the user already has a subscription, 400 for an unknown
///   price or a provider failure
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/v1/payment/subscription', {
///   method: 'POST',
///   headers: {
///     'Content-Type': 'application/json',
///     'Authorization': `Bearer ${localStorage.getItem('authToken')}`
///   },
///   body: JSON.stringify({ priceId: 'price_1234' })
/// });
/// ```
#[post("")]
pub async fn post_subscription(
    claims: web::ReqData<JwtClaims>,
    req: web::Json<CreateSubscriptionRequest>,
    subs: web::Data<SubscriptionService>,
) -> Res<impl Responder> {
    let req = req.into_inner();
    req.validate()?;
    Success::created(subs.create_subscription(claims.sub, &req.price_id).await?)
}

/// Development aid: subscribes with the provider's test card.
#[post("/test")]
pub async fn post_test_subscription(
    claims: web::ReqData<JwtClaims>,
    req: web::Json<CreateSubscriptionRequest>,
    subs: web::Data<SubscriptionService>,
) -> Res<impl Responder> {
    let req = req.into_inner();
    req.validate()?;
    Success::created(
        subs.create_subscription_with_test_payment_method(claims.sub, &req.price_id)
            .await?,
    )
}

/// Returns the caller's subscription record, or `null` if there is none.
#[get("")]
pub async fn get_subscription(
    claims: web::ReqData<JwtClaims>,
    subs: web::Data<SubscriptionService>,
) -> Res<impl Responder> {
    Success::ok(subs.get_subscription(claims.sub).await?)
}

#[get("/status")]
pub async fn get_subscription_status(
    claims: web::ReqData<JwtClaims>,
    subs: web::Data<SubscriptionService>,
) -> Res<impl Responder> {
    Success::ok(subs.get_subscription_status(claims.sub).await?)
}

/// Cancels at the end of the current period.
#[delete("")]
pub async fn delete_subscription(
    claims: web::ReqData<JwtClaims>,
    subs: web::Data<SubscriptionService>,
) -> Res<impl Responder> {
    Success::ok(subs.cancel_subscription(claims.sub).await?)
}
