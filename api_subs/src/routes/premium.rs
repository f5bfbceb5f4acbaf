use actix_web::{Responder, get};
use common::{error::Res, http::Success};

use crate::dtos::sub::PremiumFeatureResponse;

/// Sample resource behind the subscription gate.
#[get("")]
pub async fn get_premium_feature() -> Res<impl Responder> {
    Success::ok(PremiumFeatureResponse {
        message: "You have access to this premium feature!".to_string(),
        feature: "premium".to_string(),
    })
}
