use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionRequest {
    #[validate(length(min = 1, message = "Price ID is required"))]
    pub price_id: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct WebhookAck {
    pub received: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PremiumFeatureResponse {
    pub message: String,
    pub feature: String,
}
