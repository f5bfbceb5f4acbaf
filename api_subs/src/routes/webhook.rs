use actix_web::{HttpRequest, Responder, post, web};
use common::{
    error::{AppError, Res},
    http::Success,
};

use crate::{dtos::sub::WebhookAck, services::webhook::WebhookService};

pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Receives signed provider events. No session token is involved; the
/// signature over the raw body authenticates the caller.
///
/// # Output
/// - Success: `{ "received": true }`
/// - Error: 400 for a missing or invalid signature, 500 if the event could not
///   be applied so the provider redelivers it
#[post("/webhook")]
pub async fn post_webhook(
    req: HttpRequest,
    body: web::Bytes,
    webhooks: web::Data<WebhookService>,
) -> Res<impl Responder> {
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing stripe-signature header".to_string()))?;

    let payload = std::str::from_utf8(&body)
        .map_err(|_| AppError::BadRequest("Webhook payload must be UTF-8".to_string()))?;

    let event = webhooks.verify(payload, signature)?;
    let event_id = event.id.clone();

    webhooks.dispatch(event).await.map_err(|e| {
        log::error!("Webhook event {} failed: {}", event_id, e);
        AppError::Internal(format!("Webhook event {} failed: {}", event_id, e))
    })?;

    Success::ok(WebhookAck { received: true })
}
