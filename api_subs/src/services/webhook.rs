use std::sync::Arc;

use common::error::{AppError, Res};
use db::{
    dtos::subscription::SubscriptionUpdate,
    models::subscription::{STATUS_ACTIVE, STATUS_CANCELED, STATUS_PAST_DUE},
    store::SubscriptionStore,
};

use crate::{
    provider::{EventObject, PaymentProvider, ProviderEvent, ProviderInvoice, ProviderSubscription},
    services::sub::period_end,
};

pub const SUBSCRIPTION_CREATED: &str = "customer.subscription.created";
pub const SUBSCRIPTION_UPDATED: &str = "customer.subscription.updated";
pub const SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";
pub const INVOICE_PAYMENT_SUCCEEDED: &str = "invoice.payment_succeeded";
pub const INVOICE_PAYMENT_FAILED: &str = "invoice.payment_failed";

/// Applies provider webhook events to local subscription rows.
///
/// Every handler writes absolute values, so redelivery of the same event
/// leaves the row unchanged.
pub struct WebhookService {
    subscriptions: Arc<dyn SubscriptionStore>,
    provider: Arc<dyn PaymentProvider>,
}

impl WebhookService {
    pub fn new(subscriptions: Arc<dyn SubscriptionStore>, provider: Arc<dyn PaymentProvider>) -> Self {
        WebhookService {
            subscriptions,
            provider,
        }
    }

    /// Verifies the signature and parses the event.
    pub fn verify(&self, payload: &str, signature: &str) -> Res<ProviderEvent> {
        self.provider.construct_event(payload, signature)
    }

    /// Routes an event to its handler. Unknown types are ignored.
    pub async fn dispatch(&self, event: ProviderEvent) -> Res<()> {
        log::info!("Processing webhook event {} ({})", event.id, event.kind);

        match (event.kind.as_str(), &event.object) {
            (SUBSCRIPTION_CREATED, EventObject::Subscription(sub)) => {
                self.subscription_changed(sub, false).await
            }
            (SUBSCRIPTION_UPDATED, EventObject::Subscription(sub)) => {
                self.subscription_changed(sub, true).await
            }
            (SUBSCRIPTION_DELETED, EventObject::Subscription(sub)) => {
                self.subscription_deleted(sub).await
            }
            (INVOICE_PAYMENT_SUCCEEDED, EventObject::Invoice(invoice)) => {
                self.invoice_status(invoice, STATUS_ACTIVE).await
            }
            (INVOICE_PAYMENT_FAILED, EventObject::Invoice(invoice)) => {
                self.invoice_status(invoice, STATUS_PAST_DUE).await
            }
            (
                SUBSCRIPTION_CREATED
                | SUBSCRIPTION_UPDATED
                | SUBSCRIPTION_DELETED
                | INVOICE_PAYMENT_SUCCEEDED
                | INVOICE_PAYMENT_FAILED,
                _,
            ) => Err(AppError::BadRequest(format!(
                "Unexpected payload for event {}",
                event.kind
            ))),
            (kind, _) => {
                log::warn!("Unhandled webhook event type: {}", kind);
                Ok(())
            }
        }
    }

    async fn apply(&self, external_id: &str, update: SubscriptionUpdate) -> Res<()> {
        self.subscriptions
            .update_subscription_by_external_id(external_id, update)
            .await?
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("Subscription {} not found", external_id)))
    }

    async fn subscription_changed(
        &self,
        sub: &ProviderSubscription,
        include_cancel_flag: bool,
    ) -> Res<()> {
        if sub.user_id().is_none() {
            log::warn!("Subscription {} has no userId metadata, ignoring", sub.id);
            return Ok(());
        }

        let update = SubscriptionUpdate {
            status: Some(sub.status.clone()),
            current_period_end: Some(period_end(sub.current_period_end)?),
            cancel_at_period_end: include_cancel_flag.then_some(sub.cancel_at_period_end),
        };
        self.apply(&sub.id, update).await
    }

    async fn subscription_deleted(&self, sub: &ProviderSubscription) -> Res<()> {
        if sub.user_id().is_none() {
            log::warn!("Subscription {} has no userId metadata, ignoring", sub.id);
            return Ok(());
        }

        let update = SubscriptionUpdate {
            status: Some(STATUS_CANCELED.to_string()),
            cancel_at_period_end: Some(true),
            ..Default::default()
        };
        self.apply(&sub.id, update).await
    }

    async fn invoice_status(&self, invoice: &ProviderInvoice, status: &str) -> Res<()> {
        let Some(external_id) = invoice.subscription_id.as_deref() else {
            return Ok(());
        };

        let update = SubscriptionUpdate {
            status: Some(status.to_string()),
            ..Default::default()
        };
        if self
            .subscriptions
            .update_subscription_by_external_id(external_id, update)
            .await?
            .is_none()
        {
            log::debug!("Invoice for unknown subscription {}, ignoring", external_id);
        }
        Ok(())
    }
}
