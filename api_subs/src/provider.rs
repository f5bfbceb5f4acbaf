use std::collections::HashMap;

use async_trait::async_trait;
use common::error::Res;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod mock;
pub mod stripe_provider;

/// Metadata key carrying the local user id on provider objects.
pub const USER_ID_METADATA: &str = "userId";

/// Test card token accepted by the provider in test mode.
pub const TEST_CARD_TOKEN: &str = "tok_visa";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderCustomer {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSubscription {
    pub id: String,
    pub customer_id: String,
    pub status: String,
    /// Epoch seconds.
    pub current_period_end: i64,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ProviderSubscription {
    pub fn user_id(&self) -> Option<&str> {
        self.metadata.get(USER_ID_METADATA).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderInvoice {
    #[serde(default)]
    pub subscription_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "object", rename_all = "snake_case")]
pub enum EventObject {
    Subscription(ProviderSubscription),
    Invoice(ProviderInvoice),
    #[serde(other)]
    Other,
}

/// A verified webhook event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderEvent {
    pub id: String,
    /// The provider's type tag, e.g. `customer.subscription.updated`.
    #[serde(rename = "type")]
    pub kind: String,
    pub object: EventObject,
}

pub struct NewSubscription<'a> {
    pub customer_id: &'a str,
    pub price_id: &'a str,
    pub user_id: Uuid,
    /// Charge this payment method instead of leaving the first invoice incomplete.
    pub payment_method_id: Option<&'a str>,
}

/// Calls made against the external billing system.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Fails if the price does not exist.
    async fn retrieve_price(&self, price_id: &str) -> Res<()>;

    async fn find_customer_by_email(&self, email: &str) -> Res<Option<ProviderCustomer>>;

    async fn create_customer(
        &self,
        email: &str,
        name: &str,
        user_id: Uuid,
    ) -> Res<ProviderCustomer>;

    /// Creates a card from the test token, attaches it to the customer and
    /// makes it the default. Returns the payment method id.
    async fn attach_test_payment_method(&self, customer_id: &str) -> Res<String>;

    async fn create_subscription(&self, req: NewSubscription<'_>) -> Res<ProviderSubscription>;

    async fn cancel_at_period_end(&self, subscription_id: &str) -> Res<ProviderSubscription>;

    /// Verifies the signature over the raw payload and parses the event.
    fn construct_event(&self, payload: &str, signature: &str) -> Res<ProviderEvent>;
}
