use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use common::error::{AppError, Res};
use uuid::Uuid;

use super::{
    NewSubscription, PaymentProvider, ProviderCustomer, ProviderEvent, ProviderSubscription,
    USER_ID_METADATA,
};

pub const MOCK_WEBHOOK_SECRET: &str = "whsec_mock";

/// In-process provider for tests and local development.
///
/// Webhook payloads are the JSON form of [`ProviderEvent`] and the signature
/// is the webhook secret itself.
#[derive(Clone)]
pub struct MockProvider {
    state: Arc<Mutex<State>>,
}

struct State {
    prices: HashSet<String>,
    customers: Vec<(String, String)>,
    subscriptions: HashMap<String, ProviderSubscription>,
    calls: Vec<&'static str>,
    failing: HashSet<&'static str>,
    subscription_status: String,
    next_id: u32,
}

impl Default for MockProvider {
    fn default() -> Self {
        MockProvider::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        MockProvider {
            state: Arc::new(Mutex::new(State {
                prices: HashSet::new(),
                customers: Vec::new(),
                subscriptions: HashMap::new(),
                calls: Vec::new(),
                failing: HashSet::new(),
                subscription_status: "active".to_string(),
                next_id: 1,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_price(self, price_id: &str) -> Self {
        self.state().prices.insert(price_id.to_string());
        self
    }

    pub fn with_customer(self, customer_id: &str, email: &str) -> Self {
        self.state()
            .customers
            .push((customer_id.to_string(), email.to_string()));
        self
    }

    /// Status reported for newly created subscriptions.
    pub fn with_subscription_status(self, status: &str) -> Self {
        self.state().subscription_status = status.to_string();
        self
    }

    /// Makes the named call fail with a provider error.
    pub fn failing(self, call: &'static str) -> Self {
        self.state().failing.insert(call);
        self
    }

    /// Provider calls made so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.state().calls.clone()
    }

    pub fn customer_count(&self) -> usize {
        self.state().customers.len()
    }

    pub fn subscription(&self, id: &str) -> Option<ProviderSubscription> {
        self.state().subscriptions.get(id).cloned()
    }

    fn record(&self, call: &'static str) -> Res<MutexGuard<'_, State>> {
        let mut state = self.state();
        state.calls.push(call);
        if state.failing.contains(call) {
            return Err(AppError::Internal(format!("mock provider: {} failed", call)));
        }
        Ok(state)
    }
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        let id = format!("{}_mock{}", prefix, self.next_id);
        self.next_id += 1;
        id
    }
}

#[async_trait]
impl PaymentProvider for MockProvider {
    async fn retrieve_price(&self, price_id: &str) -> Res<()> {
        let state = self.record("retrieve_price")?;
        if state.prices.contains(price_id) {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("No such price: {}", price_id)))
        }
    }

    async fn find_customer_by_email(&self, email: &str) -> Res<Option<ProviderCustomer>> {
        let state = self.record("find_customer_by_email")?;
        Ok(state
            .customers
            .iter()
            .find(|(_, customer_email)| customer_email == email)
            .map(|(id, _)| ProviderCustomer { id: id.clone() }))
    }

    async fn create_customer(
        &self,
        email: &str,
        _name: &str,
        _user_id: Uuid,
    ) -> Res<ProviderCustomer> {
        let mut state = self.record("create_customer")?;
        let id = state.next_id("cus");
        state.customers.push((id.clone(), email.to_string()));
        Ok(ProviderCustomer { id })
    }

    async fn attach_test_payment_method(&self, _customer_id: &str) -> Res<String> {
        let mut state = self.record("attach_test_payment_method")?;
        Ok(state.next_id("pm"))
    }

    async fn create_subscription(&self, req: NewSubscription<'_>) -> Res<ProviderSubscription> {
        let mut state = self.record("create_subscription")?;
        let subscription = ProviderSubscription {
            id: state.next_id("sub"),
            customer_id: req.customer_id.to_string(),
            status: state.subscription_status.clone(),
            current_period_end: (Utc::now() + Duration::days(30)).timestamp(),
            cancel_at_period_end: false,
            metadata: HashMap::from([(USER_ID_METADATA.to_string(), req.user_id.to_string())]),
        };
        state
            .subscriptions
            .insert(subscription.id.clone(), subscription.clone());
        Ok(subscription)
    }

    async fn cancel_at_period_end(&self, subscription_id: &str) -> Res<ProviderSubscription> {
        let mut state = self.record("cancel_at_period_end")?;
        let subscription = state
            .subscriptions
            .get_mut(subscription_id)
            .ok_or_else(|| AppError::NotFound(format!("No such subscription: {}", subscription_id)))?;
        subscription.cancel_at_period_end = true;
        Ok(subscription.clone())
    }

    fn construct_event(&self, payload: &str, signature: &str) -> Res<ProviderEvent> {
        if signature != MOCK_WEBHOOK_SECRET {
            return Err(AppError::BadRequest("Invalid signature".to_string()));
        }
        serde_json::from_str(payload)
            .map_err(|e| AppError::BadRequest(format!("Invalid event payload: {}", e)))
    }
}
