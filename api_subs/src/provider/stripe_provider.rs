use std::collections::HashMap;

use async_trait::async_trait;
use common::{
    env_config::StripeConfig,
    error::{AppError, Res},
};
use stripe::{
    AttachPaymentMethod, Client, CreateCustomer, CreatePaymentMethod,
    CreatePaymentMethodCardUnion, CreateSubscription, CreateSubscriptionItems,
    CreateSubscriptionPaymentSettings, CreateSubscriptionPaymentSettingsSaveDefaultPaymentMethod,
    Customer, CustomerId, CustomerInvoiceSettings, Expandable, ListCustomers, PaymentMethod,
    PaymentMethodTypeFilter, Price, PriceId, Subscription, SubscriptionId,
    SubscriptionPaymentBehavior, TokenParams, UpdateCustomer, UpdateSubscription, Webhook,
};
use uuid::Uuid;

use super::{
    EventObject, NewSubscription, PaymentProvider, ProviderCustomer, ProviderEvent,
    ProviderInvoice, ProviderSubscription, TEST_CARD_TOKEN, USER_ID_METADATA,
};

/// Stripe-backed provider.
pub struct StripeProvider {
    client: Client,
    webhook_secret: String,
}

impl StripeProvider {
    pub fn new(config: &StripeConfig) -> Self {
        StripeProvider {
            client: common::stripe::create_client(config),
            webhook_secret: config.webhook_secret.clone(),
        }
    }
}

fn parse_customer_id(id: &str) -> Res<CustomerId> {
    id.parse::<CustomerId>()
        .map_err(|e| AppError::BadRequest(format!("Invalid customer ID: {}", e)))
}

fn user_metadata(user_id: Uuid) -> HashMap<String, String> {
    HashMap::from([(USER_ID_METADATA.to_string(), user_id.to_string())])
}

impl From<Subscription> for ProviderSubscription {
    fn from(sub: Subscription) -> Self {
        ProviderSubscription {
            id: sub.id.to_string(),
            customer_id: match &sub.customer {
                Expandable::Id(id) => id.to_string(),
                Expandable::Object(customer) => customer.id.to_string(),
            },
            status: sub.status.to_string(),
            current_period_end: sub.current_period_end,
            cancel_at_period_end: sub.cancel_at_period_end,
            metadata: sub.metadata,
        }
    }
}

impl From<stripe::Event> for ProviderEvent {
    fn from(event: stripe::Event) -> Self {
        let object = match event.data.object {
            stripe::EventObject::Subscription(sub) => EventObject::Subscription(sub.into()),
            stripe::EventObject::Invoice(invoice) => EventObject::Invoice(ProviderInvoice {
                subscription_id: invoice.subscription.map(|sub| match sub {
                    Expandable::Id(id) => id.to_string(),
                    Expandable::Object(sub) => sub.id.to_string(),
                }),
            }),
            _ => EventObject::Other,
        };

        ProviderEvent {
            id: event.id.to_string(),
            kind: event.type_.to_string(),
            object,
        }
    }
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    async fn retrieve_price(&self, price_id: &str) -> Res<()> {
        let id = price_id
            .parse::<PriceId>()
            .map_err(|e| AppError::BadRequest(format!("Invalid price ID: {}", e)))?;
        Price::retrieve(&self.client, &id, &[])
            .await
            .map_err(AppError::from)?;
        Ok(())
    }

    async fn find_customer_by_email(&self, email: &str) -> Res<Option<ProviderCustomer>> {
        let params = ListCustomers {
            email: Some(email),
            limit: Some(1),
            ..Default::default()
        };
        let customers = Customer::list(&self.client, &params)
            .await
            .map_err(AppError::from)?;

        Ok(customers.data.first().map(|customer| ProviderCustomer {
            id: customer.id.to_string(),
        }))
    }

    async fn create_customer(
        &self,
        email: &str,
        name: &str,
        user_id: Uuid,
    ) -> Res<ProviderCustomer> {
        let params = CreateCustomer {
            email: Some(email),
            name: Some(name),
            metadata: Some(user_metadata(user_id)),
            ..Default::default()
        };
        let customer = Customer::create(&self.client, params)
            .await
            .map_err(AppError::from)?;
        log::info!("Created Stripe customer {} for user {}", customer.id, user_id);

        Ok(ProviderCustomer {
            id: customer.id.to_string(),
        })
    }

    async fn attach_test_payment_method(&self, customer_id: &str) -> Res<String> {
        let customer_id = parse_customer_id(customer_id)?;

        let payment_method = PaymentMethod::create(
            &self.client,
            CreatePaymentMethod {
                type_: Some(PaymentMethodTypeFilter::Card),
                card: Some(CreatePaymentMethodCardUnion::TokenParams(TokenParams {
                    token: TEST_CARD_TOKEN.to_string(),
                })),
                ..Default::default()
            },
        )
        .await
        .map_err(AppError::from)?;

        PaymentMethod::attach(
            &self.client,
            &payment_method.id,
            AttachPaymentMethod {
                customer: customer_id.clone(),
            },
        )
        .await
        .map_err(AppError::from)?;

        Customer::update(
            &self.client,
            &customer_id,
            UpdateCustomer {
                invoice_settings: Some(CustomerInvoiceSettings {
                    default_payment_method: Some(payment_method.id.to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            },
        )
        .await
        .map_err(AppError::from)?;

        Ok(payment_method.id.to_string())
    }

    async fn create_subscription(&self, req: NewSubscription<'_>) -> Res<ProviderSubscription> {
        let mut params = CreateSubscription::new(parse_customer_id(req.customer_id)?);
        params.items = Some(vec![CreateSubscriptionItems {
            price: Some(req.price_id.to_string()),
            ..Default::default()
        }]);
        params.metadata = Some(user_metadata(req.user_id));
        params.expand = &["latest_invoice.payment_intent"];

        match req.payment_method_id {
            Some(payment_method_id) => {
                params.default_payment_method = Some(payment_method_id);
            }
            None => {
                params.payment_behavior = Some(SubscriptionPaymentBehavior::DefaultIncomplete);
                params.payment_settings = Some(CreateSubscriptionPaymentSettings {
                    save_default_payment_method: Some(
                        CreateSubscriptionPaymentSettingsSaveDefaultPaymentMethod::OnSubscription,
                    ),
                    ..Default::default()
                });
            }
        }

        let subscription = Subscription::create(&self.client, params)
            .await
            .map_err(AppError::from)?;

        Ok(subscription.into())
    }

    async fn cancel_at_period_end(&self, subscription_id: &str) -> Res<ProviderSubscription> {
        let id = subscription_id
            .parse::<SubscriptionId>()
            .map_err(|e| AppError::BadRequest(format!("Invalid subscription ID: {}", e)))?;

        let subscription = Subscription::update(
            &self.client,
            &id,
            UpdateSubscription {
                cancel_at_period_end: Some(true),
                ..Default::default()
            },
        )
        .await
        .map_err(AppError::from)?;

        Ok(subscription.into())
    }

    fn construct_event(&self, payload: &str, signature: &str) -> Res<ProviderEvent> {
        match Webhook::construct_event(payload, signature, &self.webhook_secret) {
            Ok(event) => Ok(event.into()),
            Err(e) => {
                log::warn!("Rejected webhook event: {}", e);
                Err(AppError::BadRequest("Invalid signature".to_string()))
            }
        }
    }
}
