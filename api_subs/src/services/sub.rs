use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{
    clock::Clock,
    error::{AppError, Res},
};
use db::{
    dtos::subscription::{
        SubscriptionCreateRequest, SubscriptionResponse, SubscriptionStatusResponse,
        SubscriptionUpdate,
    },
    models::{
        subscription::{STATUS_ACTIVE, STATUS_CANCELED, Subscription},
        user::User,
    },
    store::{SUBSCRIPTION_EXISTS, SubscriptionStore, UserStore},
};
use uuid::Uuid;

use crate::provider::{NewSubscription, PaymentProvider, ProviderSubscription};

pub const PROCESSING_ERROR: &str = "Error processing subscription";

fn subscription_not_found() -> AppError {
    AppError::NotFound("Subscription not found".to_string())
}

/// Provider timestamps are epoch seconds.
pub(crate) fn period_end(epoch_secs: i64) -> Res<DateTime<Utc>> {
    DateTime::from_timestamp(epoch_secs, 0).ok_or_else(|| {
        AppError::Internal(format!("Invalid period end from provider: {}", epoch_secs))
    })
}

/// Creates, reads and cancels subscriptions through the payment provider and
/// mirrors them locally.
pub struct SubscriptionService {
    users: Arc<dyn UserStore>,
    subscriptions: Arc<dyn SubscriptionStore>,
    provider: Arc<dyn PaymentProvider>,
    clock: Arc<dyn Clock>,
}

impl SubscriptionService {
    pub fn new(
        users: Arc<dyn UserStore>,
        subscriptions: Arc<dyn SubscriptionStore>,
        provider: Arc<dyn PaymentProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        SubscriptionService {
            users,
            subscriptions,
            provider,
            clock,
        }
    }

    /// Starts a subscription for `user_id` on `price_id`.
    ///
    /// # Errors
    ///
    /// * `Conflict` if the user already has a subscription.
    /// * `NotFound` if the user does not exist.
    /// * `BadRequest` for an unknown price or any other provider failure.
    pub async fn create_subscription(
        &self,
        user_id: Uuid,
        price_id: &str,
    ) -> Res<SubscriptionResponse> {
        self.create(user_id, price_id, false).await
    }

    /// Same as [`Self::create_subscription`] but charges a provider test card.
    pub async fn create_subscription_with_test_payment_method(
        &self,
        user_id: Uuid,
        price_id: &str,
    ) -> Res<SubscriptionResponse> {
        self.create(user_id, price_id, true).await
    }

    async fn create(
        &self,
        user_id: Uuid,
        price_id: &str,
        test_payment_method: bool,
    ) -> Res<SubscriptionResponse> {
        if self
            .subscriptions
            .get_subscription_by_user_id(user_id)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(SUBSCRIPTION_EXISTS.to_string()));
        }

        let user = self
            .users
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if let Err(e) = self.provider.retrieve_price(price_id).await {
            log::warn!("Price {} rejected by provider: {}", price_id, e);
            return Err(AppError::BadRequest(
                "Invalid price ID or not found with the payment provider".to_string(),
            ));
        }

        let subscription = self
            .provision(&user, price_id, test_payment_method)
            .await
            .map_err(|e| match e {
                AppError::Conflict(_) => e,
                e => {
                    log::error!("Failed to create subscription for user {}: {}", user_id, e);
                    AppError::BadRequest(PROCESSING_ERROR.to_string())
                }
            })?;

        log::info!(
            "Subscription {} created for user {} with status {}",
            subscription.external_subscription_id,
            user_id,
            subscription.status
        );
        Ok(subscription.into())
    }

    async fn provision(
        &self,
        user: &User,
        price_id: &str,
        test_payment_method: bool,
    ) -> Res<Subscription> {
        let customer = match self.provider.find_customer_by_email(&user.email).await? {
            Some(customer) => customer,
            None => {
                self.provider
                    .create_customer(&user.email, &user.name, user.id)
                    .await?
            }
        };

        let payment_method = if test_payment_method {
            Some(self.provider.attach_test_payment_method(&customer.id).await?)
        } else {
            None
        };

        let ProviderSubscription {
            id,
            status,
            current_period_end,
            ..
        } = self
            .provider
            .create_subscription(NewSubscription {
                customer_id: &customer.id,
                price_id,
                user_id: user.id,
                payment_method_id: payment_method.as_deref(),
            })
            .await?;

        self.subscriptions
            .insert_subscription(SubscriptionCreateRequest {
                user_id: user.id,
                external_customer_id: customer.id,
                external_subscription_id: id,
                status,
                current_period_end: period_end(current_period_end)?,
                cancel_at_period_end: false,
            })
            .await
    }

    pub async fn get_subscription(&self, user_id: Uuid) -> Res<Option<SubscriptionResponse>> {
        Ok(self
            .subscriptions
            .get_subscription_by_user_id(user_id)
            .await?
            .map(SubscriptionResponse::from))
    }

    /// Active means status `active` and a period end strictly in the future.
    pub async fn has_active_subscription(&self, user_id: Uuid) -> Res<bool> {
        Ok(self
            .subscriptions
            .get_active_subscription(user_id, self.clock.now())
            .await?
            .is_some())
    }

    pub async fn get_subscription_status(&self, user_id: Uuid) -> Res<SubscriptionStatusResponse> {
        let active = self
            .subscriptions
            .get_active_subscription(user_id, self.clock.now())
            .await?;

        Ok(SubscriptionStatusResponse {
            has_active_subscription: active.is_some(),
            subscription: active.map(SubscriptionResponse::from),
        })
    }

    /// Cancels at period end with the provider and marks the local row
    /// canceled right away. The provider's later webhook has the final word.
    pub async fn cancel_subscription(&self, user_id: Uuid) -> Res<SubscriptionResponse> {
        let subscription = self
            .subscriptions
            .get_subscription_by_user_id(user_id)
            .await?
            .ok_or_else(subscription_not_found)?;

        self.provider
            .cancel_at_period_end(&subscription.external_subscription_id)
            .await
            .map_err(|e| {
                log::error!("Failed to cancel subscription for user {}: {}", user_id, e);
                AppError::BadRequest(PROCESSING_ERROR.to_string())
            })?;

        let updated = self
            .subscriptions
            .update_subscription_by_user_id(
                user_id,
                SubscriptionUpdate {
                    status: Some(STATUS_CANCELED.to_string()),
                    cancel_at_period_end: Some(true),
                    ..Default::default()
                },
            )
            .await?
            .ok_or_else(subscription_not_found)?;

        log::info!(
            "Subscription {} canceled at period end for user {}",
            updated.external_subscription_id,
            user_id
        );
        Ok(updated.into())
    }

    /// Feature gate check. Errors carry the reason access was refused.
    pub async fn require_active(&self, user_id: Uuid) -> Res<()> {
        let subscription = self
            .subscriptions
            .get_subscription_by_user_id(user_id)
            .await?
            .ok_or_else(|| {
                AppError::Forbidden("Subscription required to access this resource".to_string())
            })?;

        if subscription.status != STATUS_ACTIVE {
            return Err(AppError::Forbidden(format!(
                "Subscription is not active. Current status: {}",
                subscription.status
            )));
        }
        if subscription.current_period_end <= self.clock.now() {
            return Err(AppError::Forbidden("Subscription expired".to_string()));
        }
        Ok(())
    }
}
