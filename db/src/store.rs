use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{error::Res, misc::Role};
use uuid::Uuid;

use crate::{
    dtos::{
        subscription::{SubscriptionCreateRequest, SubscriptionUpdate},
        user::{UserCreateRequest, UserUpdate},
    },
    models::{subscription::Subscription, user::User},
};

/// Storage for account rows.
///
/// Every mutation is a single keyed statement. Lookups return `None` rather
/// than an error when nothing matches.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user_by_id(&self, id: Uuid) -> Res<Option<User>>;

    async fn get_user_by_email(&self, email: &str) -> Res<Option<User>>;

    async fn email_exists(&self, email: &str) -> Res<bool>;

    /// All accounts, optionally narrowed to one role, oldest first.
    async fn list_users(&self, role: Option<Role>) -> Res<Vec<User>>;

    /// Fails with `Conflict("Email already exists")` on a duplicate email.
    async fn insert_user(&self, data: UserCreateRequest) -> Res<User>;

    /// Fails with `Conflict("Email already exists")` when the new email is taken.
    async fn update_user(&self, id: Uuid, data: UserUpdate) -> Res<Option<User>>;

    /// Removes the account and its subscription. Returns whether a row was deleted.
    async fn delete_user(&self, id: Uuid) -> Res<bool>;

    async fn set_reset_token(
        &self,
        id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Res<()>;

    /// Account whose stored reset hash matches and whose expiry is after `now`.
    async fn find_by_reset_token(&self, token_hash: &str, now: DateTime<Utc>)
    -> Res<Option<User>>;

    /// Stores the new password hash and clears both reset fields in one write.
    async fn complete_password_reset(&self, id: Uuid, password_hash: &str) -> Res<()>;

    /// Clears reset fields on every row whose expiry is not after `now`.
    async fn clear_expired_reset_tokens(&self, now: DateTime<Utc>) -> Res<u64>;
}

/// Storage for the one-per-user subscription mirror.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn get_subscription_by_user_id(&self, user_id: Uuid) -> Res<Option<Subscription>>;

    async fn get_subscription_by_external_id(
        &self,
        external_subscription_id: &str,
    ) -> Res<Option<Subscription>>;

    /// The user's subscription if its status is `active` and its period ends after `now`.
    async fn get_active_subscription(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Res<Option<Subscription>>;

    /// Fails with `Conflict` if the user already has a subscription.
    async fn insert_subscription(&self, data: SubscriptionCreateRequest) -> Res<Subscription>;

    async fn update_subscription_by_user_id(
        &self,
        user_id: Uuid,
        data: SubscriptionUpdate,
    ) -> Res<Option<Subscription>>;

    async fn update_subscription_by_external_id(
        &self,
        external_subscription_id: &str,
        data: SubscriptionUpdate,
    ) -> Res<Option<Subscription>>;
}

pub const EMAIL_EXISTS: &str = "Email already exists";
pub const SUBSCRIPTION_EXISTS: &str = "User already has a subscription";
