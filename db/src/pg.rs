use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{error::Res, misc::Role};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    dtos::{
        subscription::{SubscriptionCreateRequest, SubscriptionUpdate},
        user::{UserCreateRequest, UserUpdate},
    },
    models::{subscription::Subscription, user::User},
    store::{SubscriptionStore, UserStore},
    subscription::{self, SubscriptionKey},
    user,
};

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: Arc<PgPool>,
}

impl PgStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        PgStore { pool }
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn get_user_by_id(&self, id: Uuid) -> Res<Option<User>> {
        user::get_user_by_id(&*self.pool, id).await
    }

    async fn get_user_by_email(&self, email: &str) -> Res<Option<User>> {
        user::get_user_by_email(&*self.pool, email).await
    }

    async fn email_exists(&self, email: &str) -> Res<bool> {
        user::email_exists(&*self.pool, email).await
    }

    async fn list_users(&self, role: Option<Role>) -> Res<Vec<User>> {
        user::list_users(&*self.pool, role).await
    }

    async fn insert_user(&self, data: UserCreateRequest) -> Res<User> {
        user::insert_user(&*self.pool, data).await
    }

    async fn update_user(&self, id: Uuid, data: UserUpdate) -> Res<Option<User>> {
        user::update_user(&*self.pool, id, data).await
    }

    async fn delete_user(&self, id: Uuid) -> Res<bool> {
        user::delete_user(&*self.pool, id).await
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Res<()> {
        user::set_reset_token(&*self.pool, id, token_hash, expires_at).await
    }

    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Res<Option<User>> {
        user::find_by_reset_token(&*self.pool, token_hash, now).await
    }

    async fn complete_password_reset(&self, id: Uuid, password_hash: &str) -> Res<()> {
        user::complete_password_reset(&*self.pool, id, password_hash).await
    }

    async fn clear_expired_reset_tokens(&self, now: DateTime<Utc>) -> Res<u64> {
        user::clear_expired_reset_tokens(&*self.pool, now).await
    }
}

#[async_trait]
impl SubscriptionStore for PgStore {
    async fn get_subscription_by_user_id(&self, user_id: Uuid) -> Res<Option<Subscription>> {
        subscription::get_subscription_by_user_id(&*self.pool, user_id).await
    }

    async fn get_subscription_by_external_id(
        &self,
        external_subscription_id: &str,
    ) -> Res<Option<Subscription>> {
        subscription::get_subscription_by_external_id(&*self.pool, external_subscription_id).await
    }

    async fn get_active_subscription(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Res<Option<Subscription>> {
        subscription::get_active_subscription(&*self.pool, user_id, now).await
    }

    async fn insert_subscription(&self, data: SubscriptionCreateRequest) -> Res<Subscription> {
        subscription::insert_subscription(&*self.pool, data).await
    }

    async fn update_subscription_by_user_id(
        &self,
        user_id: Uuid,
        data: SubscriptionUpdate,
    ) -> Res<Option<Subscription>> {
        subscription::update_subscription(&*self.pool, SubscriptionKey::UserId(user_id), data).await
    }

    async fn update_subscription_by_external_id(
        &self,
        external_subscription_id: &str,
        data: SubscriptionUpdate,
    ) -> Res<Option<Subscription>> {
        subscription::update_subscription(
            &*self.pool,
            SubscriptionKey::ExternalId(external_subscription_id),
            data,
        )
        .await
    }
}
