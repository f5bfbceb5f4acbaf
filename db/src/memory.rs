use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    error::{AppError, Res},
    misc::Role,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    dtos::{
        subscription::{SubscriptionCreateRequest, SubscriptionUpdate},
        user::{UserCreateRequest, UserUpdate},
    },
    models::{subscription::Subscription, user::User},
    store::{EMAIL_EXISTS, SUBSCRIPTION_EXISTS, SubscriptionStore, UserStore},
};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    subscriptions: HashMap<Uuid, Subscription>,
}

/// Process-local store with the same uniqueness and cascade rules as the
/// PostgreSQL schema. Used by tests and for running without a database.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_count(&self) -> usize {
        self.state.read().await.users.len()
    }

    pub async fn subscription_count(&self) -> usize {
        self.state.read().await.subscriptions.len()
    }
}

fn apply_subscription_update(sub: &mut Subscription, data: SubscriptionUpdate) {
    if let Some(status) = data.status {
        sub.status = status;
    }
    if let Some(current_period_end) = data.current_period_end {
        sub.current_period_end = current_period_end;
    }
    if let Some(cancel_at_period_end) = data.cancel_at_period_end {
        sub.cancel_at_period_end = cancel_at_period_end;
    }
    sub.updated_at = Utc::now();
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_user_by_id(&self, id: Uuid) -> Res<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Res<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn email_exists(&self, email: &str) -> Res<bool> {
        let state = self.state.read().await;
        Ok(state.users.values().any(|u| u.email == email))
    }

    async fn list_users(&self, role: Option<Role>) -> Res<Vec<User>> {
        let state = self.state.read().await;
        let mut users: Vec<User> = state
            .users
            .values()
            .filter(|u| role.is_none_or(|r| u.role == r))
            .cloned()
            .collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn insert_user(&self, data: UserCreateRequest) -> Res<User> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.email == data.email) {
            return Err(AppError::Conflict(EMAIL_EXISTS.to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: data.name,
            email: data.email,
            password_hash: data.password_hash,
            role: data.role,
            reset_password_token: None,
            reset_password_expires: None,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: Uuid, data: UserUpdate) -> Res<Option<User>> {
        let mut state = self.state.write().await;

        if let Some(email) = &data.email {
            if state.users.values().any(|u| u.id != id && &u.email == email) {
                return Err(AppError::Conflict(EMAIL_EXISTS.to_string()));
            }
        }

        let Some(user) = state.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = data.name {
            user.name = name;
        }
        if let Some(email) = data.email {
            user.email = email;
        }
        if let Some(role) = data.role {
            user.role = role;
        }
        if let Some(password_hash) = data.password_hash {
            user.password_hash = password_hash;
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: Uuid) -> Res<bool> {
        let mut state = self.state.write().await;
        let removed = state.users.remove(&id).is_some();
        if removed {
            state.subscriptions.retain(|_, s| s.user_id != id);
        }
        Ok(removed)
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Res<()> {
        let mut state = self.state.write().await;
        if let Some(user) = state.users.get_mut(&id) {
            user.reset_password_token = Some(token_hash.to_string());
            user.reset_password_expires = Some(expires_at);
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Res<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| {
                u.reset_password_token.as_deref() == Some(token_hash)
                    && u.reset_password_expires.is_some_and(|expires| expires > now)
            })
            .cloned())
    }

    async fn complete_password_reset(&self, id: Uuid, password_hash: &str) -> Res<()> {
        let mut state = self.state.write().await;
        if let Some(user) = state.users.get_mut(&id) {
            user.password_hash = password_hash.to_string();
            user.reset_password_token = None;
            user.reset_password_expires = None;
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn clear_expired_reset_tokens(&self, now: DateTime<Utc>) -> Res<u64> {
        let mut state = self.state.write().await;
        let mut cleared = 0;
        for user in state.users.values_mut() {
            if user.reset_password_expires.is_some_and(|expires| expires <= now) {
                user.reset_password_token = None;
                user.reset_password_expires = None;
                cleared += 1;
            }
        }
        Ok(cleared)
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn get_subscription_by_user_id(&self, user_id: Uuid) -> Res<Option<Subscription>> {
        let state = self.state.read().await;
        Ok(state
            .subscriptions
            .values()
            .find(|s| s.user_id == user_id)
            .cloned())
    }

    async fn get_subscription_by_external_id(
        &self,
        external_subscription_id: &str,
    ) -> Res<Option<Subscription>> {
        let state = self.state.read().await;
        Ok(state
            .subscriptions
            .values()
            .find(|s| s.external_subscription_id == external_subscription_id)
            .cloned())
    }

    async fn get_active_subscription(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Res<Option<Subscription>> {
        let state = self.state.read().await;
        Ok(state
            .subscriptions
            .values()
            .find(|s| s.user_id == user_id && s.is_active_at(now))
            .cloned())
    }

    async fn insert_subscription(&self, data: SubscriptionCreateRequest) -> Res<Subscription> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&data.user_id) {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        if state.subscriptions.values().any(|s| {
            s.user_id == data.user_id || s.external_subscription_id == data.external_subscription_id
        }) {
            return Err(AppError::Conflict(SUBSCRIPTION_EXISTS.to_string()));
        }

        let now = Utc::now();
        let sub = Subscription {
            id: Uuid::new_v4(),
            user_id: data.user_id,
            external_customer_id: data.external_customer_id,
            external_subscription_id: data.external_subscription_id,
            status: data.status,
            current_period_end: data.current_period_end,
            cancel_at_period_end: data.cancel_at_period_end,
            created_at: now,
            updated_at: now,
        };
        state.subscriptions.insert(sub.id, sub.clone());
        Ok(sub)
    }

    async fn update_subscription_by_user_id(
        &self,
        user_id: Uuid,
        data: SubscriptionUpdate,
    ) -> Res<Option<Subscription>> {
        let mut state = self.state.write().await;
        let Some(sub) = state.subscriptions.values_mut().find(|s| s.user_id == user_id) else {
            return Ok(None);
        };
        apply_subscription_update(sub, data);
        Ok(Some(sub.clone()))
    }

    async fn update_subscription_by_external_id(
        &self,
        external_subscription_id: &str,
        data: SubscriptionUpdate,
    ) -> Res<Option<Subscription>> {
        let mut state = self.state.write().await;
        let Some(sub) = state
            .subscriptions
            .values_mut()
            .find(|s| s.external_subscription_id == external_subscription_id)
        else {
            return Ok(None);
        };
        apply_subscription_update(sub, data);
        Ok(Some(sub.clone()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn new_user(email: &str) -> UserCreateRequest {
        UserCreateRequest {
            name: "Ada".into(),
            email: email.into(),
            password_hash: "hash".into(),
            role: Role::User,
        }
    }

    fn new_subscription(user_id: Uuid, external_id: &str) -> SubscriptionCreateRequest {
        SubscriptionCreateRequest {
            user_id,
            external_customer_id: "cus_1".into(),
            external_subscription_id: external_id.into(),
            status: "active".into(),
            current_period_end: Utc::now() + Duration::days(30),
            cancel_at_period_end: false,
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_conflict() {
        let store = MemoryStore::new();
        store.insert_user(new_user("ada@example.com")).await.unwrap();

        let err = store.insert_user(new_user("ada@example.com")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(msg) if msg == EMAIL_EXISTS));
    }

    #[tokio::test]
    async fn email_update_to_taken_address_is_conflict() {
        let store = MemoryStore::new();
        store.insert_user(new_user("ada@example.com")).await.unwrap();
        let grace = store.insert_user(new_user("grace@example.com")).await.unwrap();

        let update = UserUpdate {
            email: Some("ada@example.com".into()),
            ..Default::default()
        };
        assert!(matches!(
            store.update_user(grace.id, update).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn one_subscription_per_user() {
        let store = MemoryStore::new();
        let user = store.insert_user(new_user("ada@example.com")).await.unwrap();
        store
            .insert_subscription(new_subscription(user.id, "sub_1"))
            .await
            .unwrap();

        let err = store
            .insert_subscription(new_subscription(user.id, "sub_2"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(store.subscription_count().await, 1);
    }

    #[tokio::test]
    async fn active_lookup_checks_status_and_period_end() {
        let store = MemoryStore::new();
        let user = store.insert_user(new_user("ada@example.com")).await.unwrap();
        store
            .insert_subscription(new_subscription(user.id, "sub_1"))
            .await
            .unwrap();
        let now = Utc::now();

        assert!(store.get_active_subscription(user.id, now).await.unwrap().is_some());
        assert!(
            store
                .get_active_subscription(user.id, now + Duration::days(31))
                .await
                .unwrap()
                .is_none()
        );

        store
            .update_subscription_by_external_id(
                "sub_1",
                SubscriptionUpdate {
                    status: Some("past_due".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(store.get_active_subscription(user.id, now).await.unwrap().is_none());
        assert!(store.email_exists("ada@example.com").await.unwrap());
        assert!(!store.email_exists("grace@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn deleting_user_cascades_to_subscription() {
        let store = MemoryStore::new();
        let user = store.insert_user(new_user("ada@example.com")).await.unwrap();
        store
            .insert_subscription(new_subscription(user.id, "sub_1"))
            .await
            .unwrap();

        assert!(store.delete_user(user.id).await.unwrap());
        assert_eq!(store.subscription_count().await, 0);
        assert!(!store.delete_user(user.id).await.unwrap());
    }

    #[tokio::test]
    async fn reset_token_lookup_respects_expiry() {
        let store = MemoryStore::new();
        let user = store.insert_user(new_user("ada@example.com")).await.unwrap();
        let now = Utc::now();
        store
            .set_reset_token(user.id, "digest", now + Duration::minutes(10))
            .await
            .unwrap();

        assert!(store.find_by_reset_token("digest", now).await.unwrap().is_some());
        assert!(store.find_by_reset_token("other", now).await.unwrap().is_none());
        assert!(
            store
                .find_by_reset_token("digest", now + Duration::minutes(10))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn sweep_clears_only_expired_pairs() {
        let store = MemoryStore::new();
        let stale = store.insert_user(new_user("stale@example.com")).await.unwrap();
        let fresh = store.insert_user(new_user("fresh@example.com")).await.unwrap();
        let now = Utc::now();
        store
            .set_reset_token(stale.id, "a", now - Duration::minutes(1))
            .await
            .unwrap();
        store
            .set_reset_token(fresh.id, "b", now + Duration::minutes(5))
            .await
            .unwrap();

        assert_eq!(store.clear_expired_reset_tokens(now).await.unwrap(), 1);

        let stale = store.get_user_by_id(stale.id).await.unwrap().unwrap();
        assert!(stale.reset_password_token.is_none() && stale.reset_password_expires.is_none());
        let fresh = store.get_user_by_id(fresh.id).await.unwrap().unwrap();
        assert_eq!(fresh.reset_password_token.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn list_filters_by_role() {
        let store = MemoryStore::new();
        store.insert_user(new_user("ada@example.com")).await.unwrap();
        let mut admin = new_user("root@example.com");
        admin.role = Role::Admin;
        store.insert_user(admin).await.unwrap();

        assert_eq!(store.list_users(None).await.unwrap().len(), 2);
        let admins = store.list_users(Some(Role::Admin)).await.unwrap();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].email, "root@example.com");
    }
}
