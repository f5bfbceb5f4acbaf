use std::sync::Arc;

use common::{
    env_config::AdminSeed,
    error::{AppError, Res},
    http::MessageResponse,
    misc::Role,
};
use db::{
    dtos::{
        subscription::SubscriptionSummary,
        user::{UserCreateRequest, UserResponse, UserUpdate},
    },
    models::user::User,
    store::{EMAIL_EXISTS, SubscriptionStore, UserStore},
};
use uuid::Uuid;

use crate::{
    dtos::user::{ChangePasswordRequest, CreateUserRequest, RegisterRequest, UpdateUserRequest},
    policy::{self, Actor, Operation, RequestedFields},
    services::password::PasswordService,
};

fn user_not_found() -> AppError {
    AppError::NotFound("User not found".to_string())
}

/// Account management on behalf of an authenticated actor.
///
/// Every operation consults the policy table first, then touches storage.
pub struct UserService {
    users: Arc<dyn UserStore>,
    subscriptions: Arc<dyn SubscriptionStore>,
    passwords: PasswordService,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserStore>,
        subscriptions: Arc<dyn SubscriptionStore>,
        passwords: PasswordService,
    ) -> Self {
        UserService {
            users,
            subscriptions,
            passwords,
        }
    }

    async fn require_user(&self, id: Uuid) -> Res<User> {
        self.users.get_user_by_id(id).await?.ok_or_else(user_not_found)
    }

    async fn insert(&self, name: String, email: String, password: &str, role: Role) -> Res<User> {
        if self.users.email_exists(&email).await? {
            return Err(AppError::Conflict(EMAIL_EXISTS.to_string()));
        }

        let password_hash = self.passwords.hash(password).await?;
        self.users
            .insert_user(UserCreateRequest {
                name,
                email,
                password_hash,
                role,
            })
            .await
    }

    /// Public sign-up. The role is always USER.
    pub async fn register(&self, req: RegisterRequest) -> Res<UserResponse> {
        let user = self.insert(req.name, req.email, &req.password, Role::User).await?;
        log::info!("User {} registered", user.id);
        Ok(user.into())
    }

    /// Administrator-initiated creation; the requested role is respected.
    pub async fn create_user(&self, actor: &Actor, req: CreateUserRequest) -> Res<UserResponse> {
        policy::authorize(Operation::CreateUser, actor, None)?;

        let role = req.role.unwrap_or_default();
        let user = self.insert(req.name, req.email, &req.password, role).await?;
        log::info!("User {} created by {} with role {}", user.id, actor.id, role);
        Ok(user.into())
    }

    pub async fn create_admin(&self, actor: &Actor, req: RegisterRequest) -> Res<UserResponse> {
        self.create_user(
            actor,
            CreateUserRequest {
                name: req.name,
                email: req.email,
                password: req.password,
                role: Some(Role::Admin),
            },
        )
        .await
    }

    pub async fn list_users(&self, actor: &Actor, role: Option<Role>) -> Res<Vec<UserResponse>> {
        policy::authorize(Operation::ListUsers, actor, None)?;

        let users = self.users.list_users(role).await?;
        Ok(users.into_iter().map(UserResponse::from).collect())
    }

    pub async fn list_users_by_role(&self, actor: &Actor, role: Role) -> Res<Vec<UserResponse>> {
        self.list_users(actor, Some(role)).await
    }

    /// Single account, with its subscription summary when one exists.
    pub async fn get_user(&self, actor: &Actor, id: Uuid) -> Res<UserResponse> {
        policy::authorize(Operation::ReadProfile, actor, Some(id))?;

        let user = self.require_user(id).await?;
        let subscription = self
            .subscriptions
            .get_subscription_by_user_id(id)
            .await?
            .as_ref()
            .map(SubscriptionSummary::from);

        Ok(UserResponse::from(&user).with_subscription(subscription))
    }

    pub async fn get_profile(&self, actor: &Actor) -> Res<UserResponse> {
        self.get_user(actor, actor.id).await
    }

    pub async fn update_user(
        &self,
        actor: &Actor,
        id: Uuid,
        req: UpdateUserRequest,
    ) -> Res<UserResponse> {
        let fields = RequestedFields {
            name: req.name.is_some(),
            email: req.email.is_some(),
            role: req.role.is_some(),
        };
        policy::authorize_update(actor, id, fields)?;

        let user = self.require_user(id).await?;

        if let Some(email) = &req.email {
            if email != &user.email && self.users.email_exists(email).await? {
                return Err(AppError::Conflict(EMAIL_EXISTS.to_string()));
            }
        }

        let update = UserUpdate {
            name: req.name,
            email: req.email,
            role: req.role,
            password_hash: None,
        };
        if update.is_empty() {
            return Ok(user.into());
        }

        let updated = self
            .users
            .update_user(id, update)
            .await?
            .ok_or_else(user_not_found)?;
        Ok(updated.into())
    }

    /// Changes a password. On one's own account the current password must be
    /// supplied and the new one must differ from it.
    pub async fn change_password(
        &self,
        actor: &Actor,
        id: Uuid,
        req: ChangePasswordRequest,
    ) -> Res<MessageResponse> {
        policy::authorize(Operation::ChangePassword, actor, Some(id))?;

        let user = self.require_user(id).await?;

        if policy::requires_current_password(actor, id) {
            let current = req.current_password.as_deref().unwrap_or_default();
            if !self.passwords.verify(current, &user.password_hash).await {
                return Err(AppError::Unauthorized(
                    "Current password is incorrect".to_string(),
                ));
            }
            if self.passwords.verify(&req.new_password, &user.password_hash).await {
                return Err(AppError::BadRequest(
                    "New password must be different from the current password".to_string(),
                ));
            }
        }

        let password_hash = self.passwords.hash(&req.new_password).await?;
        self.users
            .update_user(
                id,
                UserUpdate {
                    password_hash: Some(password_hash),
                    ..Default::default()
                },
            )
            .await?
            .ok_or_else(user_not_found)?;

        log::info!("Password changed for user {}", id);
        Ok(MessageResponse::new("Password changed successfully!"))
    }

    pub async fn promote_to_admin(&self, actor: &Actor, id: Uuid) -> Res<UserResponse> {
        policy::authorize(Operation::PromoteUser, actor, Some(id))?;

        let user = self.require_user(id).await?;
        if user.is_admin() {
            return Err(AppError::Conflict(
                "User is already an administrator".to_string(),
            ));
        }
        self.set_role(id, Role::Admin).await
    }

    pub async fn demote_to_user(&self, actor: &Actor, id: Uuid) -> Res<UserResponse> {
        policy::authorize(Operation::DemoteUser, actor, Some(id))?;

        let user = self.require_user(id).await?;
        if !user.is_admin() {
            return Err(AppError::Conflict(
                "User is not an administrator".to_string(),
            ));
        }
        self.set_role(id, Role::User).await
    }

    async fn set_role(&self, id: Uuid, role: Role) -> Res<UserResponse> {
        let update = UserUpdate {
            role: Some(role),
            ..Default::default()
        };
        let user = self
            .users
            .update_user(id, update)
            .await?
            .ok_or_else(user_not_found)?;
        log::info!("User {} role set to {}", id, role);
        Ok(user.into())
    }

    /// Administrative deletion of any account.
    pub async fn delete_user(&self, actor: &Actor, id: Uuid) -> Res<MessageResponse> {
        policy::authorize(Operation::DeleteUser, actor, Some(id))?;

        if !self.users.delete_user(id).await? {
            return Err(user_not_found());
        }
        log::info!("User {} deleted by {}", id, actor.id);
        Ok(MessageResponse::new("User deleted successfully"))
    }

    /// Self-service deletion; removes the subscription along with the account.
    pub async fn delete_account(&self, actor: &Actor) -> Res<MessageResponse> {
        policy::authorize(Operation::DeleteOwnAccount, actor, Some(actor.id))?;

        if !self.users.delete_user(actor.id).await? {
            return Err(user_not_found());
        }
        log::info!("Account {} deleted", actor.id);
        Ok(MessageResponse::new("Account deleted successfully"))
    }

    /// Ensures the configured administrator exists. Returns whether one was created.
    pub async fn seed_admin(&self, seed: &AdminSeed) -> Res<bool> {
        if let Some(existing) = self.users.get_user_by_email(&seed.email).await? {
            if !existing.is_admin() {
                log::warn!(
                    "Seed administrator email {} belongs to a non-admin account",
                    seed.email
                );
            }
            return Ok(false);
        }

        let user = self
            .insert(seed.name.clone(), seed.email.clone(), &seed.password, Role::Admin)
            .await?;
        log::info!("Seeded administrator {}", user.id);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use db::{dtos::subscription::SubscriptionCreateRequest, memory::MemoryStore};

    use super::*;

    struct Fixture {
        store: MemoryStore,
        service: UserService,
    }

    fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let service = UserService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            PasswordService::new(1).unwrap(),
        );
        Fixture { store, service }
    }

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Ada".into(),
            email: email.into(),
            password: "first-password".into(),
        }
    }

    async fn registered(f: &Fixture, email: &str) -> Actor {
        let user = f.service.register(register_request(email)).await.unwrap();
        Actor::new(user.id, user.role)
    }

    async fn admin(f: &Fixture) -> Actor {
        let seed = AdminSeed {
            email: "root@example.com".into(),
            password: "root-password".into(),
            name: "Root".into(),
        };
        f.service.seed_admin(&seed).await.unwrap();
        let user = f.store.get_user_by_email("root@example.com").await.unwrap().unwrap();
        Actor::new(user.id, user.role)
    }

    #[tokio::test]
    async fn registration_forces_user_role_and_rejects_duplicates() {
        let f = fixture();
        let actor = registered(&f, "ada@example.com").await;
        assert_eq!(actor.role, Role::User);

        let err = f.service.register(register_request("ada@example.com")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(msg) if msg == "Email already exists"));
    }

    #[tokio::test]
    async fn admin_create_respects_requested_role() {
        let f = fixture();
        let root = admin(&f).await;

        let created = f
            .service
            .create_user(
                &root,
                CreateUserRequest {
                    name: "Grace".into(),
                    email: "grace@example.com".into(),
                    password: "grace-password".into(),
                    role: Some(Role::Admin),
                },
            )
            .await
            .unwrap();
        assert_eq!(created.role, Role::Admin);
    }

    #[tokio::test]
    async fn user_cannot_create_or_list() {
        let f = fixture();
        let ada = registered(&f, "ada@example.com").await;

        assert!(matches!(
            f.service.create_admin(&ada, register_request("x@example.com")).await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            f.service.list_users(&ada, None).await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn user_renaming_another_user_is_unauthorized() {
        let f = fixture();
        let ada = registered(&f, "ada@example.com").await;
        let grace = registered(&f, "grace@example.com").await;

        let req = UpdateUserRequest {
            name: Some("x".into()),
            ..Default::default()
        };
        assert!(matches!(
            f.service.update_user(&ada, grace.id, req).await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn user_changing_own_email_is_unauthorized() {
        let f = fixture();
        let ada = registered(&f, "ada@example.com").await;

        let req = UpdateUserRequest {
            email: Some("new@x.com".into()),
            ..Default::default()
        };
        match f.service.update_user(&ada, ada.id, req).await {
            Err(AppError::Unauthorized(msg)) => assert_eq!(msg, "Users can only update their name"),
            other => panic!("unexpected: {other:?}"),
        }
        let stored = f.store.get_user_by_id(ada.id).await.unwrap().unwrap();
        assert_eq!(stored.email, "ada@example.com");
    }

    #[tokio::test]
    async fn admin_email_change_to_taken_address_conflicts() {
        let f = fixture();
        let root = admin(&f).await;
        registered(&f, "ada@example.com").await;
        let grace = registered(&f, "grace@example.com").await;

        let req = UpdateUserRequest {
            email: Some("ada@example.com".into()),
            ..Default::default()
        };
        assert!(matches!(
            f.service.update_user(&root, grace.id, req).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn admin_reading_missing_user_is_not_found() {
        let f = fixture();
        let root = admin(&f).await;
        assert!(matches!(
            f.service.get_user(&root, Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn user_reading_other_profile_is_unauthorized_before_lookup() {
        let f = fixture();
        let ada = registered(&f, "ada@example.com").await;
        assert!(matches!(
            f.service.get_user(&ada, Uuid::new_v4()).await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn profile_includes_subscription_summary() {
        let f = fixture();
        let ada = registered(&f, "ada@example.com").await;
        f.store
            .insert_subscription(SubscriptionCreateRequest {
                user_id: ada.id,
                external_customer_id: "cus_1".into(),
                external_subscription_id: "sub_1".into(),
                status: "active".into(),
                current_period_end: Utc::now() + Duration::days(30),
                cancel_at_period_end: false,
            })
            .await
            .unwrap();

        let profile = f.service.get_profile(&ada).await.unwrap();
        assert_eq!(profile.subscription.unwrap().status, "active");
    }

    #[tokio::test]
    async fn own_password_change_requires_current_password() {
        let f = fixture();
        let ada = registered(&f, "ada@example.com").await;

        let wrong = ChangePasswordRequest {
            current_password: Some("not-it".into()),
            new_password: "second-password".into(),
        };
        match f.service.change_password(&ada, ada.id, wrong).await {
            Err(AppError::Unauthorized(msg)) => assert_eq!(msg, "Current password is incorrect"),
            other => panic!("unexpected: {other:?}"),
        }

        let same = ChangePasswordRequest {
            current_password: Some("first-password".into()),
            new_password: "first-password".into(),
        };
        assert!(matches!(
            f.service.change_password(&ada, ada.id, same).await,
            Err(AppError::BadRequest(_))
        ));

        let ok = ChangePasswordRequest {
            current_password: Some("first-password".into()),
            new_password: "second-password".into(),
        };
        let msg = f.service.change_password(&ada, ada.id, ok).await.unwrap();
        assert_eq!(msg.message, "Password changed successfully!");
    }

    #[tokio::test]
    async fn admin_resets_other_password_without_current() {
        let f = fixture();
        let root = admin(&f).await;
        let ada = registered(&f, "ada@example.com").await;

        let req = ChangePasswordRequest {
            current_password: None,
            new_password: "admin-chosen".into(),
        };
        f.service.change_password(&root, ada.id, req).await.unwrap();

        let stored = f.store.get_user_by_id(ada.id).await.unwrap().unwrap();
        let passwords = PasswordService::new(1).unwrap();
        assert!(passwords.verify("admin-chosen", &stored.password_hash).await);
    }

    #[tokio::test]
    async fn promote_and_demote_reject_no_ops() {
        let f = fixture();
        let root = admin(&f).await;
        let ada = registered(&f, "ada@example.com").await;

        assert!(matches!(
            f.service.demote_to_user(&root, ada.id).await,
            Err(AppError::Conflict(_))
        ));

        let promoted = f.service.promote_to_admin(&root, ada.id).await.unwrap();
        assert_eq!(promoted.role, Role::Admin);

        match f.service.promote_to_admin(&root, ada.id).await {
            Err(AppError::Conflict(msg)) => assert_eq!(msg, "User is already an administrator"),
            other => panic!("unexpected: {other:?}"),
        }

        let demoted = f.service.demote_to_user(&root, ada.id).await.unwrap();
        assert_eq!(demoted.role, Role::User);
    }

    #[tokio::test]
    async fn user_cannot_promote_self() {
        let f = fixture();
        let ada = registered(&f, "ada@example.com").await;
        assert!(matches!(
            f.service.promote_to_admin(&ada, ada.id).await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn user_cannot_use_admin_delete_even_on_self() {
        let f = fixture();
        let ada = registered(&f, "ada@example.com").await;
        assert!(matches!(
            f.service.delete_user(&ada, ada.id).await,
            Err(AppError::Unauthorized(_))
        ));

        let msg = f.service.delete_account(&ada).await.unwrap();
        assert_eq!(msg.message, "Account deleted successfully");
        assert_eq!(f.store.user_count().await, 0);
    }

    #[tokio::test]
    async fn admin_delete_of_missing_user_is_not_found() {
        let f = fixture();
        let root = admin(&f).await;
        assert!(matches!(
            f.service.delete_user(&root, Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn admin_seed_is_idempotent() {
        let f = fixture();
        let seed = AdminSeed {
            email: "root@example.com".into(),
            password: "root-password".into(),
            name: "Root".into(),
        };
        assert!(f.service.seed_admin(&seed).await.unwrap());
        assert!(!f.service.seed_admin(&seed).await.unwrap());
        assert_eq!(f.store.user_count().await, 1);
    }

    #[tokio::test]
    async fn list_by_role_filters() {
        let f = fixture();
        let root = admin(&f).await;
        registered(&f, "ada@example.com").await;

        let admins = f.service.list_users_by_role(&root, Role::Admin).await.unwrap();
        assert_eq!(admins.len(), 1);
        let everyone = f.service.list_users(&root, None).await.unwrap();
        assert_eq!(everyone.len(), 2);
    }
}
