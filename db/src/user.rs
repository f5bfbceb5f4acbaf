use chrono::{DateTime, Utc};
use common::{
    error::{AppError, Res},
    misc::Role,
};
use sqlx::{Executor, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    dtos::user::{UserCreateRequest, UserUpdate},
    models::user::User,
    store::EMAIL_EXISTS,
};

pub async fn get_user_by_id<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

pub async fn get_user_by_email<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    email: &str,
) -> Res<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

pub async fn email_exists<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    email: &str,
) -> Res<bool> {
    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
        .bind(email)
        .fetch_one(executor)
        .await
        .map_err(AppError::from)
}

pub async fn list_users<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    role: Option<Role>,
) -> Res<Vec<User>> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM users");
    if let Some(role) = role {
        qb.push(" WHERE role = ").push_bind(role);
    }
    qb.push(" ORDER BY created_at ASC");

    qb.build_query_as::<User>()
        .fetch_all(executor)
        .await
        .map_err(AppError::from)
}

pub async fn insert_user<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: UserCreateRequest,
) -> Res<User> {
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (name, email, password_hash, role)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(data.name)
    .bind(data.email)
    .bind(data.password_hash)
    .bind(data.role)
    .fetch_one(executor)
    .await
    .map_err(|e| AppError::on_unique_violation(e, EMAIL_EXISTS))
}

pub async fn update_user<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    data: UserUpdate,
) -> Res<Option<User>> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET updated_at = NOW()");

    if let Some(name) = data.name {
        qb.push(", name = ").push_bind(name);
    }
    if let Some(email) = data.email {
        qb.push(", email = ").push_bind(email);
    }
    if let Some(role) = data.role {
        qb.push(", role = ").push_bind(role);
    }
    if let Some(password_hash) = data.password_hash {
        qb.push(", password_hash = ").push_bind(password_hash);
    }
    qb.push(" WHERE id = ").push_bind(user_id);
    qb.push(" RETURNING *");

    qb.build_query_as::<User>()
        .fetch_optional(executor)
        .await
        .map_err(|e| AppError::on_unique_violation(e, EMAIL_EXISTS))
}

pub async fn delete_user<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<bool> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn set_reset_token<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    token_hash: &str,
    expires_at: DateTime<Utc>,
) -> Res<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET reset_password_token = $2, reset_password_expires = $3, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .bind(token_hash)
    .bind(expires_at)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn find_by_reset_token<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    token_hash: &str,
    now: DateTime<Utc>,
) -> Res<Option<User>> {
    sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE reset_password_token = $1 AND reset_password_expires > $2",
    )
    .bind(token_hash)
    .bind(now)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn complete_password_reset<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    password_hash: &str,
) -> Res<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET password_hash = $2,
            reset_password_token = NULL,
            reset_password_expires = NULL,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .bind(password_hash)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn clear_expired_reset_tokens<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    now: DateTime<Utc>,
) -> Res<u64> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET reset_password_token = NULL, reset_password_expires = NULL
        WHERE reset_password_expires IS NOT NULL AND reset_password_expires <= $1
        "#,
    )
    .bind(now)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}
