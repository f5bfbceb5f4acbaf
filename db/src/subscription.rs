use chrono::{DateTime, Utc};
use common::error::{AppError, Res};
use sqlx::{Executor, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    dtos::subscription::{SubscriptionCreateRequest, SubscriptionUpdate},
    models::subscription::{STATUS_ACTIVE, Subscription},
    store::SUBSCRIPTION_EXISTS,
};

pub async fn get_subscription_by_user_id<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Option<Subscription>> {
    sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

pub async fn get_subscription_by_external_id<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    external_subscription_id: &str,
) -> Res<Option<Subscription>> {
    sqlx::query_as::<_, Subscription>(
        "SELECT * FROM subscriptions WHERE external_subscription_id = $1",
    )
    .bind(external_subscription_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_active_subscription<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Res<Option<Subscription>> {
    sqlx::query_as::<_, Subscription>(
        r#"
        SELECT * FROM subscriptions
        WHERE user_id = $1 AND status = $2 AND current_period_end > $3
        "#,
    )
    .bind(user_id)
    .bind(STATUS_ACTIVE)
    .bind(now)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn insert_subscription<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: SubscriptionCreateRequest,
) -> Res<Subscription> {
    sqlx::query_as::<_, Subscription>(
        r#"
        INSERT INTO subscriptions (
            user_id, external_customer_id, external_subscription_id,
            status, current_period_end, cancel_at_period_end
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(data.user_id)
    .bind(data.external_customer_id)
    .bind(data.external_subscription_id)
    .bind(data.status)
    .bind(data.current_period_end)
    .bind(data.cancel_at_period_end)
    .fetch_one(executor)
    .await
    .map_err(|e| AppError::on_unique_violation(e, SUBSCRIPTION_EXISTS))
}

/// Which unique key an update is addressed by.
pub enum SubscriptionKey<'a> {
    UserId(Uuid),
    ExternalId(&'a str),
}

pub async fn update_subscription<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    key: SubscriptionKey<'_>,
    data: SubscriptionUpdate,
) -> Res<Option<Subscription>> {
    let mut qb: QueryBuilder<Postgres> =
        QueryBuilder::new("UPDATE subscriptions SET updated_at = NOW()");

    if let Some(status) = data.status {
        qb.push(", status = ").push_bind(status);
    }
    if let Some(current_period_end) = data.current_period_end {
        qb.push(", current_period_end = ").push_bind(current_period_end);
    }
    if let Some(cancel_at_period_end) = data.cancel_at_period_end {
        qb.push(", cancel_at_period_end = ")
            .push_bind(cancel_at_period_end);
    }

    match key {
        SubscriptionKey::UserId(user_id) => {
            qb.push(" WHERE user_id = ").push_bind(user_id);
        }
        SubscriptionKey::ExternalId(external_id) => {
            qb.push(" WHERE external_subscription_id = ")
                .push_bind(external_id.to_string());
        }
    }
    qb.push(" RETURNING *");

    qb.build_query_as::<Subscription>()
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}
