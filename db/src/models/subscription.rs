use chrono::{DateTime, Utc};
use uuid::Uuid;

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_PAST_DUE: &str = "past_due";
pub const STATUS_CANCELED: &str = "canceled";

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub external_customer_id: String,
    pub external_subscription_id: String,
    /// Mirrors the provider's subscription status.
    pub status: String,
    pub current_period_end: DateTime<Utc>,
    pub cancel_at_period_end: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Active means the provider reports it active and the paid period has not ended.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == STATUS_ACTIVE && self.current_period_end > now
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn subscription(status: &str, period_end: DateTime<Utc>) -> Subscription {
        let now = Utc::now();
        Subscription {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            external_customer_id: "cus_1".into(),
            external_subscription_id: "sub_1".into(),
            status: status.into(),
            current_period_end: period_end,
            cancel_at_period_end: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn activity_requires_status_and_future_period_end() {
        let now = Utc::now();
        assert!(subscription("active", now + Duration::days(1)).is_active_at(now));
        assert!(!subscription("active", now).is_active_at(now));
        assert!(!subscription("active", now - Duration::days(1)).is_active_at(now));
        assert!(!subscription("past_due", now + Duration::days(1)).is_active_at(now));
    }
}
