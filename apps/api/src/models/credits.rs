use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const CREDIT_TYPE_FIT_ANALYSIS: &str = "fit_analysis";
pub const CREDIT_TYPE_AI_MESSAGES: &str = "ai_messages";

/// Per-(user, credit type) consumable balance. Never negative.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CreditBalance {
    pub user_id: String,
    pub credit_type: String,
    pub balance: i64,
    /// Active subscription window; while now < unlimited_until the type is
    /// uncapped. Checked against the clock at call time, never cached.
    pub unlimited_until: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreditAvailability {
    pub has_credits: bool,
    pub remaining: i64,
    pub unlimited: bool,
}

/// Append-only usage/grant record.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CreditUsageRecord {
    pub id: Uuid,
    pub user_id: String,
    pub credit_type: String,
    /// Negative for debits, positive for grants.
    pub delta: i64,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}
