//! Consumable-credit ledger gating expensive operations.
//!
//! Balance mutation is a single conditional UPDATE, so two concurrent debits
//! against one remaining unit cannot both succeed: the row-level write lock
//! serializes them and the `balance >= amount` guard fails the loser closed.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::credits::{CreditAvailability, CreditBalance, CreditUsageRecord};

/// Subscription state is evaluated against the clock at call time, never
/// cached: an expired window stops short-circuiting immediately.
pub fn subscription_active(unlimited_until: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    unlimited_until.map(|until| until > now).unwrap_or(false)
}

pub async fn check_available(
    pool: &PgPool,
    user_id: &str,
    credit_type: &str,
    amount: i64,
) -> Result<CreditAvailability, AppError> {
    let row = fetch_balance(pool, user_id, credit_type).await?;
    let (balance, unlimited_until) = row
        .map(|r| (r.balance, r.unlimited_until))
        .unwrap_or((0, None));

    let unlimited = subscription_active(unlimited_until, Utc::now());
    Ok(CreditAvailability {
        has_credits: unlimited || balance >= amount,
        remaining: balance,
        unlimited,
    })
}

/// Debits `amount` credits, failing closed (no partial debit) when the
/// balance is short. Returns the remaining balance. An active subscription
/// covers the use without decrementing; the usage record then carries a
/// zero delta.
pub async fn debit(
    pool: &PgPool,
    user_id: &str,
    credit_type: &str,
    amount: i64,
    reason: &str,
) -> Result<i64, AppError> {
    if amount <= 0 {
        return Err(AppError::Validation(
            "debit amount must be positive".to_string(),
        ));
    }

    let row = fetch_balance(pool, user_id, credit_type).await?;
    let current_balance = row.as_ref().map(|r| r.balance).unwrap_or(0);
    if subscription_active(row.and_then(|r| r.unlimited_until), Utc::now()) {
        record_usage(pool, user_id, credit_type, 0, reason).await?;
        return Ok(current_balance);
    }

    let updated: Option<(i64,)> = sqlx::query_as(
        r#"
        UPDATE credit_balances
        SET balance = balance - $3, updated_at = now()
        WHERE user_id = $1 AND credit_type = $2 AND balance >= $3
        RETURNING balance
        "#,
    )
    .bind(user_id)
    .bind(credit_type)
    .bind(amount)
    .fetch_optional(pool)
    .await?;

    match updated {
        Some((remaining,)) => {
            record_usage(pool, user_id, credit_type, -amount, reason).await?;
            info!("Debited {amount} {credit_type} credit(s) from {user_id}, {remaining} left");
            Ok(remaining)
        }
        None => Err(AppError::InsufficientCredits {
            credit_type: credit_type.to_string(),
            remaining: current_balance,
        }),
    }
}

/// Grants credits. Always succeeds; creates the balance row on first grant.
pub async fn grant(
    pool: &PgPool,
    user_id: &str,
    credit_type: &str,
    amount: i64,
    source: &str,
) -> Result<i64, AppError> {
    if amount <= 0 {
        return Err(AppError::Validation(
            "grant amount must be positive".to_string(),
        ));
    }

    let (balance,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO credit_balances (user_id, credit_type, balance, updated_at)
        VALUES ($1, $2, $3, now())
        ON CONFLICT (user_id, credit_type)
        DO UPDATE SET balance = credit_balances.balance + EXCLUDED.balance,
                      updated_at = now()
        RETURNING balance
        "#,
    )
    .bind(user_id)
    .bind(credit_type)
    .bind(amount)
    .fetch_one(pool)
    .await?;

    record_usage(pool, user_id, credit_type, amount, source).await?;
    info!("Granted {amount} {credit_type} credit(s) to {user_id} ({source})");
    Ok(balance)
}

/// Opens (or extends) an unlimited window for one credit type.
pub async fn set_unlimited(
    pool: &PgPool,
    user_id: &str,
    credit_type: &str,
    until: DateTime<Utc>,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO credit_balances (user_id, credit_type, balance, unlimited_until, updated_at)
        VALUES ($1, $2, 0, $3, now())
        ON CONFLICT (user_id, credit_type)
        DO UPDATE SET unlimited_until = EXCLUDED.unlimited_until, updated_at = now()
        "#,
    )
    .bind(user_id)
    .bind(credit_type)
    .bind(until)
    .execute(pool)
    .await?;

    info!("Set {credit_type} unlimited for {user_id} until {until}");
    Ok(())
}

pub async fn balances(pool: &PgPool, user_id: &str) -> Result<Vec<CreditBalance>, AppError> {
    Ok(sqlx::query_as(
        "SELECT * FROM credit_balances WHERE user_id = $1 ORDER BY credit_type",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

/// Most recent usage/grant records, newest first.
pub async fn usage_history(
    pool: &PgPool,
    user_id: &str,
    limit: i64,
) -> Result<Vec<CreditUsageRecord>, AppError> {
    Ok(sqlx::query_as(
        "SELECT * FROM credit_usage WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?)
}

async fn fetch_balance(
    pool: &PgPool,
    user_id: &str,
    credit_type: &str,
) -> Result<Option<CreditBalance>, AppError> {
    Ok(sqlx::query_as(
        "SELECT * FROM credit_balances WHERE user_id = $1 AND credit_type = $2",
    )
    .bind(user_id)
    .bind(credit_type)
    .fetch_optional(pool)
    .await?)
}

async fn record_usage(
    pool: &PgPool,
    user_id: &str,
    credit_type: &str,
    delta: i64,
    reason: &str,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO credit_usage (id, user_id, credit_type, delta, reason, created_at)
        VALUES ($1, $2, $3, $4, $5, now())
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(credit_type)
    .bind(delta)
    .bind(reason)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_no_subscription_is_inactive() {
        assert!(!subscription_active(None, Utc::now()));
    }

    #[test]
    fn test_future_expiry_is_active() {
        let now = Utc::now();
        assert!(subscription_active(Some(now + Duration::days(30)), now));
    }

    #[test]
    fn test_past_expiry_is_inactive() {
        let now = Utc::now();
        assert!(!subscription_active(Some(now - Duration::seconds(1)), now));
    }

    #[test]
    fn test_expiry_at_exactly_now_is_inactive() {
        let now = Utc::now();
        assert!(!subscription_active(Some(now), now));
    }
}
