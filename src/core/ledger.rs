//! Reward ledger business logic - the append-only nut transaction log.
//!
//! Every grant appends an immutable transaction row and increments the
//! owner's cached balance in the same database transaction, so the cached
//! `balance_nuts` always equals the sum of the owner's ledger rows. One-time
//! rewards (profile completion, referral bonus, first vehicle, first
//! tracking) are gated by an exact-description existence check performed
//! inside the same transaction as the insert; SQLite allows a single writer
//! at a time, which serializes the check-then-grant pair and guarantees
//! at-most-once granting under concurrent triggers.
//!
//! Persistence failures always propagate to the caller - a swallowed write
//! error here would corrupt the balance invariant.

use crate::{
    entities::{RewardTransaction, User, reward_transaction, user},
    errors::{Error, Result},
};
use sea_orm::{Condition, PaginatorTrait, QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use tracing::info;

/// Well-known ledger descriptions. One-time rewards are keyed by the exact
/// description text, so these strings are part of the stored data contract
/// and stay as the live system produced them.
pub mod descriptions {
    /// One-time reward for completing a vehicle profile.
    pub const PROFILE_COMPLETED: &str = "Заполнение профиля авто";
    /// One-time reward for adding the first vehicle.
    pub const FIRST_VEHICLE: &str = "Первый автомобиль в гараже";
    /// One-time reward for creating the first tracking.
    pub const FIRST_TRACKING: &str = "Первое напоминание ТО";

    /// Referral bonus description; encodes the referred user so that each
    /// referral pays out once.
    #[must_use]
    pub fn referral_bonus(referred_id: i64) -> String {
        format!("Реферальный бонус за приглашение {referred_id}")
    }

    /// Mileage reward description; encodes the rewarded distance.
    #[must_use]
    pub fn mileage_reward(km: i64) -> String {
        format!("Начисление за пробег {km} км")
    }
}

/// Appends a transaction and atomically increments the owner's cached
/// balance. A zero amount is a no-op and persists nothing.
///
/// Returns the created transaction, or `None` for the zero-amount no-op.
pub async fn grant(
    db: &DatabaseConnection,
    user_id: i64,
    amount: i64,
    description: &str,
) -> Result<Option<reward_transaction::Model>> {
    if amount == 0 {
        return Ok(None);
    }

    let txn = db.begin().await?;
    let created = grant_in(&txn, user_id, amount, description).await?;
    txn.commit().await?;
    Ok(Some(created))
}

/// Inserts the ledger row and increments the cached balance on an open
/// transaction. Callers own the transaction boundary; `amount` must be
/// non-zero.
pub(crate) async fn grant_in<C>(
    conn: &C,
    user_id: i64,
    amount: i64,
    description: &str,
) -> Result<reward_transaction::Model>
where
    C: ConnectionTrait,
{
    // Verify the owner exists so the balance increment cannot silently
    // update zero rows while the ledger row still lands
    User::find_by_id(user_id)
        .one(conn)
        .await?
        .ok_or(Error::UserNotFound { id: user_id })?;

    let transaction = reward_transaction::ActiveModel {
        user_id: Set(user_id),
        amount: Set(amount),
        description: Set(description.to_string()),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    let created = transaction.insert(conn).await?;

    // Atomic increment: balance_nuts = balance_nuts + amount
    use sea_orm::sea_query::Expr;
    User::update_many()
        .col_expr(
            user::Column::BalanceNuts,
            Expr::col(user::Column::BalanceNuts).add(amount),
        )
        .filter(user::Column::Id.eq(user_id))
        .exec(conn)
        .await?;

    info!(user_id, amount, description, "Granted nuts");
    Ok(created)
}

/// Whether the owner already holds a transaction with exactly this
/// description. Used to gate one-time rewards.
pub async fn has_received(db: &DatabaseConnection, user_id: i64, description: &str) -> Result<bool> {
    let found = RewardTransaction::find()
        .filter(reward_transaction::Column::UserId.eq(user_id))
        .filter(reward_transaction::Column::Description.eq(description))
        .limit(1)
        .one(db)
        .await?;
    Ok(found.is_some())
}

/// Grants a one-time reward at most once per (owner, description).
///
/// The existence check, the ledger insert and the balance increment run in
/// one database transaction, closing the check-then-grant race between
/// concurrent triggers for the same owner. Returns whether a grant happened.
pub async fn grant_one_time(
    db: &DatabaseConnection,
    user_id: i64,
    amount: i64,
    description: &str,
) -> Result<bool> {
    if amount == 0 {
        return Ok(false);
    }

    let txn = db.begin().await?;

    let already_granted = RewardTransaction::find()
        .filter(reward_transaction::Column::UserId.eq(user_id))
        .filter(reward_transaction::Column::Description.eq(description))
        .limit(1)
        .one(&txn)
        .await?
        .is_some();
    if already_granted {
        txn.commit().await?;
        return Ok(false);
    }

    grant_in(&txn, user_id, amount, description).await?;
    txn.commit().await?;
    Ok(true)
}

/// Grants the referral bonus to `referrer_id` for inviting `referred_id`,
/// at most once per referred user.
pub async fn grant_referral_bonus(
    db: &DatabaseConnection,
    referrer_id: i64,
    referred_id: i64,
    amount: i64,
) -> Result<bool> {
    grant_one_time(
        db,
        referrer_id,
        amount,
        &descriptions::referral_bonus(referred_id),
    )
    .await
}

/// The owner's cached nut balance.
pub async fn balance(db: &DatabaseConnection, user_id: i64) -> Result<i64> {
    let user = User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(Error::UserNotFound { id: user_id })?;
    Ok(user.balance_nuts)
}

/// The owner's 1-based leaderboard rank, ordered by balance descending with
/// ties broken by user id ascending - a stable, deterministic total order.
pub async fn rank(db: &DatabaseConnection, user_id: i64) -> Result<u64> {
    let user = User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(Error::UserNotFound { id: user_id })?;

    let ahead = User::find()
        .filter(
            Condition::any()
                .add(user::Column::BalanceNuts.gt(user.balance_nuts))
                .add(
                    Condition::all()
                        .add(user::Column::BalanceNuts.eq(user.balance_nuts))
                        .add(user::Column::Id.lt(user_id)),
                ),
        )
        .count(db)
        .await?;

    Ok(ahead + 1)
}

/// One page of the owner's transaction history, newest first. Pages are
/// 1-based.
pub async fn history(
    db: &DatabaseConnection,
    user_id: i64,
    page: u64,
    page_size: u64,
) -> Result<Vec<reward_transaction::Model>> {
    RewardTransaction::find()
        .filter(reward_transaction::Column::UserId.eq(user_id))
        .order_by_desc(reward_transaction::Column::CreatedAt)
        .order_by_desc(reward_transaction::Column::Id)
        .paginate(db, page_size)
        .fetch_page(page.saturating_sub(1))
        .await
        .map_err(Into::into)
}

/// Total number of transactions for an owner (for pagination controls).
pub async fn transactions_count(db: &DatabaseConnection, user_id: i64) -> Result<u64> {
    RewardTransaction::find()
        .filter(reward_transaction::Column::UserId.eq(user_id))
        .count(db)
        .await
        .map_err(Into::into)
}

/// The owner's `limit` most recent transactions, newest first.
pub async fn latest_transactions(
    db: &DatabaseConnection,
    user_id: i64,
    limit: u64,
) -> Result<Vec<reward_transaction::Model>> {
    RewardTransaction::find()
        .filter(reward_transaction::Column::UserId.eq(user_id))
        .order_by_desc(reward_transaction::Column::CreatedAt)
        .order_by_desc(reward_transaction::Column::Id)
        .limit(limit)
        .all(db)
        .await
        .map_err(Into::into)
}
