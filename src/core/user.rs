//! User business logic - registration, active vehicle and leaderboard.
//!
//! Users arrive from the chat platform with an external identifier, so
//! registration is an idempotent insert keyed on that id. The "active"
//! vehicle is the one mileage reports and reminders apply to; when none is
//! selected, the most recently added vehicle is promoted automatically.

use crate::{
    config::settings::Settings,
    entities::{User, Vehicle, user, vehicle},
    errors::{Error, Result},
};
use sea_orm::{PaginatorTrait, QueryOrder, Set, prelude::*};
use tracing::{debug, info};

/// Registers a user, keeping the existing row when the id is already known
/// (re-running `/start` must not reset anything). The referrer, if any, is
/// recorded for the referral bonus.
pub async fn register_user(
    db: &DatabaseConnection,
    settings: &Settings,
    id: i64,
    username: Option<String>,
    first_name: Option<String>,
    referrer_id: Option<i64>,
    referral_code: Option<String>,
) -> Result<user::Model> {
    if let Some(existing) = User::find_by_id(id).one(db).await? {
        debug!(user_id = id, "User already registered");
        return Ok(existing);
    }

    let model = user::ActiveModel {
        id: Set(id),
        username: Set(username),
        first_name: Set(first_name),
        balance_nuts: Set(0),
        active_vehicle_id: Set(None),
        mileage_reminder_period: Set(settings.default_reminder_period_days),
        referrer_id: Set(referrer_id),
        referral_code: Set(referral_code),
    };
    let created = model.insert(db).await?;
    info!(user_id = id, ?referrer_id, "Registered new user");
    Ok(created)
}

/// Fetches a user by id.
pub async fn get_user(db: &DatabaseConnection, id: i64) -> Result<Option<user::Model>> {
    User::find_by_id(id).one(db).await.map_err(Into::into)
}

/// Selects the vehicle that mileage reports and reminders apply to. The
/// vehicle must belong to the user.
pub async fn set_active_vehicle(
    db: &DatabaseConnection,
    user_id: i64,
    vehicle_id: i64,
) -> Result<()> {
    let vehicle = Vehicle::find_by_id(vehicle_id)
        .one(db)
        .await?
        .ok_or(Error::VehicleNotFound { id: vehicle_id })?;
    if vehicle.user_id != user_id {
        return Err(Error::Validation {
            message: format!("Vehicle {vehicle_id} does not belong to user {user_id}"),
        });
    }

    let user = User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(Error::UserNotFound { id: user_id })?;
    let mut active: user::ActiveModel = user.into();
    active.active_vehicle_id = Set(Some(vehicle_id));
    active.update(db).await?;
    Ok(())
}

/// The user's active vehicle. When none is selected but the user owns
/// vehicles, the most recently added one is promoted to active and returned.
pub async fn get_active_vehicle(
    db: &DatabaseConnection,
    user_id: i64,
) -> Result<Option<vehicle::Model>> {
    let user = User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(Error::UserNotFound { id: user_id })?;

    if let Some(active_id) = user.active_vehicle_id
        && let Some(vehicle) = Vehicle::find_by_id(active_id).one(db).await?
    {
        return Ok(Some(vehicle));
    }

    // Nothing selected (or the selection points at a deleted vehicle):
    // promote the latest vehicle, if any
    let latest = Vehicle::find()
        .filter(vehicle::Column::UserId.eq(user_id))
        .order_by_desc(vehicle::Column::Id)
        .one(db)
        .await?;

    if let Some(vehicle) = &latest {
        info!(user_id, vehicle_id = vehicle.id, "Auto-activating latest vehicle");
        let mut active: user::ActiveModel = user.into();
        active.active_vehicle_id = Set(Some(vehicle.id));
        active.update(db).await?;
    }

    Ok(latest)
}

/// Sets how many days may pass without a mileage report before the reminder
/// sweep nudges this user.
pub async fn set_mileage_reminder_period(
    db: &DatabaseConnection,
    user_id: i64,
    days: i64,
) -> Result<()> {
    if days < 1 {
        return Err(Error::Validation {
            message: format!("Reminder period must be at least 1 day, got {days}"),
        });
    }

    let user = User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(Error::UserNotFound { id: user_id })?;
    let mut active: user::ActiveModel = user.into();
    active.mileage_reminder_period = Set(days);
    active.update(db).await?;
    Ok(())
}

/// Number of users who registered with this user as referrer.
pub async fn count_referrals(db: &DatabaseConnection, user_id: i64) -> Result<u64> {
    User::find()
        .filter(user::Column::ReferrerId.eq(user_id))
        .count(db)
        .await
        .map_err(Into::into)
}

/// One page of the leaderboard, richest first, ties broken by user id
/// ascending. Pages are 1-based.
pub async fn top_users(
    db: &DatabaseConnection,
    page: u64,
    page_size: u64,
) -> Result<Vec<user::Model>> {
    User::find()
        .order_by_desc(user::Column::BalanceNuts)
        .order_by_asc(user::Column::Id)
        .paginate(db, page_size)
        .fetch_page(page.saturating_sub(1))
        .await
        .map_err(Into::into)
}

/// Total number of registered users.
pub async fn total_users_count(db: &DatabaseConnection) -> Result<u64> {
    User::find().count(db).await.map_err(Into::into)
}
