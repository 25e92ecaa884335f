//! Vehicle business logic - garage management.
//!
//! Provides functions for creating, retrieving, updating and deleting
//! vehicles. Odometer updates that feed the reward pipeline live in
//! [`crate::core::allowance`]; the patch surface here is for conversational
//! edits (rename, manual odometer correction) and does not touch the
//! allowance.

use crate::{
    entities::{Note, Tracking, User, Vehicle, note, tracking, user, vehicle},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::info;

/// Partial update for a vehicle. Only provided fields mutate.
#[derive(Debug, Default, Clone)]
pub struct VehiclePatch {
    /// New display name
    pub name: Option<String>,
    /// Manual odometer correction (bypasses the reward pipeline)
    pub mileage: Option<i64>,
}

/// Adds a vehicle to a user's garage. Names are unique per owner; the
/// odometer may be left unknown until the first report.
pub async fn add_vehicle(
    db: &DatabaseConnection,
    user_id: i64,
    name: String,
    mileage: Option<i64>,
) -> Result<vehicle::Model> {
    if name.trim().is_empty() {
        return Err(Error::Validation {
            message: "Vehicle name cannot be empty".to_string(),
        });
    }
    if let Some(m) = mileage
        && m < 0
    {
        return Err(Error::Validation {
            message: format!("Odometer reading cannot be negative, got {m}"),
        });
    }

    User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(Error::UserNotFound { id: user_id })?;

    let name = name.trim().to_string();
    if vehicle_exists_by_name(db, user_id, &name).await? {
        return Err(Error::Validation {
            message: format!("Vehicle named {name:?} already exists"),
        });
    }

    let today = Utc::now().date_naive();
    let model = vehicle::ActiveModel {
        user_id: Set(user_id),
        name: Set(name.clone()),
        mileage: Set(mileage),
        last_mileage_update_at: Set(today),
        mileage_allowance: Set(0),
        last_allowance_update_at: Set(today),
        ..Default::default()
    };
    let created = model.insert(db).await?;
    info!(user_id, vehicle_id = created.id, name, "Added vehicle");
    Ok(created)
}

/// Fetches a vehicle by id.
pub async fn get_vehicle(db: &DatabaseConnection, id: i64) -> Result<Option<vehicle::Model>> {
    Vehicle::find_by_id(id).one(db).await.map_err(Into::into)
}

/// All vehicles of a user, in the order they were added.
pub async fn list_vehicles(db: &DatabaseConnection, user_id: i64) -> Result<Vec<vehicle::Model>> {
    Vehicle::find()
        .filter(vehicle::Column::UserId.eq(user_id))
        .order_by_asc(vehicle::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Whether the user already has a vehicle with this name.
pub async fn vehicle_exists_by_name(
    db: &DatabaseConnection,
    user_id: i64,
    name: &str,
) -> Result<bool> {
    let found = Vehicle::find()
        .filter(vehicle::Column::UserId.eq(user_id))
        .filter(vehicle::Column::Name.eq(name))
        .one(db)
        .await?;
    Ok(found.is_some())
}

/// Applies a conversational edit to a vehicle.
pub async fn update_vehicle_details(
    db: &DatabaseConnection,
    id: i64,
    patch: VehiclePatch,
) -> Result<vehicle::Model> {
    if let Some(name) = &patch.name
        && name.trim().is_empty()
    {
        return Err(Error::Validation {
            message: "Vehicle name cannot be empty".to_string(),
        });
    }
    if let Some(m) = patch.mileage
        && m < 0
    {
        return Err(Error::Validation {
            message: format!("Odometer reading cannot be negative, got {m}"),
        });
    }

    let model = Vehicle::find_by_id(id)
        .one(db)
        .await?
        .ok_or(Error::VehicleNotFound { id })?;

    let mut active: vehicle::ActiveModel = model.clone().into();
    if let Some(name) = &patch.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(m) = patch.mileage {
        active.mileage = Set(Some(m));
    }

    if !active.is_changed() {
        return Ok(model);
    }
    active.update(db).await.map_err(Into::into)
}

/// Postpones the mileage reminder: stamps today as the last report date
/// without touching the odometer, so the next sweep match is a full reminder
/// period away.
pub async fn snooze_mileage_update(db: &DatabaseConnection, id: i64) -> Result<()> {
    let model = Vehicle::find_by_id(id)
        .one(db)
        .await?
        .ok_or(Error::VehicleNotFound { id })?;

    let mut active: vehicle::ActiveModel = model.into();
    active.last_mileage_update_at = Set(Utc::now().date_naive());
    active.update(db).await?;
    Ok(())
}

/// Deletes a vehicle with everything attached to it: its trackings, its
/// notes, and any active-vehicle selection pointing at it. All in one
/// database transaction.
pub async fn delete_vehicle(db: &DatabaseConnection, id: i64) -> Result<()> {
    use sea_orm::sea_query::Expr;

    let txn = db.begin().await?;

    Vehicle::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or(Error::VehicleNotFound { id })?;

    User::update_many()
        .col_expr(user::Column::ActiveVehicleId, Expr::value(Option::<i64>::None))
        .filter(user::Column::ActiveVehicleId.eq(id))
        .exec(&txn)
        .await?;

    Tracking::delete_many()
        .filter(tracking::Column::VehicleId.eq(id))
        .exec(&txn)
        .await?;
    Note::delete_many()
        .filter(note::Column::VehicleId.eq(id))
        .exec(&txn)
        .await?;
    Vehicle::delete_by_id(id).exec(&txn).await?;

    txn.commit().await?;
    info!(vehicle_id = id, "Deleted vehicle");
    Ok(())
}
