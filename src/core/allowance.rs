//! Mileage allowance business logic - the date-throttled reward budget.
//!
//! Owners may only be rewarded for a bounded number of kilometres per elapsed
//! calendar day. The budget ("allowance") accrues daily and caps the
//! rewardable share of every mileage report, so a large backlog of unreported
//! driving cannot pay out disproportionately, and rapid tiny reports gain
//! nothing over a single large one.
//!
//! [`settle`] is the pure settlement function; [`report_mileage`] applies it
//! and persists the odometer, the remaining allowance, both date stamps and
//! the nut grant in a single database transaction.

use crate::{
    config::settings::Settings,
    core::ledger,
    entities::{Vehicle, vehicle},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{Set, TransactionTrait, prelude::*};
use tracing::info;

/// Inputs to one allowance settlement.
#[derive(Debug, Clone, Copy)]
pub struct AllowanceInput {
    /// Stored odometer reading, if the vehicle has one
    pub old_mileage: Option<i64>,
    /// Newly reported odometer reading
    pub new_mileage: i64,
    /// Allowance balance before accrual
    pub current_allowance_km: i64,
    /// Date the allowance was last replenished
    pub last_allowance_update_at: NaiveDate,
    /// Settlement date
    pub today: NaiveDate,
    /// Rewardable kilometres accrued per elapsed day
    pub daily_rate_km: i64,
    /// Kilometres of rewardable distance per nut
    pub km_per_point: i64,
}

/// Result of one allowance settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowanceOutcome {
    /// Distance that fit into the allowance budget
    pub rewardable_km: i64,
    /// Nuts to pay out (integer floor of `rewardable_km / km_per_point`)
    pub points_awarded: i64,
    /// Allowance budget left after the settlement
    pub remaining_allowance_km: i64,
}

/// Settles one mileage report against the allowance budget.
///
/// Elapsed whole calendar days replenish the budget at `daily_rate_km`; the
/// reported distance is then capped by the replenished budget. A report that
/// adds no distance (or moves the odometer backwards) still advances the
/// allowance clock but awards nothing - decreases are never penalized.
#[must_use]
pub fn settle(input: AllowanceInput) -> AllowanceOutcome {
    let days_passed = input
        .today
        .signed_duration_since(input.last_allowance_update_at)
        .num_days()
        .max(0);

    let mut allowance = input.current_allowance_km;
    if days_passed > 0 {
        allowance += days_passed * input.daily_rate_km;
    }

    let mileage_added = (input.new_mileage - input.old_mileage.unwrap_or(0)).max(0);
    let rewardable_km = mileage_added.min(allowance);
    let points_awarded = if input.km_per_point > 0 {
        rewardable_km / input.km_per_point
    } else {
        0
    };

    AllowanceOutcome {
        rewardable_km,
        points_awarded,
        remaining_allowance_km: allowance - rewardable_km,
    }
}

/// Outcome of a persisted mileage report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MileageReport {
    /// Nuts granted for this report
    pub points_awarded: i64,
    /// Distance that was rewarded
    pub rewardable_km: i64,
    /// Allowance budget left after the report
    pub new_allowance: i64,
}

/// Processes an odometer report for a vehicle.
///
/// Settles the report against the allowance (see [`settle`]), then persists
/// the new odometer reading, the remaining allowance, today as both the
/// mileage and allowance date stamp, and - when nuts were earned - the ledger
/// grant, all in one database transaction. A report below the stored reading
/// leaves the odometer unchanged (it only ever moves forward) but still
/// advances the allowance clock.
pub async fn report_mileage(
    db: &DatabaseConnection,
    settings: &Settings,
    vehicle_id: i64,
    new_mileage: i64,
) -> Result<MileageReport> {
    if new_mileage < 0 {
        return Err(Error::Validation {
            message: format!("Odometer reading cannot be negative, got {new_mileage}"),
        });
    }

    let today = Utc::now().date_naive();
    let txn = db.begin().await?;

    let vehicle = Vehicle::find_by_id(vehicle_id)
        .one(&txn)
        .await?
        .ok_or(Error::VehicleNotFound { id: vehicle_id })?;

    let outcome = settle(AllowanceInput {
        old_mileage: vehicle.mileage,
        new_mileage,
        current_allowance_km: vehicle.mileage_allowance,
        last_allowance_update_at: vehicle.last_allowance_update_at,
        today,
        daily_rate_km: settings.daily_allowance_km,
        km_per_point: settings.km_per_point,
    });

    // The odometer only ever moves forward
    let stored_mileage = vehicle.mileage.map_or(new_mileage, |old| old.max(new_mileage));
    let user_id = vehicle.user_id;

    let mut active: vehicle::ActiveModel = vehicle.into();
    active.mileage = Set(Some(stored_mileage));
    active.mileage_allowance = Set(outcome.remaining_allowance_km);
    active.last_mileage_update_at = Set(today);
    active.last_allowance_update_at = Set(today);
    active.update(&txn).await?;

    if outcome.points_awarded > 0 {
        ledger::grant_in(
            &txn,
            user_id,
            outcome.points_awarded,
            &ledger::descriptions::mileage_reward(outcome.rewardable_km),
        )
        .await?;
    }

    txn.commit().await?;

    info!(
        vehicle_id,
        new_mileage,
        rewardable_km = outcome.rewardable_km,
        points = outcome.points_awarded,
        "Processed mileage report"
    );

    Ok(MileageReport {
        points_awarded: outcome.points_awarded,
        rewardable_km: outcome.rewardable_km,
        new_allowance: outcome.remaining_allowance_km,
    })
}
