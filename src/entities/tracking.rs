//! Tracking entity - A maintenance obligation attached to one vehicle.
//!
//! The row is polymorphic: `kind` discriminates the variant and the
//! kind-specific columns are nullable. Which columns must be non-null for a
//! tracking to be considered configured is decided by
//! [`crate::core::tracking::TrackingSpec`], which converts a row into a typed
//! sum over the active kind; nothing outside that module reads the nullable
//! columns directly.
//!
//! `notification_schedule` holds the pending day-thresholds still awaiting
//! acknowledgment (serialized `"7,3,1"`); `schedule_template` keeps the full
//! configured set so a repeat renewal can restore it.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Discriminator for the tracking variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum TrackingType {
    /// Recurs every `interval_km` kilometres
    #[sea_orm(string_value = "mileage")]
    MileageInterval,
    /// Fires once at `target_mileage`
    #[sea_orm(string_value = "exact_mileage")]
    ExactMileage,
    /// Recurring or one-shot by calendar duration
    #[sea_orm(string_value = "time")]
    TimeBased,
}

/// Tracking database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "trackings")]
pub struct Model {
    /// Unique identifier for the tracking
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Vehicle this tracking belongs to
    pub vehicle_id: i64,
    /// Display name (e.g. "Oil change")
    pub name: String,
    /// Variant discriminator
    pub kind: TrackingType,
    /// MileageInterval: recurrence interval in km
    pub interval_km: Option<i64>,
    /// MileageInterval: odometer value at the last reset
    pub last_reset_mileage: Option<i64>,
    /// TimeBased: recurrence interval in days
    pub interval_days: Option<i64>,
    /// TimeBased: anchor date of the current cycle
    pub last_reset_date: Option<Date>,
    /// ExactMileage: odometer value at which the tracking fires
    pub target_mileage: Option<i64>,
    /// TimeBased: fixed due date (alternative to interval + anchor)
    pub target_date: Option<Date>,
    /// TimeBased: whether the tracking renews itself when due
    pub is_repeating: bool,
    /// Pending notification day-thresholds, serialized (e.g. `"7,3,1"`)
    pub notification_schedule: Option<String>,
    /// Configured full threshold set, restored on repeat renewal
    pub schedule_template: Option<String>,
}

/// Defines relationships between Tracking and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each tracking belongs to one vehicle
    #[sea_orm(
        belongs_to = "super::vehicle::Entity",
        from = "Column::VehicleId",
        to = "super::vehicle::Column::Id"
    )]
    Vehicle,
}

impl Related<super::vehicle::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vehicle.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
