//! Vehicle entity - A car (or bike, or van) owned by a user.
//!
//! The odometer reading is nullable until the owner first reports it. The
//! allowance columns back the date-throttled mileage reward: `mileage_allowance`
//! is the budget of rewardable kilometres and `last_allowance_update_at` marks
//! when it was last replenished. Both date columns hold calendar dates, never
//! wall-clock timestamps.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Vehicle database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vehicles")]
pub struct Model {
    /// Unique identifier for the vehicle
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owner of this vehicle
    pub user_id: i64,
    /// Display name, unique per owner
    pub name: String,
    /// Current odometer reading in km; None until first reported
    pub mileage: Option<i64>,
    /// Date of the last mileage report (or snooze)
    pub last_mileage_update_at: Date,
    /// Remaining budget of rewardable kilometres
    pub mileage_allowance: i64,
    /// Date the allowance was last replenished
    pub last_allowance_update_at: Date,
}

/// Defines relationships between Vehicle and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each vehicle belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    /// One vehicle has many trackings
    #[sea_orm(has_many = "super::tracking::Entity")]
    Trackings,
    /// One vehicle has many notes
    #[sea_orm(has_many = "super::note::Entity")]
    Notes,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::tracking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Trackings.def()
    }
}

impl Related<super::note::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Notes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
