//! User entity - Represents an owner registered with the bot.
//!
//! The primary key is the chat-platform user id, so inserts never
//! auto-increment. `balance_nuts` is a cached sum of the user's reward
//! transactions and is only ever mutated together with a ledger insert.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Chat-platform user id (external identifier, not auto-generated)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    /// Platform username, if the user has one
    pub username: Option<String>,
    /// Display name captured at registration
    pub first_name: Option<String>,
    /// Cached nut balance; always equals the sum of the user's transactions
    pub balance_nuts: i64,
    /// The vehicle currently selected as active, if any
    pub active_vehicle_id: Option<i64>,
    /// How many days without a mileage report before a reminder fires
    pub mileage_reminder_period: i64,
    /// User id of whoever referred this user, if anyone
    pub referrer_id: Option<i64>,
    /// Promo code used at registration, if any
    pub referral_code: Option<String>,
}

/// Defines relationships between User and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One user owns many vehicles
    #[sea_orm(has_many = "super::vehicle::Entity")]
    Vehicles,
    /// One user has many reward transactions
    #[sea_orm(has_many = "super::reward_transaction::Entity")]
    RewardTransactions,
}

impl Related<super::vehicle::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vehicles.def()
    }
}

impl Related<super::reward_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RewardTransactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
