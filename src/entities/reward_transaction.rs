//! Reward transaction entity - The append-only nut ledger.
//!
//! Each row is an immutable signed grant. Zero-amount rows are never
//! persisted. One-time rewards are gated by an exact-description existence
//! check, so descriptions double as idempotency keys.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Reward transaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reward_transactions")]
pub struct Model {
    /// Unique identifier for the transaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User whose balance this transaction affects
    pub user_id: i64,
    /// Signed nut amount; never zero
    pub amount: i64,
    /// Human-readable description; exact-match key for one-time rewards
    pub description: String,
    /// When the transaction was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between RewardTransaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
