//! Core business logic - framework-agnostic engine operations.
//!
//! Every module here exposes async functions over a `DatabaseConnection`
//! and returns [`crate::errors::Result`]; nothing in this tree knows about
//! chat platforms or message formatting.

/// Mileage allowance settlement and odometer reports
pub mod allowance;
/// Reward ledger: grants, idempotent one-time rewards, balances, ranks
pub mod ledger;
/// Vehicle notes
pub mod note;
/// Notification schedule value type
pub mod schedule;
/// Tracking model: kinds, remaining values, lifecycle operations
pub mod tracking;
/// User registration, active vehicle and leaderboard
pub mod user;
/// Garage management
pub mod vehicle;
