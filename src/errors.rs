//! Unified error types and result handling for `GarageBuddy`.
//!
//! All fallible operations in the crate return [`Result`]. Database and I/O
//! failures are wrapped via `#[from]` conversions; domain failures carry
//! enough context to be reported back to the conversational layer.

use thiserror::Error;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration file or environment problem.
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable description of the configuration problem
        message: String,
    },

    /// A caller-supplied value failed validation. No state was mutated.
    #[error("Validation error: {message}")]
    Validation {
        /// What was wrong with the input
        message: String,
    },

    /// The referenced vehicle does not exist.
    #[error("Vehicle {id} not found")]
    VehicleNotFound {
        /// Primary key that failed to resolve
        id: i64,
    },

    /// The referenced tracking does not exist.
    #[error("Tracking {id} not found")]
    TrackingNotFound {
        /// Primary key that failed to resolve
        id: i64,
    },

    /// The referenced user does not exist.
    #[error("User {id} not found")]
    UserNotFound {
        /// Primary key that failed to resolve
        id: i64,
    },

    /// An outbound notification could not be delivered.
    #[error("Delivery error: {message}")]
    Delivery {
        /// Why delivery failed (recipient unreachable, timeout, ...)
        message: String,
    },

    /// Underlying database failure. Never swallowed: a lost write would
    /// corrupt the balance invariant.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// I/O error (config file access etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Environment variable error.
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

/// Convenience `Result` type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
