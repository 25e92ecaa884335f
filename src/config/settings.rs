//! Engine settings loading from config.toml
//!
//! Tunables for the reward engine and the background sweeps: the daily
//! allowance accrual rate, the km-per-nut conversion, one-time reward
//! amounts, and sweep timing. Every field has a default so the engine runs
//! with no configuration file present; an optional `config.toml` overrides
//! them per deployment.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// One-time reward amounts, in nuts.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Rewards {
    /// Paid once when a vehicle profile is fully filled in
    pub fill_profile: i64,
    /// Paid once per referred user to the referrer
    pub referral: i64,
    /// Paid once when the user adds their first vehicle
    pub first_vehicle: i64,
    /// Paid once when the user creates their first tracking
    pub first_tracking: i64,
}

impl Default for Rewards {
    fn default() -> Self {
        Self {
            fill_profile: 500,
            referral: 300,
            first_vehicle: 100,
            first_tracking: 100,
        }
    }
}

/// Engine settings, shared by the request path and the background sweeps.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Settings {
    /// Rewardable kilometres accrued per elapsed calendar day
    pub daily_allowance_km: i64,
    /// Kilometres of rewardable distance per nut awarded
    pub km_per_point: i64,
    /// Default days between mileage reminders for new users
    pub default_reminder_period_days: i64,
    /// Delay before the first sweep pass after startup
    pub sweep_startup_delay_secs: u64,
    /// Interval between sweep passes
    pub sweep_interval_secs: u64,
    /// Upper bound on a single outbound delivery call
    pub delivery_timeout_secs: u64,
    /// One-time reward amounts
    pub rewards: Rewards,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            daily_allowance_km: 100,
            km_per_point: 10,
            default_reminder_period_days: 1,
            sweep_startup_delay_secs: 60,
            sweep_interval_secs: 86_400,
            delivery_timeout_secs: 10,
            rewards: Rewards::default(),
        }
    }
}

impl Settings {
    /// Delay before the first sweep pass, as a [`Duration`].
    #[must_use]
    pub const fn sweep_startup_delay(&self) -> Duration {
        Duration::from_secs(self.sweep_startup_delay_secs)
    }

    /// Interval between sweep passes, as a [`Duration`].
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Per-delivery timeout, as a [`Duration`].
    #[must_use]
    pub const fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }
}

/// Loads engine settings from a TOML file.
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML is invalid.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads settings from the default location (./config.toml), falling back to
/// defaults when the file does not exist.
pub fn load_default_settings() -> Result<Settings> {
    if Path::new("config.toml").exists() {
        load_settings("config.toml")
    } else {
        Ok(Settings::default())
    }
}
