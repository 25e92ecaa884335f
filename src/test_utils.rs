//! Shared test utilities for `GarageBuddy`.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults, plus recording and
//! failing [`Notifier`] implementations for sweep tests.

use crate::{
    config::settings::Settings,
    core::{tracking as tracking_core, user as user_core, vehicle as vehicle_core},
    entities::{self, TrackingType},
    errors::{Error, Result},
    notify::Notifier,
};
use chrono::NaiveDate;
use sea_orm::DatabaseConnection;
use std::future::Future;
use std::sync::{Arc, Mutex};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Engine settings used across tests: a 1000 km/day allowance rate and
/// 10 km per nut, matching the canonical reward examples.
#[must_use]
pub fn test_settings() -> Settings {
    Settings {
        daily_allowance_km: 1000,
        km_per_point: 10,
        ..Settings::default()
    }
}

/// Registers a test user with the given id and no referrer.
pub async fn create_test_user(db: &DatabaseConnection, id: i64) -> Result<entities::user::Model> {
    user_core::register_user(
        db,
        &test_settings(),
        id,
        Some(format!("user{id}")),
        Some(format!("User {id}")),
        None,
        None,
    )
    .await
}

/// Adds a vehicle with an unknown odometer for the given user.
pub async fn create_test_vehicle(
    db: &DatabaseConnection,
    user_id: i64,
    name: &str,
) -> Result<entities::vehicle::Model> {
    vehicle_core::add_vehicle(db, user_id, name.to_string(), None).await
}

/// Creates a fully-configured mileage-interval tracking.
pub async fn create_mileage_tracking(
    db: &DatabaseConnection,
    vehicle_id: i64,
    name: &str,
    interval_km: i64,
    last_reset_mileage: i64,
) -> Result<entities::tracking::Model> {
    tracking_core::create_tracking(
        db,
        vehicle_id,
        name.to_string(),
        TrackingType::MileageInterval,
        tracking_core::TrackingPatch {
            interval_km: Some(interval_km),
            last_reset_mileage: Some(last_reset_mileage),
            ..Default::default()
        },
    )
    .await
}

/// Creates a fully-configured time-based tracking with the standard
/// notification schedule.
pub async fn create_time_tracking(
    db: &DatabaseConnection,
    vehicle_id: i64,
    name: &str,
    interval_days: i64,
    last_reset_date: NaiveDate,
    is_repeating: bool,
) -> Result<entities::tracking::Model> {
    tracking_core::create_tracking(
        db,
        vehicle_id,
        name.to_string(),
        TrackingType::TimeBased,
        tracking_core::TrackingPatch {
            interval_days: Some(interval_days),
            last_reset_date: Some(last_reset_date),
            is_repeating: Some(is_repeating),
            ..Default::default()
        },
    )
    .await
}

/// Sets up a complete test environment with a registered user and one
/// vehicle. Returns (db, user, vehicle) for common test scenarios.
pub async fn setup_with_vehicle() -> Result<(
    DatabaseConnection,
    entities::user::Model,
    entities::vehicle::Model,
)> {
    let db = setup_test_db().await?;
    let user = create_test_user(&db, 1).await?;
    let vehicle = create_test_vehicle(&db, user.id, "Civic").await?;
    Ok((db, user, vehicle))
}

/// One outbound request captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    /// Captured `notify_mileage_due` call
    MileageDue {
        /// Recipient
        user_id: i64,
        /// Vehicle display name
        vehicle_name: String,
        /// Vehicle id
        vehicle_id: i64,
    },
    /// Captured `notify_time_tracking_due` call
    TimeTrackingDue {
        /// Recipient
        user_id: i64,
        /// Vehicle display name
        vehicle_name: String,
        /// Tracking display name
        tracking_name: String,
        /// Threshold that fired
        days_left: i64,
        /// Tracking id
        tracking_id: i64,
    },
    /// Captured `notify_tracking_renewed` call
    TrackingRenewed {
        /// Recipient
        user_id: i64,
        /// Vehicle display name
        vehicle_name: String,
        /// Tracking display name
        tracking_name: String,
    },
}

/// Notifier that records every request for assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<NotificationEvent>>>,
}

impl RecordingNotifier {
    /// Everything delivered so far, in order.
    #[must_use]
    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }

    fn push(&self, event: NotificationEvent) {
        self.events.lock().expect("notifier mutex poisoned").push(event);
    }
}

impl Notifier for RecordingNotifier {
    fn notify_mileage_due(
        &self,
        user_id: i64,
        vehicle_name: &str,
        vehicle_id: i64,
    ) -> impl Future<Output = Result<()>> + Send {
        self.push(NotificationEvent::MileageDue {
            user_id,
            vehicle_name: vehicle_name.to_string(),
            vehicle_id,
        });
        std::future::ready(Ok(()))
    }

    fn notify_time_tracking_due(
        &self,
        user_id: i64,
        vehicle_name: &str,
        tracking_name: &str,
        days_left: i64,
        tracking_id: i64,
    ) -> impl Future<Output = Result<()>> + Send {
        self.push(NotificationEvent::TimeTrackingDue {
            user_id,
            vehicle_name: vehicle_name.to_string(),
            tracking_name: tracking_name.to_string(),
            days_left,
            tracking_id,
        });
        std::future::ready(Ok(()))
    }

    fn notify_tracking_renewed(
        &self,
        user_id: i64,
        vehicle_name: &str,
        tracking_name: &str,
    ) -> impl Future<Output = Result<()>> + Send {
        self.push(NotificationEvent::TrackingRenewed {
            user_id,
            vehicle_name: vehicle_name.to_string(),
            tracking_name: tracking_name.to_string(),
        });
        std::future::ready(Ok(()))
    }
}

/// Notifier whose every delivery fails, for failure-isolation tests.
#[derive(Debug, Clone, Copy)]
pub struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn notify_mileage_due(
        &self,
        _user_id: i64,
        _vehicle_name: &str,
        _vehicle_id: i64,
    ) -> impl Future<Output = Result<()>> + Send {
        std::future::ready(Err(Error::Delivery {
            message: "recipient unreachable".to_string(),
        }))
    }

    fn notify_time_tracking_due(
        &self,
        _user_id: i64,
        _vehicle_name: &str,
        _tracking_name: &str,
        _days_left: i64,
        _tracking_id: i64,
    ) -> impl Future<Output = Result<()>> + Send {
        std::future::ready(Err(Error::Delivery {
            message: "recipient unreachable".to_string(),
        }))
    }

    fn notify_tracking_renewed(
        &self,
        _user_id: i64,
        _vehicle_name: &str,
        _tracking_name: &str,
    ) -> impl Future<Output = Result<()>> + Send {
        std::future::ready(Err(Error::Delivery {
            message: "recipient unreachable".to_string(),
        }))
    }
}
