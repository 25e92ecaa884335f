//! Periodic background sweeps.
//!
//! Two independent long-lived tasks share the persistent store with the
//! request path:
//!
//! * the **notification scheduler** finds time-based trackings whose
//!   remaining days sit exactly on a pending threshold and notifies the
//!   owner, then renews due repeating trackings;
//! * the **mileage-reminder sweep** nudges owners whose active vehicle has
//!   not had an odometer report for their configured reminder period.
//!
//! Each loop sleeps a fixed interval (24 h by default, with a 60 s startup
//! delay) and re-reads the store on every pass. Thresholds are never removed
//! by the sweep - only an explicit acknowledgment or opt-out removes them -
//! so an ignored notification re-fires on the next pass (at-least-once
//! delivery). Delivery is time-bounded per recipient; one unreachable owner
//! cannot stall a pass, and a failed delivery or a row vanishing mid-pass
//! just moves the loop to the next tracking.

use crate::{
    config::settings::Settings,
    core::tracking::{self as tracking_core, Remaining, TrackingSpec},
    entities::{Tracking, TrackingType, User, Vehicle, tracking, vehicle},
    errors::Result,
    notify::Notifier,
};
use chrono::{NaiveDate, Utc};
use sea_orm::{DatabaseConnection, prelude::*};
use std::future::Future;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Counters for one sweep pass, logged at the end of the pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    /// Rows considered by the pass
    pub examined: usize,
    /// Notifications handed to the delivery collaborator
    pub notified: usize,
    /// Repeating trackings renewed
    pub renewed: usize,
    /// Deliveries that failed or timed out
    pub delivery_failures: usize,
}

/// Awaits one delivery with the configured timeout; failures are logged and
/// counted, never escalated.
async fn deliver<F>(stats: &mut SweepStats, settings: &Settings, what: &str, fut: F)
where
    F: Future<Output = Result<()>>,
{
    match tokio::time::timeout(settings.delivery_timeout(), fut).await {
        Ok(Ok(())) => stats.notified += 1,
        Ok(Err(e)) => {
            warn!(error = %e, what, "Delivery failed; continuing sweep");
            stats.delivery_failures += 1;
        }
        Err(_) => {
            warn!(what, "Delivery timed out; continuing sweep");
            stats.delivery_failures += 1;
        }
    }
}

/// One pass of the notification scheduler.
///
/// Phase 1: every configured time-based tracking with a non-empty pending
/// schedule is checked; when its remaining days are an exact member of the
/// pending set, a due notification goes out. The schedule entry stays put -
/// removal happens only through the owner's "thanks"/"stop" interactions -
/// so the same threshold re-fires tomorrow if it goes unacknowledged.
///
/// Phase 2: every repeating interval-anchored tracking at or past its due
/// date is advanced by exactly one interval (anchor + interval, never
/// "today", so cadence never drifts under a delayed sweep), its schedule is
/// restored to the configured set, and a renewal notification goes out.
pub async fn run_notification_sweep<N: Notifier>(
    db: &DatabaseConnection,
    notifier: &N,
    settings: &Settings,
    today: NaiveDate,
) -> Result<SweepStats> {
    let mut stats = SweepStats::default();

    // Phase 1: threshold notifications
    let candidates = Tracking::find()
        .filter(tracking::Column::Kind.eq(TrackingType::TimeBased))
        .filter(tracking::Column::NotificationSchedule.is_not_null())
        .filter(tracking::Column::NotificationSchedule.ne(""))
        .find_also_related(Vehicle)
        .all(db)
        .await?;

    for (row, vehicle) in &candidates {
        stats.examined += 1;
        // Vehicle deleted between query and action: benign race, skip
        let Some(vehicle) = vehicle else { continue };
        let Some(spec) = tracking_core::spec(row) else { continue };
        let TrackingSpec::TimeBased { ref schedule, .. } = spec else {
            continue;
        };
        let Some(Remaining::Days(days_left)) = tracking_core::remaining(&spec, None, today)
        else {
            continue;
        };

        if schedule.contains(days_left) {
            deliver(
                &mut stats,
                settings,
                "time tracking due",
                notifier.notify_time_tracking_due(
                    vehicle.user_id,
                    &vehicle.name,
                    &row.name,
                    days_left,
                    row.id,
                ),
            )
            .await;
        }
    }

    // Phase 2: renew expired repeating trackings
    let repeating = Tracking::find()
        .filter(tracking::Column::Kind.eq(TrackingType::TimeBased))
        .filter(tracking::Column::IsRepeating.eq(true))
        .filter(tracking::Column::IntervalDays.is_not_null())
        .filter(tracking::Column::LastResetDate.is_not_null())
        .find_also_related(Vehicle)
        .all(db)
        .await?;

    for (row, vehicle) in &repeating {
        let Some(vehicle) = vehicle else { continue };
        let Some(spec) = tracking_core::spec(row) else { continue };
        let due = tracking_core::remaining(&spec, None, today).is_some_and(|r| r.is_due());
        if !due {
            continue;
        }

        match tracking_core::advance(db, row).await {
            Ok(renewed) => {
                stats.renewed += 1;
                info!(
                    tracking_id = row.id,
                    next_reset = %renewed.last_reset_date.map(|d| d.to_string()).unwrap_or_default(),
                    "Renewed repeating tracking"
                );
                deliver(
                    &mut stats,
                    settings,
                    "tracking renewed",
                    notifier.notify_tracking_renewed(vehicle.user_id, &vehicle.name, &row.name),
                )
                .await;
            }
            Err(e) => {
                // The row may have been deleted or edited mid-pass
                warn!(tracking_id = row.id, error = %e, "Failed to renew tracking; continuing sweep");
            }
        }
    }

    Ok(stats)
}

/// One pass of the mileage-reminder sweep: vehicles with a known odometer
/// that are their owner's active vehicle and whose last report is at least
/// the owner's reminder period old get a reminder. No tracking state changes
/// here - snoozing just restamps the report date.
pub async fn run_mileage_reminder_sweep<N: Notifier>(
    db: &DatabaseConnection,
    notifier: &N,
    settings: &Settings,
    today: NaiveDate,
) -> Result<SweepStats> {
    let mut stats = SweepStats::default();

    let rows = Vehicle::find()
        .filter(vehicle::Column::Mileage.is_not_null())
        .find_also_related(User)
        .all(db)
        .await?;

    for (vehicle, user) in &rows {
        stats.examined += 1;
        let Some(user) = user else { continue };
        if user.active_vehicle_id != Some(vehicle.id) {
            continue;
        }

        let days_silent = today
            .signed_duration_since(vehicle.last_mileage_update_at)
            .num_days();
        if days_silent >= user.mileage_reminder_period {
            deliver(
                &mut stats,
                settings,
                "mileage reminder",
                notifier.notify_mileage_due(user.id, &vehicle.name, vehicle.id),
            )
            .await;
        }
    }

    Ok(stats)
}

/// Spawns the notification scheduler loop: startup delay, then one
/// [`run_notification_sweep`] per interval until shutdown. A failed pass is
/// logged and retried on the next scheduled interval, never crashes the
/// task.
pub fn spawn_notification_scheduler<N>(
    db: DatabaseConnection,
    notifier: N,
    settings: Settings,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    N: Notifier + 'static,
{
    tokio::spawn(async move {
        info!("Starting scheduled job: notification sweep");
        tokio::select! {
            () = tokio::time::sleep(settings.sweep_startup_delay()) => {}
            _ = shutdown.changed() => return,
        }

        loop {
            let today = Utc::now().date_naive();
            match run_notification_sweep(&db, &notifier, &settings, today).await {
                Ok(stats) => info!(?stats, "Notification sweep finished"),
                Err(e) => error!(error = %e, "Notification sweep failed; retrying next cycle"),
            }

            tokio::select! {
                () = tokio::time::sleep(settings.sweep_interval()) => {}
                _ = shutdown.changed() => {
                    info!("Notification scheduler shutting down");
                    return;
                }
            }
        }
    })
}

/// Spawns the mileage-reminder loop with the same shape as
/// [`spawn_notification_scheduler`].
pub fn spawn_mileage_reminder_sweep<N>(
    db: DatabaseConnection,
    notifier: N,
    settings: Settings,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    N: Notifier + 'static,
{
    tokio::spawn(async move {
        info!("Starting scheduled job: mileage reminder sweep");
        tokio::select! {
            () = tokio::time::sleep(settings.sweep_startup_delay()) => {}
            _ = shutdown.changed() => return,
        }

        loop {
            let today = Utc::now().date_naive();
            match run_mileage_reminder_sweep(&db, &notifier, &settings, today).await {
                Ok(stats) => info!(?stats, "Mileage reminder sweep finished"),
                Err(e) => error!(error = %e, "Mileage reminder sweep failed; retrying next cycle"),
            }

            tokio::select! {
                () = tokio::time::sleep(settings.sweep_interval()) => {}
                _ = shutdown.changed() => {
                    info!("Mileage reminder sweep shutting down");
                    return;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::tracking::ResetAnchor;
    use crate::core::{user as user_core, vehicle as vehicle_core};
    use crate::test_utils::*;
    use sea_orm::Set;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_threshold_notification_fires_without_clearing_schedule() -> Result<()> {
        let (db, user, vehicle) = setup_with_vehicle().await?;
        let settings = test_settings();
        let notifier = RecordingNotifier::default();

        // 30-day tracking anchored at Jan 1; Jan 24 leaves exactly 7 days
        let tracking =
            create_time_tracking(&db, vehicle.id, "Insurance", 30, date(2024, 1, 1), false)
                .await?;

        let stats =
            run_notification_sweep(&db, &notifier, &settings, date(2024, 1, 24)).await?;
        assert_eq!(stats.notified, 1);
        assert_eq!(stats.delivery_failures, 0);

        assert_eq!(
            notifier.events(),
            vec![NotificationEvent::TimeTrackingDue {
                user_id: user.id,
                vehicle_name: vehicle.name.clone(),
                tracking_name: "Insurance".to_string(),
                days_left: 7,
                tracking_id: tracking.id,
            }]
        );

        // Schedule untouched until the owner acknowledges
        let stored = tracking_core::get_tracking(&db, tracking.id).await?.unwrap();
        assert_eq!(stored.notification_schedule.as_deref(), Some("7,3,1"));

        // The unacknowledged threshold re-fires on the next pass
        let stats =
            run_notification_sweep(&db, &notifier, &settings, date(2024, 1, 24)).await?;
        assert_eq!(stats.notified, 1);
        assert_eq!(notifier.events().len(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_no_notification_between_thresholds() -> Result<()> {
        let (db, _user, vehicle) = setup_with_vehicle().await?;
        let settings = test_settings();
        let notifier = RecordingNotifier::default();

        create_time_tracking(&db, vehicle.id, "Insurance", 30, date(2024, 1, 1), false).await?;

        // 10 days left is not a member of {7,3,1}
        let stats =
            run_notification_sweep(&db, &notifier, &settings, date(2024, 1, 21)).await?;
        assert_eq!(stats.notified, 0);
        assert!(notifier.events().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_acknowledged_threshold_stays_silent() -> Result<()> {
        let (db, _user, vehicle) = setup_with_vehicle().await?;
        let settings = test_settings();
        let notifier = RecordingNotifier::default();

        let tracking =
            create_time_tracking(&db, vehicle.id, "Insurance", 30, date(2024, 1, 1), false)
                .await?;
        tracking_core::acknowledge_notification(&db, tracking.id, 7).await?;

        let stats =
            run_notification_sweep(&db, &notifier, &settings, date(2024, 1, 24)).await?;
        assert_eq!(stats.notified, 0);

        // The remaining thresholds still fire later
        let stats =
            run_notification_sweep(&db, &notifier, &settings, date(2024, 1, 28)).await?;
        assert_eq!(stats.notified, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_unconfigured_and_stopped_trackings_never_fire() -> Result<()> {
        let (db, _user, vehicle) = setup_with_vehicle().await?;
        let settings = test_settings();
        let notifier = RecordingNotifier::default();

        // Created empty: has a seeded schedule but no anchor yet
        tracking_core::create_tracking(
            &db,
            vehicle.id,
            "Inspection".to_string(),
            TrackingType::TimeBased,
            tracking_core::TrackingPatch::default(),
        )
        .await?;

        // Configured but opted out
        let stopped =
            create_time_tracking(&db, vehicle.id, "Insurance", 30, date(2024, 1, 1), false)
                .await?;
        tracking_core::stop_notifications(&db, stopped.id).await?;

        let stats =
            run_notification_sweep(&db, &notifier, &settings, date(2024, 1, 24)).await?;
        assert_eq!(stats.notified, 0);
        assert!(notifier.events().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_due_repeating_tracking_renews_with_fixed_cadence() -> Result<()> {
        let (db, user, vehicle) = setup_with_vehicle().await?;
        let settings = test_settings();
        let notifier = RecordingNotifier::default();

        let tracking =
            create_time_tracking(&db, vehicle.id, "Oil change", 30, date(2024, 1, 1), true)
                .await?;
        // Owner opted out during the cycle; renewal must re-arm
        tracking_core::stop_notifications(&db, tracking.id).await?;

        // Sweep runs five days late; the anchor still moves by exactly one
        // interval, not to "today"
        let stats =
            run_notification_sweep(&db, &notifier, &settings, date(2024, 2, 5)).await?;
        assert_eq!(stats.renewed, 1);

        let stored = tracking_core::get_tracking(&db, tracking.id).await?.unwrap();
        assert_eq!(stored.last_reset_date, Some(date(2024, 1, 31)));
        assert_eq!(stored.notification_schedule.as_deref(), Some("7,3,1"));

        assert!(notifier.events().contains(&NotificationEvent::TrackingRenewed {
            user_id: user.id,
            vehicle_name: vehicle.name.clone(),
            tracking_name: "Oil change".to_string(),
        }));

        // Renewed anchor (Jan 31 + 30 = Mar 1) is no longer due on Feb 5
        let stats =
            run_notification_sweep(&db, &notifier, &settings, date(2024, 2, 5)).await?;
        assert_eq!(stats.renewed, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_non_repeating_due_tracking_is_left_alone() -> Result<()> {
        let (db, _user, vehicle) = setup_with_vehicle().await?;
        let settings = test_settings();
        let notifier = RecordingNotifier::default();

        let tracking =
            create_time_tracking(&db, vehicle.id, "Inspection", 30, date(2024, 1, 1), false)
                .await?;

        let stats =
            run_notification_sweep(&db, &notifier, &settings, date(2024, 3, 1)).await?;
        assert_eq!(stats.renewed, 0);

        // Still due, still anchored where it was; a manual restart is the
        // only way forward
        let stored = tracking_core::get_tracking(&db, tracking.id).await?.unwrap();
        assert_eq!(stored.last_reset_date, Some(date(2024, 1, 1)));

        tracking_core::reset_tracking(&db, tracking.id, ResetAnchor::Date(date(2024, 3, 1)))
            .await?;
        let restarted = tracking_core::get_tracking(&db, tracking.id).await?.unwrap();
        assert_eq!(restarted.last_reset_date, Some(date(2024, 3, 1)));

        Ok(())
    }

    #[tokio::test]
    async fn test_delivery_failure_does_not_abort_pass() -> Result<()> {
        let (db, _user, vehicle) = setup_with_vehicle().await?;
        let settings = test_settings();
        let notifier = FailingNotifier;

        // Two trackings both at a threshold on the same day
        create_time_tracking(&db, vehicle.id, "Insurance", 30, date(2024, 1, 1), false).await?;
        create_time_tracking(&db, vehicle.id, "Inspection", 30, date(2024, 1, 1), false).await?;

        let stats =
            run_notification_sweep(&db, &notifier, &settings, date(2024, 1, 24)).await?;
        // Both deliveries were attempted despite the first failing
        assert_eq!(stats.delivery_failures, 2);
        assert_eq!(stats.notified, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_mileage_reminder_matches_period() -> Result<()> {
        let (db, user, vehicle) = setup_with_vehicle().await?;
        let settings = test_settings();
        let notifier = RecordingNotifier::default();
        user_core::set_active_vehicle(&db, user.id, vehicle.id).await?;
        user_core::set_mileage_reminder_period(&db, user.id, 3).await?;

        // Known odometer, last reported Mar 8
        let mut active: crate::entities::vehicle::ActiveModel = vehicle.clone().into();
        active.mileage = Set(Some(10_000));
        active.last_mileage_update_at = Set(date(2024, 3, 8));
        active.update(&db).await?;

        // Two days of silence: below the 3-day period
        let stats =
            run_mileage_reminder_sweep(&db, &notifier, &settings, date(2024, 3, 10)).await?;
        assert_eq!(stats.notified, 0);

        // Three days: reminder fires
        let stats =
            run_mileage_reminder_sweep(&db, &notifier, &settings, date(2024, 3, 11)).await?;
        assert_eq!(stats.notified, 1);
        assert_eq!(
            notifier.events(),
            vec![NotificationEvent::MileageDue {
                user_id: user.id,
                vehicle_name: vehicle.name.clone(),
                vehicle_id: vehicle.id,
            }]
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_mileage_reminder_skips_inactive_and_unknown_odometer() -> Result<()> {
        let (db, user, first) = setup_with_vehicle().await?;
        let settings = test_settings();
        let notifier = RecordingNotifier::default();

        // Second vehicle is active but has no odometer yet
        let second = vehicle_core::add_vehicle(&db, user.id, "Octavia".to_string(), None).await?;
        user_core::set_active_vehicle(&db, user.id, second.id).await?;

        // First vehicle has an odometer and is long silent, but is not active
        let mut active: crate::entities::vehicle::ActiveModel = first.into();
        active.mileage = Set(Some(10_000));
        active.last_mileage_update_at = Set(date(2024, 1, 1));
        active.update(&db).await?;

        let stats =
            run_mileage_reminder_sweep(&db, &notifier, &settings, date(2024, 3, 1)).await?;
        assert_eq!(stats.notified, 0);
        assert!(notifier.events().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_snooze_delays_next_match() -> Result<()> {
        let (db, user, vehicle) = setup_with_vehicle().await?;
        let settings = test_settings();
        let notifier = RecordingNotifier::default();
        user_core::set_active_vehicle(&db, user.id, vehicle.id).await?;

        let mut active: crate::entities::vehicle::ActiveModel = vehicle.clone().into();
        active.mileage = Set(Some(10_000));
        active.last_mileage_update_at = Set(date(2024, 3, 1));
        active.update(&db).await?;

        // Snooze restamps the report date to today without an odometer change
        vehicle_core::snooze_mileage_update(&db, vehicle.id).await?;
        let stored = vehicle_core::get_vehicle(&db, vehicle.id).await?.unwrap();
        assert_eq!(stored.mileage, Some(10_000));
        assert_eq!(stored.last_mileage_update_at, Utc::now().date_naive());

        // A sweep dated before the restamp finds nothing due
        let stats = run_mileage_reminder_sweep(
            &db,
            &notifier,
            &settings,
            Utc::now().date_naive(),
        )
        .await?;
        assert_eq!(stats.notified, 0);

        Ok(())
    }
}
