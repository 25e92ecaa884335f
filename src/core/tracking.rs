//! Tracking business logic - maintenance obligations attached to a vehicle.
//!
//! The database row is polymorphic (kind discriminator plus nullable
//! kind-specific columns); this module converts rows into the [`TrackingSpec`]
//! sum type so that configuration-completeness and remaining-value logic are
//! exhaustive matches over the active kind, and a field belonging to another
//! kind can never be read by accident. Remaining values are recomputed on
//! every read - nothing derived is persisted.
//!
//! All date arithmetic is calendar-day subtraction; time of day never enters
//! the computation.

use crate::{
    core::schedule::NotificationSchedule,
    entities::{Tracking, Vehicle, tracking, tracking::TrackingType},
    errors::{Error, Result},
};
use chrono::{Duration, NaiveDate};
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::debug;

/// What anchors a time-based tracking's due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeAnchor {
    /// Recurring cycle: due `interval_days` after the last reset
    Interval {
        /// Length of one cycle in days
        interval_days: i64,
        /// Anchor date of the current cycle
        last_reset_date: NaiveDate,
    },
    /// One fixed calendar due date
    TargetDate(NaiveDate),
}

impl TimeAnchor {
    /// The calendar date this anchor comes due.
    #[must_use]
    pub fn due_date(&self) -> NaiveDate {
        match *self {
            Self::Interval {
                interval_days,
                last_reset_date,
            } => last_reset_date + Duration::days(interval_days),
            Self::TargetDate(date) => date,
        }
    }
}

/// A fully-configured tracking, one variant per kind, carrying only the
/// fields that apply to that kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingSpec {
    /// Recurs every `interval_km` kilometres
    MileageInterval {
        /// Recurrence interval in km
        interval_km: i64,
        /// Odometer value at the last reset
        last_reset_mileage: i64,
    },
    /// Fires once at a specific odometer value
    ExactMileage {
        /// Odometer value at which the tracking is due
        target_mileage: i64,
    },
    /// Recurring or one-shot by calendar duration
    TimeBased {
        /// What anchors the due date
        anchor: TimeAnchor,
        /// Whether the tracking renews itself when due
        is_repeating: bool,
        /// Pending notification thresholds
        schedule: NotificationSchedule,
    },
}

/// Remaining distance or time until a tracking is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remaining {
    /// Kilometres left; may be negative for an overshot exact-mileage target
    Kilometers(i64),
    /// Whole calendar days left, floored at zero
    Days(i64),
}

impl Remaining {
    /// A tracking is due once its remaining value reaches zero or below.
    #[must_use]
    pub const fn is_due(&self) -> bool {
        match *self {
            Self::Kilometers(v) | Self::Days(v) => v <= 0,
        }
    }
}

/// Partial update for a tracking. Only provided fields mutate; fields that do
/// not apply to the tracking's kind are ignored, never misapplied.
#[derive(Debug, Default, Clone)]
pub struct TrackingPatch {
    /// New display name
    pub name: Option<String>,
    /// MileageInterval: recurrence interval in km
    pub interval_km: Option<i64>,
    /// MileageInterval: odometer value at the last reset
    pub last_reset_mileage: Option<i64>,
    /// TimeBased: recurrence interval in days
    pub interval_days: Option<i64>,
    /// TimeBased: anchor date of the current cycle
    pub last_reset_date: Option<NaiveDate>,
    /// ExactMileage: odometer value at which the tracking fires
    pub target_mileage: Option<i64>,
    /// TimeBased: fixed due date
    pub target_date: Option<NaiveDate>,
    /// TimeBased: whether the tracking renews itself
    pub is_repeating: Option<bool>,
    /// TimeBased: replacement threshold set (updates template and pending)
    pub notification_schedule: Option<NotificationSchedule>,
}

impl TrackingPatch {
    /// True when the patch carries no fields at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.interval_km.is_none()
            && self.last_reset_mileage.is_none()
            && self.interval_days.is_none()
            && self.last_reset_date.is_none()
            && self.target_mileage.is_none()
            && self.target_date.is_none()
            && self.is_repeating.is_none()
            && self.notification_schedule.is_none()
    }
}

/// Anchor value for a manual restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetAnchor {
    /// New reset odometer value for a mileage-interval tracking
    Mileage(i64),
    /// New cycle anchor date for a time-based tracking
    Date(NaiveDate),
}

/// Converts a row into its typed spec, or `None` when the kind-specific
/// required fields are not all present ("unconfigured"). An unconfigured
/// tracking never fires and never matches scheduler queries.
#[must_use]
pub fn spec(model: &tracking::Model) -> Option<TrackingSpec> {
    match model.kind {
        TrackingType::MileageInterval => match (model.interval_km, model.last_reset_mileage) {
            (Some(interval_km), Some(last_reset_mileage)) => Some(TrackingSpec::MileageInterval {
                interval_km,
                last_reset_mileage,
            }),
            _ => None,
        },
        TrackingType::ExactMileage => {
            model
                .target_mileage
                .map(|target_mileage| TrackingSpec::ExactMileage { target_mileage })
        }
        TrackingType::TimeBased => {
            let anchor = match (model.interval_days, model.last_reset_date, model.target_date) {
                (Some(interval_days), Some(last_reset_date), _) => TimeAnchor::Interval {
                    interval_days,
                    last_reset_date,
                },
                (_, _, Some(target_date)) => TimeAnchor::TargetDate(target_date),
                _ => return None,
            };
            Some(TrackingSpec::TimeBased {
                anchor,
                is_repeating: model.is_repeating,
                schedule: pending_schedule(model),
            })
        }
    }
}

/// The pending notification thresholds of a row. A corrupt column value is
/// treated as an empty set rather than poisoning the whole tracking.
#[must_use]
pub fn pending_schedule(model: &tracking::Model) -> NotificationSchedule {
    model
        .notification_schedule
        .as_deref()
        .map(|raw| NotificationSchedule::parse(raw).unwrap_or_else(|_| NotificationSchedule::empty()))
        .unwrap_or_default()
}

/// The configured full threshold set restored on repeat renewal.
#[must_use]
pub fn template_schedule(model: &tracking::Model) -> NotificationSchedule {
    model
        .schedule_template
        .as_deref()
        .map(|raw| NotificationSchedule::parse(raw).unwrap_or_else(|_| NotificationSchedule::empty()))
        .unwrap_or_else(NotificationSchedule::standard)
}

/// Remaining distance/time until due.
///
/// * `MileageInterval`: `max(0, last_reset_mileage + interval_km - odometer)`
/// * `ExactMileage`: `target_mileage - odometer` (signed)
/// * `TimeBased`: calendar days from `today` to the due date, floored at 0
///
/// Returns `None` for mileage kinds when the vehicle's odometer is unknown.
#[must_use]
pub fn remaining(spec: &TrackingSpec, odometer: Option<i64>, today: NaiveDate) -> Option<Remaining> {
    match *spec {
        TrackingSpec::MileageInterval {
            interval_km,
            last_reset_mileage,
        } => odometer.map(|odo| Remaining::Kilometers((last_reset_mileage + interval_km - odo).max(0))),
        TrackingSpec::ExactMileage { target_mileage } => {
            odometer.map(|odo| Remaining::Kilometers(target_mileage - odo))
        }
        TrackingSpec::TimeBased { anchor, .. } => {
            let days = anchor.due_date().signed_duration_since(today).num_days();
            Some(Remaining::Days(days.max(0)))
        }
    }
}

/// Fraction of the current cycle already consumed, in `[0, 1]`. Used for UI
/// progress bars; callers outside the core only consume this value.
#[must_use]
pub fn progress_fraction(spec: &TrackingSpec, odometer: Option<i64>, today: NaiveDate) -> f64 {
    let fraction = match *spec {
        TrackingSpec::MileageInterval {
            interval_km,
            last_reset_mileage,
        } => {
            if interval_km <= 0 {
                return 0.0;
            }
            let consumed = odometer.map_or(0, |odo| odo - last_reset_mileage);
            consumed as f64 / interval_km as f64
        }
        TrackingSpec::ExactMileage { target_mileage } => {
            if target_mileage <= 0 {
                return 0.0;
            }
            odometer.map_or(0.0, |odo| odo as f64 / target_mileage as f64)
        }
        TrackingSpec::TimeBased { anchor, .. } => match anchor {
            TimeAnchor::Interval {
                interval_days,
                last_reset_date,
            } => {
                if interval_days <= 0 {
                    return 0.0;
                }
                let consumed = today.signed_duration_since(last_reset_date).num_days();
                consumed as f64 / interval_days as f64
            }
            // A fixed date has no start anchor to measure from
            TimeAnchor::TargetDate(date) => {
                if today >= date {
                    1.0
                } else {
                    0.0
                }
            }
        },
    };
    fraction.clamp(0.0, 1.0)
}

/// Creates a tracking on a vehicle, empty or partially filled.
///
/// The conversational layer collects parameters incrementally, so every
/// kind-specific field may be absent at creation; the tracking stays
/// unconfigured (and silent) until the required fields arrive via
/// [`patch_tracking`]. Time-based trackings are seeded with the standard
/// notification schedule unless the patch provides one.
pub async fn create_tracking(
    db: &DatabaseConnection,
    vehicle_id: i64,
    name: String,
    kind: TrackingType,
    fields: TrackingPatch,
) -> Result<tracking::Model> {
    if name.trim().is_empty() {
        return Err(Error::Validation {
            message: "Tracking name cannot be empty".to_string(),
        });
    }
    validate_patch(&fields)?;

    Vehicle::find_by_id(vehicle_id)
        .one(db)
        .await?
        .ok_or(Error::VehicleNotFound { id: vehicle_id })?;

    let mut model = tracking::ActiveModel {
        vehicle_id: Set(vehicle_id),
        name: Set(name.trim().to_string()),
        kind: Set(kind),
        is_repeating: Set(false),
        ..Default::default()
    };
    apply_patch(&mut model, kind, &fields);

    if kind == TrackingType::TimeBased {
        let schedule = fields
            .notification_schedule
            .unwrap_or_else(NotificationSchedule::standard);
        model.notification_schedule = Set(Some(schedule.to_string()));
        model.schedule_template = Set(Some(schedule.to_string()));
    }

    let result = model.insert(db).await?;
    Ok(result)
}

/// Fetches a tracking by id.
pub async fn get_tracking(db: &DatabaseConnection, id: i64) -> Result<Option<tracking::Model>> {
    Tracking::find_by_id(id).one(db).await.map_err(Into::into)
}

/// All trackings of a vehicle, in creation order. Unconfigured and due
/// trackings are included - the summary view shows them too.
pub async fn get_trackings_for_vehicle(
    db: &DatabaseConnection,
    vehicle_id: i64,
) -> Result<Vec<tracking::Model>> {
    Tracking::find()
        .filter(tracking::Column::VehicleId.eq(vehicle_id))
        .order_by_asc(tracking::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Applies a partial update. Fields the row's kind does not carry are ignored
/// (PATCH semantics); present-but-invalid values are rejected before any
/// mutation.
pub async fn patch_tracking(
    db: &DatabaseConnection,
    id: i64,
    fields: TrackingPatch,
) -> Result<tracking::Model> {
    validate_patch(&fields)?;

    let model = Tracking::find_by_id(id)
        .one(db)
        .await?
        .ok_or(Error::TrackingNotFound { id })?;
    if fields.is_empty() {
        return Ok(model);
    }
    let kind = model.kind;

    let mut active: tracking::ActiveModel = model.clone().into();
    if let Some(name) = &fields.name {
        active.name = Set(name.trim().to_string());
    }
    apply_patch(&mut active, kind, &fields);

    if kind == TrackingType::TimeBased
        && let Some(schedule) = &fields.notification_schedule
    {
        // A reconfigured threshold set re-arms pending notifications too
        active.notification_schedule = Set(Some(schedule.to_string()));
        active.schedule_template = Set(Some(schedule.to_string()));
    }

    // Every provided field may have been inapplicable to this kind
    if !active.is_changed() {
        return Ok(model);
    }

    active.update(db).await.map_err(Into::into)
}

/// Deletes a tracking. There are no separately owned child entities.
pub async fn delete_tracking(db: &DatabaseConnection, id: i64) -> Result<()> {
    let model = Tracking::find_by_id(id)
        .one(db)
        .await?
        .ok_or(Error::TrackingNotFound { id })?;
    model.delete(db).await?;
    Ok(())
}

/// Manually restarts a tracking from the given anchor.
///
/// Mileage-interval trackings restart from an odometer value (usually the
/// current reading); time-based trackings restart from a date. The pending
/// notification schedule is left untouched - it only refills on repeat
/// renewal. An exact-mileage tracking has no cycle to restart.
pub async fn reset_tracking(
    db: &DatabaseConnection,
    id: i64,
    anchor: ResetAnchor,
) -> Result<tracking::Model> {
    let model = Tracking::find_by_id(id)
        .one(db)
        .await?
        .ok_or(Error::TrackingNotFound { id })?;

    let mut active: tracking::ActiveModel = model.clone().into();
    match (model.kind, anchor) {
        (TrackingType::MileageInterval, ResetAnchor::Mileage(value)) => {
            if value < 0 {
                return Err(Error::Validation {
                    message: format!("Reset mileage cannot be negative, got {value}"),
                });
            }
            active.last_reset_mileage = Set(Some(value));
        }
        (TrackingType::TimeBased, ResetAnchor::Date(date)) => {
            active.last_reset_date = Set(Some(date));
        }
        _ => {
            return Err(Error::Validation {
                message: format!(
                    "Reset anchor {anchor:?} does not apply to a {:?} tracking",
                    model.kind
                ),
            });
        }
    }

    active.update(db).await.map_err(Into::into)
}

/// Renews a due repeating time-based tracking: shifts the anchor forward by
/// exactly one interval (never to "today", so cadence does not drift under a
/// delayed sweep) and restores the full configured notification schedule.
pub async fn advance(db: &DatabaseConnection, model: &tracking::Model) -> Result<tracking::Model> {
    let (Some(interval_days), Some(last_reset_date)) = (model.interval_days, model.last_reset_date)
    else {
        return Err(Error::Validation {
            message: format!("Tracking {} has no interval cycle to advance", model.id),
        });
    };
    if !model.is_repeating {
        return Err(Error::Validation {
            message: format!("Tracking {} is not repeating", model.id),
        });
    }

    let template = template_schedule(model);
    let mut active: tracking::ActiveModel = model.clone().into();
    active.last_reset_date = Set(Some(last_reset_date + Duration::days(interval_days)));
    active.notification_schedule = Set(Some(template.to_string()));
    active.update(db).await.map_err(Into::into)
}

/// Flips the repeat flag of a time-based tracking; returns the new state.
pub async fn toggle_repeat(db: &DatabaseConnection, id: i64) -> Result<bool> {
    let model = Tracking::find_by_id(id)
        .one(db)
        .await?
        .ok_or(Error::TrackingNotFound { id })?;
    if model.kind != TrackingType::TimeBased {
        return Err(Error::Validation {
            message: format!("Tracking {id} is not time-based"),
        });
    }

    let new_state = !model.is_repeating;
    let mut active: tracking::ActiveModel = model.into();
    active.is_repeating = Set(new_state);
    active.update(db).await?;
    Ok(new_state)
}

/// Acknowledges one fired threshold ("thanks"), removing it from the pending
/// set so the next sweep no longer re-notifies it.
pub async fn acknowledge_notification(db: &DatabaseConnection, id: i64, day: i64) -> Result<()> {
    let model = Tracking::find_by_id(id)
        .one(db)
        .await?
        .ok_or(Error::TrackingNotFound { id })?;

    let mut schedule = pending_schedule(&model);
    if !schedule.remove(day) {
        debug!(tracking_id = id, day, "Acknowledged threshold was not pending");
        return Ok(());
    }

    let mut active: tracking::ActiveModel = model.into();
    active.notification_schedule = Set(Some(schedule.to_string()));
    active.update(db).await?;
    Ok(())
}

/// Opts out of all further notifications for this cycle ("stop"): empties the
/// pending set. A later repeat renewal restores the configured schedule.
pub async fn stop_notifications(db: &DatabaseConnection, id: i64) -> Result<()> {
    let model = Tracking::find_by_id(id)
        .one(db)
        .await?
        .ok_or(Error::TrackingNotFound { id })?;

    let mut active: tracking::ActiveModel = model.into();
    active.notification_schedule = Set(Some(NotificationSchedule::empty().to_string()));
    active.update(db).await?;
    Ok(())
}

/// Rejects present-but-invalid patch values. Runs before any mutation so a
/// failed patch leaves no state behind.
fn validate_patch(fields: &TrackingPatch) -> Result<()> {
    if let Some(name) = &fields.name
        && name.trim().is_empty()
    {
        return Err(Error::Validation {
            message: "Tracking name cannot be empty".to_string(),
        });
    }
    for (label, value) in [
        ("interval_km", fields.interval_km),
        ("interval_days", fields.interval_days),
        ("target_mileage", fields.target_mileage),
    ] {
        if let Some(v) = value
            && v <= 0
        {
            return Err(Error::Validation {
                message: format!("{label} must be positive, got {v}"),
            });
        }
    }
    if let Some(v) = fields.last_reset_mileage
        && v < 0
    {
        return Err(Error::Validation {
            message: format!("last_reset_mileage cannot be negative, got {v}"),
        });
    }
    Ok(())
}

/// Copies the patch fields that apply to `kind` into the active model and
/// logs the ones that don't. The schedule columns are handled by the callers
/// because creation and patching treat them differently.
fn apply_patch(active: &mut tracking::ActiveModel, kind: TrackingType, fields: &TrackingPatch) {
    let mut ignored: Vec<&str> = Vec::new();

    match kind {
        TrackingType::MileageInterval => {
            if let Some(v) = fields.interval_km {
                active.interval_km = Set(Some(v));
            }
            if let Some(v) = fields.last_reset_mileage {
                active.last_reset_mileage = Set(Some(v));
            }
            for (label, present) in [
                ("interval_days", fields.interval_days.is_some()),
                ("last_reset_date", fields.last_reset_date.is_some()),
                ("target_mileage", fields.target_mileage.is_some()),
                ("target_date", fields.target_date.is_some()),
                ("is_repeating", fields.is_repeating.is_some()),
                (
                    "notification_schedule",
                    fields.notification_schedule.is_some(),
                ),
            ] {
                if present {
                    ignored.push(label);
                }
            }
        }
        TrackingType::ExactMileage => {
            if let Some(v) = fields.target_mileage {
                active.target_mileage = Set(Some(v));
            }
            for (label, present) in [
                ("interval_km", fields.interval_km.is_some()),
                ("last_reset_mileage", fields.last_reset_mileage.is_some()),
                ("interval_days", fields.interval_days.is_some()),
                ("last_reset_date", fields.last_reset_date.is_some()),
                ("target_date", fields.target_date.is_some()),
                ("is_repeating", fields.is_repeating.is_some()),
                (
                    "notification_schedule",
                    fields.notification_schedule.is_some(),
                ),
            ] {
                if present {
                    ignored.push(label);
                }
            }
        }
        TrackingType::TimeBased => {
            if let Some(v) = fields.interval_days {
                active.interval_days = Set(Some(v));
            }
            if let Some(v) = fields.last_reset_date {
                active.last_reset_date = Set(Some(v));
            }
            if let Some(v) = fields.target_date {
                active.target_date = Set(Some(v));
            }
            if let Some(v) = fields.is_repeating {
                active.is_repeating = Set(v);
            }
            for (label, present) in [
                ("interval_km", fields.interval_km.is_some()),
                ("last_reset_mileage", fields.last_reset_mileage.is_some()),
                ("target_mileage", fields.target_mileage.is_some()),
            ] {
                if present {
                    ignored.push(label);
                }
            }
        }
    }

    if !ignored.is_empty() {
        debug!(?kind, ?ignored, "Ignoring patch fields not applicable to kind");
    }
}
