//! Outbound notification contract.
//!
//! The engine never formats chat messages or talks to a messaging platform;
//! it emits notification requests through the [`Notifier`] trait and the
//! delivery collaborator (a Telegram/Discord front-end, in production) does
//! the rest. Requests are fire-and-forget: a delivery failure is logged by
//! the calling sweep and never retried synchronously - an unacknowledged
//! threshold simply re-fires on the next sweep.
//!
//! Each method returns a `Send` future so sweeps can run inside spawned
//! tasks and wrap every call in a delivery timeout.

use crate::errors::Result;
use std::future::Future;
use tracing::info;

/// Delivery collaborator for the background sweeps.
pub trait Notifier: Send + Sync {
    /// The owner's active vehicle wants a fresh odometer reading.
    fn notify_mileage_due(
        &self,
        user_id: i64,
        vehicle_name: &str,
        vehicle_id: i64,
    ) -> impl Future<Output = Result<()>> + Send;

    /// A time-based tracking crossed one of its notification thresholds.
    fn notify_time_tracking_due(
        &self,
        user_id: i64,
        vehicle_name: &str,
        tracking_name: &str,
        days_left: i64,
        tracking_id: i64,
    ) -> impl Future<Output = Result<()>> + Send;

    /// A repeating tracking came due and was renewed for the next cycle.
    fn notify_tracking_renewed(
        &self,
        user_id: i64,
        vehicle_name: &str,
        tracking_name: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Tracing-backed delivery used when no chat front-end is attached (local
/// runs, smoke tests). Every request is logged and reported as delivered.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_mileage_due(
        &self,
        user_id: i64,
        vehicle_name: &str,
        vehicle_id: i64,
    ) -> impl Future<Output = Result<()>> + Send {
        info!(user_id, vehicle_name, vehicle_id, "Mileage update reminder");
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
        info!(
            user_id,
            vehicle_name, tracking_name, days_left, tracking_id, "Tracking due soon"
        );
        std::future::ready(Ok(()))
    }

    fn notify_tracking_renewed(
        &self,
        user_id: i64,
        vehicle_name: &str,
        tracking_name: &str,
    ) -> impl Future<Output = Result<()>> + Send {
        info!(user_id, vehicle_name, tracking_name, "Tracking renewed");
        std::future::ready(Ok(()))
    }
}
