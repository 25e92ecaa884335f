//! Notification schedule value type.
//!
//! A time-based tracking notifies its owner when the remaining days hit one
//! of a configured set of thresholds (e.g. 7, 3 and 1 days before due). The
//! pending set only ever shrinks - a threshold is removed when the owner
//! acknowledges the notification or opts out - until a repeat renewal
//! restores the configured full set. The database column stores the set in
//! the compact `"7,3,1"` form.

use crate::errors::{Error, Result};
use std::collections::BTreeSet;
use std::fmt;

/// Default thresholds seeded into new time-based trackings.
pub const DEFAULT_THRESHOLDS: [i64; 3] = [7, 3, 1];

/// An ordered set of distinct positive day-thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NotificationSchedule(BTreeSet<i64>);

impl NotificationSchedule {
    /// The default schedule: notify 7, 3 and 1 days before due.
    #[must_use]
    pub fn standard() -> Self {
        Self(DEFAULT_THRESHOLDS.into_iter().collect())
    }

    /// An empty schedule (notifications stopped).
    #[must_use]
    pub fn empty() -> Self {
        Self(BTreeSet::new())
    }

    /// Builds a schedule from arbitrary thresholds, dropping duplicates.
    ///
    /// # Errors
    /// Returns a validation error if any threshold is not positive.
    pub fn from_thresholds<I: IntoIterator<Item = i64>>(thresholds: I) -> Result<Self> {
        let mut set = BTreeSet::new();
        for day in thresholds {
            if day <= 0 {
                return Err(Error::Validation {
                    message: format!("Notification threshold must be positive, got {day}"),
                });
            }
            set.insert(day);
        }
        Ok(Self(set))
    }

    /// Parses the database wire format (`"7,3,1"`). An empty or blank string
    /// is an empty schedule.
    ///
    /// # Errors
    /// Returns a validation error on non-numeric or non-positive entries.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut set = BTreeSet::new();
        for token in raw.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let day: i64 = token.parse().map_err(|_| Error::Validation {
                message: format!("Invalid notification threshold: {token:?}"),
            })?;
            if day <= 0 {
                return Err(Error::Validation {
                    message: format!("Notification threshold must be positive, got {day}"),
                });
            }
            set.insert(day);
        }
        Ok(Self(set))
    }

    /// True when no thresholds remain pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of pending thresholds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether `days` is a pending threshold.
    #[must_use]
    pub fn contains(&self, days: i64) -> bool {
        self.0.contains(&days)
    }

    /// Removes a threshold; returns whether it was present.
    pub fn remove(&mut self, days: i64) -> bool {
        self.0.remove(&days)
    }

    /// Thresholds in descending order, as stored and notified.
    pub fn thresholds(&self) -> impl Iterator<Item = i64> + '_ {
        self.0.iter().rev().copied()
    }
}

impl fmt::Display for NotificationSchedule {
    /// Renders the wire format: descending, comma-separated, no spaces.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for day in self.0.iter().rev() {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "{day}")?;
            first = false;
        }
        Ok(())
    }
}
