//! Nullable KPI measurements and delta arithmetic.
//!
//! A KPI value is either [`Measurement::Known`] or [`Measurement::Unknown`].
//! Unknown is absorbing: any delta that touches an unknown operand is itself
//! unknown, never a fabricated zero.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A decimal KPI value that may not have been measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<Decimal>", into = "Option<Decimal>")]
pub enum Measurement {
    /// A measured value.
    Known(Decimal),
    /// No value was measured.
    #[default]
    Unknown,
}

impl Measurement {
    /// Get the value if it is known.
    #[must_use]
    pub const fn value(self) -> Option<Decimal> {
        match self {
            Self::Known(v) => Some(v),
            Self::Unknown => None,
        }
    }

    #[must_use]
    pub const fn is_known(self) -> bool {
        matches!(self, Self::Known(_))
    }

    /// Difference `new - old`, unknown if either side is unknown.
    ///
    /// Overflow (only possible near the limits of [`Decimal`]) also yields
    /// unknown; use [`Measurement::checked_delta`] to observe it.
    #[must_use]
    pub fn delta(new: Self, old: Self) -> Self {
        Self::checked_delta(new, old, "measurement").unwrap_or(Self::Unknown)
    }

    /// Difference `new - old`, reporting arithmetic overflow as an error.
    ///
    /// # Errors
    /// Returns [`Error::Overflow`] naming `field` if the subtraction overflows.
    pub fn checked_delta(new: Self, old: Self, field: &'static str) -> Result<Self> {
        match (new, old) {
            (Self::Known(new), Self::Known(old)) => new
                .checked_sub(old)
                .map(Self::Known)
                .ok_or(Error::Overflow(field)),
            _ => Ok(Self::Unknown),
        }
    }
}

impl From<Option<Decimal>> for Measurement {
    fn from(value: Option<Decimal>) -> Self {
        value.map_or(Self::Unknown, Self::Known)
    }
}

impl From<Measurement> for Option<Decimal> {
    fn from(value: Measurement) -> Self {
        value.value()
    }
}

impl From<Decimal> for Measurement {
    fn from(value: Decimal) -> Self {
        Self::Known(value)
    }
}

/// Difference of two whole-second durations, unknown if either is unknown.
///
/// # Errors
/// Returns [`Error::Overflow`] if the subtraction overflows `i32`.
pub fn seconds_delta(new: Option<i32>, old: Option<i32>) -> Result<Option<i32>> {
    match (new, old) {
        (Some(new), Some(old)) => new
            .checked_sub(old)
            .map(Some)
            .ok_or(Error::Overflow("median_on_scene_time_secs")),
        _ => Ok(None),
    }
}
