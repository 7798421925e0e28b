//! Trip cost and duration accrual.
//!
//! Converts the wall-clock time elapsed since a trip started into a display
//! duration, a modeled distance, and an accrued cost under a linear tariff.
//! Distance is not measured: it is whole elapsed minutes times a fixed
//! modeled speed.

use anyhow::{Result, ensure};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use crate::error::AccrualError;

const MS_PER_MINUTE: i64 = 60_000;
const MS_PER_SECOND: i64 = 1_000;

/// Linear pricing: `base + distance * per_km + minutes * per_minute`.
///
/// Every field is optional when deserialized; missing fields take the
/// standard city tariff (5.00 ETB base, 2.00 ETB/km, no per-minute charge,
/// 200 m/min modeled speed).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tariff {
    #[serde(default = "Tariff::default_base_fee_etb")]
    pub base_fee_etb: f64,
    #[serde(default = "Tariff::default_per_km_rate_etb")]
    pub per_km_rate_etb: f64,
    /// Zero for the standard tariff; the per-minute variant sets this.
    #[serde(default)]
    pub per_minute_rate_etb: f64,
    #[serde(default = "Tariff::default_speed_km_per_minute")]
    pub speed_km_per_minute: f64,
}

impl Default for Tariff {
    fn default() -> Self {
        Self {
            base_fee_etb: Self::default_base_fee_etb(),
            per_km_rate_etb: Self::default_per_km_rate_etb(),
            per_minute_rate_etb: 0.0,
            speed_km_per_minute: Self::default_speed_km_per_minute(),
        }
    }
}

impl Tariff {
    fn default_base_fee_etb() -> f64 {
        5.0
    }
    fn default_per_km_rate_etb() -> f64 {
        2.0
    }
    fn default_speed_km_per_minute() -> f64 {
        0.2
    }

    /// Rejects tariffs that would break cost monotonicity or produce NaN.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("base_fee_etb", self.base_fee_etb),
            ("per_km_rate_etb", self.per_km_rate_etb),
            ("per_minute_rate_etb", self.per_minute_rate_etb),
            ("speed_km_per_minute", self.speed_km_per_minute),
        ] {
            ensure!(
                value.is_finite() && value >= 0.0,
                "tariff field {name} must be finite and non-negative (got {value})"
            );
        }
        Ok(())
    }

    /// Modeled distance after `minutes` whole minutes of riding.
    pub fn distance_km(&self, minutes: u64) -> f64 {
        minutes as f64 * self.speed_km_per_minute
    }

    pub fn cost_etb(&self, minutes: u64, distance_km: f64) -> f64 {
        self.base_fee_etb
            + distance_km * self.per_km_rate_etb
            + minutes as f64 * self.per_minute_rate_etb
    }
}

/// Elapsed ride time, displayed as `MM:SS`.
///
/// Minutes are not wrapped into hours; a ride past 99 minutes simply
/// prints more digits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Elapsed {
    pub minutes: u64,
    pub seconds: u8,
}

impl Elapsed {
    pub fn from_millis(ms: u64) -> Self {
        Self {
            minutes: ms / MS_PER_MINUTE as u64,
            seconds: ((ms % MS_PER_MINUTE as u64) / MS_PER_SECOND as u64) as u8,
        }
    }
}

impl fmt::Display for Elapsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.minutes, self.seconds)
    }
}

/// One observation of an active trip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Accrual {
    pub elapsed: Elapsed,
    pub distance_km: f64,
    pub cost_etb: f64,
}

impl Accrual {
    /// Keeps whichever observation is further along, so a published series
    /// never goes backwards when the wall clock does.
    pub fn latest(self, other: Accrual) -> Accrual {
        if other.elapsed >= self.elapsed {
            other
        } else {
            self
        }
    }
}

/// Computes the accrual for a trip started at `start`, observed at `now`.
///
/// # Errors
///
/// Returns [`AccrualError::ClockSkew`] when `now` precedes `start`.
pub fn try_accrue(
    start: DateTime<Utc>,
    now: DateTime<Utc>,
    tariff: &Tariff,
) -> Result<Accrual, AccrualError> {
    let diff_ms = (now - start).num_milliseconds();
    if diff_ms < 0 {
        return Err(AccrualError::ClockSkew { start, now });
    }

    let elapsed = Elapsed::from_millis(diff_ms as u64);
    let distance_km = tariff.distance_km(elapsed.minutes);
    let cost_etb = tariff.cost_etb(elapsed.minutes, distance_km);

    Ok(Accrual {
        elapsed,
        distance_km,
        cost_etb,
    })
}

/// Like [`try_accrue`], but fails closed: clock skew yields the zero accrual
/// (`00:00`, no distance, no cost) instead of an error. Safe to call on every
/// UI tick.
pub fn accrue(start: DateTime<Utc>, now: DateTime<Utc>, tariff: &Tariff) -> Accrual {
    match try_accrue(start, now, tariff) {
        Ok(accrual) => {
            debug!(elapsed = %accrual.elapsed, cost_etb = accrual.cost_etb, "Accrued");
            accrual
        }
        Err(e) => {
            warn!(error = %e, "Accrual clamped to zero");
            Accrual::default()
        }
    }
}

/// Formats an amount in Ethiopian Birr, e.g. `ETB 9.00`.
pub fn format_etb(amount: f64) -> String {
    format!("ETB {amount:.2}")
}

/// Formats a distance in kilometers, e.g. `2.00 km`.
pub fn format_km(distance: f64) -> String {
    format!("{distance:.2} km")
}
