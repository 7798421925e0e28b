//! Typed errors for the trip, tariff, and discovery domains.
//!
//! I/O-shaped failures (files, dictionaries, preference storage) stay on
//! `anyhow::Result`; these enums cover the rules the domain itself enforces.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::fleet::BikeStatus;

#[derive(Debug, Error, PartialEq)]
pub enum AccrualError {
    #[error("Clock skew: now ({now}) is before trip start ({start})")]
    ClockSkew {
        start: DateTime<Utc>,
        now: DateTime<Utc>,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum CriteriaError {
    #[error("Minimum battery level cannot be negative (got {0})")]
    NegativeBattery(i64),
    #[error("Minimum battery level cannot exceed 100 (got {0})")]
    BatteryAboveMax(i64),
    #[error("Maximum distance must be a finite, non-negative number of km (got {0})")]
    InvalidDistance(f64),
}

#[derive(Debug, Error, PartialEq)]
pub enum TripError {
    #[error("Bike {bike_id} is not available (status: {status})")]
    BikeNotAvailable { bike_id: String, status: BikeStatus },
    #[error("Trip {trip_id} belongs to bike {expected}, not {actual}")]
    BikeMismatch {
        trip_id: String,
        expected: String,
        actual: String,
    },
    #[error("Trip {0} is already closed")]
    AlreadyClosed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_negative_battery() {
        let err = CriteriaError::NegativeBattery(-5);
        assert_eq!(
            err.to_string(),
            "Minimum battery level cannot be negative (got -5)"
        );
    }

    #[test]
    fn error_display_bike_not_available() {
        let err = TripError::BikeNotAvailable {
            bike_id: "b-1".into(),
            status: BikeStatus::Maintenance,
        };
        assert_eq!(
            err.to_string(),
            "Bike b-1 is not available (status: maintenance)"
        );
    }

    #[test]
    fn error_display_already_closed() {
        let err = TripError::AlreadyClosed("t-9".into());
        assert_eq!(err.to_string(), "Trip t-9 is already closed");
    }
}
