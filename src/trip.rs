//! Trip lifecycle: start against an available bike, accrue while active,
//! close exactly once.
//!
//! ```text
//! Active --complete--> Completed
//!    \----cancel-----> Cancelled
//! ```
//!
//! Closing a trip hands its bike back to the pool. Persisting the resulting
//! records is the caller's job; nothing here talks to the backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::TripError;
use crate::fleet::{Bike, BikeStatus};
use crate::tariff::{Accrual, Elapsed, Tariff, accrue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Active,
    Completed,
    Cancelled,
}

impl TripStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TripStatus::Active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Wallet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: String,
    pub user_id: String,
    pub bike_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub distance_km: f64,
    pub cost_etb: f64,
    /// Whole minutes, set when the trip is closed.
    pub duration_minutes: Option<u64>,
    pub status: TripStatus,
    /// Furthest instant the trip has been observed at. Distance, cost,
    /// duration and end time all derive from it.
    pub observed_until: DateTime<Utc>,
}

/// Summary of a completed trip, one row of the receipt ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripReceipt {
    pub trip_id: String,
    pub user_id: String,
    pub bike_id: String,
    pub bike_code: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: u64,
    pub distance_km: f64,
    pub cost_etb: f64,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
}

impl Trip {
    /// Starts a trip on `bike` at `now` and marks the bike in use.
    ///
    /// The new trip already carries the base fee.
    pub fn start(
        id: impl Into<String>,
        user_id: impl Into<String>,
        bike: &mut Bike,
        now: DateTime<Utc>,
        tariff: &Tariff,
    ) -> Result<Trip, TripError> {
        if !bike.is_available() {
            return Err(TripError::BikeNotAvailable {
                bike_id: bike.id.clone(),
                status: bike.status,
            });
        }

        let opening = accrue(now, now, tariff);
        bike.status = BikeStatus::InUse;

        let trip = Trip {
            id: id.into(),
            user_id: user_id.into(),
            bike_id: bike.id.clone(),
            start_time: now,
            end_time: None,
            distance_km: opening.distance_km,
            cost_etb: opening.cost_etb,
            duration_minutes: None,
            status: TripStatus::Active,
            observed_until: now,
        };
        info!(trip_id = %trip.id, bike_id = %trip.bike_id, "Trip started");
        Ok(trip)
    }

    pub fn is_active(&self) -> bool {
        self.status == TripStatus::Active
    }

    /// Recomputes distance and cost at `now`.
    ///
    /// An observation taken with a clock that has stepped backwards is
    /// treated as one at the furthest instant seen so far, so the figures
    /// never decrease and always belong to the same instant.
    pub fn observe(&mut self, now: DateTime<Utc>, tariff: &Tariff) -> Result<Accrual, TripError> {
        self.ensure_active()?;

        self.observed_until = self.observed_until.max(now);
        let accrual = accrue(self.start_time, self.observed_until, tariff);
        self.distance_km = accrual.distance_km;
        self.cost_etb = accrual.cost_etb;
        debug!(trip_id = %self.id, elapsed = %accrual.elapsed, cost_etb = self.cost_etb, "Trip observed");

        Ok(accrual)
    }

    /// The stored figures as an [`Accrual`], without observing.
    pub fn progress(&self) -> Accrual {
        let millis = (self.observed_until - self.start_time)
            .num_milliseconds()
            .max(0) as u64;
        Accrual {
            elapsed: Elapsed::from_millis(millis),
            distance_km: self.distance_km,
            cost_etb: self.cost_etb,
        }
    }

    /// Ends the ride: final accrual, end time, bike back to available.
    pub fn complete(
        &mut self,
        bike: &mut Bike,
        now: DateTime<Utc>,
        tariff: &Tariff,
    ) -> Result<TripReceipt, TripError> {
        self.ensure_active()?;
        self.ensure_bike(bike)?;

        let accrual = self.observe(now, tariff)?;
        let end_time = self.observed_until;

        self.end_time = Some(end_time);
        self.duration_minutes = Some(accrual.elapsed.minutes);
        self.status = TripStatus::Completed;
        bike.status = BikeStatus::Available;

        info!(
            trip_id = %self.id,
            duration_minutes = accrual.elapsed.minutes,
            distance_km = self.distance_km,
            cost_etb = self.cost_etb,
            "Trip completed"
        );

        Ok(TripReceipt {
            trip_id: self.id.clone(),
            user_id: self.user_id.clone(),
            bike_id: bike.id.clone(),
            bike_code: bike.code.clone(),
            start_time: self.start_time,
            end_time,
            duration_minutes: accrual.elapsed.minutes,
            distance_km: self.distance_km,
            cost_etb: self.cost_etb,
            payment_method: PaymentMethod::Wallet,
            payment_status: PaymentStatus::Pending,
        })
    }

    /// Abandons the ride without a receipt; the bike is released. The
    /// figures accrued up to `now` are kept on the trip.
    pub fn cancel(
        &mut self,
        bike: &mut Bike,
        now: DateTime<Utc>,
        tariff: &Tariff,
    ) -> Result<(), TripError> {
        self.ensure_active()?;
        self.ensure_bike(bike)?;

        let accrual = self.observe(now, tariff)?;
        self.end_time = Some(self.observed_until);
        self.duration_minutes = Some(accrual.elapsed.minutes);
        self.status = TripStatus::Cancelled;
        bike.status = BikeStatus::Available;

        info!(trip_id = %self.id, cost_etb = self.cost_etb, "Trip cancelled");
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), TripError> {
        if self.status.is_terminal() {
            return Err(TripError::AlreadyClosed(self.id.clone()));
        }
        Ok(())
    }

    fn ensure_bike(&self, bike: &Bike) -> Result<(), TripError> {
        if bike.id != self.bike_id {
            return Err(TripError::BikeMismatch {
                trip_id: self.id.clone(),
                expected: self.bike_id.clone(),
                actual: bike.id.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
    }

    fn bike(id: &str) -> Bike {
        Bike {
            id: id.to_string(),
            code: format!("BK-{id}"),
            model: "Urban Classic".to_string(),
            battery_level: 90,
            location_name: Some("Piassa".to_string()),
            latitude: None,
            longitude: None,
            status: BikeStatus::Available,
        }
    }

    #[test]
    fn test_start_marks_bike_in_use_and_charges_base_fee() {
        let mut b = bike("1");
        let trip = Trip::start("t-1", "u-1", &mut b, t0(), &Tariff::default()).unwrap();

        assert_eq!(b.status, BikeStatus::InUse);
        assert_eq!(trip.status, TripStatus::Active);
        assert_eq!(trip.distance_km, 0.0);
        assert_eq!(trip.cost_etb, 5.0);
    }

    #[test]
    fn test_start_rejects_unavailable_bike() {
        let mut b = bike("1");
        b.status = BikeStatus::Maintenance;
        let err = Trip::start("t-1", "u-1", &mut b, t0(), &Tariff::default()).unwrap_err();

        assert!(matches!(err, TripError::BikeNotAvailable { .. }));
        assert_eq!(b.status, BikeStatus::Maintenance);
    }

    #[test]
    fn test_observe_never_decreases() {
        let tariff = Tariff::default();
        let mut b = bike("1");
        let mut trip = Trip::start("t-1", "u-1", &mut b, t0(), &tariff).unwrap();

        let later = trip.observe(t0() + Duration::minutes(5), &tariff).unwrap();
        let skewed = trip.observe(t0() + Duration::minutes(2), &tariff).unwrap();

        assert!(skewed.cost_etb >= later.cost_etb);
        assert_eq!(trip.cost_etb, later.cost_etb);
    }

    #[test]
    fn test_complete_after_clock_step_back_is_consistent() {
        let tariff = Tariff::default();
        let mut b = bike("1");
        let mut trip = Trip::start("t-1", "u-1", &mut b, t0(), &tariff).unwrap();

        trip.observe(t0() + Duration::minutes(5), &tariff).unwrap();
        let receipt = trip
            .complete(&mut b, t0() + Duration::minutes(2), &tariff)
            .unwrap();

        assert_eq!(receipt.duration_minutes, 5);
        assert_eq!(receipt.end_time, t0() + Duration::minutes(5));
        assert!((receipt.distance_km - 5.0 * tariff.speed_km_per_minute).abs() < 1e-9);
        assert!(
            (receipt.cost_etb - (tariff.base_fee_etb + receipt.distance_km * tariff.per_km_rate_etb))
                .abs()
                < 1e-9
        );
    }

    #[test]
    fn test_progress_reflects_last_observation() {
        let tariff = Tariff::default();
        let mut b = bike("1");
        let mut trip = Trip::start("t-1", "u-1", &mut b, t0(), &tariff).unwrap();

        let seen = trip
            .observe(t0() + Duration::minutes(7) + Duration::seconds(15), &tariff)
            .unwrap();
        assert_eq!(trip.progress(), seen);
        assert_eq!(trip.progress().elapsed.to_string(), "07:15");
    }

    #[test]
    fn test_complete_closes_trip_and_releases_bike() {
        let tariff = Tariff::default();
        let mut b = bike("1");
        let mut trip = Trip::start("t-1", "u-1", &mut b, t0(), &tariff).unwrap();

        let receipt = trip
            .complete(&mut b, t0() + Duration::minutes(10), &tariff)
            .unwrap();

        assert_eq!(trip.status, TripStatus::Completed);
        assert_eq!(trip.duration_minutes, Some(10));
        assert_eq!(b.status, BikeStatus::Available);
        assert_eq!(receipt.bike_code, "BK-1");
        assert_eq!(receipt.duration_minutes, 10);
        assert!((receipt.distance_km - 2.0).abs() < 1e-9);
        assert!((receipt.cost_etb - 9.0).abs() < 1e-9);
        assert_eq!(receipt.payment_status, PaymentStatus::Pending);
    }

    #[test]
    fn test_terminal_trip_rejects_further_transitions() {
        let tariff = Tariff::default();
        let mut b = bike("1");
        let mut trip = Trip::start("t-1", "u-1", &mut b, t0(), &tariff).unwrap();
        trip.complete(&mut b, t0() + Duration::minutes(1), &tariff)
            .unwrap();

        let frozen = trip.cost_etb;
        assert_eq!(
            trip.observe(t0() + Duration::minutes(30), &tariff),
            Err(TripError::AlreadyClosed("t-1".into()))
        );
        assert!(trip.cancel(&mut b, t0(), &tariff).is_err());
        assert!(trip.complete(&mut b, t0(), &tariff).is_err());
        assert_eq!(trip.cost_etb, frozen);
    }

    #[test]
    fn test_cancel_releases_bike() {
        let tariff = Tariff::default();
        let mut b = bike("1");
        let mut trip = Trip::start("t-1", "u-1", &mut b, t0(), &tariff).unwrap();

        trip.cancel(&mut b, t0() + Duration::minutes(3), &tariff).unwrap();

        assert_eq!(trip.status, TripStatus::Cancelled);
        assert_eq!(b.status, BikeStatus::Available);
        assert_eq!(trip.end_time, Some(t0() + Duration::minutes(3)));
        assert_eq!(trip.duration_minutes, Some(3));
        assert!((trip.cost_etb - 6.2).abs() < 1e-9);
    }

    #[test]
    fn test_complete_with_wrong_bike() {
        let tariff = Tariff::default();
        let mut b = bike("1");
        let mut other = bike("2");
        let mut trip = Trip::start("t-1", "u-1", &mut b, t0(), &tariff).unwrap();

        let err = trip.complete(&mut other, t0(), &tariff).unwrap_err();
        assert!(matches!(err, TripError::BikeMismatch { .. }));
        assert!(trip.is_active());
    }

    #[test]
    fn test_complete_before_start_clamps_end_time() {
        let tariff = Tariff::default();
        let mut b = bike("1");
        let mut trip = Trip::start("t-1", "u-1", &mut b, t0(), &tariff).unwrap();

        let receipt = trip
            .complete(&mut b, t0() - Duration::seconds(5), &tariff)
            .unwrap();
        assert_eq!(receipt.end_time, t0());
        assert_eq!(receipt.duration_minutes, 0);
        assert_eq!(receipt.cost_etb, 5.0);
    }
}
