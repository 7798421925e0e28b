use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Bike, BikeStatus};

/// Battery level below which a bike is flagged for charging.
pub const LOW_BATTERY_THRESHOLD: u8 = 30;

#[derive(Debug, Default, Serialize)]
pub struct FleetStats {
    pub timestamp: DateTime<Utc>,
    pub total_bikes: usize,

    // status
    pub available: usize,
    pub in_use: usize,
    pub maintenance: usize,
    pub unavailable: usize,

    // battery
    pub low_battery: usize,
    pub with_location_name: usize,
    pub with_coordinates: usize,
}

impl FleetStats {
    pub fn from_bikes<'a, I>(bikes: I) -> Self
    where
        I: IntoIterator<Item = &'a Bike>,
    {
        let mut s = FleetStats {
            timestamp: Utc::now(),
            ..Default::default()
        };

        for b in bikes {
            s.total_bikes += 1;

            match b.status {
                BikeStatus::Available => s.available += 1,
                BikeStatus::InUse => s.in_use += 1,
                BikeStatus::Maintenance => s.maintenance += 1,
                BikeStatus::Unavailable => s.unavailable += 1,
            }

            if b.battery_level < LOW_BATTERY_THRESHOLD {
                s.low_battery += 1;
            }

            if b.location_name.is_some() {
                s.with_location_name += 1;
            }

            if b.coordinates().is_some() {
                s.with_coordinates += 1;
            }
        }

        s
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    pub fn available_pct(&self) -> f64 {
        Self::pct(self.available, self.total_bikes)
    }

    pub fn low_battery_pct(&self) -> f64 {
        Self::pct(self.low_battery, self.total_bikes)
    }
}
