//! Bikes and bike snapshots.
//!
//! A snapshot is the list of bikes as last read from the backend. It is
//! loaded once and never mutated while a filter pass runs over it.

pub mod filter;
pub mod geo;
pub mod stats;

pub use filter::{BikeType, FilterCriteria, SearchScope, filter_bikes};
pub use geo::Coordinates;
pub use stats::FleetStats;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BikeStatus {
    #[default]
    Available,
    InUse,
    Maintenance,
    Unavailable,
}

impl BikeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BikeStatus::Available => "available",
            BikeStatus::InUse => "in_use",
            BikeStatus::Maintenance => "maintenance",
            BikeStatus::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for BikeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bike as stored in the `bikes` table.
///
/// Field names on the wire follow the table columns (`bike_code`,
/// `current_location_name`); the shorter names are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bike {
    pub id: String,
    #[serde(rename = "bike_code", alias = "code")]
    pub code: String,
    pub model: String,
    /// Percent, 0 to 100.
    pub battery_level: u8,
    #[serde(
        rename = "current_location_name",
        alias = "location_name",
        default
    )]
    pub location_name: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub status: BikeStatus,
}

impl Bike {
    /// Position of the bike, if both coordinates are known.
    pub fn coordinates(&self) -> Option<Coordinates> {
        Some(Coordinates::new(self.latitude?, self.longitude?))
    }

    pub fn is_available(&self) -> bool {
        self.status == BikeStatus::Available
    }
}

/// Loads a bike snapshot from a JSON array or, for `.csv` files, a CSV table
/// with a header row.
pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<Vec<Bike>> {
    let path = path.as_ref();
    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    debug!(path = %path.display(), is_csv, "Loading bike snapshot");

    let bikes = if is_csv {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open bike snapshot {}", path.display()))?;
        reader
            .deserialize()
            .collect::<Result<Vec<Bike>, _>>()
            .with_context(|| format!("invalid bike row in {}", path.display()))?
    } else {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read bike snapshot {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("invalid bike snapshot JSON in {}", path.display()))?
    };

    info!(path = %path.display(), bikes = bikes.len(), "Bike snapshot loaded");
    Ok(bikes)
}

/// Finds a bike by id or, failing that, by its printed code (case-insensitive).
pub fn find_bike<'a>(bikes: &'a mut [Bike], id_or_code: &str) -> Option<&'a mut Bike> {
    let position = bikes
        .iter()
        .position(|b| b.id == id_or_code)
        .or_else(|| {
            bikes
                .iter()
                .position(|b| b.code.eq_ignore_ascii_case(id_or_code))
        })?;
    bikes.get_mut(position)
}
