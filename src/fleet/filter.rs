//! Bike discovery: narrowing a snapshot down to the bikes a rider can see.
//!
//! Every predicate is independent and a bike stays only if all of them hold.
//! The filter is stable (snapshot order is kept) and has no side effects;
//! criteria are validated when they are built, not while filtering.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Bike;
use super::geo::Coordinates;
use crate::error::CriteriaError;

/// Search radius applied until the rider picks another one.
pub const DEFAULT_MAX_DISTANCE_KM: f64 = 5.0;

/// Models offered in the filter sheet, after "all".
pub const BIKE_MODELS: &[&str] = &["Urban Classic", "City Cruiser", "Electric Pro"];

/// Model filter. `"all"` on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BikeType {
    #[default]
    All,
    Model(String),
}

impl BikeType {
    pub fn matches(&self, model: &str) -> bool {
        match self {
            BikeType::All => true,
            BikeType::Model(m) => m == model,
        }
    }
}

impl From<&str> for BikeType {
    fn from(value: &str) -> Self {
        if value == "all" {
            BikeType::All
        } else {
            BikeType::Model(value.to_string())
        }
    }
}

impl From<String> for BikeType {
    fn from(value: String) -> Self {
        if value == "all" {
            BikeType::All
        } else {
            BikeType::Model(value)
        }
    }
}

impl From<BikeType> for String {
    fn from(value: BikeType) -> Self {
        match value {
            BikeType::All => "all".to_string(),
            BikeType::Model(m) => m,
        }
    }
}

impl fmt::Display for BikeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BikeType::All => f.write_str("all"),
            BikeType::Model(m) => f.write_str(m),
        }
    }
}

/// Which bike fields the free-text search looks at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    /// Rider map: location name only.
    #[default]
    Location,
    /// Admin fleet list: code, model, or location name.
    Fleet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    /// 0 means "no battery constraint".
    pub min_battery_level: u8,
    pub max_distance_km: f64,
    pub bike_type: BikeType,
    #[serde(default)]
    pub search_text: String,
    #[serde(default)]
    pub scope: SearchScope,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            min_battery_level: 0,
            max_distance_km: DEFAULT_MAX_DISTANCE_KM,
            bike_type: BikeType::All,
            search_text: String::new(),
            scope: SearchScope::Location,
        }
    }
}

impl FilterCriteria {
    /// Builds criteria from raw user input, rejecting values the filter
    /// would otherwise have to guess about.
    ///
    /// # Errors
    ///
    /// Returns a [`CriteriaError`] for a battery threshold outside 0..=100
    /// or a distance that is negative or not finite.
    pub fn try_new(
        min_battery_level: i64,
        max_distance_km: f64,
        bike_type: &str,
        search_text: &str,
    ) -> Result<Self, CriteriaError> {
        if min_battery_level < 0 {
            return Err(CriteriaError::NegativeBattery(min_battery_level));
        }
        if min_battery_level > 100 {
            return Err(CriteriaError::BatteryAboveMax(min_battery_level));
        }
        let criteria = Self {
            min_battery_level: min_battery_level as u8,
            max_distance_km,
            bike_type: BikeType::from(bike_type),
            search_text: search_text.to_string(),
            scope: SearchScope::Location,
        };
        criteria.validate()?;
        Ok(criteria)
    }

    /// Checks criteria that arrived by deserialization or direct mutation.
    pub fn validate(&self) -> Result<(), CriteriaError> {
        if self.min_battery_level > 100 {
            return Err(CriteriaError::BatteryAboveMax(
                self.min_battery_level as i64,
            ));
        }
        if !self.max_distance_km.is_finite() || self.max_distance_km < 0.0 {
            return Err(CriteriaError::InvalidDistance(self.max_distance_km));
        }
        Ok(())
    }

    pub fn with_scope(mut self, scope: SearchScope) -> Self {
        self.scope = scope;
        self
    }

    /// Restores the filter-sheet defaults: any battery, 5 km, all models.
    /// The search box is separate input and is left as is.
    pub fn reset(&mut self) {
        self.min_battery_level = 0;
        self.max_distance_km = DEFAULT_MAX_DISTANCE_KM;
        self.bike_type = BikeType::All;
    }

    pub fn matches_battery(&self, bike: &Bike) -> bool {
        self.min_battery_level == 0 || bike.battery_level >= self.min_battery_level
    }

    pub fn matches_type(&self, bike: &Bike) -> bool {
        self.bike_type.matches(&bike.model)
    }

    /// Case-insensitive substring match. A bike without a location name
    /// never matches a non-empty location search.
    pub fn matches_search(&self, bike: &Bike) -> bool {
        if self.search_text.is_empty() {
            return true;
        }
        let needle = self.search_text.to_lowercase();
        let location_hit = bike
            .location_name
            .as_deref()
            .is_some_and(|name| name.to_lowercase().contains(&needle));

        match self.scope {
            SearchScope::Location => location_hit,
            SearchScope::Fleet => {
                location_hit
                    || bike.code.to_lowercase().contains(&needle)
                    || bike.model.to_lowercase().contains(&needle)
            }
        }
    }

    /// A bike without coordinates is never within range of a known rider.
    pub fn matches_distance(&self, bike: &Bike, user: Coordinates) -> bool {
        bike.coordinates()
            .is_some_and(|at| at.distance_km(&user) <= self.max_distance_km)
    }

    /// All predicates. The distance predicate only applies when the rider's
    /// position is known.
    pub fn matches(&self, bike: &Bike, user: Option<Coordinates>) -> bool {
        self.matches_battery(bike)
            && self.matches_type(bike)
            && self.matches_search(bike)
            && user.is_none_or(|u| self.matches_distance(bike, u))
    }
}

/// Returns the bikes matching `criteria`, in snapshot order.
pub fn filter_bikes<'a>(
    bikes: &'a [Bike],
    criteria: &FilterCriteria,
    user: Option<Coordinates>,
) -> Vec<&'a Bike> {
    bikes
        .iter()
        .filter(|bike| criteria.matches(bike, user))
        .collect()
}
