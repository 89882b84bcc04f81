//! Coordinates, position fixes and great-circle distance helpers.
//!
//! Distances use the haversine formula over a spherical Earth with the mean
//! radius [`EARTH_RADIUS_M`]. Inputs are not range-checked: a GPS reading that
//! drifts slightly out of range still yields a number rather than an error.
//! Use [`Coordinate::checked`] where validation is actually wanted.

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A point on the Earth's surface in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Builds a coordinate, rejecting latitudes outside `[-90, 90]` and
    /// longitudes outside `[-180, 180]`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LatitudeOutOfRange`] or
    /// [`CoreError::LongitudeOutOfRange`] for out-of-range (or NaN) input.
    pub fn checked(latitude: f64, longitude: f64) -> Result<Self, CoreError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(CoreError::LatitudeOutOfRange(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(CoreError::LongitudeOutOfRange(longitude));
        }
        Ok(Self::new(latitude, longitude))
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Lat: {:.6}, Lng: {:.6}", self.latitude, self.longitude)
    }
}

/// A single reported device position.
///
/// Each successful read produces a new fix; fixes are superseded, never merged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub coordinate: Coordinate,
    /// Radius of the 95% confidence circle, in meters.
    pub accuracy_meters: f64,
    /// Capture time as Unix epoch milliseconds.
    pub captured_at_ms: i64,
}

impl PositionFix {
    #[must_use]
    pub const fn new(coordinate: Coordinate, accuracy_meters: f64, captured_at_ms: i64) -> Self {
        Self {
            coordinate,
            accuracy_meters,
            captured_at_ms,
        }
    }

    /// Milliseconds elapsed between capture and `now_ms`. Negative when the
    /// fix carries a timestamp from the future.
    #[must_use]
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.captured_at_ms)
    }

    #[must_use]
    pub fn accuracy_level(&self) -> AccuracyLevel {
        describe_accuracy(self.accuracy_meters)
    }
}

/// Great-circle distance between `a` and `b` in meters.
#[must_use]
pub fn distance(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lng = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Returns `true` when `b` lies within `radius_m` meters of `a` (inclusive).
#[must_use]
pub fn is_within(a: Coordinate, b: Coordinate, radius_m: f64) -> bool {
    distance(a, b) <= radius_m
}

/// Formats a distance for display: `"999m"` below one kilometer, `"1.5km"`
/// from there on.
#[must_use]
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{}m", meters.round())
    } else {
        format!("{:.1}km", meters / 1000.0)
    }
}

/// Display-only bucket for a fix's reported accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccuracyLevel {
    VeryPrecise,
    Good,
    Moderate,
    Low,
}

impl AccuracyLevel {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            AccuracyLevel::VeryPrecise => "very precise",
            AccuracyLevel::Good => "good precision",
            AccuracyLevel::Moderate => "moderate precision",
            AccuracyLevel::Low => "low precision",
        }
    }
}

impl std::fmt::Display for AccuracyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Buckets an accuracy radius: ≤10 m very precise, ≤50 m good, ≤100 m
/// moderate, anything else low.
#[must_use]
pub fn describe_accuracy(accuracy_meters: f64) -> AccuracyLevel {
    if accuracy_meters <= 10.0 {
        AccuracyLevel::VeryPrecise
    } else if accuracy_meters <= 50.0 {
        AccuracyLevel::Good
    } else if accuracy_meters <= 100.0 {
        AccuracyLevel::Moderate
    } else {
        AccuracyLevel::Low
    }
}
