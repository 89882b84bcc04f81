//! Side-channel cache of the last known position.
//!
//! The value is stored as JSON under [`LAST_KNOWN_LOCATION_KEY`] with the
//! shape `{latitude, longitude, accuracy, timestamp}`. A value that no longer
//! parses reads as absent.

use std::sync::Arc;
use std::time::Duration;

use nearoffers_core::{Coordinate, PositionFix};
use serde::{Deserialize, Serialize};

use crate::clock::{duration_ms, Clock};
use crate::error::TrackerError;
use crate::store::KeyValueStore;

pub const LAST_KNOWN_LOCATION_KEY: &str = "lastKnownLocation";

/// How long a stored location counts as fresh unless configured otherwise.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoredLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    /// Capture time, epoch milliseconds.
    pub timestamp: i64,
}

impl From<&PositionFix> for StoredLocation {
    fn from(fix: &PositionFix) -> Self {
        Self {
            latitude: fix.coordinate.latitude,
            longitude: fix.coordinate.longitude,
            accuracy: fix.accuracy_meters,
            timestamp: fix.captured_at_ms,
        }
    }
}

impl StoredLocation {
    #[must_use]
    pub fn to_fix(&self) -> PositionFix {
        PositionFix::new(
            Coordinate::new(self.latitude, self.longitude),
            self.accuracy,
            self.timestamp,
        )
    }
}

pub struct LocationStore {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    max_age: Duration,
}

impl LocationStore {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            max_age: DEFAULT_MAX_AGE,
        }
    }

    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    #[must_use]
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Overwrites the stored location with `fix`.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::StorageIo`] if the backing store fails.
    pub fn save(&self, fix: &PositionFix) -> Result<(), TrackerError> {
        let body = serde_json::to_string(&StoredLocation::from(fix)).map_err(|e| {
            TrackerError::StorageCorrupt {
                key: LAST_KNOWN_LOCATION_KEY.to_owned(),
                source: e,
            }
        })?;
        self.store.set(LAST_KNOWN_LOCATION_KEY, &body)
    }

    /// Reads the stored location, surfacing corruption as an error.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::StorageCorrupt`] when the value does not parse
    /// and [`TrackerError::StorageIo`] when the store cannot be read.
    pub fn try_last_location(&self) -> Result<Option<StoredLocation>, TrackerError> {
        let Some(raw) = self.store.get(LAST_KNOWN_LOCATION_KEY)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| TrackerError::StorageCorrupt {
                key: LAST_KNOWN_LOCATION_KEY.to_owned(),
                source: e,
            })
    }

    /// Reads the stored location; any failure is logged and reads as `None`.
    #[must_use]
    pub fn last_location(&self) -> Option<StoredLocation> {
        match self.try_last_location() {
            Ok(location) => location,
            Err(err) => {
                tracing::warn!(error = %err, "ignoring unreadable last known location");
                None
            }
        }
    }

    /// Deletes the stored location.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::StorageIo`] if the backing store fails.
    pub fn clear(&self) -> Result<(), TrackerError> {
        self.store.remove(LAST_KNOWN_LOCATION_KEY)
    }

    /// `true` while the stored location is younger than the configured max age.
    #[must_use]
    pub fn is_location_fresh(&self) -> bool {
        self.is_fresh_within(self.max_age)
    }

    /// `true` while the stored location is strictly younger than `max_age`;
    /// a location exactly `max_age` old is stale.
    #[must_use]
    pub fn is_fresh_within(&self, max_age: Duration) -> bool {
        self.last_location().is_some_and(|location| {
            self.clock.now_ms().saturating_sub(location.timestamp) < duration_ms(max_age)
        })
    }

    /// The stored location as a fix, only if still fresh.
    #[must_use]
    pub fn fresh_fix(&self) -> Option<PositionFix> {
        if self.is_location_fresh() {
            self.last_location().map(|location| location.to_fix())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;

    const NOW: i64 = 1_760_000_000_000;

    fn fixture() -> (LocationStore, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(NOW));
        let locations = LocationStore::new(store.clone(), clock.clone());
        (locations, store, clock)
    }

    fn fix_at(ts: i64) -> PositionFix {
        PositionFix::new(Coordinate::new(-34.6037, -58.3816), 8.0, ts)
    }

    #[test]
    fn save_writes_expected_json_shape() {
        let (locations, store, _) = fixture();
        locations.save(&fix_at(NOW)).unwrap();

        let raw = store.get(LAST_KNOWN_LOCATION_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["latitude"], -34.6037);
        assert_eq!(value["longitude"], -58.3816);
        assert_eq!(value["accuracy"], 8.0);
        assert_eq!(value["timestamp"], NOW);
    }

    #[test]
    fn last_location_round_trips_to_fix() {
        let (locations, _, _) = fixture();
        locations.save(&fix_at(NOW - 5)).unwrap();
        let stored = locations.last_location().unwrap();
        assert_eq!(stored.to_fix(), fix_at(NOW - 5));
    }

    #[test]
    fn corrupt_value_reads_as_absent() {
        let (locations, store, _) = fixture();
        store.set(LAST_KNOWN_LOCATION_KEY, "{not json").unwrap();
        assert!(locations.last_location().is_none());
        assert!(matches!(
            locations.try_last_location(),
            Err(TrackerError::StorageCorrupt { .. })
        ));
        assert!(!locations.is_location_fresh());
    }

    #[test]
    fn clear_removes_location() {
        let (locations, _, _) = fixture();
        locations.save(&fix_at(NOW)).unwrap();
        locations.clear().unwrap();
        assert!(locations.last_location().is_none());
    }

    #[test]
    fn freshness_boundary_is_exclusive() {
        let (locations, _, clock) = fixture();
        locations.save(&fix_at(NOW)).unwrap();
        assert!(locations.is_location_fresh(), "fix timestamped now is fresh");

        clock.set(NOW + duration_ms(DEFAULT_MAX_AGE) - 1);
        assert!(locations.is_location_fresh());

        clock.set(NOW + duration_ms(DEFAULT_MAX_AGE));
        assert!(!locations.is_location_fresh(), "exactly max age is stale");
        assert!(locations.fresh_fix().is_none());
    }

    #[test]
    fn configured_max_age_is_used() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(NOW));
        let locations =
            LocationStore::new(store, clock.clone()).with_max_age(Duration::from_secs(30));
        locations.save(&fix_at(NOW)).unwrap();
        clock.advance(Duration::from_secs(31));
        assert!(!locations.is_location_fresh());
        assert!(locations.is_fresh_within(Duration::from_secs(60)));
    }

    #[test]
    fn nothing_stored_is_not_fresh() {
        let (locations, _, _) = fixture();
        assert!(!locations.is_location_fresh());
    }
}
