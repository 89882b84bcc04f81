pub mod backend;
pub mod clock;
pub mod controller;
pub mod error;
pub mod location_store;
pub mod map;
pub mod notify;
pub mod position;
pub mod simulated;
pub mod store;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use backend::OfferSource;
pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{
    ControllerDeps, NotificationToggle, ProximityController, QueryOutcome,
    DEFAULT_AUTO_UPDATE_INTERVAL,
};
pub use error::{PositionError, TrackerError};
pub use location_store::{LocationStore, StoredLocation, LAST_KNOWN_LOCATION_KEY};
pub use map::{LocationStatus, MapRenderer, StatusLevel};
pub use notify::{
    Alerter, NotificationGate, NotificationRecord, PermissionPhase, PermissionState,
    ProximityAlert,
};
pub use position::{
    ListenerResult, PositionOptions, PositionProvider, PositionSource, TrackingMode, WatchHandle,
};
pub use simulated::SimulatedPositionSource;
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};

/// Locks `mutex`, recovering the data if a previous holder panicked.
///
/// Listener panics are caught and logged, so a poisoned lock only means a
/// callback failed mid-update; the guarded state itself stays consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
