//! A position source without hardware: fixes scattered around a point.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, BoxStream, StreamExt};
use nearoffers_core::{Coordinate, PositionFix};
use rand::Rng;

use crate::clock::Clock;
use crate::error::PositionError;
use crate::lock;
use crate::position::{PositionOptions, PositionSource};

/// Meters per degree of latitude.
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Low-accuracy reads report this many times the configured accuracy.
const LOW_ACCURACY_FACTOR: f64 = 5.0;

struct Inner {
    center: Mutex<Coordinate>,
    failure: Mutex<Option<PositionError>>,
    jitter_m: f64,
    accuracy_m: f64,
    clock: Arc<dyn Clock>,
}

impl Inner {
    fn read(&self, options: PositionOptions) -> Result<PositionFix, PositionError> {
        if let Some(err) = *lock(&self.failure) {
            return Err(err);
        }
        let center = *lock(&self.center);
        let accuracy = if options.high_accuracy {
            self.accuracy_m
        } else {
            self.accuracy_m * LOW_ACCURACY_FACTOR
        };
        Ok(PositionFix::new(
            jitter(center, self.jitter_m),
            accuracy,
            self.clock.now_ms(),
        ))
    }
}

/// Offsets `center` by up to `jitter_m` meters on each axis.
fn jitter(center: Coordinate, jitter_m: f64) -> Coordinate {
    if jitter_m <= 0.0 {
        return center;
    }
    let mut rng = rand::rng();
    let north_m: f64 = rng.random_range(-jitter_m..=jitter_m);
    let east_m: f64 = rng.random_range(-jitter_m..=jitter_m);
    let lng_scale = (METERS_PER_DEGREE * center.latitude.to_radians().cos()).max(1.0);
    Coordinate::new(
        center.latitude + north_m / METERS_PER_DEGREE,
        center.longitude + east_m / lng_scale,
    )
}

/// Reports fixes around a movable center, optionally failing on demand.
/// Watches emit one fix per `watch_interval`.
pub struct SimulatedPositionSource {
    inner: Arc<Inner>,
    watch_interval: Duration,
}

impl SimulatedPositionSource {
    #[must_use]
    pub fn new(center: Coordinate, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                center: Mutex::new(center),
                failure: Mutex::new(None),
                jitter_m: 0.0,
                accuracy_m: 10.0,
                clock,
            }),
            watch_interval: Duration::from_secs(5),
        }
    }

    /// Scatter fixes up to `jitter_m` meters from the center. Negative or
    /// non-finite values turn jitter off.
    #[must_use]
    pub fn with_jitter(self, jitter_m: f64) -> Self {
        let jitter_m = if jitter_m.is_finite() {
            jitter_m.max(0.0)
        } else {
            0.0
        };
        self.rebuild(|inner| inner.jitter_m = jitter_m)
    }

    #[must_use]
    pub fn with_accuracy(self, accuracy_m: f64) -> Self {
        self.rebuild(|inner| inner.accuracy_m = accuracy_m.max(0.0))
    }

    #[must_use]
    pub fn with_watch_interval(mut self, interval: Duration) -> Self {
        self.watch_interval = interval.max(Duration::from_millis(1));
        self
    }

    fn rebuild(self, edit: impl FnOnce(&mut Inner)) -> Self {
        let mut inner = Inner {
            center: Mutex::new(*lock(&self.inner.center)),
            failure: Mutex::new(*lock(&self.inner.failure)),
            jitter_m: self.inner.jitter_m,
            accuracy_m: self.inner.accuracy_m,
            clock: Arc::clone(&self.inner.clock),
        };
        edit(&mut inner);
        Self {
            inner: Arc::new(inner),
            watch_interval: self.watch_interval,
        }
    }

    /// Moves the simulated device. Running watches pick it up on their next fix.
    pub fn move_to(&self, center: Coordinate) {
        *lock(&self.inner.center) = center;
    }

    /// Makes every read fail with `err` until cleared with `None`.
    pub fn fail_with(&self, err: Option<PositionError>) {
        *lock(&self.inner.failure) = err;
    }
}

impl PositionSource for SimulatedPositionSource {
    fn current_position(
        &self,
        options: PositionOptions,
    ) -> BoxFuture<'_, Result<PositionFix, PositionError>> {
        futures::future::ready(self.inner.read(options)).boxed()
    }

    fn watch_position(
        &self,
        options: PositionOptions,
    ) -> BoxStream<'static, Result<PositionFix, PositionError>> {
        let inner = Arc::clone(&self.inner);
        let ticker = tokio::time::interval(self.watch_interval);
        stream::unfold((inner, ticker), move |(inner, mut ticker)| async move {
            ticker.tick().await;
            let event = inner.read(options);
            Some((event, (inner, ticker)))
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use nearoffers_core::distance;

    use super::*;
    use crate::clock::ManualClock;

    const OBELISCO: Coordinate = Coordinate::new(-34.6037, -58.3816);

    fn source() -> SimulatedPositionSource {
        SimulatedPositionSource::new(OBELISCO, Arc::new(ManualClock::new(42)))
    }

    #[tokio::test]
    async fn without_jitter_reports_center() {
        let fix = source()
            .current_position(PositionOptions::one_shot())
            .await
            .unwrap();
        assert_eq!(fix.coordinate, OBELISCO);
        assert_eq!(fix.accuracy_meters, 10.0);
        assert_eq!(fix.captured_at_ms, 42);
    }

    #[tokio::test]
    async fn jitter_stays_within_bounds() {
        let source = source().with_jitter(50.0);
        for _ in 0..50 {
            let fix = source
                .current_position(PositionOptions::one_shot())
                .await
                .unwrap();
            // Both axes at most 50 m, so the diagonal is at most ~71 m.
            assert!(distance(fix.coordinate, OBELISCO) <= 75.0);
        }
    }

    #[tokio::test]
    async fn unusable_jitter_is_ignored() {
        for jitter_m in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN, -3.0] {
            let fix = source()
                .with_jitter(jitter_m)
                .current_position(PositionOptions::one_shot())
                .await
                .unwrap();
            assert_eq!(fix.coordinate, OBELISCO, "jitter {jitter_m}");
        }
    }

    #[tokio::test]
    async fn low_accuracy_reads_are_coarser() {
        let fix = source()
            .with_accuracy(8.0)
            .current_position(PositionOptions::auto_update())
            .await
            .unwrap();
        assert_eq!(fix.accuracy_meters, 40.0);
    }

    #[tokio::test]
    async fn fail_with_and_move_to() {
        let source = source();
        source.fail_with(Some(PositionError::PermissionDenied));
        assert_eq!(
            source.current_position(PositionOptions::one_shot()).await,
            Err(PositionError::PermissionDenied)
        );
        source.fail_with(None);
        let moved = Coordinate::new(0.0, 0.0);
        source.move_to(moved);
        let fix = source
            .current_position(PositionOptions::one_shot())
            .await
            .unwrap();
        assert_eq!(fix.coordinate, moved);
    }

    #[tokio::test(start_paused = true)]
    async fn watch_emits_once_per_interval() {
        let source = source().with_watch_interval(Duration::from_secs(5));
        let mut events = source.watch_position(PositionOptions::continuous());
        let first = events.next().await.unwrap().unwrap();
        assert_eq!(first.coordinate, OBELISCO);

        let started = tokio::time::Instant::now();
        source.move_to(Coordinate::new(1.0, 1.0));
        let second = events.next().await.unwrap().unwrap();
        assert_eq!(second.coordinate, Coordinate::new(1.0, 1.0));
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }
}
