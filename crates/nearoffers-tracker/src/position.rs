//! Position reads on top of a platform [`PositionSource`].
//!
//! [`PositionProvider::get_once`] is a single awaited read;
//! [`PositionProvider::watch`] starts continuous reporting that lives until
//! its [`WatchHandle`] is cancelled. Both fan results out to registered
//! listeners in registration order. A listener that errors or panics is
//! logged and skipped; the rest still run.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::{BoxStream, StreamExt};
use nearoffers_core::PositionFix;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{PositionError, TrackerError};
use crate::lock;

/// Read options handed to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    /// Upper bound for a single read. Also enforced by the provider.
    pub timeout: Duration,
    /// The platform may answer with a cached fix at most this old.
    pub max_cached_age: Duration,
}

impl PositionOptions {
    /// Defaults for a single read: high accuracy, 10 s timeout, 60 s cache.
    #[must_use]
    pub const fn one_shot() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(10),
            max_cached_age: Duration::from_secs(60),
        }
    }

    /// Defaults for continuous reporting: high accuracy, 5 s timeout, 30 s cache.
    #[must_use]
    pub const fn continuous() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(5),
            max_cached_age: Duration::from_secs(30),
        }
    }

    /// Periodic re-reads: always low accuracy, 5 s timeout, 30 s cache.
    #[must_use]
    pub const fn auto_update() -> Self {
        Self {
            high_accuracy: false,
            timeout: Duration::from_secs(5),
            max_cached_age: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub const fn with_high_accuracy(mut self, high_accuracy: bool) -> Self {
        self.high_accuracy = high_accuracy;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self::one_shot()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingMode {
    OneShot,
    Continuous,
}

impl TrackingMode {
    #[must_use]
    pub const fn default_options(self) -> PositionOptions {
        match self {
            TrackingMode::OneShot => PositionOptions::one_shot(),
            TrackingMode::Continuous => PositionOptions::continuous(),
        }
    }
}

/// The platform geolocation capability.
pub trait PositionSource: Send + Sync {
    fn is_supported(&self) -> bool {
        true
    }

    /// A single position read.
    fn current_position(
        &self,
        options: PositionOptions,
    ) -> BoxFuture<'_, Result<PositionFix, PositionError>>;

    /// Continuous reporting; the stream ends when the platform stops.
    fn watch_position(
        &self,
        options: PositionOptions,
    ) -> BoxStream<'static, Result<PositionFix, PositionError>>;
}

/// Returned by listeners; an `Err` is logged and does not stop dispatch.
pub type ListenerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

type UpdateListener = Arc<dyn Fn(&PositionFix) -> ListenerResult + Send + Sync>;
type ErrorListener = Arc<dyn Fn(&PositionError) -> ListenerResult + Send + Sync>;

/// Identifies a running watch. Cancelling twice is harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchHandle(u64);

#[derive(Default)]
struct Shared {
    update_listeners: Mutex<Vec<UpdateListener>>,
    error_listeners: Mutex<Vec<ErrorListener>>,
    latest: Mutex<Option<PositionFix>>,
}

impl Shared {
    fn publish_fix(&self, fix: &PositionFix) -> usize {
        *lock(&self.latest) = Some(*fix);
        // Snapshot so listeners may register further listeners.
        let listeners = lock(&self.update_listeners).clone();
        dispatch("update", &listeners, |listener| listener(fix))
    }

    fn publish_error(&self, err: &PositionError) -> usize {
        let listeners = lock(&self.error_listeners).clone();
        dispatch("error", &listeners, |listener| listener(err))
    }
}

/// Invokes every listener in order and returns how many failed.
fn dispatch<L>(kind: &'static str, listeners: &[L], call: impl Fn(&L) -> ListenerResult) -> usize {
    let mut failures = 0;
    for (index, listener) in listeners.iter().enumerate() {
        let reason = match catch_unwind(AssertUnwindSafe(|| call(listener))) {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => e.to_string(),
            Err(panic) => panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "listener panicked".to_owned()),
        };
        failures += 1;
        let err = TrackerError::ListenerFailure {
            kind,
            index,
            reason,
        };
        tracing::error!(error = %err, "position listener failed");
    }
    failures
}

pub struct PositionProvider {
    source: Arc<dyn PositionSource>,
    shared: Arc<Shared>,
    watches: Mutex<HashMap<u64, JoinHandle<()>>>,
    next_watch_id: AtomicU64,
}

impl PositionProvider {
    #[must_use]
    pub fn new(source: Arc<dyn PositionSource>) -> Self {
        Self {
            source,
            shared: Arc::new(Shared::default()),
            watches: Mutex::new(HashMap::new()),
            next_watch_id: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub fn is_supported(&self) -> bool {
        self.source.is_supported()
    }

    /// The most recent successful fix from any read or watch.
    #[must_use]
    pub fn current_position(&self) -> Option<PositionFix> {
        *lock(&self.shared.latest)
    }

    pub fn on_update<F>(&self, listener: F)
    where
        F: Fn(&PositionFix) -> ListenerResult + Send + Sync + 'static,
    {
        lock(&self.shared.update_listeners).push(Arc::new(listener));
    }

    pub fn on_error<F>(&self, listener: F)
    where
        F: Fn(&PositionError) -> ListenerResult + Send + Sync + 'static,
    {
        lock(&self.shared.error_listeners).push(Arc::new(listener));
    }

    /// Reads the position once.
    ///
    /// # Errors
    ///
    /// [`PositionError::Unsupported`] without a platform capability,
    /// otherwise whatever the platform reports. A read that outlives
    /// `options.timeout` fails with [`PositionError::Timeout`].
    pub async fn get_once(&self, options: PositionOptions) -> Result<PositionFix, PositionError> {
        let result = if self.source.is_supported() {
            tokio::time::timeout(options.timeout, self.source.current_position(options))
                .await
                .unwrap_or(Err(PositionError::Timeout))
        } else {
            Err(PositionError::Unsupported)
        };

        match &result {
            Ok(fix) => {
                self.shared.publish_fix(fix);
            }
            Err(err) => {
                tracing::debug!(
                    error = %err,
                    high_accuracy = options.high_accuracy,
                    "position read failed"
                );
                self.shared.publish_error(err);
            }
        }
        result
    }

    /// Starts continuous reporting to the registered listeners. Must be
    /// called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`PositionError::Unsupported`] without a platform capability.
    pub fn watch(&self, options: PositionOptions) -> Result<WatchHandle, PositionError> {
        self.spawn_watch(options, None)
    }

    /// Like [`PositionProvider::watch`], additionally publishing each fix to
    /// `forward`. The channel keeps only the newest fix, so a slow consumer
    /// skips superseded ones. The watch ends once the receiver is gone.
    pub(crate) fn watch_forwarding(
        &self,
        options: PositionOptions,
        forward: watch::Sender<Option<PositionFix>>,
    ) -> Result<WatchHandle, PositionError> {
        self.spawn_watch(options, Some(forward))
    }

    fn spawn_watch(
        &self,
        options: PositionOptions,
        forward: Option<watch::Sender<Option<PositionFix>>>,
    ) -> Result<WatchHandle, PositionError> {
        if !self.source.is_supported() {
            return Err(PositionError::Unsupported);
        }

        let id = self.next_watch_id.fetch_add(1, Ordering::Relaxed);
        let mut events = self.source.watch_position(options);
        let shared = Arc::clone(&self.shared);

        let task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                match event {
                    Ok(fix) => {
                        shared.publish_fix(&fix);
                        if let Some(tx) = &forward {
                            if tx.send(Some(fix)).is_err() {
                                break;
                            }
                        }
                    }
                    Err(err) => {
                        tracing::debug!(watch_id = id, error = %err, "watch reported an error");
                        shared.publish_error(&err);
                    }
                }
            }
            tracing::debug!(watch_id = id, "watch stream ended");
        });

        lock(&self.watches).insert(id, task);
        tracing::debug!(watch_id = id, "started position watch");
        Ok(WatchHandle(id))
    }

    /// Stops a watch. Returns `false` if it was already cancelled or never
    /// existed.
    pub fn cancel_watch(&self, handle: WatchHandle) -> bool {
        match lock(&self.watches).remove(&handle.0) {
            Some(task) => {
                task.abort();
                tracing::debug!(watch_id = handle.0, "cancelled position watch");
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn active_watches(&self) -> usize {
        lock(&self.watches)
            .values()
            .filter(|task| !task.is_finished())
            .count()
    }
}

impl Drop for PositionProvider {
    fn drop(&mut self) {
        for (_, task) in lock(&self.watches).drain() {
            task.abort();
        }
    }
}
