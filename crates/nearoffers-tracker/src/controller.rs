//! The proximity update loop.
//!
//! [`ProximityController`] owns the current fix, the search radius, the
//! auto-update timer and the notifications flag. Every fix that reaches it,
//! whether from a manual refresh, the timer or a follow watch, goes through
//! [`ProximityController::on_fix_available`]: persist, recenter, query, render,
//! alert.
//!
//! State sits behind a short `Mutex` that is never held across an `.await`.
//! Spawned tasks hold a `Weak` so they never keep a disposed controller alive.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use nearoffers_core::{Offer, PositionFix, SearchRadius};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::backend::OfferSource;
use crate::error::{PositionError, TrackerError};
use crate::location_store::LocationStore;
use crate::lock;
use crate::map::{LocationStatus, MapRenderer, BUSINESS_ZOOM, USER_ZOOM};
use crate::notify::{NotificationGate, PermissionState};
use crate::position::{PositionOptions, PositionProvider, WatchHandle};

pub const DEFAULT_AUTO_UPDATE_INTERVAL: Duration = Duration::from_secs(30);

const REQUESTING_LOCATION: &str = "Requesting location access...";
const LOCATION_DETECTED: &str = "Location detected";
const SHOWING_LAST_KNOWN: &str = "Showing last known location";

/// Collaborators injected into the controller.
pub struct ControllerDeps {
    pub positions: Arc<PositionProvider>,
    pub offers: Arc<dyn OfferSource>,
    pub map: Arc<dyn MapRenderer>,
    pub gate: Arc<NotificationGate>,
    pub locations: Arc<LocationStore>,
}

/// What happened to one nearby-offers query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    /// No fix yet; nothing was queried.
    NoFix,
    /// The query failed and was logged.
    Failed,
    /// A newer response was already on screen; this one was dropped.
    Stale,
    Rendered { offers: usize, alerts: usize },
}

/// Result of the notifications toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationToggle {
    Enabled,
    Disabled,
    /// The user blocked alerts at the platform level.
    Blocked,
    Unsupported,
}

struct Follow {
    watch: WatchHandle,
    pump: JoinHandle<()>,
}

struct State {
    current_fix: Option<PositionFix>,
    radius: SearchRadius,
    notifications_enabled: bool,
    auto_update_enabled: bool,
    auto_update_interval: Duration,
    auto_update: Option<JoinHandle<()>>,
    follow: Option<Follow>,
    next_seq: u64,
    last_rendered_seq: u64,
}

pub struct ProximityController {
    positions: Arc<PositionProvider>,
    offers: Arc<dyn OfferSource>,
    map: Arc<dyn MapRenderer>,
    gate: Arc<NotificationGate>,
    locations: Arc<LocationStore>,
    /// Capture time of the newest persisted fix; also serializes writes.
    newest_persisted_ms: Arc<Mutex<i64>>,
    state: Mutex<State>,
}

impl ProximityController {
    #[must_use]
    pub fn create(deps: ControllerDeps, radius: SearchRadius) -> Arc<Self> {
        deps.map.set_radius_label(radius);
        deps.map.set_notifications_enabled(false);
        Arc::new(Self {
            positions: deps.positions,
            offers: deps.offers,
            map: deps.map,
            gate: deps.gate,
            locations: deps.locations,
            newest_persisted_ms: Arc::new(Mutex::new(i64::MIN)),
            state: Mutex::new(State {
                current_fix: None,
                radius,
                notifications_enabled: false,
                auto_update_enabled: false,
                auto_update_interval: DEFAULT_AUTO_UPDATE_INTERVAL,
                auto_update: None,
                follow: None,
                next_seq: 0,
                last_rendered_seq: 0,
            }),
        })
    }

    #[must_use]
    pub fn current_fix(&self) -> Option<PositionFix> {
        lock(&self.state).current_fix
    }

    #[must_use]
    pub fn radius(&self) -> SearchRadius {
        lock(&self.state).radius
    }

    #[must_use]
    pub fn notifications_enabled(&self) -> bool {
        lock(&self.state).notifications_enabled
    }

    #[must_use]
    pub fn auto_update_interval(&self) -> Duration {
        lock(&self.state).auto_update_interval
    }

    #[must_use]
    pub fn is_auto_updating(&self) -> bool {
        lock(&self.state)
            .auto_update
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    #[must_use]
    pub fn is_following(&self) -> bool {
        lock(&self.state).follow.is_some()
    }

    /// Handles a new fix: persist it, recenter on it, query and render
    /// offers, alert on close ones, reload business markers.
    pub async fn on_fix_available(&self, fix: PositionFix) -> QueryOutcome {
        lock(&self.state).current_fix = Some(fix);
        self.persist(fix).await;

        self.map.set_view(fix.coordinate, USER_ZOOM);
        self.map.show_user(&fix);

        let outcome = self.refresh_offers().await;
        self.refresh_businesses().await;
        outcome
    }

    /// Writes `fix` as the last known location on the blocking pool. A fix
    /// older than one already written is skipped.
    async fn persist(&self, fix: PositionFix) {
        let locations = Arc::clone(&self.locations);
        let newest = Arc::clone(&self.newest_persisted_ms);
        let written = tokio::task::spawn_blocking(move || {
            let mut newest = lock(&newest);
            if fix.captured_at_ms < *newest {
                return Ok(());
            }
            locations.save(&fix)?;
            *newest = fix.captured_at_ms;
            Ok::<_, TrackerError>(())
        })
        .await;

        match written {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "could not persist last known location");
            }
            Err(err) => tracing::warn!(error = %err, "location persistence task failed"),
        }
    }

    /// Queries offers around the current fix with the current radius.
    ///
    /// Each query is stamped; a response that arrives after a newer one was
    /// rendered is discarded.
    pub async fn refresh_offers(&self) -> QueryOutcome {
        let (fix, radius, seq) = {
            let mut state = lock(&self.state);
            let Some(fix) = state.current_fix else {
                return QueryOutcome::NoFix;
            };
            state.next_seq += 1;
            (fix, state.radius, state.next_seq)
        };

        let offers = match self.offers.nearby_offers(fix.coordinate, radius).await {
            Ok(offers) => offers,
            Err(e) => {
                let err = TrackerError::from(e);
                tracing::warn!(
                    error = %err,
                    seq,
                    radius = radius.meters(),
                    "nearby offers query failed"
                );
                return QueryOutcome::Failed;
            }
        };

        let notify = {
            let mut state = lock(&self.state);
            if seq < state.last_rendered_seq {
                tracing::debug!(
                    seq,
                    rendered = state.last_rendered_seq,
                    "discarding stale offers response"
                );
                return QueryOutcome::Stale;
            }
            state.last_rendered_seq = seq;
            state.notifications_enabled
        };

        self.map.render_offers(&offers);

        let alerts = if notify {
            self.check_proximity(&offers)
        } else {
            0
        };
        tracing::debug!(seq, offers = offers.len(), alerts, "rendered nearby offers");
        QueryOutcome::Rendered {
            offers: offers.len(),
            alerts,
        }
    }

    fn check_proximity(&self, offers: &[Offer]) -> usize {
        offers
            .iter()
            .filter(|offer| offer.is_in_proximity())
            .filter(|offer| self.gate.notify_proximity(offer, offer.distance_meters))
            .count()
    }

    /// Reloads business markers. Returns how many were rendered, or `None`
    /// if the query failed.
    pub async fn refresh_businesses(&self) -> Option<usize> {
        match self.offers.businesses().await {
            Ok(businesses) => {
                self.map.render_businesses(&businesses);
                Some(businesses.len())
            }
            Err(e) => {
                let err = TrackerError::from(e);
                tracing::warn!(error = %err, "businesses query failed");
                None
            }
        }
    }

    /// Changes the search radius and re-queries right away when a fix exists.
    pub async fn set_radius(&self, radius: SearchRadius) -> QueryOutcome {
        lock(&self.state).radius = radius;
        self.map.set_radius_label(radius);
        self.refresh_offers().await
    }

    /// One high-accuracy read with status text. On success the fix is fed
    /// through [`ProximityController::on_fix_available`] and, when the
    /// auto-update toggle is on, the timer is (re)started.
    ///
    /// # Errors
    ///
    /// Returns the [`PositionError`] from the read after showing it as status.
    pub async fn refresh_location(self: &Arc<Self>) -> Result<PositionFix, PositionError> {
        self.map.set_status(&LocationStatus::warning(REQUESTING_LOCATION));

        match self.positions.get_once(PositionOptions::one_shot()).await {
            Ok(fix) => {
                self.on_fix_available(fix).await;
                self.map.set_status(&LocationStatus::success(LOCATION_DETECTED));
                let (enabled, interval) = {
                    let state = lock(&self.state);
                    (state.auto_update_enabled, state.auto_update_interval)
                };
                if enabled {
                    self.start_auto_update(interval);
                }
                Ok(fix)
            }
            Err(err) => {
                tracing::warn!(error = %err, "location refresh failed");
                self.map.set_status(&LocationStatus::error(err.status_message()));
                Err(err)
            }
        }
    }

    /// Shows the persisted location if it is still fresh. Returns `None`
    /// (and does nothing) otherwise.
    pub async fn resume_last_location(&self) -> Option<QueryOutcome> {
        let fix = self.locations.fresh_fix()?;
        tracing::info!(coordinate = %fix.coordinate, "resuming from last known location");
        self.map.set_status(&LocationStatus::warning(SHOWING_LAST_KNOWN));
        Some(self.on_fix_available(fix).await)
    }

    /// Starts the recurring re-read, replacing any running timer. The first
    /// tick fires one `interval` from now. Ticks without a current fix are
    /// skipped; failed reads are logged and the timer keeps going.
    pub fn start_auto_update(self: &Arc<Self>, interval: Duration) {
        let interval = interval.max(Duration::from_millis(1));
        let weak = Arc::downgrade(self);
        let task = tokio::spawn(auto_update_loop(weak, interval));

        let previous = {
            let mut state = lock(&self.state);
            state.auto_update_interval = interval;
            state.auto_update.replace(task)
        };
        if let Some(previous) = previous {
            previous.abort();
            tracing::debug!("replaced running auto-update timer");
        }
        tracing::info!(?interval, "auto-update started");
    }

    /// Stops the timer. Returns `false` if none was running.
    pub fn stop_auto_update(&self) -> bool {
        let Some(task) = lock(&self.state).auto_update.take() else {
            return false;
        };
        task.abort();
        tracing::info!("auto-update stopped");
        true
    }

    /// The auto-update toggle.
    pub fn set_auto_update(self: &Arc<Self>, enabled: bool) {
        let interval = {
            let mut state = lock(&self.state);
            state.auto_update_enabled = enabled;
            state.auto_update_interval
        };
        if enabled {
            self.start_auto_update(interval);
        } else {
            self.stop_auto_update();
        }
    }

    async fn auto_update_tick(&self) {
        if self.current_fix().is_none() {
            tracing::debug!("auto-update tick skipped; no current fix");
            return;
        }
        match self.positions.get_once(PositionOptions::auto_update()).await {
            Ok(fix) => {
                self.on_fix_available(fix).await;
            }
            Err(err) => tracing::warn!(error = %err, "auto-update position read failed"),
        }
    }

    /// The notifications toggle.
    ///
    /// Prompts for permission while the platform is undecided, flips the flag
    /// once granted and reports `Blocked` when the user denied alerts.
    pub async fn toggle_notifications(&self) -> NotificationToggle {
        if !self.gate.is_supported() {
            return NotificationToggle::Unsupported;
        }

        let enabled = match self.gate.platform_permission() {
            PermissionState::Default => {
                self.gate.request_permission().await == PermissionState::Granted
            }
            PermissionState::Granted => !self.notifications_enabled(),
            PermissionState::Denied => {
                self.apply_notifications(false);
                return NotificationToggle::Blocked;
            }
        };

        self.apply_notifications(enabled);
        if enabled {
            NotificationToggle::Enabled
        } else {
            NotificationToggle::Disabled
        }
    }

    /// Sets the notifications flag directly. Enabling only sticks while the
    /// gate can actually notify; returns the resulting flag.
    pub fn set_notifications_enabled(&self, enabled: bool) -> bool {
        let enabled = enabled && self.gate.can_notify();
        self.apply_notifications(enabled);
        enabled
    }

    fn apply_notifications(&self, enabled: bool) {
        lock(&self.state).notifications_enabled = enabled;
        self.map.set_notifications_enabled(enabled);
        tracing::info!(enabled, "proximity notifications toggled");
    }

    /// Routes a click on a proximity alert: focus the app, recenter on the
    /// business, close the alert.
    pub fn handle_alert_click(&self, tag: &str) -> bool {
        self.gate.handle_click(tag, |target| self.map.set_view(target, BUSINESS_ZOOM))
    }

    /// Recenters on an offer's business, as a click in the offer list does.
    pub fn focus_business(&self, offer: &Offer) {
        self.map.set_view(offer.business_coordinate, BUSINESS_ZOOM);
    }

    /// Switches to continuous tracking. Fixes are handled one at a time in
    /// arrival order; fixes that arrive while one is being handled collapse
    /// into the newest. Replaces an earlier follow.
    ///
    /// # Errors
    ///
    /// Returns [`PositionError::Unsupported`] without a platform capability.
    pub fn follow(self: &Arc<Self>) -> Result<WatchHandle, PositionError> {
        self.unfollow();

        let (tx, mut rx) = watch::channel(None);
        let handle = self
            .positions
            .watch_forwarding(PositionOptions::continuous(), tx)?;

        let weak = Arc::downgrade(self);
        let pump = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let Some(fix) = *rx.borrow_and_update() else {
                    continue;
                };
                let Some(controller) = weak.upgrade() else {
                    break;
                };
                controller.on_fix_available(fix).await;
            }
        });

        lock(&self.state).follow = Some(Follow { watch: handle, pump });
        Ok(handle)
    }

    /// Stops continuous tracking. Returns `false` if not following.
    pub fn unfollow(&self) -> bool {
        let Some(follow) = lock(&self.state).follow.take() else {
            return false;
        };
        self.positions.cancel_watch(follow.watch);
        follow.pump.abort();
        true
    }

    /// Cancels the timer and any watch. In-flight queries are not aborted.
    pub fn dispose(&self) {
        self.stop_auto_update();
        self.unfollow();
    }
}

impl Drop for ProximityController {
    fn drop(&mut self) {
        self.dispose();
    }
}

async fn auto_update_loop(controller: Weak<ProximityController>, interval: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(controller) = controller.upgrade() else {
            break;
        };
        tracing::debug!("auto-update tick");
        controller.auto_update_tick().await;
    }
}
