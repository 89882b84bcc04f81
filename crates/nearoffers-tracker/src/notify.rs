//! Proximity alerts: permission handling and per-offer de-duplication.
//!
//! An offer alerts at most once per [`SUPPRESSION_WINDOW`]. Shown alerts
//! close themselves after [`AUTO_DISMISS_AFTER`] unless clicked first.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use nearoffers_core::{Coordinate, Offer};

use crate::clock::{duration_ms, Clock};
use crate::lock;

pub const SUPPRESSION_WINDOW: Duration = Duration::from_secs(5 * 60);
pub const AUTO_DISMISS_AFTER: Duration = Duration::from_secs(10);

pub const ALERT_TITLE: &str = "Offer near you!";
pub const ALERT_ICON: &str = "/favicon.ico";

/// Platform notification permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
    /// The user has not decided yet (or dismissed the prompt).
    Default,
}

/// Where the gate is in its once-per-session permission flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionPhase {
    Unrequested,
    /// A prompt is on screen.
    Requested,
    Granted,
    Denied,
    /// The prompt closed without a decision; a later request may prompt again.
    Default,
}

impl From<PermissionState> for PermissionPhase {
    fn from(state: PermissionState) -> Self {
        match state {
            PermissionState::Granted => PermissionPhase::Granted,
            PermissionState::Denied => PermissionPhase::Denied,
            PermissionState::Default => PermissionPhase::Default,
        }
    }
}

/// Payload handed to the platform alerter.
#[derive(Debug, Clone, PartialEq)]
pub struct ProximityAlert {
    /// De-duplication tag, `offer-<id>`.
    pub tag: String,
    pub title: String,
    pub body: String,
    pub icon: String,
    pub offer_id: String,
    /// Where the map goes when the alert is clicked.
    pub target: Coordinate,
}

impl ProximityAlert {
    #[must_use]
    pub fn tag_for(offer_id: &str) -> String {
        format!("offer-{offer_id}")
    }

    #[must_use]
    pub fn for_offer(offer: &Offer, distance_m: f64) -> Self {
        Self {
            tag: Self::tag_for(&offer.id),
            title: ALERT_TITLE.to_owned(),
            body: format!(
                "{} - {}% OFF at {} ({}m)",
                offer.title,
                offer.discount_percentage,
                offer.business_name,
                distance_m.round()
            ),
            icon: ALERT_ICON.to_owned(),
            offer_id: offer.id.clone(),
            target: offer.business_coordinate,
        }
    }
}

/// The platform's native alert capability.
pub trait Alerter: Send + Sync {
    fn is_supported(&self) -> bool;

    /// Current platform permission, without prompting.
    fn permission(&self) -> PermissionState;

    /// Prompts the user.
    fn request_permission(&self) -> BoxFuture<'_, PermissionState>;

    fn show(&self, alert: &ProximityAlert);

    /// Closes the alert with `tag` if it is still on screen.
    fn dismiss(&self, tag: &str);

    /// Brings the application window to the foreground.
    fn focus_app(&self) {}
}

/// A suppression entry created when an alert fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRecord {
    pub offer_id: String,
    pub suppressed_until_ms: i64,
}

#[derive(Debug, Clone, Copy)]
struct ActiveAlert {
    target: Coordinate,
    generation: u64,
}

struct GateInner {
    phase: PermissionPhase,
    /// offer id → suppressed-until (epoch ms)
    records: HashMap<String, i64>,
    /// tag → alert still on screen
    active: HashMap<String, ActiveAlert>,
    generation: u64,
}

impl GateInner {
    fn purge_expired(&mut self, now_ms: i64) {
        self.records.retain(|_, until| *until > now_ms);
    }
}

pub struct NotificationGate {
    alerter: Arc<dyn Alerter>,
    clock: Arc<dyn Clock>,
    inner: Arc<Mutex<GateInner>>,
    suppression_window: Duration,
    auto_dismiss_after: Duration,
}

impl NotificationGate {
    #[must_use]
    pub fn new(alerter: Arc<dyn Alerter>, clock: Arc<dyn Clock>) -> Self {
        Self {
            alerter,
            clock,
            inner: Arc::new(Mutex::new(GateInner {
                phase: PermissionPhase::Unrequested,
                records: HashMap::new(),
                active: HashMap::new(),
                generation: 0,
            })),
            suppression_window: SUPPRESSION_WINDOW,
            auto_dismiss_after: AUTO_DISMISS_AFTER,
        }
    }

    #[must_use]
    pub fn is_supported(&self) -> bool {
        self.alerter.is_supported()
    }

    #[must_use]
    pub fn platform_permission(&self) -> PermissionState {
        self.alerter.permission()
    }

    #[must_use]
    pub fn phase(&self) -> PermissionPhase {
        lock(&self.inner).phase
    }

    /// Asks for permission at most once per session.
    ///
    /// Later calls return the platform's current state without prompting,
    /// unless the earlier prompt ended undecided. A platform that already
    /// has a decision is never prompted.
    pub async fn request_permission(&self) -> PermissionState {
        if !self.alerter.is_supported() {
            tracing::debug!("notifications unsupported; reporting permission as denied");
            return PermissionState::Denied;
        }

        {
            let mut inner = lock(&self.inner);
            match inner.phase {
                PermissionPhase::Unrequested | PermissionPhase::Default => {
                    let current = self.alerter.permission();
                    if current != PermissionState::Default {
                        inner.phase = current.into();
                        return current;
                    }
                    inner.phase = PermissionPhase::Requested;
                }
                PermissionPhase::Requested
                | PermissionPhase::Granted
                | PermissionPhase::Denied => return self.alerter.permission(),
            }
        }

        let state = self.alerter.request_permission().await;
        lock(&self.inner).phase = state.into();
        tracing::info!(?state, "notification permission resolved");
        state
    }

    /// `true` iff the platform supports alerts and permission is granted.
    #[must_use]
    pub fn can_notify(&self) -> bool {
        self.alerter.is_supported() && self.alerter.permission() == PermissionState::Granted
    }

    /// Raises a proximity alert for `offer` unless alerts are unavailable or
    /// the offer already alerted within the suppression window.
    ///
    /// Returns `true` when an alert was shown.
    pub fn notify_proximity(&self, offer: &Offer, distance_m: f64) -> bool {
        if !self.can_notify() {
            return false;
        }

        let now = self.clock.now_ms();
        let alert = ProximityAlert::for_offer(offer, distance_m);
        let generation = {
            let mut inner = lock(&self.inner);
            inner.purge_expired(now);
            if inner.records.contains_key(&offer.id) {
                tracing::debug!(offer_id = %offer.id, "proximity alert suppressed");
                return false;
            }
            inner.records.insert(
                offer.id.clone(),
                now.saturating_add(duration_ms(self.suppression_window)),
            );
            inner.generation += 1;
            let generation = inner.generation;
            inner.active.insert(
                alert.tag.clone(),
                ActiveAlert {
                    target: alert.target,
                    generation,
                },
            );
            generation
        };

        tracing::info!(
            offer_id = %offer.id,
            distance_m = distance_m.round(),
            business = %offer.business_name,
            "raising proximity alert"
        );
        self.alerter.show(&alert);
        self.schedule_dismiss(alert.tag, generation);
        true
    }

    fn schedule_dismiss(&self, tag: String, generation: u64) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(%tag, "no runtime; alert will not auto-dismiss");
            return;
        };
        let inner = Arc::clone(&self.inner);
        let alerter = Arc::clone(&self.alerter);
        let after = self.auto_dismiss_after;
        runtime.spawn(async move {
            tokio::time::sleep(after).await;
            let still_showing = {
                let mut inner = lock(&inner);
                let current = inner.active.get(&tag).map(|a| a.generation);
                if current == Some(generation) {
                    inner.active.remove(&tag);
                    true
                } else {
                    false
                }
            };
            if still_showing {
                alerter.dismiss(&tag);
            }
        });
    }

    /// Handles a click on the alert with `tag`: focuses the app, hands the
    /// business coordinate to `recenter`, then closes the alert. Returns
    /// `false` if the alert is no longer showing.
    pub fn handle_click(&self, tag: &str, recenter: impl FnOnce(Coordinate)) -> bool {
        let Some(active) = lock(&self.inner).active.remove(tag) else {
            return false;
        };
        self.alerter.focus_app();
        recenter(active.target);
        self.alerter.dismiss(tag);
        true
    }

    /// Drops every suppression record immediately.
    pub fn clear_history(&self) {
        lock(&self.inner).records.clear();
    }

    /// Unexpired suppression records, soonest expiry first.
    #[must_use]
    pub fn records(&self) -> Vec<NotificationRecord> {
        let now = self.clock.now_ms();
        let mut inner = lock(&self.inner);
        inner.purge_expired(now);
        let mut records: Vec<_> = inner
            .records
            .iter()
            .map(|(offer_id, until)| NotificationRecord {
                offer_id: offer_id.clone(),
                suppressed_until_ms: *until,
            })
            .collect();
        records.sort_by_key(|r| r.suppressed_until_ms);
        records
    }

    #[must_use]
    pub fn active_alerts(&self) -> usize {
        lock(&self.inner).active.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::FutureExt;

    use super::*;
    use crate::clock::ManualClock;

    struct FakeAlerter {
        supported: bool,
        permission: Mutex<PermissionState>,
        prompt_answer: PermissionState,
        prompts: AtomicUsize,
        shown: Mutex<Vec<ProximityAlert>>,
        dismissed: Mutex<Vec<String>>,
        focused: AtomicUsize,
    }

    impl FakeAlerter {
        fn with_permission(permission: PermissionState) -> Self {
            Self {
                supported: true,
                permission: Mutex::new(permission),
                prompt_answer: PermissionState::Granted,
                prompts: AtomicUsize::new(0),
                shown: Mutex::new(Vec::new()),
                dismissed: Mutex::new(Vec::new()),
                focused: AtomicUsize::new(0),
            }
        }
    }

    impl Alerter for FakeAlerter {
        fn is_supported(&self) -> bool {
            self.supported
        }

        fn permission(&self) -> PermissionState {
            *lock(&self.permission)
        }

        fn request_permission(&self) -> BoxFuture<'_, PermissionState> {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            *lock(&self.permission) = self.prompt_answer;
            futures::future::ready(self.prompt_answer).boxed()
        }

        fn show(&self, alert: &ProximityAlert) {
            lock(&self.shown).push(alert.clone());
        }

        fn dismiss(&self, tag: &str) {
            lock(&self.dismissed).push(tag.to_owned());
        }

        fn focus_app(&self) {
            self.focused.fetch_add(1, Ordering::SeqCst);
        }
    }

    const START: i64 = 1_760_000_000_000;

    fn gate(alerter: &Arc<FakeAlerter>) -> (NotificationGate, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(START));
        (NotificationGate::new(alerter.clone(), clock.clone()), clock)
    }

    fn offer(id: &str) -> Offer {
        Offer {
            id: id.to_owned(),
            title: "Pizza slice".to_owned(),
            description: "Muzzarella".to_owned(),
            discount_percentage: 25,
            business_name: "Güerrín".to_owned(),
            business_address: None,
            business_phone: None,
            business_coordinate: Coordinate::new(-34.6044, -58.3862),
            distance_meters: 42.4,
            valid_until: "2026-12-31".to_owned(),
        }
    }

    #[test]
    fn alert_payload_mentions_offer_details() {
        let alert = ProximityAlert::for_offer(&offer("9"), 42.4);
        assert_eq!(alert.tag, "offer-9");
        assert_eq!(alert.title, ALERT_TITLE);
        assert_eq!(alert.body, "Pizza slice - 25% OFF at Güerrín (42m)");
        assert_eq!(alert.icon, ALERT_ICON);
        assert_eq!(alert.target, Coordinate::new(-34.6044, -58.3862));
    }

    #[test]
    fn repeat_within_window_is_suppressed_until_expiry() {
        let alerter = Arc::new(FakeAlerter::with_permission(PermissionState::Granted));
        let (gate, clock) = gate(&alerter);

        assert!(gate.notify_proximity(&offer("1"), 40.0));
        clock.advance(Duration::from_secs(4 * 60));
        assert!(!gate.notify_proximity(&offer("1"), 40.0));
        assert_eq!(lock(&alerter.shown).len(), 1);

        clock.advance(Duration::from_secs(60));
        assert!(gate.notify_proximity(&offer("1"), 40.0));
        assert_eq!(lock(&alerter.shown).len(), 2);
    }

    #[test]
    fn different_offers_are_independent() {
        let alerter = Arc::new(FakeAlerter::with_permission(PermissionState::Granted));
        let (gate, _) = gate(&alerter);
        assert!(gate.notify_proximity(&offer("1"), 10.0));
        assert!(gate.notify_proximity(&offer("2"), 10.0));
        assert_eq!(gate.records().len(), 2);
    }

    #[test]
    fn denied_permission_never_notifies() {
        let alerter = Arc::new(FakeAlerter::with_permission(PermissionState::Denied));
        let (gate, _) = gate(&alerter);
        assert!(!gate.can_notify());
        assert!(!gate.notify_proximity(&offer("1"), 10.0));
        gate.clear_history();
        assert!(!gate.notify_proximity(&offer("1"), 10.0));
        assert!(lock(&alerter.shown).is_empty());
        assert!(gate.records().is_empty());
    }

    #[test]
    fn unsupported_platform_cannot_notify() {
        let mut fake = FakeAlerter::with_permission(PermissionState::Granted);
        fake.supported = false;
        let alerter = Arc::new(fake);
        let (gate, _) = gate(&alerter);
        assert!(!gate.can_notify());
        assert!(!gate.notify_proximity(&offer("1"), 10.0));
    }

    #[test]
    fn clear_history_lifts_suppression() {
        let alerter = Arc::new(FakeAlerter::with_permission(PermissionState::Granted));
        let (gate, _) = gate(&alerter);
        assert!(gate.notify_proximity(&offer("1"), 10.0));
        gate.clear_history();
        assert!(gate.notify_proximity(&offer("1"), 10.0));
    }

    #[test]
    fn records_expire_on_their_own() {
        let alerter = Arc::new(FakeAlerter::with_permission(PermissionState::Granted));
        let (gate, clock) = gate(&alerter);
        gate.notify_proximity(&offer("1"), 10.0);
        assert_eq!(
            gate.records(),
            vec![NotificationRecord {
                offer_id: "1".to_owned(),
                suppressed_until_ms: START + 300_000,
            }]
        );
        clock.advance(SUPPRESSION_WINDOW);
        assert!(gate.records().is_empty());
    }

    #[tokio::test]
    async fn permission_is_requested_once() {
        let alerter = Arc::new(FakeAlerter::with_permission(PermissionState::Default));
        let (gate, _) = gate(&alerter);
        assert_eq!(gate.phase(), PermissionPhase::Unrequested);

        assert_eq!(gate.request_permission().await, PermissionState::Granted);
        assert_eq!(gate.phase(), PermissionPhase::Granted);
        assert_eq!(gate.request_permission().await, PermissionState::Granted);
        assert_eq!(alerter.prompts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn undecided_prompt_may_be_repeated() {
        let mut fake = FakeAlerter::with_permission(PermissionState::Default);
        fake.prompt_answer = PermissionState::Default;
        let alerter = Arc::new(fake);
        let (gate, _) = gate(&alerter);

        assert_eq!(gate.request_permission().await, PermissionState::Default);
        assert_eq!(gate.phase(), PermissionPhase::Default);
        assert_eq!(gate.request_permission().await, PermissionState::Default);
        assert_eq!(alerter.prompts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn decided_platform_is_not_prompted() {
        let alerter = Arc::new(FakeAlerter::with_permission(PermissionState::Denied));
        let (gate, _) = gate(&alerter);
        assert_eq!(gate.request_permission().await, PermissionState::Denied);
        assert_eq!(gate.phase(), PermissionPhase::Denied);
        assert_eq!(alerter.prompts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn alert_auto_dismisses_after_ten_seconds() {
        let alerter = Arc::new(FakeAlerter::with_permission(PermissionState::Granted));
        let (gate, _) = gate(&alerter);
        assert!(gate.notify_proximity(&offer("5"), 80.0));
        assert_eq!(gate.active_alerts(), 1);

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert!(lock(&alerter.dismissed).is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(*lock(&alerter.dismissed), vec!["offer-5".to_owned()]);
        assert_eq!(gate.active_alerts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn click_focuses_recenters_then_dismisses_once() {
        let alerter = Arc::new(FakeAlerter::with_permission(PermissionState::Granted));
        let (gate, _) = gate(&alerter);
        gate.notify_proximity(&offer("5"), 80.0);

        let mut target = None;
        let handled = gate.handle_click("offer-5", |coordinate| {
            assert_eq!(alerter.focused.load(Ordering::SeqCst), 1, "focus comes first");
            assert!(lock(&alerter.dismissed).is_empty(), "alert still open while recentering");
            target = Some(coordinate);
        });
        assert!(handled);
        assert_eq!(target, Some(Coordinate::new(-34.6044, -58.3862)));
        assert_eq!(*lock(&alerter.dismissed), vec!["offer-5".to_owned()]);
        assert!(!gate.handle_click("offer-5", |_| panic!("alert already closed")));

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(
            *lock(&alerter.dismissed),
            vec!["offer-5".to_owned()],
            "auto-dismiss must not close an alert twice"
        );
    }
}
