//! Map and alert capabilities rendered as plain terminal lines.

use std::sync::Mutex;

use futures::future::{BoxFuture, FutureExt};
use nearoffers_core::{Business, Coordinate, Offer, PositionFix, SearchRadius};
use nearoffers_tracker::map::{
    describe_business, describe_offer, describe_user, NO_OFFERS_HINT, NO_OFFERS_MESSAGE,
};
use nearoffers_tracker::{
    Alerter, LocationStatus, MapRenderer, PermissionState, ProximityAlert, StatusLevel,
};

#[derive(Debug, Default)]
pub(crate) struct TerminalMap;

impl MapRenderer for TerminalMap {
    fn set_view(&self, center: Coordinate, zoom: u8) {
        tracing::debug!(%center, zoom, "map view");
    }

    fn show_user(&self, fix: &PositionFix) {
        println!("@ {}", describe_user(fix));
    }

    fn render_offers(&self, offers: &[Offer]) {
        if offers.is_empty() {
            println!("  {NO_OFFERS_MESSAGE}. {NO_OFFERS_HINT}.");
            return;
        }
        println!("  {} offers nearby", offers.len());
        for offer in offers {
            println!("  - {}", describe_offer(offer));
        }
    }

    fn render_businesses(&self, businesses: &[Business]) {
        tracing::debug!(count = businesses.len(), "business markers refreshed");
        for business in businesses {
            tracing::trace!("{}", describe_business(business));
        }
    }

    fn set_status(&self, status: &LocationStatus) {
        let tag = match status.level {
            StatusLevel::Success => "ok",
            StatusLevel::Warning => "..",
            StatusLevel::Error => "!!",
        };
        println!("[{tag}] {status}");
    }

    fn set_radius_label(&self, radius: SearchRadius) {
        println!("search radius: {}", radius.label());
    }

    fn set_notifications_enabled(&self, enabled: bool) {
        println!("proximity alerts: {}", if enabled { "on" } else { "off" });
    }
}

/// Prints alerts to stdout. The permission prompt is answered up front.
pub(crate) struct TerminalAlerter {
    permission: Mutex<PermissionState>,
    answer: PermissionState,
}

impl TerminalAlerter {
    pub(crate) fn new(allow: bool) -> Self {
        Self {
            permission: Mutex::new(PermissionState::Default),
            answer: if allow {
                PermissionState::Granted
            } else {
                PermissionState::Denied
            },
        }
    }

    fn current(&self) -> PermissionState {
        *self
            .permission
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Alerter for TerminalAlerter {
    fn is_supported(&self) -> bool {
        true
    }

    fn permission(&self) -> PermissionState {
        self.current()
    }

    fn request_permission(&self) -> BoxFuture<'_, PermissionState> {
        *self
            .permission
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = self.answer;
        println!("notification permission: {:?}", self.answer);
        futures::future::ready(self.answer).boxed()
    }

    fn show(&self, alert: &ProximityAlert) {
        println!("\x07>> {}: {}", alert.title, alert.body);
    }

    fn dismiss(&self, tag: &str) {
        tracing::debug!(%tag, "alert dismissed");
    }
}
