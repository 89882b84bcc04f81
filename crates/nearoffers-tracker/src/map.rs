//! The map surface the controller drives, plus the text it shows.

use std::fmt;

use nearoffers_core::{format_distance, Business, Coordinate, Offer, PositionFix, SearchRadius};

/// Zoom used when centering on the user.
pub const USER_ZOOM: u8 = 15;
/// Zoom used when centering on a business (offer click, alert click).
pub const BUSINESS_ZOOM: u8 = 17;
/// Initial view before the first fix: central Buenos Aires.
pub const DEFAULT_CENTER: Coordinate = Coordinate::new(-34.6037, -58.3816);
pub const DEFAULT_ZOOM: u8 = 13;

pub const USER_MARKER_LABEL: &str = "Your location";
pub const NO_OFFERS_MESSAGE: &str = "No offers in your current area";
pub const NO_OFFERS_HINT: &str = "Try increasing the search radius";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Success,
    Warning,
    Error,
}

/// The one-line location status shown above the map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationStatus {
    pub message: String,
    pub level: StatusLevel,
}

impl LocationStatus {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: StatusLevel::Success,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: StatusLevel::Warning,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: StatusLevel::Error,
        }
    }
}

impl fmt::Display for LocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Rendering capability. Implementations must not block; the controller
/// calls these from its update path.
pub trait MapRenderer: Send + Sync {
    fn set_view(&self, center: Coordinate, zoom: u8);

    /// Replaces the user marker.
    fn show_user(&self, fix: &PositionFix);

    /// Replaces the offer list. An empty slice means "nothing nearby".
    fn render_offers(&self, offers: &[Offer]);

    /// Replaces every business marker.
    fn render_businesses(&self, businesses: &[Business]);

    fn set_status(&self, _status: &LocationStatus) {}

    fn set_radius_label(&self, _radius: SearchRadius) {}

    fn set_notifications_enabled(&self, _enabled: bool) {}
}

/// One entry of the offer list.
#[must_use]
pub fn describe_offer(offer: &Offer) -> String {
    let valid_until = offer.valid_until_date().map_or_else(
        || offer.valid_until.clone(),
        |date| date.format("%Y-%m-%d").to_string(),
    );
    format!(
        "{} [{}% OFF] {} at {} ({}, valid until {})",
        offer.title,
        offer.discount_percentage,
        offer.description,
        offer.business_name,
        format_distance(offer.distance_meters),
        valid_until
    )
}

/// Marker popup text for a business.
#[must_use]
pub fn describe_business(business: &Business) -> String {
    let mut text = format!(
        "{} - {} ({} active offers)",
        business.name, business.address, business.offers_count
    );
    if let Some(phone) = &business.phone {
        text.push_str(" tel. ");
        text.push_str(phone);
    }
    text
}

/// Popup text for the user marker.
#[must_use]
pub fn describe_user(fix: &PositionFix) -> String {
    format!(
        "{USER_MARKER_LABEL}: {} (±{}, {})",
        fix.coordinate,
        format_distance(fix.accuracy_meters),
        fix.accuracy_level()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer() -> Offer {
        Offer {
            id: "3".to_owned(),
            title: "2x1 coffee".to_owned(),
            description: "Any size".to_owned(),
            discount_percentage: 50,
            business_name: "Café Tortoni".to_owned(),
            business_address: Some("Av. de Mayo 825".to_owned()),
            business_phone: None,
            business_coordinate: Coordinate::new(-34.6087, -58.3787),
            distance_meters: 1234.0,
            valid_until: "2026-11-30T23:59:59".to_owned(),
        }
    }

    #[test]
    fn offer_line_carries_discount_distance_and_date() {
        assert_eq!(
            describe_offer(&offer()),
            "2x1 coffee [50% OFF] Any size at Café Tortoni (1.2km, valid until 2026-11-30)"
        );
    }

    #[test]
    fn offer_line_keeps_unparseable_date_verbatim() {
        let mut offer = offer();
        offer.valid_until = "soon".to_owned();
        assert!(describe_offer(&offer).ends_with("valid until soon)"));
    }

    #[test]
    fn business_popup_includes_phone_when_known() {
        let mut business = Business {
            id: Some("b1".to_owned()),
            name: "Café Tortoni".to_owned(),
            address: "Av. de Mayo 825".to_owned(),
            phone: None,
            coordinate: Coordinate::new(-34.6087, -58.3787),
            offers_count: 2,
        };
        assert_eq!(
            describe_business(&business),
            "Café Tortoni - Av. de Mayo 825 (2 active offers)"
        );
        business.phone = Some("011 4342-4328".to_owned());
        assert!(describe_business(&business).ends_with("tel. 011 4342-4328"));
    }

    #[test]
    fn user_popup_shows_coordinate_and_accuracy() {
        let fix = PositionFix::new(DEFAULT_CENTER, 8.0, 0);
        let text = describe_user(&fix);
        assert!(text.starts_with("Your location: Lat: -34.603700, Lng: -58.381600"));
        assert!(text.contains("±8m"));
    }

    #[test]
    fn status_constructors_set_level() {
        assert_eq!(LocationStatus::error("x").level, StatusLevel::Error);
        assert_eq!(LocationStatus::warning("x").level, StatusLevel::Warning);
        assert_eq!(LocationStatus::success("ok").to_string(), "ok");
    }
}
