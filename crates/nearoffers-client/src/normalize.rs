//! Normalization of offers API payloads into `nearoffers_core` domain types.

use nearoffers_core::{Business, Coordinate, Offer};

use crate::types::{BusinessPayload, OfferPayload};

/// Clamps a server-sent discount into `0..=100`.
#[must_use]
pub fn clamp_discount(raw: i64) -> u8 {
    u8::try_from(raw.clamp(0, 100)).unwrap_or(0)
}

/// Converts an [`OfferPayload`] into an [`Offer`].
///
/// Negative or non-finite distances are treated as zero.
#[must_use]
pub fn normalize_offer(payload: OfferPayload) -> Offer {
    let distance_meters = if payload.distance.is_finite() {
        payload.distance.max(0.0)
    } else {
        0.0
    };

    Offer {
        id: payload.id,
        title: payload.title,
        description: payload.description,
        discount_percentage: clamp_discount(payload.discount_percentage),
        business_name: payload.business_name,
        business_address: payload.business_address.filter(|s| !s.trim().is_empty()),
        business_phone: payload.business_phone.filter(|s| !s.trim().is_empty()),
        business_coordinate: Coordinate::new(payload.business_lat, payload.business_lng),
        distance_meters,
        valid_until: payload.valid_until.unwrap_or_default(),
    }
}

/// Converts a [`BusinessPayload`] into a [`Business`].
#[must_use]
pub fn normalize_business(payload: BusinessPayload) -> Business {
    Business {
        id: payload.id,
        name: payload.name,
        address: payload.address,
        phone: payload.phone.filter(|s| !s.trim().is_empty()),
        coordinate: Coordinate::new(payload.latitude, payload.longitude),
        offers_count: payload.offers_count,
    }
}
