use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::geo::{format_distance, Coordinate};

/// Distance, in meters, at or under which an offer qualifies for a
/// proximity alert.
pub const PROXIMITY_THRESHOLD_M: f64 = 100.0;

/// A promotional offer as served by the backend's nearby-offers query.
///
/// Offers are read-only on the client: a changed offer arrives as a new
/// value on the next query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Whole percent in `0..=100`.
    pub discount_percentage: u8,
    pub business_name: String,
    pub business_address: Option<String>,
    pub business_phone: Option<String>,
    pub business_coordinate: Coordinate,
    /// Distance from the fix the query was issued for.
    pub distance_meters: f64,
    /// Expiry as sent by the server, usually `YYYY-MM-DD`.
    pub valid_until: String,
}

impl Offer {
    /// Returns `true` when the offer is within [`PROXIMITY_THRESHOLD_M`].
    #[must_use]
    pub fn is_in_proximity(&self) -> bool {
        self.distance_meters <= PROXIMITY_THRESHOLD_M
    }

    /// Parses the leading `YYYY-MM-DD` of [`Offer::valid_until`].
    ///
    /// Returns `None` when the server sent something else.
    #[must_use]
    pub fn valid_until_date(&self) -> Option<NaiveDate> {
        let head = self.valid_until.get(..10)?;
        NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
    }

    /// Formatted distance, e.g. `"850m"`.
    #[must_use]
    pub fn distance_label(&self) -> String {
        format_distance(self.distance_meters)
    }
}

/// A business shown as a map marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Business {
    pub id: Option<String>,
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
    pub coordinate: Coordinate,
    /// Number of currently active offers.
    pub offers_count: u32,
}
