//! Offers API response types.
//!
//! These model the JSON bodies exactly as the backend sends them; see
//! [`crate::normalize`] for the conversion into `nearoffers_core` types.

use serde::{Deserialize, Deserializer};

/// Body of `GET /api/nearby_offers`.
#[derive(Debug, Deserialize)]
pub struct NearbyOffersResponse {
    pub offers: Vec<OfferPayload>,
    #[serde(default)]
    pub count: Option<u64>,
}

/// One entry of the nearby-offers list. Offers come pre-joined with the
/// owning business and sorted by distance, closest first.
#[derive(Debug, Deserialize)]
pub struct OfferPayload {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub discount_percentage: i64,
    #[serde(default)]
    pub valid_until: Option<String>,
    pub business_name: String,
    #[serde(default)]
    pub business_address: Option<String>,
    #[serde(default)]
    pub business_phone: Option<String>,
    pub business_lat: f64,
    pub business_lng: f64,
    /// Meters from the queried point, rounded to centimeters by the server.
    pub distance: f64,
}

/// Body of `GET /api/businesses`.
#[derive(Debug, Deserialize)]
pub struct BusinessesResponse {
    pub businesses: Vec<BusinessPayload>,
}

#[derive(Debug, Deserialize)]
pub struct BusinessPayload {
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub offers_count: u32,
}

/// Identifiers arrive as JSON strings from some deployments and as numbers
/// from others.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(serde_json::Number),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawId::deserialize(deserializer).map(String::from)
}

fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<RawId>::deserialize(deserializer).map(|id| id.map(String::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offer_id_accepts_string_and_number() {
        let base = serde_json::json!({
            "title": "t",
            "discount_percentage": 10,
            "business_name": "b",
            "business_lat": 1.0,
            "business_lng": 2.0,
            "distance": 3.0
        });

        let mut with_string = base.clone();
        with_string["id"] = serde_json::json!("12");
        let offer: OfferPayload = serde_json::from_value(with_string).unwrap();
        assert_eq!(offer.id, "12");

        let mut with_number = base;
        with_number["id"] = serde_json::json!(12);
        let offer: OfferPayload = serde_json::from_value(with_number).unwrap();
        assert_eq!(offer.id, "12");
        assert_eq!(offer.description, "");
        assert!(offer.valid_until.is_none());
    }

    #[test]
    fn business_without_id_parses() {
        let business: BusinessPayload = serde_json::from_value(serde_json::json!({
            "name": "Bar Británico",
            "latitude": -34.627,
            "longitude": -58.367
        }))
        .unwrap();
        assert!(business.id.is_none());
        assert_eq!(business.offers_count, 0);
        assert_eq!(business.address, "");
    }
}
