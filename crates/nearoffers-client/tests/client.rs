//! Integration tests for `OffersClient` using wiremock HTTP mocks.

use nearoffers_client::{ClientError, OffersClient};
use nearoffers_core::{Coordinate, SearchRadius};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(base_url: &str) -> OffersClient {
    OffersClient::new(base_url, 30).expect("client construction should not fail")
}

const PALERMO: Coordinate = Coordinate::new(-34.5875, -58.4216);

#[tokio::test]
async fn nearby_offers_returns_parsed_offers() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "offers": [
            {
                "id": "1",
                "title": "Medialunas 2x1",
                "description": "Until noon",
                "discount_percentage": 50,
                "valid_until": "2026-12-31",
                "business_name": "Panadería Palermo",
                "business_address": "Honduras 4800",
                "business_phone": "",
                "business_lat": -34.5880,
                "business_lng": -58.4220,
                "distance": 65.32
            },
            {
                "id": 2,
                "title": "Happy hour",
                "description": "Beer",
                "discount_percentage": 30,
                "valid_until": "2026-11-01",
                "business_name": "Bar Norte",
                "business_lat": -34.5900,
                "business_lng": -58.4250,
                "distance": 412.0
            }
        ],
        "count": 2
    });

    Mock::given(method("GET"))
        .and(path("/api/nearby_offers"))
        .and(query_param("lat", "-34.5875"))
        .and(query_param("lng", "-58.4216"))
        .and(query_param("radius", "1500"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let offers = client
        .nearby_offers(PALERMO, SearchRadius::new(1_500))
        .await
        .expect("should parse offers");

    assert_eq!(offers.len(), 2);
    assert_eq!(offers[0].id, "1");
    assert_eq!(offers[0].business_name, "Panadería Palermo");
    assert_eq!(offers[0].business_address.as_deref(), Some("Honduras 4800"));
    assert_eq!(offers[0].business_phone, None);
    assert!(offers[0].is_in_proximity());
    assert_eq!(offers[1].id, "2");
    assert!(!offers[1].is_in_proximity());
}

#[tokio::test]
async fn nearby_offers_empty_list() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/nearby_offers"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"offers": [], "count": 0})),
        )
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let offers = client
        .nearby_offers(PALERMO, SearchRadius::default())
        .await
        .expect("empty list is fine");
    assert!(offers.is_empty());
}

#[tokio::test]
async fn error_envelope_with_bad_request_returns_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/nearby_offers"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(serde_json::json!({"error": "invalid location"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri()).with_retry(3, 0);
    let err = client
        .nearby_offers(Coordinate::new(0.0, 0.0), SearchRadius::default())
        .await
        .unwrap_err();

    match err {
        ClientError::Api { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "invalid location");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn error_envelope_with_ok_status_is_still_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/businesses"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"error": "db offline"})),
        )
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client.businesses().await.unwrap_err();
    assert!(
        err.to_string().contains("db offline"),
        "expected message to surface, got: {err}"
    );
}

#[tokio::test]
async fn server_error_is_retried_until_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/businesses"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(serde_json::json!({"error": "internal server error"})),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/businesses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "businesses": [
                {
                    "id": "4",
                    "name": "Librería Ateneo",
                    "address": "Av. Santa Fe 1860",
                    "phone": "011 4813-6052",
                    "latitude": -34.5959,
                    "longitude": -58.3941,
                    "offers_count": 3
                }
            ]
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri()).with_retry(2, 0);
    let businesses = client.businesses().await.expect("second attempt succeeds");

    assert_eq!(businesses.len(), 1);
    assert_eq!(businesses[0].name, "Librería Ateneo");
    assert_eq!(businesses[0].offers_count, 3);
    assert_eq!(businesses[0].coordinate, Coordinate::new(-34.5959, -58.3941));
}

#[tokio::test]
async fn bare_not_found_is_unexpected_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/businesses"))
        .respond_with(ResponseTemplate::new(404).set_body_string("<html>not found</html>"))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client.businesses().await.unwrap_err();
    assert!(matches!(err, ClientError::UnexpectedStatus { status: 404, .. }));
}

#[tokio::test]
async fn malformed_body_is_deserialize_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/nearby_offers"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"offers": "nope"})),
        )
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client
        .nearby_offers(PALERMO, SearchRadius::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Deserialize { .. }));
}
