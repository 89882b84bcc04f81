//! One-shot subcommands: offers, businesses, distance, last-location.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use nearoffers_client::OffersClient;
use nearoffers_core::{distance, format_distance, AppConfig, Coordinate, SearchRadius};
use nearoffers_tracker::map::{describe_business, describe_offer, NO_OFFERS_HINT, NO_OFFERS_MESSAGE};
use nearoffers_tracker::{Clock, JsonFileStore, LocationStore, SystemClock};

pub(crate) fn radius_or_default(config: &AppConfig, radius: Option<u32>) -> SearchRadius {
    radius.map_or(config.search_radius, SearchRadius::new)
}

/// Queries offers around `(lat, lng)` and prints them closest first.
///
/// # Errors
///
/// Returns an error if the coordinate is out of range or the query fails.
pub(crate) async fn run_offers(
    config: &AppConfig,
    lat: f64,
    lng: f64,
    radius: Option<u32>,
) -> anyhow::Result<()> {
    let center = Coordinate::checked(lat, lng)?;
    let radius = radius_or_default(config, radius);
    let client = OffersClient::from_app_config(config)?;

    let offers = client.nearby_offers(center, radius).await?;
    println!("{} offers within {}", offers.len(), radius.label());
    if offers.is_empty() {
        println!("{NO_OFFERS_MESSAGE}. {NO_OFFERS_HINT}.");
        return Ok(());
    }
    for offer in &offers {
        let marker = if offer.is_in_proximity() { "*" } else { " " };
        println!("{marker} {}", describe_offer(offer));
    }
    Ok(())
}

/// Prints every business marker.
///
/// # Errors
///
/// Returns an error if the query fails.
pub(crate) async fn run_businesses(config: &AppConfig) -> anyhow::Result<()> {
    let client = OffersClient::from_app_config(config)?;
    let businesses = client.businesses().await?;
    if businesses.is_empty() {
        println!("no businesses registered");
        return Ok(());
    }
    for business in &businesses {
        println!("{} | {}", describe_business(business), business.coordinate);
    }
    Ok(())
}

pub(crate) fn run_distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) {
    let meters = distance(Coordinate::new(lat1, lng1), Coordinate::new(lat2, lng2));
    println!("{} ({meters:.2} m)", format_distance(meters));
}

/// Shows the persisted location and its freshness, or deletes it.
///
/// # Errors
///
/// Returns an error if the store file cannot be read or written.
pub(crate) fn run_last_location(
    config: &AppConfig,
    clear: bool,
    max_age_secs: Option<u64>,
) -> anyhow::Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let max_age = max_age_secs.map_or(config.location_max_age(), Duration::from_secs);
    let store = Arc::new(JsonFileStore::in_dir(&config.data_dir));
    let locations = LocationStore::new(store, Arc::clone(&clock)).with_max_age(max_age);

    if clear {
        locations.clear()?;
        println!("last known location cleared");
        return Ok(());
    }

    let Some(stored) = locations.try_last_location()? else {
        println!("no location stored in {}", config.data_dir.display());
        return Ok(());
    };
    let fix = stored.to_fix();
    let captured = DateTime::<Utc>::from_timestamp_millis(fix.captured_at_ms)
        .map_or_else(|| fix.captured_at_ms.to_string(), |t| t.to_rfc3339());
    let age_secs = fix.age_ms(clock.now_ms()) / 1000;
    let freshness = if locations.is_location_fresh() {
        "fresh"
    } else {
        "stale"
    };

    println!("{}", fix.coordinate);
    println!(
        "accuracy: {} ({})",
        format_distance(fix.accuracy_meters),
        fix.accuracy_level()
    );
    println!("captured: {captured} ({age_secs}s ago, {freshness})");
    Ok(())
}
