//! The `track` subcommand: the full proximity loop on a simulated device.

use std::sync::Arc;
use std::time::Duration;

use nearoffers_client::OffersClient;
use nearoffers_core::{AppConfig, Coordinate};
use nearoffers_tracker::{
    Clock, ControllerDeps, JsonFileStore, LocationStore, NotificationGate, NotificationToggle,
    PositionProvider, ProximityController, SimulatedPositionSource, SystemClock,
};

use crate::terminal::{TerminalAlerter, TerminalMap};
use crate::TrackArgs;

/// Runs until Ctrl-C or `--duration-secs` elapses.
///
/// # Errors
///
/// Returns an error if the coordinate is out of range, the HTTP client
/// cannot be built or following is requested without a position source.
/// Failures inside the loop are logged and never end it.
pub(crate) async fn run_track(config: &AppConfig, args: &TrackArgs) -> anyhow::Result<()> {
    let start = Coordinate::checked(args.lat, args.lng)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let source = SimulatedPositionSource::new(start, Arc::clone(&clock)).with_jitter(args.jitter_m);
    let store = Arc::new(JsonFileStore::in_dir(&config.data_dir));
    let deps = ControllerDeps {
        positions: Arc::new(PositionProvider::new(Arc::new(source))),
        offers: Arc::new(OffersClient::from_app_config(config)?),
        map: Arc::new(TerminalMap),
        gate: Arc::new(NotificationGate::new(
            Arc::new(TerminalAlerter::new(!args.deny_notifications)),
            Arc::clone(&clock),
        )),
        locations: Arc::new(
            LocationStore::new(store, Arc::clone(&clock)).with_max_age(config.location_max_age()),
        ),
    };
    let radius = crate::query::radius_or_default(config, args.radius);
    let controller = ProximityController::create(deps, radius);

    if args.notify {
        match controller.toggle_notifications().await {
            NotificationToggle::Enabled => {}
            NotificationToggle::Disabled => println!("proximity alerts not enabled"),
            NotificationToggle::Blocked => {
                println!("notifications are blocked; allow them to get proximity alerts");
            }
            NotificationToggle::Unsupported => println!("notifications are not supported"),
        }
    }

    if let Err(err) = controller.refresh_location().await {
        tracing::warn!(error = %err, "initial location read failed");
        if controller.resume_last_location().await.is_none() {
            println!("no recent location to fall back on");
        }
    }

    if args.auto_update {
        let interval = args
            .interval_secs
            .map_or(config.auto_update_interval(), Duration::from_secs);
        controller.start_auto_update(interval);
    }
    if args.follow {
        controller.follow()?;
    }

    tracing::info!(
        lat = args.lat,
        lng = args.lng,
        radius = controller.radius().meters(),
        auto_update = controller.is_auto_updating(),
        following = controller.is_following(),
        "tracking"
    );

    match args.duration_secs {
        Some(secs) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        None => {
            tokio::signal::ctrl_c().await?;
        }
    }

    controller.dispose();
    println!("stopped tracking");
    Ok(())
}
