use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod query;
mod terminal;
mod track;

#[derive(Debug, Parser)]
#[command(name = "nearoffers")]
#[command(about = "Nearby offers on a live position, from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Follow a simulated position and alert on offers close by
    Track(TrackArgs),
    /// List offers around a point once
    Offers {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,
        /// Search radius in meters (snapped to 100 m steps, 100 to 5000)
        #[arg(long)]
        radius: Option<u32>,
    },
    /// List every business with a map position
    Businesses,
    /// Great-circle distance between two points
    Distance {
        #[arg(allow_negative_numbers = true)]
        lat1: f64,
        #[arg(allow_negative_numbers = true)]
        lng1: f64,
        #[arg(allow_negative_numbers = true)]
        lat2: f64,
        #[arg(allow_negative_numbers = true)]
        lng2: f64,
    },
    /// Show or clear the persisted last known location
    LastLocation {
        /// Delete the stored location
        #[arg(long)]
        clear: bool,
        /// Freshness window in seconds (defaults to the configured one)
        #[arg(long)]
        max_age_secs: Option<u64>,
    },
}

#[derive(Debug, Args)]
pub(crate) struct TrackArgs {
    /// Starting latitude of the simulated device
    #[arg(long, allow_negative_numbers = true)]
    pub(crate) lat: f64,
    /// Starting longitude of the simulated device
    #[arg(long, allow_negative_numbers = true)]
    pub(crate) lng: f64,
    /// Search radius in meters (snapped to 100 m steps, 100 to 5000)
    #[arg(long)]
    pub(crate) radius: Option<u32>,
    /// Auto-update period in seconds (defaults to the configured one)
    #[arg(long)]
    pub(crate) interval_secs: Option<u64>,
    /// Re-read the position periodically
    #[arg(long)]
    pub(crate) auto_update: bool,
    /// Turn proximity alerts on at start
    #[arg(long)]
    pub(crate) notify: bool,
    /// Answer the permission prompt with "deny"
    #[arg(long)]
    pub(crate) deny_notifications: bool,
    /// Scatter simulated fixes up to this many meters
    #[arg(long, default_value_t = 0.0, value_parser = parse_jitter_m)]
    pub(crate) jitter_m: f64,
    /// Track continuously instead of polling
    #[arg(long)]
    pub(crate) follow: bool,
    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    pub(crate) duration_secs: Option<u64>,
}

fn parse_jitter_m(raw: &str) -> Result<f64, String> {
    let meters: f64 = raw.parse().map_err(|e| format!("{e}"))?;
    if meters.is_finite() && meters >= 0.0 {
        Ok(meters)
    } else {
        Err(format!("expected a finite, non-negative distance, got {raw}"))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = nearoffers_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Track(args)) => track::run_track(&config, &args).await?,
        Some(Commands::Offers { lat, lng, radius }) => {
            query::run_offers(&config, lat, lng, radius).await?;
        }
        Some(Commands::Businesses) => query::run_businesses(&config).await?,
        Some(Commands::Distance {
            lat1,
            lng1,
            lat2,
            lng2,
        }) => query::run_distance(lat1, lng1, lat2, lng2),
        Some(Commands::LastLocation {
            clear,
            max_age_secs,
        }) => query::run_last_location(&config, clear, max_age_secs)?,
        None => println!("nothing to do; try `nearoffers --help`"),
    }

    Ok(())
}
