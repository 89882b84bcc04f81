pub mod app_config;
pub mod config;
pub mod error;
pub mod geo;
pub mod offers;
pub mod radius;

pub use app_config::AppConfig;
pub use config::{load_app_config, load_app_config_from_env};
pub use error::{ConfigError, CoreError};
pub use geo::{
    describe_accuracy, distance, format_distance, is_within, AccuracyLevel, Coordinate,
    PositionFix, EARTH_RADIUS_M,
};
pub use offers::{Business, Offer, PROXIMITY_THRESHOLD_M};
pub use radius::SearchRadius;
