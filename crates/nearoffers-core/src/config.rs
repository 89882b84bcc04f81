use crate::app_config::AppConfig;
use crate::radius::SearchRadius;
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Parsing is decoupled from the real environment so tests can feed a plain
/// `HashMap` instead of mutating process state.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let api_base_url = or_default("NEAROFFERS_API_BASE_URL", "http://127.0.0.1:5000");
    if !(api_base_url.starts_with("http://") || api_base_url.starts_with("https://")) {
        return Err(invalid(
            "NEAROFFERS_API_BASE_URL",
            format!("expected an http(s) URL, got '{api_base_url}'"),
        ));
    }

    let log_level = or_default("NEAROFFERS_LOG_LEVEL", "info");
    let data_dir = PathBuf::from(or_default("NEAROFFERS_DATA_DIR", "./.nearoffers"));

    let request_timeout_secs = parse_u64("NEAROFFERS_REQUEST_TIMEOUT_SECS", "10")?;
    let user_agent = or_default("NEAROFFERS_USER_AGENT", "nearoffers/0.1 (proximity-client)");
    let max_retries = parse_u32("NEAROFFERS_MAX_RETRIES", "2")?;
    let retry_backoff_base_ms = parse_u64("NEAROFFERS_RETRY_BACKOFF_BASE_MS", "500")?;

    let search_radius = SearchRadius::new(parse_u32("NEAROFFERS_SEARCH_RADIUS_M", "1000")?);

    let auto_update_interval_secs = parse_u64("NEAROFFERS_AUTO_UPDATE_INTERVAL_SECS", "30")?;
    if auto_update_interval_secs == 0 {
        return Err(invalid(
            "NEAROFFERS_AUTO_UPDATE_INTERVAL_SECS",
            "must be greater than zero".to_string(),
        ));
    }
    let location_max_age_secs = parse_u64("NEAROFFERS_LOCATION_MAX_AGE_SECS", "600")?;

    Ok(AppConfig {
        api_base_url,
        log_level,
        data_dir,
        request_timeout_secs,
        user_agent,
        max_retries,
        retry_backoff_base_ms,
        search_radius,
        auto_update_interval_secs,
        location_max_age_secs,
    })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
