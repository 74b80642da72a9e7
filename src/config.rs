use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Result, anyhow};
use chrono::NaiveTime;
use dotenvy::dotenv;

use crate::attendance::finalizer::DEFAULT_CONCURRENCY;
use crate::attendance::geofence::DEFAULT_RADIUS_METERS;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub api_prefix: String,

    // Rate limiting
    pub rate_protected_per_min: u32,
    pub rate_punch_per_min: u32,

    pub db_max_connections: u32,
    pub store_timeout: Duration,
    pub geofence_radius_meters: f64,
    /// JSON list of extra or replacement shift profiles.
    pub shift_profiles_path: Option<PathBuf>,

    pub finalizer_concurrency: usize,
    pub finalizer_run_at: NaiveTime,
    pub night_finalizer_run_at: NaiveTime,

    pub log_dir: String,
    pub log_level: tracing::Level,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let lookup = &lookup;

        Ok(Self {
            server_addr: required(lookup, "SERVER_ADDR")?,
            database_url: required(lookup, "DATABASE_URL")?,
            jwt_secret: required(lookup, "JWT_SECRET")?,
            api_prefix: lookup("API_PREFIX").unwrap_or_else(|| "/api".to_string()),

            rate_protected_per_min: parsed(lookup, "RATE_PROTECTED_PER_MIN", 1000)?,
            rate_punch_per_min: parsed(lookup, "RATE_PUNCH_PER_MIN", 30)?,

            db_max_connections: parsed(lookup, "DB_MAX_CONNECTIONS", 10)?,
            store_timeout: Duration::from_millis(parsed(lookup, "STORE_TIMEOUT_MS", 5000)?),
            geofence_radius_meters: parsed(lookup, "GEOFENCE_RADIUS_METERS", DEFAULT_RADIUS_METERS)?,
            shift_profiles_path: lookup("SHIFT_PROFILES_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),

            finalizer_concurrency: parsed(lookup, "FINALIZER_CONCURRENCY", DEFAULT_CONCURRENCY)?,
            finalizer_run_at: time_of_day(lookup, "FINALIZER_RUN_AT", "00:30")?,
            night_finalizer_run_at: time_of_day(lookup, "NIGHT_FINALIZER_RUN_AT", "10:00")?,

            log_dir: lookup("LOG_DIR").unwrap_or_else(|| "logs".to_string()),
            log_level: parsed(lookup, "LOG_LEVEL", tracing::Level::DEBUG)?,
        })
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    lookup(key).ok_or_else(|| anyhow!("{key} must be set"))
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid {key} '{raw}': {e}")),
    }
}

/// `HH:MM` local wall time.
fn time_of_day(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<NaiveTime> {
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|e| anyhow!("invalid {key} '{raw}', expected HH:MM: {e}"))
}
