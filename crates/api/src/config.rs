//! Configuration loaded from environment variables.
//!
//! Every section has a `from_env()` constructor plus a `from_lookup()`
//! variant that reads from any key/value source, which is what tests use.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use framechain_pipeline::{PipelineConfig, PollPolicy};
use framechain_provider::ark::DEFAULT_BASE_URL;
use framechain_provider::ProviderConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var}='{value}' is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Read `var` and parse it, falling back to `default` when unset.
fn parse_or<T, L>(lookup: &L, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    L: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}

fn string_or<L>(lookup: &L, var: &str, default: &str) -> String
where
    L: Fn(&str) -> Option<String>,
{
    lookup(var).unwrap_or_else(|| default.to_string())
}

fn required<L>(lookup: &L, var: &'static str) -> Result<String, ConfigError>
where
    L: Fn(&str) -> Option<String>,
{
    lookup(var)
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(var))
}

fn env_lookup(var: &str) -> Option<String> {
    std::env::var(var).ok()
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// Timeout for ordinary requests. Segment generation is exempt.
    pub request_timeout_secs: u64,
    /// How long shutdown waits for background runs to stop.
    pub shutdown_timeout_secs: u64,
}

impl ServerConfig {
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `30`                       |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let cors_origins = string_or(&lookup, "CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            host: string_or(&lookup, "HOST", "0.0.0.0"),
            port: parse_or(&lookup, "PORT", 3000)?,
            cors_origins,
            request_timeout_secs: parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 30)?,
            shutdown_timeout_secs: parse_or(&lookup, "SHUTDOWN_TIMEOUT_SECS", 30)?,
        })
    }
}

/// Where extracted frames are written and how they are addressed.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub root: PathBuf,
    /// Public base URL the root is served under.
    pub public_url: String,
}

impl StorageConfig {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            root: PathBuf::from(string_or(&lookup, "STORAGE_ROOT", "./data/objects")),
            public_url: string_or(&lookup, "STORAGE_PUBLIC_URL", "http://localhost:3000/objects"),
        }
    }
}

/// `ARK_API_KEY` and `ARK_VIDEO_MODEL` are required.
pub fn provider_from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ProviderConfig, ConfigError> {
    Ok(ProviderConfig {
        base_url: string_or(&lookup, "ARK_BASE_URL", DEFAULT_BASE_URL),
        api_key: required(&lookup, "ARK_API_KEY")?,
        model: required(&lookup, "ARK_VIDEO_MODEL")?,
        resolution: string_or(&lookup, "VIDEO_RESOLUTION", "720p"),
        camera_fixed: parse_or(&lookup, "VIDEO_CAMERA_FIXED", false)?,
    })
}

pub fn pipeline_from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<PipelineConfig, ConfigError> {
    let defaults = PipelineConfig::default();
    let poll_defaults = PollPolicy::default();

    let max_segment_secs: u32 =
        parse_or(&lookup, "MAX_SEGMENT_SECS", defaults.max_segment_secs)?;
    if max_segment_secs == 0 {
        return Err(ConfigError::Invalid {
            var: "MAX_SEGMENT_SECS",
            value: "0".into(),
            reason: "must be positive".into(),
        });
    }

    let ratio: f64 = parse_or(&lookup, "FRAME_SAMPLE_RATIO", defaults.frame_sample_ratio)?;
    if !(0.0..=1.0).contains(&ratio) {
        return Err(ConfigError::Invalid {
            var: "FRAME_SAMPLE_RATIO",
            value: ratio.to_string(),
            reason: "must be between 0 and 1".into(),
        });
    }

    let secs = |var: &'static str, default: Duration| -> Result<Duration, ConfigError> {
        parse_or(&lookup, var, default.as_secs()).map(Duration::from_secs)
    };

    let poll = PollPolicy {
        interval: secs("POLL_INTERVAL_SECS", poll_defaults.interval)?,
        max_interval: secs("POLL_MAX_INTERVAL_SECS", poll_defaults.max_interval)?,
        multiplier: parse_or(&lookup, "POLL_BACKOFF_MULTIPLIER", poll_defaults.multiplier)?,
        max_wait: secs("POLL_MAX_WAIT_SECS", poll_defaults.max_wait)?,
        max_consecutive_errors: parse_or(
            &lookup,
            "POLL_MAX_CONSECUTIVE_ERRORS",
            poll_defaults.max_consecutive_errors,
        )?,
    };
    validate_poll(&poll)?;

    Ok(PipelineConfig {
        max_segment_secs,
        poll,
        frame_sample_ratio: ratio,
        scratch_dir: lookup("SCRATCH_DIR").map(PathBuf::from),
    })
}

/// Reject poll settings that would hammer the provider or time out before
/// the first poll.
fn validate_poll(poll: &PollPolicy) -> Result<(), ConfigError> {
    let invalid = |var: &'static str, value: String, reason: &str| ConfigError::Invalid {
        var,
        value,
        reason: reason.into(),
    };
    let secs = |d: Duration| d.as_secs().to_string();

    if poll.interval.is_zero() {
        return Err(invalid("POLL_INTERVAL_SECS", secs(poll.interval), "must be positive"));
    }
    if poll.max_interval.is_zero() {
        return Err(invalid(
            "POLL_MAX_INTERVAL_SECS",
            secs(poll.max_interval),
            "must be positive",
        ));
    }
    if !poll.multiplier.is_finite() || poll.multiplier < 1.0 {
        return Err(invalid(
            "POLL_BACKOFF_MULTIPLIER",
            poll.multiplier.to_string(),
            "must be at least 1.0",
        ));
    }
    if poll.max_wait < poll.interval {
        return Err(invalid(
            "POLL_MAX_WAIT_SECS",
            secs(poll.max_wait),
            "must be at least POLL_INTERVAL_SECS",
        ));
    }
    if poll.max_consecutive_errors == 0 {
        return Err(invalid(
            "POLL_MAX_CONSECUTIVE_ERRORS",
            "0".into(),
            "must be positive",
        ));
    }
    Ok(())
}

/// Everything the binary needs to start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub provider: ProviderConfig,
    pub pipeline: PipelineConfig,
    pub storage: StorageConfig,
    /// Postgres when set, in-memory stores otherwise.
    pub database_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_lookup(&lookup)?,
            provider: provider_from_lookup(&lookup)?,
            pipeline: pipeline_from_lookup(&lookup)?,
            storage: StorageConfig::from_lookup(&lookup),
            database_url: lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()),
        })
    }
}
