//! The configuration envelope of §6: a `Config` struct loaded from
//! environment variables via `dotenvy`, with per-field validated ranges.
//! Grounded on `env_config.rs`'s validation shape and
//! `original_source/app/config.py`'s auto-clamping behavior: range-checked
//! knobs clamp to their nearest bound and log a warning, while
//! presence-checked knobs (`token`, the `db_*` coordinates) are
//! `fatal-config` on absence (§7 error taxonomy).

use std::env;
use std::path::PathBuf;

use tracing::warn;

use crate::errors::CoreError;

const MIN_TOKEN_LEN: usize = 50;
const MAX_DB_NAME_LEN: usize = 64;

#[derive(Debug, Clone, Copy)]
pub struct RangeU32 {
    pub min: u32,
    pub max: u32,
    pub default: u32,
}

impl RangeU32 {
    /// Parses `raw`, falling back to `default` when absent, and clamping
    /// out-of-range values with a warning (spec.md §9 "Config validation
    /// auto-clamping").
    fn resolve(self, var_name: &str, raw: Option<&str>) -> u32 {
        let Some(raw) = raw else { return self.default };
        let parsed = match raw.parse::<u32>() {
            Ok(v) => v,
            Err(_) => {
                warn!(var_name, raw, "non-numeric config value, using default");
                return self.default;
            }
        };
        if parsed < self.min {
            warn!(var_name, parsed, min = self.min, "config value below range, clamped");
            self.min
        } else if parsed > self.max {
            warn!(var_name, parsed, max = self.max, "config value above range, clamped");
            self.max
        } else {
            parsed
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    pub db_user: String,
    pub db_host: String,
    pub db_port: u16,
    pub db_name: String,
    pub db_pool_size: u32,
    pub db_timeout_secs: u32,
    pub db_circuit_breaker_threshold: u32,
    pub max_memory_mb: Option<u32>,
    pub max_cpu_percent: Option<u32>,
    pub rate_limit_per_minute: u32,
    pub translation_file: Option<PathBuf>,
    pub debug: bool,
    pub production: bool,
}

fn required_var(name: &str) -> Result<String, CoreError> {
    env::var(name).map_err(|_| CoreError::FatalConfig(format!("missing required environment variable {name}")))
}

fn parse_bool(raw: Option<String>) -> bool {
    matches!(raw.as_deref(), Some("true" | "1" | "yes" | "on"))
}

fn validate_db_name(name: &str) -> Result<(), CoreError> {
    if name.len() > MAX_DB_NAME_LEN {
        return Err(CoreError::FatalConfig(format!(
            "db_name exceeds {MAX_DB_NAME_LEN} characters"
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(CoreError::FatalConfig(
            "db_name must contain only [A-Za-z0-9_]".to_string(),
        ));
    }
    Ok(())
}

impl Config {
    /// Loads and validates the configuration envelope of §6. Presence
    /// checks (`token`, `db_*` coordinates) are fatal on absence; ranged
    /// knobs clamp-and-warn instead of failing (spec.md §9).
    pub fn from_env() -> Result<Self, CoreError> {
        let token = required_var("TOKEN")?;
        if token.len() < MIN_TOKEN_LEN {
            return Err(CoreError::FatalConfig(format!(
                "token must be at least {MIN_TOKEN_LEN} characters"
            )));
        }

        let db_user = required_var("DB_USER")?;
        let db_host = required_var("DB_HOST")?;
        let db_name = required_var("DB_NAME")?;
        validate_db_name(&db_name)?;

        let db_port_raw = required_var("DB_PORT")?;
        let db_port = db_port_raw
            .parse::<u16>()
            .map_err(|_| CoreError::FatalConfig(format!("invalid DB_PORT: {db_port_raw}")))?;

        const POOL_SIZE_RANGE: RangeU32 = RangeU32 { min: 1, max: 50, default: 25 };
        const TIMEOUT_RANGE: RangeU32 = RangeU32 { min: 5, max: 30, default: 15 };
        const BREAKER_RANGE: RangeU32 = RangeU32 { min: 3, max: 20, default: 5 };
        const RATE_LIMIT_RANGE: RangeU32 = RangeU32 { min: 10, max: 1000, default: 100 };

        let db_pool_size = POOL_SIZE_RANGE.resolve("DB_POOL_SIZE", env::var("DB_POOL_SIZE").ok().as_deref());
        let db_timeout_secs = TIMEOUT_RANGE.resolve("DB_TIMEOUT", env::var("DB_TIMEOUT").ok().as_deref());
        let db_circuit_breaker_threshold = BREAKER_RANGE.resolve(
            "DB_CIRCUIT_BREAKER_THRESHOLD",
            env::var("DB_CIRCUIT_BREAKER_THRESHOLD").ok().as_deref(),
        );
        let rate_limit_per_minute = RATE_LIMIT_RANGE.resolve(
            "RATE_LIMIT_PER_MINUTE",
            env::var("RATE_LIMIT_PER_MINUTE").ok().as_deref(),
        );

        let max_memory_mb = env::var("MAX_MEMORY_MB").ok().and_then(|v| v.parse().ok());
        let max_cpu_percent = env::var("MAX_CPU_PERCENT").ok().and_then(|v| v.parse().ok());
        let translation_file = env::var("TRANSLATION_FILE").ok().map(PathBuf::from);

        Ok(Self {
            token,
            db_user,
            db_host,
            db_port,
            db_name,
            db_pool_size,
            db_timeout_secs,
            db_circuit_breaker_threshold,
            max_memory_mb,
            max_cpu_percent,
            rate_limit_per_minute,
            translation_file,
            debug: parse_bool(env::var("DEBUG").ok()),
            production: parse_bool(env::var("PRODUCTION").ok()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_clamps_below_minimum() {
        const RANGE: RangeU32 = RangeU32 { min: 3, max: 20, default: 5 };
        assert_eq!(RANGE.resolve("X", Some("0")), 3);
    }

    #[test]
    fn range_clamps_above_maximum() {
        const RANGE: RangeU32 = RangeU32 { min: 3, max: 20, default: 5 };
        assert_eq!(RANGE.resolve("X", Some("999")), 20);
    }

    #[test]
    fn range_uses_default_when_absent() {
        const RANGE: RangeU32 = RangeU32 { min: 3, max: 20, default: 5 };
        assert_eq!(RANGE.resolve("X", None), 5);
    }

    #[test]
    fn db_name_rejects_invalid_characters() {
        assert!(validate_db_name("valid_name_1").is_ok());
        assert!(validate_db_name("bad-name; DROP TABLE").is_err());
    }

    #[test]
    fn db_name_rejects_excess_length() {
        let long = "a".repeat(65);
        assert!(validate_db_name(&long).is_err());
    }
}
