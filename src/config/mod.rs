//! Configuration module - environment variable parsing

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::game::VotePolicy;

/// Log output format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error), used when RUST_LOG is unset
    pub log_level: String,
    pub log_format: LogFormat,

    /// Length of a voting window
    pub tick_interval: Duration,
    pub grid_width: u32,
    pub grid_height: u32,
    pub vote_policy: VotePolicy,
    /// Fixed seed for reproducible runs; entropy otherwise
    pub rng_seed: Option<u64>,
}

pub const DEFAULT_MOVE_SELECTION_MILLIS: u64 = 5000;
pub const DEFAULT_GRID_SIZE: u32 = 3;

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load configuration from any variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let tick_millis: u64 = parse_or(
            &lookup,
            "MOVE_SELECTION_MILLIS",
            DEFAULT_MOVE_SELECTION_MILLIS,
        )?;
        if tick_millis == 0 {
            return Err(ConfigError::Invalid {
                var: "MOVE_SELECTION_MILLIS",
                value: tick_millis.to_string(),
            });
        }

        let grid_width: u32 = parse_or(&lookup, "GRID_WIDTH", DEFAULT_GRID_SIZE)?;
        let grid_height: u32 = parse_or(&lookup, "GRID_HEIGHT", DEFAULT_GRID_SIZE)?;
        if grid_width == 0 {
            return Err(ConfigError::Invalid {
                var: "GRID_WIDTH",
                value: grid_width.to_string(),
            });
        }
        if grid_height == 0 {
            return Err(ConfigError::Invalid {
                var: "GRID_HEIGHT",
                value: grid_height.to_string(),
            });
        }

        let rng_seed = match lookup("RNG_SEED") {
            Some(raw) => Some(raw.parse().map_err(|_| ConfigError::Invalid {
                var: "RNG_SEED",
                value: raw,
            })?),
            None => None,
        };

        Ok(Self {
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_format: parse_or(&lookup, "LOG_FORMAT", LogFormat::Pretty)?,
            tick_interval: Duration::from_millis(tick_millis),
            grid_width,
            grid_height,
            vote_policy: parse_or(&lookup, "VOTE_POLICY", VotePolicy::FirstWins)?,
            rng_seed,
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for environment variable {var}")]
    Invalid { var: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.tick_interval, Duration::from_millis(5000));
        assert_eq!((config.grid_width, config.grid_height), (3, 3));
        assert_eq!(config.vote_policy, VotePolicy::FirstWins);
        assert_eq!(config.rng_seed, None);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("MOVE_SELECTION_MILLIS", "250"),
            ("GRID_WIDTH", "5"),
            ("GRID_HEIGHT", "4"),
            ("VOTE_POLICY", "latest_wins"),
            ("RNG_SEED", "99"),
            ("LOG_FORMAT", "json"),
        ])
        .unwrap();
        assert_eq!(config.tick_interval, Duration::from_millis(250));
        assert_eq!((config.grid_width, config.grid_height), (5, 4));
        assert_eq!(config.vote_policy, VotePolicy::LatestWins);
        assert_eq!(config.rng_seed, Some(99));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            load(&[("MOVE_SELECTION_MILLIS", "0")]),
            Err(ConfigError::Invalid { var: "MOVE_SELECTION_MILLIS", .. })
        ));
        assert!(matches!(
            load(&[("GRID_WIDTH", "wide")]),
            Err(ConfigError::Invalid { var: "GRID_WIDTH", .. })
        ));
        assert!(matches!(
            load(&[("VOTE_POLICY", "random")]),
            Err(ConfigError::Invalid { var: "VOTE_POLICY", .. })
        ));
        assert!(matches!(
            load(&[("RNG_SEED", "-1")]),
            Err(ConfigError::Invalid { var: "RNG_SEED", .. })
        ));
    }
}
