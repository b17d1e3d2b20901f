//! Configuration management for the diagnostics server.
//!
//! Configuration is loaded from environment variables following the 12-factor app pattern.

use crate::constants::{
    DEFAULT_MAX_DEBUG, DEFAULT_MAX_ERROR_COUNT, DEFAULT_MAX_INFO, DEFAULT_MAX_MESSAGE_COUNT,
    DEFAULT_MAX_VERBOSE, DEFAULT_MIN_DEBUG, DEFAULT_MIN_INFO, DEFAULT_MIN_VERBOSE,
    DEFAULT_NESTING_DECREMENT, MAX_LOG_CAPACITY,
};
use crate::error::DiagnosticsError;
use crate::level::MessageLevel;
use serde::{Deserialize, Serialize};

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Level resolution configuration
    pub levels: LevelConfig,

    /// Output routing thresholds
    pub routing: RoutingConfig,

    /// In-memory log configuration
    pub log: LogConfig,
}

/// Level resolution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelConfig {
    /// Level added per nesting step (0 disables)
    pub nesting_decrement: i64,
}

/// Inclusive level range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelRange {
    pub min: MessageLevel,
    pub max: MessageLevel,
}

impl LevelRange {
    /// Create a range, rejecting inverted bounds.
    pub fn new(
        name: &str,
        min: MessageLevel,
        max: MessageLevel,
    ) -> Result<Self, DiagnosticsError> {
        if min > max {
            return Err(DiagnosticsError::config(format!(
                "{} range is inverted: minimum {} is above maximum {}",
                name,
                min.ordinal(),
                max.ordinal()
            )));
        }
        Ok(Self { min, max })
    }

    /// Check whether a level falls inside the range.
    pub fn contains(&self, level: MessageLevel) -> bool {
        self.min <= level && level <= self.max
    }
}

/// Output routing thresholds.
///
/// A message goes to the first range containing its resolved level, checked
/// in the order information, verbose, debug.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub information: LevelRange,
    pub verbose: LevelRange,
    pub debug: LevelRange,
}

/// In-memory log configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Maximum messages retained
    pub max_message_count: usize,

    /// Maximum errors retained
    pub max_error_count: usize,

    /// Record messages in the in-memory log
    pub message_logging: bool,

    /// Record errors in the in-memory log
    pub error_logging: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DBADIAG_NESTING_DECREMENT`: Level added per nesting step (default: 0)
    /// - `DBADIAG_MIN_INFO` / `DBADIAG_MAX_INFO`: Information range (default: 1-3)
    /// - `DBADIAG_MIN_VERBOSE` / `DBADIAG_MAX_VERBOSE`: Verbose range (default: 4-6)
    /// - `DBADIAG_MIN_DEBUG` / `DBADIAG_MAX_DEBUG`: Debug range (default: 1-9)
    /// - `DBADIAG_MAX_MESSAGE_COUNT`: Messages retained in memory (default: 1024)
    /// - `DBADIAG_MAX_ERROR_COUNT`: Errors retained in memory (default: 128)
    /// - `DBADIAG_MESSAGE_LOGGING`: Record messages (default: true)
    /// - `DBADIAG_ERROR_LOGGING`: Record errors (default: true)
    pub fn from_env() -> Result<Self, DiagnosticsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DiagnosticsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let nesting_decrement = parse_var(
            &lookup,
            "DBADIAG_NESTING_DECREMENT",
            DEFAULT_NESTING_DECREMENT,
        )?;

        let routing = RoutingConfig {
            information: level_range(
                &lookup,
                "information",
                ("DBADIAG_MIN_INFO", DEFAULT_MIN_INFO),
                ("DBADIAG_MAX_INFO", DEFAULT_MAX_INFO),
            )?,
            verbose: level_range(
                &lookup,
                "verbose",
                ("DBADIAG_MIN_VERBOSE", DEFAULT_MIN_VERBOSE),
                ("DBADIAG_MAX_VERBOSE", DEFAULT_MAX_VERBOSE),
            )?,
            debug: level_range(
                &lookup,
                "debug",
                ("DBADIAG_MIN_DEBUG", DEFAULT_MIN_DEBUG),
                ("DBADIAG_MAX_DEBUG", DEFAULT_MAX_DEBUG),
            )?,
        };

        let max_message_count = capacity(
            &lookup,
            "DBADIAG_MAX_MESSAGE_COUNT",
            DEFAULT_MAX_MESSAGE_COUNT,
        )?;
        let max_error_count = capacity(&lookup, "DBADIAG_MAX_ERROR_COUNT", DEFAULT_MAX_ERROR_COUNT)?;

        let message_logging = lookup("DBADIAG_MESSAGE_LOGGING")
            .map(|v| v.to_lowercase() != "false" && v != "0")
            .unwrap_or(true);

        let error_logging = lookup("DBADIAG_ERROR_LOGGING")
            .map(|v| v.to_lowercase() != "false" && v != "0")
            .unwrap_or(true);

        Ok(Config {
            levels: LevelConfig { nesting_decrement },
            routing,
            log: LogConfig {
                max_message_count,
                max_error_count,
                message_logging,
                error_logging,
            },
        })
    }
}

fn level_range<F>(
    lookup: &F,
    name: &str,
    min: (&str, u8),
    max: (&str, u8),
) -> Result<LevelRange, DiagnosticsError>
where
    F: Fn(&str) -> Option<String>,
{
    let min_level = level_var(lookup, min.0, min.1)?;
    let max_level = level_var(lookup, max.0, max.1)?;
    LevelRange::new(name, min_level, max_level)
}

fn level_var<F>(lookup: &F, key: &str, default: u8) -> Result<MessageLevel, DiagnosticsError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => value
            .parse()
            .map_err(|e| DiagnosticsError::config(format!("{}: {}", key, e))),
        None => MessageLevel::try_from(default),
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, DiagnosticsError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e| DiagnosticsError::config(format!("{}: {}", key, e))),
        None => Ok(default),
    }
}

fn capacity<F>(lookup: &F, key: &str, default: usize) -> Result<usize, DiagnosticsError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = parse_var(lookup, key, default)?;
    if value > MAX_LOG_CAPACITY {
        return Err(DiagnosticsError::config(format!(
            "{} exceeds the maximum of {}",
            key, MAX_LOG_CAPACITY
        )));
    }
    Ok(value)
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            nesting_decrement: DEFAULT_NESTING_DECREMENT,
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            information: LevelRange {
                min: MessageLevel::Critical,
                max: MessageLevel::Significant,
            },
            verbose: LevelRange {
                min: MessageLevel::VeryVerbose,
                max: MessageLevel::SomewhatVerbose,
            },
            debug: LevelRange {
                min: MessageLevel::Critical,
                max: MessageLevel::InternalComment,
            },
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            max_message_count: DEFAULT_MAX_MESSAGE_COUNT,
            max_error_count: DEFAULT_MAX_ERROR_COUNT,
            message_logging: true,
            error_logging: true,
        }
    }
}
