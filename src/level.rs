//! Message severity levels.
//!
//! Levels are ordinals in the closed range 1 through 9. Lower numbers are
//! more severe; higher numbers are increasingly verbose chatter.

use crate::constants::{MAX_LEVEL, MIN_LEVEL};
use crate::error::DiagnosticsError;
use serde::{Deserialize, Serialize};

/// Severity of a diagnostic message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum MessageLevel {
    Critical = 1,
    Important = 2,
    Significant = 3,
    VeryVerbose = 4,
    #[default]
    Verbose = 5,
    SomewhatVerbose = 6,
    System = 7,
    Debug = 8,
    InternalComment = 9,
}

impl MessageLevel {
    /// Messages written as regular command output.
    pub const OUTPUT: MessageLevel = MessageLevel::Important;

    /// Messages written directly to the host.
    pub const HOST: MessageLevel = MessageLevel::Important;

    /// All levels, most severe first.
    pub const ALL: [MessageLevel; 9] = [
        MessageLevel::Critical,
        MessageLevel::Important,
        MessageLevel::Significant,
        MessageLevel::VeryVerbose,
        MessageLevel::Verbose,
        MessageLevel::SomewhatVerbose,
        MessageLevel::System,
        MessageLevel::Debug,
        MessageLevel::InternalComment,
    ];

    /// Get the ordinal value.
    #[must_use]
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Build a level from an arbitrary integer, clamping into range.
    #[must_use]
    pub fn clamped(value: i64) -> Self {
        let ordinal = value.clamp(i64::from(MIN_LEVEL), i64::from(MAX_LEVEL));
        // In range after the clamp.
        Self::ALL[(ordinal - i64::from(MIN_LEVEL)) as usize]
    }

    /// Get the level name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Critical => "Critical",
            Self::Important => "Important",
            Self::Significant => "Significant",
            Self::VeryVerbose => "VeryVerbose",
            Self::Verbose => "Verbose",
            Self::SomewhatVerbose => "SomewhatVerbose",
            Self::System => "System",
            Self::Debug => "Debug",
            Self::InternalComment => "InternalComment",
        }
    }
}

impl std::fmt::Display for MessageLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl TryFrom<i64> for MessageLevel {
    type Error = DiagnosticsError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value < i64::from(MIN_LEVEL) || value > i64::from(MAX_LEVEL) {
            return Err(DiagnosticsError::invalid_level(value));
        }
        Ok(Self::clamped(value))
    }
}

impl TryFrom<u8> for MessageLevel {
    type Error = DiagnosticsError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::try_from(i64::from(value))
    }
}

impl From<MessageLevel> for u8 {
    fn from(level: MessageLevel) -> Self {
        level.ordinal()
    }
}

impl std::str::FromStr for MessageLevel {
    type Err = DiagnosticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(value) = trimmed.parse::<i64>() {
            return Self::try_from(value);
        }

        match trimmed.to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "critical" => Ok(Self::Critical),
            "important" | "output" | "host" => Ok(Self::Important),
            "significant" => Ok(Self::Significant),
            "veryverbose" => Ok(Self::VeryVerbose),
            "verbose" => Ok(Self::Verbose),
            "somewhatverbose" => Ok(Self::SomewhatVerbose),
            "system" => Ok(Self::System),
            "debug" => Ok(Self::Debug),
            "internalcomment" => Ok(Self::InternalComment),
            _ => Err(DiagnosticsError::UnknownLevel(s.to_string())),
        }
    }
}
