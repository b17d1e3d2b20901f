//! Centralized constants for the diagnostics server.
//!
//! This module contains the default values used throughout the codebase,
//! making them easy to find, understand, and modify.

// =============================================================================
// Level Constants
// =============================================================================

/// Lowest (most severe) message level ordinal.
pub const MIN_LEVEL: u8 = 1;

/// Highest (least severe) message level ordinal.
pub const MAX_LEVEL: u8 = 9;

/// Frames subtracted from the nesting depth before the decrement is applied.
///
/// The explicit nesting counter only counts scopes opened by callers, so no
/// frames of the resolver itself need to be excluded.
pub const DEPTH_OFFSET: i64 = 0;

/// Additional depth contributed by an error-guarding layer.
pub const GUARDED_CALL_DEPTH: i64 = 1;

/// Default nesting decrement (disabled).
pub const DEFAULT_NESTING_DECREMENT: i64 = 0;

// =============================================================================
// Routing Thresholds
// =============================================================================

/// Default lowest level shown as information.
pub const DEFAULT_MIN_INFO: u8 = 1;

/// Default highest level shown as information.
pub const DEFAULT_MAX_INFO: u8 = 3;

/// Default lowest level shown as verbose output.
pub const DEFAULT_MIN_VERBOSE: u8 = 4;

/// Default highest level shown as verbose output.
pub const DEFAULT_MAX_VERBOSE: u8 = 6;

/// Default lowest level shown as debug output.
pub const DEFAULT_MIN_DEBUG: u8 = 1;

/// Default highest level shown as debug output.
pub const DEFAULT_MAX_DEBUG: u8 = 9;

// =============================================================================
// Log Store Constants
// =============================================================================

/// Default number of messages retained in memory.
pub const DEFAULT_MAX_MESSAGE_COUNT: usize = 1024;

/// Default number of errors retained in memory.
pub const DEFAULT_MAX_ERROR_COUNT: usize = 128;

/// Upper bound accepted for either log queue.
pub const MAX_LOG_CAPACITY: usize = 1_000_000;

/// Default module name for messages written through the MCP tools.
pub const DEFAULT_MODULE_NAME: &str = "dbadiag";

// =============================================================================
// Tool Output Constants
// =============================================================================

/// Maximum length of a message echoed into tracing output.
pub const MAX_LOGGED_MESSAGE_LENGTH: usize = 200;
