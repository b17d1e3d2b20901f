//! MCP server struct definition and initialization.

use crate::config::Config;
use crate::error::McpError;
use crate::message::MessageWriter;
use crate::state::{new_shared_state, SharedState};
use std::sync::Arc;
use tracing::info;

/// The diagnostics MCP server instance.
///
/// This struct is cloned for each request, but the inner state
/// is shared via Arc. The server provides tools to:
///
/// - Resolve message levels against the active settings
/// - Write messages and retrieve the in-memory logs
/// - Manage level modifiers and the nesting decrement
#[derive(Clone)]
pub struct DiagnosticsMcpServer {
    /// Shared settings, logs and metrics.
    pub(crate) state: SharedState,

    /// Configuration.
    pub(crate) config: Arc<Config>,

    /// Writer for the server's own execution context.
    pub(crate) writer: MessageWriter,
}

impl DiagnosticsMcpServer {
    /// Create a new server instance with the given configuration.
    pub fn new(config: Config) -> Self {
        let state = new_shared_state(&config);
        let writer = MessageWriter::new(state.clone());

        info!(
            "Diagnostics state initialized: decrement={}, messages={}, errors={}",
            config.levels.nesting_decrement,
            config.log.max_message_count,
            config.log.max_error_count
        );

        Self {
            state,
            config: Arc::new(config),
            writer,
        }
    }

    /// Create a server from environment variables.
    ///
    /// This is the standard way to create a server for production use.
    pub fn from_env() -> Result<Self, McpError> {
        let config = Config::from_env()?;
        Ok(Self::new(config))
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get a reference to the shared state.
    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Get the server's message writer.
    pub fn writer(&self) -> &MessageWriter {
        &self.writer
    }
}
