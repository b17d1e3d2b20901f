//! # dbadiag MCP Server
//!
//! Diagnostic message levels for SQL Server administration tooling, exposed
//! over the Model Context Protocol (MCP).
//!
//! This crate provides:
//! - **Levels**: The nine-step message severity scale
//! - **Resolution**: Effective levels from nesting depth and named modifiers
//! - **Messages**: A front-end that routes, records and emits messages
//! - **Logs**: Bounded in-memory message and error logs with filtering
//! - **Tools**: MCP tools to inspect and change all of the above
//!
//! ## Architecture
//!
//! Settings live behind a copy-on-read snapshot so that a resolution always
//! sees one consistent configuration. Nesting depth is an explicit counter
//! owned by each execution context and raised by RAII scopes.

pub mod config;
pub mod constants;
pub mod error;
pub mod level;
pub mod log_store;
pub mod message;
pub mod modifier;
pub mod nesting;
pub mod resolver;
pub mod server;
pub mod state;
pub mod telemetry;
pub mod tools;

pub use config::Config;
pub use error::{DiagnosticsError, McpError};
pub use level::MessageLevel;
pub use message::{MessageRequest, MessageWriter};
pub use modifier::LevelModifier;
pub use nesting::NestingContext;
pub use resolver::{resolve_level, LevelRequest, LevelSettings};
pub use server::DiagnosticsMcpServer;
