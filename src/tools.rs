//! MCP Tools for the diagnostic message system.
//!
//! - `resolve_level`: Resolve a message level and explain each term
//! - `write_message`: Write a message through the front-end
//! - `write_warning`: Record a warning
//! - `write_error`: Record an error
//! - `get_last_error`: Show the most recent error
//! - `get_log`: Retrieve in-memory messages or errors
//! - `clear_log`: Clear the in-memory logs
//! - `set_log_capacity`: Resize the in-memory logs
//! - `register_level_modifier`: Add or replace a level modifier
//! - `remove_level_modifier`: Remove a level modifier
//! - `clear_level_modifiers`: Remove every level modifier
//! - `list_level_modifiers`: List level modifiers
//! - `set_nesting_decrement`: Change the nesting decrement
//! - `get_settings`: Show the active settings and thresholds
//! - `get_log_metrics`: Show message system metrics

use crate::constants::{DEFAULT_MODULE_NAME, MAX_LOG_CAPACITY};
use crate::error::DiagnosticsError;
use crate::level::MessageLevel;
use crate::log_store::LogFilter;
use crate::message::{MessageRequest, MessageWriter, WrittenMessage};
use crate::modifier::{LevelModifier, WildcardPattern};
use crate::nesting::NestingContext;
use crate::resolver::{LevelRequest, LevelResolution};
use crate::server::DiagnosticsMcpServer;
use crate::state::SharedState;
use mcpkit::prelude::*;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Deepest nesting a tool caller may simulate.
const MAX_TOOL_DEPTH: i64 = 64;

/// MCP server implementation containing all tools.
///
/// The `#[mcp_server]` macro generates the MCP protocol infrastructure
/// for all `#[tool]` annotated methods.
#[mcp_server(
    name = "dbadiag-mcp-server",
    version = "0.1.0",
    instructions = "Diagnostic message levels and in-memory logs for SQL Server admin tooling"
)]
impl DiagnosticsMcpServer {
    // =========================================================================
    // Level Resolution Tools
    // =========================================================================

    /// Resolve the effective level of a message.
    #[tool(description = "Resolve the effective level (1-9) of a message from its nominal level, origin, tags and nesting depth. Returns a breakdown of every term.")]
    pub async fn resolve_level(
        &self,
        level: String,
        function_name: String,
        module_name: Option<String>,
        tags: Option<Vec<String>>,
        depth: Option<i64>,
        from_guarded_call: Option<bool>,
    ) -> Result<ToolOutput, McpError> {
        let resolution = match resolve_with_state(
            &self.state,
            &level,
            &function_name,
            module_name.as_deref().unwrap_or(DEFAULT_MODULE_NAME),
            tags.as_deref(),
            depth.unwrap_or(0),
            from_guarded_call.unwrap_or(false),
        ) {
            Ok(r) => r,
            Err(e) => return Ok(ToolOutput::error(format!("Level resolution failed: {}", e))),
        };

        debug!(
            "Resolved {} -> {} for {}",
            resolution.original_level, resolution.level, function_name
        );

        Ok(ToolOutput::text(pretty(&json!({
            "original_level": resolution.original_level,
            "level": resolution.level,
            "level_name": resolution.level.name(),
            "raw": resolution.raw.to_string(),
            "effective_depth": resolution.effective_depth.map(|d| d.to_string()),
            "depth_term": resolution.depth_term.to_string(),
            "modifier_total": resolution.modifier_total.to_string(),
            "applied_modifiers": resolution.applied_modifiers,
        }))))
    }

    // =========================================================================
    // Message Tools
    // =========================================================================

    /// Write a message through the front-end.
    #[tool(description = "Write a diagnostic message. The level is resolved, routed to information/verbose/debug output and recorded in the in-memory log.")]
    pub async fn write_message(
        &self,
        message: String,
        level: String,
        function_name: String,
        module_name: Option<String>,
        tags: Option<Vec<String>>,
        target: Option<String>,
        depth: Option<i64>,
        from_guarded_call: Option<bool>,
    ) -> Result<ToolOutput, McpError> {
        let level = match level.parse::<MessageLevel>() {
            Ok(l) => l,
            Err(e) => return Ok(ToolOutput::error(e.to_string())),
        };

        let mut request = MessageRequest::new(
            level,
            function_name,
            module_name.unwrap_or_else(|| DEFAULT_MODULE_NAME.to_string()),
            message,
        )
        .tags(tags.unwrap_or_default());
        request.target = target;

        let written = match write_at_depth(
            &self.state,
            &self.writer,
            request,
            depth.unwrap_or(0),
            from_guarded_call.unwrap_or(false),
        ) {
            Ok(w) => w,
            Err(e) => return Ok(ToolOutput::error(format!("Write failed: {}", e))),
        };

        Ok(ToolOutput::text(pretty(&json!({
            "level": written.resolution.level,
            "level_name": written.resolution.level.name(),
            "route": written.route,
            "recorded": written.recorded,
            "applied_modifiers": written.resolution.applied_modifiers,
        }))))
    }

    /// Record a warning.
    #[tool(description = "Record a warning message. Warnings bypass level resolution and are always shown.")]
    pub async fn write_warning(
        &self,
        message: String,
        function_name: String,
        module_name: Option<String>,
        tags: Option<Vec<String>>,
        target: Option<String>,
    ) -> Result<ToolOutput, McpError> {
        let module_name = module_name.unwrap_or_else(|| DEFAULT_MODULE_NAME.to_string());
        if let Err(e) = self.writer.warn(
            &function_name,
            &module_name,
            &message,
            &tags.unwrap_or_default(),
            target.as_deref(),
        ) {
            return Ok(ToolOutput::error(format!("Write failed: {}", e)));
        }

        Ok(ToolOutput::text(pretty(&json!({ "status": "recorded" }))))
    }

    /// Record an error.
    #[tool(description = "Record an error in the in-memory error log together with a warning describing it.")]
    pub async fn write_error(
        &self,
        message: String,
        error: String,
        function_name: String,
        module_name: Option<String>,
        tags: Option<Vec<String>>,
        target: Option<String>,
    ) -> Result<ToolOutput, McpError> {
        let module_name = module_name.unwrap_or_else(|| DEFAULT_MODULE_NAME.to_string());
        if let Err(e) = record_error(
            &self.writer,
            &function_name,
            &module_name,
            &message,
            &error,
            &tags.unwrap_or_default(),
            target.as_deref(),
        ) {
            return Ok(ToolOutput::error(format!("Write failed: {}", e)));
        }

        Ok(ToolOutput::text(pretty(&json!({
            "status": "recorded",
            "error_logging": self.state.logging().error_logging,
        }))))
    }

    /// Show the most recent error.
    #[tool(description = "Get the most recently recorded error, if any.")]
    pub async fn get_last_error(&self) -> Result<ToolOutput, McpError> {
        let output = match self.state.log().last_error() {
            Some(entry) => json!({ "error": entry }),
            None => json!({ "error": null }),
        };
        Ok(ToolOutput::text(pretty(&output)))
    }

    /// Retrieve entries from the in-memory log.
    #[tool(description = "Retrieve in-memory log entries. Filters: function_name/module_name (wildcards), target, tags, runspace, levels, skip (newest), last (count). Set errors=true for the error log.")]
    pub async fn get_log(
        &self,
        function_name: Option<String>,
        module_name: Option<String>,
        target: Option<String>,
        tags: Option<Vec<String>>,
        runspace: Option<String>,
        levels: Option<Vec<String>>,
        skip: Option<usize>,
        last: Option<usize>,
        errors: Option<bool>,
    ) -> Result<ToolOutput, McpError> {
        let filter = match build_filter(
            function_name.as_deref(),
            module_name.as_deref(),
            target,
            tags.unwrap_or_default(),
            runspace.as_deref(),
            levels.unwrap_or_default(),
            skip.unwrap_or(0),
            last,
        ) {
            Ok(f) => f,
            Err(e) => return Ok(ToolOutput::error(format!("Invalid filter: {}", e))),
        };

        let output = if errors.unwrap_or(false) {
            let entries = self.state.log().errors(&filter);
            debug!("Retrieved {} error entries", entries.len());
            json!({ "count": entries.len(), "errors": entries })
        } else {
            let entries = self.state.log().messages(&filter);
            debug!("Retrieved {} message entries", entries.len());
            json!({ "count": entries.len(), "messages": entries })
        };

        Ok(ToolOutput::text(pretty(&output)))
    }

    /// Clear the in-memory logs.
    #[tool(description = "Clear all in-memory messages and errors.")]
    pub async fn clear_log(&self) -> Result<ToolOutput, McpError> {
        let (messages, errors) = self.state.log().clear();
        info!("Cleared {} messages and {} errors", messages, errors);

        Ok(ToolOutput::text(pretty(&json!({
            "messages_removed": messages,
            "errors_removed": errors,
        }))))
    }

    /// Resize the in-memory logs.
    #[tool(description = "Change how many messages and errors the in-memory log retains. Shrinking evicts the oldest entries.")]
    pub async fn set_log_capacity(
        &self,
        max_message_count: Option<usize>,
        max_error_count: Option<usize>,
    ) -> Result<ToolOutput, McpError> {
        let (current_messages, current_errors) = self.state.log().capacity();
        let messages = max_message_count.unwrap_or(current_messages);
        let errors = max_error_count.unwrap_or(current_errors);

        if messages > MAX_LOG_CAPACITY || errors > MAX_LOG_CAPACITY {
            return Ok(ToolOutput::error(format!(
                "Capacity must not exceed {} entries",
                MAX_LOG_CAPACITY
            )));
        }

        let evicted = self.state.log().set_capacity(messages, errors);
        info!(
            "Log capacity changed: messages {} -> {}, errors {} -> {}",
            current_messages, messages, current_errors, errors
        );

        Ok(ToolOutput::text(pretty(&json!({
            "max_message_count": messages,
            "max_error_count": errors,
            "evicted": evicted,
        }))))
    }

    // =========================================================================
    // Settings Tools
    // =========================================================================

    /// Register a level modifier.
    #[tool(description = "Register or replace a named level modifier. Matching messages have 'modifier' added to their level. Unset criteria always match.")]
    pub async fn register_level_modifier(
        &self,
        name: String,
        modifier: i64,
        include_function_name: Option<String>,
        exclude_function_name: Option<String>,
        include_module_name: Option<String>,
        exclude_module_name: Option<String>,
        include_tags: Option<Vec<String>>,
        exclude_tags: Option<Vec<String>>,
    ) -> Result<ToolOutput, McpError> {
        let rule = match build_modifier(
            &name,
            modifier,
            include_function_name.as_deref(),
            exclude_function_name.as_deref(),
            include_module_name.as_deref(),
            exclude_module_name.as_deref(),
            include_tags.unwrap_or_default(),
            exclude_tags.unwrap_or_default(),
        ) {
            Ok(r) => r,
            Err(e) => return Ok(ToolOutput::error(format!("Invalid modifier: {}", e))),
        };

        let replaced = self.state.settings().register_modifier(rule.clone());
        info!(
            "Level modifier '{}' {} (modifier {})",
            rule.name,
            if replaced.is_some() { "replaced" } else { "registered" },
            rule.modifier
        );

        Ok(ToolOutput::text(pretty(&json!({
            "status": if replaced.is_some() { "replaced" } else { "registered" },
            "modifier": rule,
        }))))
    }

    /// Remove a level modifier.
    #[tool(description = "Remove a level modifier by name.")]
    pub async fn remove_level_modifier(&self, name: String) -> Result<ToolOutput, McpError> {
        match self.state.settings().remove_modifier(&name) {
            Ok(rule) => {
                info!("Level modifier '{}' removed", rule.name);
                Ok(ToolOutput::text(pretty(&json!({
                    "status": "removed",
                    "modifier": rule,
                }))))
            }
            Err(e) => {
                warn!("Failed to remove level modifier: {}", e);
                Ok(ToolOutput::error(e.to_string()))
            }
        }
    }

    /// Remove every level modifier.
    #[tool(description = "Remove all registered level modifiers.")]
    pub async fn clear_level_modifiers(&self) -> Result<ToolOutput, McpError> {
        let removed = self.state.settings().clear_modifiers();
        info!("Cleared {} level modifiers", removed);

        Ok(ToolOutput::text(pretty(&json!({ "modifiers_removed": removed }))))
    }

    /// List level modifiers.
    #[tool(description = "List all registered level modifiers, sorted by name.")]
    pub async fn list_level_modifiers(&self) -> Result<ToolOutput, McpError> {
        let snapshot = self.state.settings().snapshot();
        let rules = snapshot.modifiers.sorted();

        Ok(ToolOutput::text(pretty(&json!({
            "count": rules.len(),
            "modifiers": rules,
        }))))
    }

    /// Change the nesting decrement.
    #[tool(description = "Set the level added per nesting step. Values of 0 or below disable depth-based adjustment.")]
    pub async fn set_nesting_decrement(&self, value: i64) -> Result<ToolOutput, McpError> {
        let previous = self.state.settings().set_nesting_decrement(value);
        info!("Nesting decrement changed: {} -> {}", previous, value);

        Ok(ToolOutput::text(pretty(&json!({
            "previous_nesting_decrement": previous,
            "nesting_decrement": value,
            "status": "applied",
        }))))
    }

    /// Show the active settings.
    #[tool(description = "Show the active nesting decrement, modifier count, routing thresholds and log configuration.")]
    pub async fn get_settings(&self, detailed: Option<bool>) -> Result<ToolOutput, McpError> {
        let snapshot = self.state.settings().snapshot();
        let (max_messages, max_errors) = self.state.log().capacity();

        let mut response = json!({
            "nesting_decrement": snapshot.nesting_decrement,
            "initial_nesting_decrement": self.config.levels.nesting_decrement,
            "modifier_count": snapshot.modifiers.len(),
            "routing": self.state.routing(),
            "log": {
                "max_message_count": max_messages,
                "max_error_count": max_errors,
                "message_logging": self.state.logging().message_logging,
                "error_logging": self.state.logging().error_logging,
            },
        });

        if detailed.unwrap_or(false) {
            response["modifiers"] = json!(snapshot.modifiers.sorted());
            response["runspace"] = json!(self.writer.context().runspace());
            response["messages_held"] = json!(self.state.log().message_count());
            response["errors_held"] = json!(self.state.log().error_count());
        }

        Ok(ToolOutput::text(pretty(&response)))
    }

    /// Show message system metrics.
    #[tool(description = "Get message system metrics: resolutions, routes, warnings, errors and evictions.")]
    pub async fn get_log_metrics(&self, include_rates: Option<bool>) -> Result<ToolOutput, McpError> {
        let snapshot = self.state.metrics().snapshot();

        let mut response = json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "resolutions": {
                "total": snapshot.resolutions_total,
                "modified": snapshot.resolutions_modified,
            },
            "messages": {
                "total": snapshot.messages_total(),
                "information": snapshot.messages_information,
                "verbose": snapshot.messages_verbose,
                "debug": snapshot.messages_debug,
                "suppressed": snapshot.messages_suppressed,
                "evicted": snapshot.messages_evicted,
            },
            "warnings": snapshot.warnings_total,
            "errors": {
                "total": snapshot.errors_total,
                "evicted": snapshot.errors_evicted,
            },
        });

        if include_rates.unwrap_or(false) {
            response["rates"] = json!({
                "modified_rate_percent": snapshot.modified_rate(),
                "suppressed_rate_percent": snapshot.suppressed_rate(),
            });
        }

        Ok(ToolOutput::text(pretty(&response)))
    }
}

// =========================================================================
// Helper Functions
// =========================================================================

fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        warn!("Failed to serialize tool output: {}", e);
        value.to_string()
    })
}

/// Resolve a level from tool arguments against the current settings.
fn resolve_with_state(
    state: &SharedState,
    level: &str,
    function_name: &str,
    module_name: &str,
    tags: Option<&[String]>,
    depth: i64,
    from_guarded_call: bool,
) -> Result<LevelResolution, DiagnosticsError> {
    let level: MessageLevel = level.parse()?;
    let mut request = LevelRequest::new(level, function_name, module_name)
        .depth(depth)
        .guarded(from_guarded_call);
    request.tags = tags;

    let resolution = state.settings().snapshot().explain(&request)?;
    state
        .metrics()
        .record_resolution(!resolution.applied_modifiers.is_empty());
    Ok(resolution)
}

/// Write a message as if emitted `depth` commands deep, optionally from
/// inside one more error-guarding layer.
fn write_at_depth(
    state: &SharedState,
    writer: &MessageWriter,
    request: MessageRequest,
    depth: i64,
    guarded: bool,
) -> Result<WrittenMessage, DiagnosticsError> {
    if !(0..=MAX_TOOL_DEPTH).contains(&depth) {
        return Err(DiagnosticsError::validation(
            "depth",
            format!("must be between 0 and {}", MAX_TOOL_DEPTH),
        ));
    }

    let context = NestingContext::with_runspace(writer.context().runspace());
    let _scopes: Vec<_> = (0..depth).map(|_| context.enter()).collect();
    let _guard = guarded.then(|| context.guarded());
    MessageWriter::with_context(state.clone(), context).write(request)
}

/// Error text reported by a tool caller.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct ReportedError(String);

/// Record an error entry and its accompanying warning.
fn record_error(
    writer: &MessageWriter,
    function_name: &str,
    module_name: &str,
    message: &str,
    error: &str,
    tags: &[String],
    target: Option<&str>,
) -> Result<(), DiagnosticsError> {
    let error = error.trim();
    if error.is_empty() {
        return Err(DiagnosticsError::validation("error", "must not be empty"));
    }
    let reported = ReportedError(error.to_string());
    writer.error(function_name, module_name, message, &reported, tags, target)
}

/// Build a log filter from tool arguments.
#[allow(clippy::too_many_arguments)]
fn build_filter(
    function_name: Option<&str>,
    module_name: Option<&str>,
    target: Option<String>,
    tags: Vec<String>,
    runspace: Option<&str>,
    levels: Vec<String>,
    skip: usize,
    last: Option<usize>,
) -> Result<LogFilter, DiagnosticsError> {
    let runspace = runspace
        .map(|r| {
            Uuid::parse_str(r.trim())
                .map_err(|e| DiagnosticsError::validation("runspace", e.to_string()))
        })
        .transpose()?;

    let levels = levels
        .iter()
        .map(|l| l.parse::<MessageLevel>())
        .collect::<Result<Vec<_>, _>>()?;

    Ok(LogFilter {
        function_name: optional_pattern(function_name)?,
        module_name: optional_pattern(module_name)?,
        target,
        tags,
        runspace,
        levels,
        skip,
        last,
    })
}

/// Build a level modifier from tool arguments.
#[allow(clippy::too_many_arguments)]
fn build_modifier(
    name: &str,
    modifier: i64,
    include_function_name: Option<&str>,
    exclude_function_name: Option<&str>,
    include_module_name: Option<&str>,
    exclude_module_name: Option<&str>,
    include_tags: Vec<String>,
    exclude_tags: Vec<String>,
) -> Result<LevelModifier, DiagnosticsError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DiagnosticsError::validation("name", "must not be empty"));
    }

    LevelModifier::new(name, modifier)
        .include_function(include_function_name.unwrap_or_default())?
        .exclude_function(exclude_function_name.unwrap_or_default())?
        .include_module(include_module_name.unwrap_or_default())?
        .exclude_module(exclude_module_name.unwrap_or_default())
        .map(|rule| rule.include_tags(include_tags).exclude_tags(exclude_tags))
}

fn optional_pattern(pattern: Option<&str>) -> Result<Option<WildcardPattern>, DiagnosticsError> {
    match pattern.map(str::trim) {
        Some(p) if !p.is_empty() => WildcardPattern::new(p).map(Some),
        _ => Ok(None),
    }
}
