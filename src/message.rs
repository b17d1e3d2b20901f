//! Message front-end.
//!
//! [`MessageWriter`] is what commands call to emit diagnostics. Each message
//! has its level resolved against the current settings snapshot and the
//! writer's nesting depth. It is then routed to an output by the configured
//! thresholds, recorded in the in-memory log, and emitted through `tracing`.

use crate::constants::MAX_LOGGED_MESSAGE_LENGTH;
use crate::config::RoutingConfig;
use crate::error::DiagnosticsError;
use crate::level::MessageLevel;
use crate::log_store::{ErrorEntry, LogEntry, MessageType};
use crate::modifier::normalize_tags;
use crate::nesting::{NestingContext, NestingScope};
use crate::resolver::{LevelRequest, LevelResolution};
use crate::state::SharedState;
use chrono::Utc;
use once_cell::sync::Lazy;
use serde::Serialize;
use tracing::{debug, error, info, trace, warn};

/// Computer and user names stamped on every entry.
static HOST_IDENTITY: Lazy<(String, String)> = Lazy::new(|| {
    (
        env_or("COMPUTERNAME", "HOSTNAME", "localhost"),
        env_or("USERNAME", "USER", "unknown"),
    )
});

/// Output a resolved message is shown on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRoute {
    Information,
    Verbose,
    Debug,
    /// Outside every configured range; recorded but not shown.
    Suppressed,
}

impl MessageRoute {
    /// Pick the first output range containing the level.
    pub fn for_level(level: MessageLevel, routing: &RoutingConfig) -> Self {
        if routing.information.contains(level) {
            Self::Information
        } else if routing.verbose.contains(level) {
            Self::Verbose
        } else if routing.debug.contains(level) {
            Self::Debug
        } else {
            Self::Suppressed
        }
    }

    /// Message type recorded for this route.
    pub fn message_type(self) -> MessageType {
        match self {
            Self::Information => MessageType::Information,
            Self::Verbose => MessageType::Verbose,
            Self::Debug | Self::Suppressed => MessageType::Debug,
        }
    }
}

/// One message to write.
#[derive(Debug, Clone)]
pub struct MessageRequest {
    pub level: MessageLevel,
    pub message: String,
    pub function_name: String,
    pub module_name: String,
    pub tags: Vec<String>,
    pub target: Option<String>,
}

impl MessageRequest {
    pub fn new(
        level: MessageLevel,
        function_name: impl Into<String>,
        module_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            level,
            message: message.into(),
            function_name: function_name.into(),
            module_name: module_name.into(),
            tags: Vec::new(),
            target: None,
        }
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = normalize_tags(tags);
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

/// Outcome of a write.
#[derive(Debug, Clone, Serialize)]
pub struct WrittenMessage {
    pub route: MessageRoute,
    pub resolution: LevelResolution,
    /// Whether the message was added to the in-memory log.
    pub recorded: bool,
}

/// Writes messages on behalf of one execution context.
#[derive(Debug, Clone)]
pub struct MessageWriter {
    state: SharedState,
    context: NestingContext,
}

impl MessageWriter {
    /// Create a writer with a fresh execution context.
    pub fn new(state: SharedState) -> Self {
        Self::with_context(state, NestingContext::new())
    }

    /// Create a writer for an existing execution context.
    pub fn with_context(state: SharedState, context: NestingContext) -> Self {
        Self { state, context }
    }

    pub fn context(&self) -> &NestingContext {
        &self.context
    }

    /// Enter a nested command.
    pub fn enter(&self) -> NestingScope {
        self.context.enter()
    }

    /// Enter an error-guarding layer. Writes inside it resolve as guarded calls.
    pub fn guarded(&self) -> NestingScope {
        self.context.guarded()
    }

    /// Resolve, route, record, and emit a message.
    pub fn write(&self, mut request: MessageRequest) -> Result<WrittenMessage, DiagnosticsError> {
        request.tags = normalize_tags(&request.tags);
        let depth = self.context.depth();
        let settings = self.state.settings().snapshot();
        let resolution = settings.explain(
            &LevelRequest::new(request.level, &request.function_name, &request.module_name)
                .tags(&request.tags)
                .depth(depth)
                .guarded(self.context.in_guard()),
        )?;

        let metrics = self.state.metrics();
        metrics.record_resolution(!resolution.applied_modifiers.is_empty());

        let route = MessageRoute::for_level(resolution.level, self.state.routing());
        metrics.record_route(route);
        emit(route, &request, resolution.level);

        let recorded = self.state.logging().message_logging;
        if recorded {
            let entry = self.entry(&request, resolution.level, route.message_type(), depth);
            metrics.record_messages_evicted(self.state.log().push_message(entry));
        }

        Ok(WrittenMessage {
            route,
            resolution,
            recorded,
        })
    }

    /// Record and emit a warning. Warnings bypass level resolution.
    pub fn warn(
        &self,
        function_name: &str,
        module_name: &str,
        message: &str,
        tags: &[String],
        target: Option<&str>,
    ) -> Result<(), DiagnosticsError> {
        require_names(function_name, module_name)?;
        let mut request =
            MessageRequest::new(MessageLevel::Important, function_name, module_name, message)
                .tags(tags);
        request.target = target.map(str::to_string);

        warn!(
            function = %request.function_name,
            module = %request.module_name,
            "{}",
            truncate_for_log(&request.message, MAX_LOGGED_MESSAGE_LENGTH)
        );
        self.state.metrics().record_warning();

        if self.state.logging().message_logging {
            let entry = self.entry(
                &request,
                MessageLevel::Important,
                MessageType::Warning,
                self.context.depth(),
            );
            self.state
                .metrics()
                .record_messages_evicted(self.state.log().push_message(entry));
        }
        Ok(())
    }

    /// Record an error together with a warning describing it.
    pub fn error(
        &self,
        function_name: &str,
        module_name: &str,
        message: &str,
        err: &(dyn std::error::Error + 'static),
        tags: &[String],
        target: Option<&str>,
    ) -> Result<(), DiagnosticsError> {
        require_names(function_name, module_name)?;
        let error_record = error_chain(err);
        let tags = normalize_tags(tags);

        error!(
            function = %function_name,
            module = %module_name,
            error = %error_record,
            "{}",
            truncate_for_log(message, MAX_LOGGED_MESSAGE_LENGTH)
        );
        self.state.metrics().record_error();

        if self.state.logging().error_logging {
            let entry = ErrorEntry {
                timestamp: Utc::now(),
                function_name: function_name.to_string(),
                module_name: module_name.to_string(),
                tags: tags.clone(),
                message: message.to_string(),
                error_record: error_record.clone(),
                runspace: self.context.runspace(),
                target: target.map(str::to_string),
            };
            self.state
                .metrics()
                .record_errors_evicted(self.state.log().push_error(entry));
        }

        self.warn(
            function_name,
            module_name,
            &format!("{} | {}", message, error_record),
            &tags,
            target,
        )
    }

    fn entry(
        &self,
        request: &MessageRequest,
        level: MessageLevel,
        message_type: MessageType,
        depth: i64,
    ) -> LogEntry {
        LogEntry {
            timestamp: Utc::now(),
            function_name: request.function_name.clone(),
            module_name: request.module_name.clone(),
            tags: request.tags.clone(),
            level,
            message: request.message.clone(),
            message_type,
            runspace: self.context.runspace(),
            target: request.target.clone(),
            computer_name: HOST_IDENTITY.0.clone(),
            user_name: HOST_IDENTITY.1.clone(),
            depth,
        }
    }
}

fn emit(route: MessageRoute, request: &MessageRequest, level: MessageLevel) {
    let text = truncate_for_log(&request.message, MAX_LOGGED_MESSAGE_LENGTH);
    let function = request.function_name.as_str();
    let module = request.module_name.as_str();
    let level = level.ordinal();
    match route {
        MessageRoute::Information => info!(function, module, level, "{}", text),
        MessageRoute::Verbose => debug!(function, module, level, "{}", text),
        MessageRoute::Debug => trace!(function, module, level, "{}", text),
        MessageRoute::Suppressed => {}
    }
}

fn require_names(function_name: &str, module_name: &str) -> Result<(), DiagnosticsError> {
    if function_name.trim().is_empty() {
        return Err(DiagnosticsError::validation("function_name", "must not be empty"));
    }
    if module_name.trim().is_empty() {
        return Err(DiagnosticsError::validation("module_name", "must not be empty"));
    }
    Ok(())
}

/// Render an error and its sources as one line.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

fn env_or(primary: &str, fallback: &str, default: &str) -> String {
    std::env::var(primary)
        .or_else(|_| std::env::var(fallback))
        .unwrap_or_else(|_| default.to_string())
}

/// Truncate a string for logging.
fn truncate_for_log(s: &str, max_len: usize) -> String {
    match s.char_indices().nth(max_len) {
        None => s.to_string(),
        Some((index, _)) => format!("{}...", &s[..index]),
    }
}
