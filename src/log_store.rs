//! In-memory message and error logs.
//!
//! Both logs are bounded FIFO queues: once a queue is full, the oldest entry
//! is evicted to make room for the newest one.

use crate::constants::{DEFAULT_MAX_ERROR_COUNT, DEFAULT_MAX_MESSAGE_COUNT};
use crate::level::MessageLevel;
use crate::modifier::{has_tag, WildcardPattern};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// How a message was surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Information,
    Verbose,
    Debug,
    Warning,
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageType::Information => write!(f, "information"),
            MessageType::Verbose => write!(f, "verbose"),
            MessageType::Debug => write!(f, "debug"),
            MessageType::Warning => write!(f, "warning"),
        }
    }
}

/// A recorded message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub function_name: String,
    pub module_name: String,
    pub tags: Vec<String>,
    /// Resolved level.
    pub level: MessageLevel,
    pub message: String,
    pub message_type: MessageType,
    /// Owning execution context.
    pub runspace: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub computer_name: String,
    pub user_name: String,
    pub depth: i64,
}

/// A recorded error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub timestamp: DateTime<Utc>,
    pub function_name: String,
    pub module_name: String,
    pub tags: Vec<String>,
    pub message: String,
    /// Text of the underlying error, including its source chain.
    pub error_record: String,
    pub runspace: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// Common fields used by [`LogFilter`].
pub trait Filterable {
    fn function_name(&self) -> &str;
    fn module_name(&self) -> &str;
    fn target(&self) -> Option<&str>;
    fn tags(&self) -> &[String];
    fn runspace(&self) -> Uuid;
    /// Level, for entries that carry one.
    fn level(&self) -> Option<MessageLevel>;
}

impl Filterable for LogEntry {
    fn function_name(&self) -> &str {
        &self.function_name
    }
    fn module_name(&self) -> &str {
        &self.module_name
    }
    fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }
    fn tags(&self) -> &[String] {
        &self.tags
    }
    fn runspace(&self) -> Uuid {
        self.runspace
    }
    fn level(&self) -> Option<MessageLevel> {
        Some(self.level)
    }
}

impl Filterable for ErrorEntry {
    fn function_name(&self) -> &str {
        &self.function_name
    }
    fn module_name(&self) -> &str {
        &self.module_name
    }
    fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }
    fn tags(&self) -> &[String] {
        &self.tags
    }
    fn runspace(&self) -> Uuid {
        self.runspace
    }
    fn level(&self) -> Option<MessageLevel> {
        None
    }
}

/// Retrieval criteria for the logs. Unset criteria match everything.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub function_name: Option<WildcardPattern>,
    pub module_name: Option<WildcardPattern>,
    pub target: Option<String>,
    /// Entry must carry at least one of these tags.
    pub tags: Vec<String>,
    pub runspace: Option<Uuid>,
    /// Entry level must be one of these. Ignored for error entries.
    pub levels: Vec<MessageLevel>,
    /// Drop this many of the newest matches.
    pub skip: usize,
    /// Keep at most this many of the newest remaining matches.
    pub last: Option<usize>,
}

impl LogFilter {
    /// Check a single entry against every criterion except `skip`/`last`.
    pub fn matches<E: Filterable>(&self, entry: &E) -> bool {
        if let Some(pattern) = &self.function_name {
            if !pattern.matches(entry.function_name()) {
                return false;
            }
        }
        if let Some(pattern) = &self.module_name {
            if !pattern.matches(entry.module_name()) {
                return false;
            }
        }
        if let Some(target) = &self.target {
            if entry.target() != Some(target.as_str()) {
                return false;
            }
        }
        if !self.tags.is_empty()
            && !self
                .tags
                .iter()
                .any(|wanted| has_tag(entry.tags(), wanted))
        {
            return false;
        }
        if let Some(runspace) = self.runspace {
            if entry.runspace() != runspace {
                return false;
            }
        }
        if !self.levels.is_empty() {
            if let Some(level) = entry.level() {
                if !self.levels.contains(&level) {
                    return false;
                }
            }
        }
        true
    }

    /// Apply the filter to entries ordered oldest-first.
    ///
    /// The result is also oldest-first.
    pub fn apply<'a, E, I>(&self, entries: I) -> Vec<E>
    where
        E: Filterable + Clone + 'a,
        I: DoubleEndedIterator<Item = &'a E>,
    {
        let newest_first = entries.rev().filter(|e| self.matches(*e)).skip(self.skip);
        let mut selected: Vec<E> = match self.last {
            Some(last) => newest_first.take(last).cloned().collect(),
            None => newest_first.cloned().collect(),
        };
        selected.reverse();
        selected
    }
}

#[derive(Debug)]
struct Queues {
    messages: VecDeque<LogEntry>,
    errors: VecDeque<ErrorEntry>,
    max_messages: usize,
    max_errors: usize,
}

/// Bounded in-memory message and error logs.
#[derive(Debug)]
pub struct LogStore {
    queues: RwLock<Queues>,
}

impl Default for LogStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_COUNT, DEFAULT_MAX_ERROR_COUNT)
    }
}

impl LogStore {
    /// Create a store with the given capacities.
    pub fn new(max_messages: usize, max_errors: usize) -> Self {
        Self {
            queues: RwLock::new(Queues {
                messages: VecDeque::with_capacity(max_messages.min(DEFAULT_MAX_MESSAGE_COUNT)),
                errors: VecDeque::with_capacity(max_errors.min(DEFAULT_MAX_ERROR_COUNT)),
                max_messages,
                max_errors,
            }),
        }
    }

    /// Append a message, returning how many entries were evicted.
    pub fn push_message(&self, entry: LogEntry) -> usize {
        let mut queues = self.queues.write();
        let max = queues.max_messages;
        push_bounded(&mut queues.messages, entry, max)
    }

    /// Append an error, returning how many entries were evicted.
    pub fn push_error(&self, entry: ErrorEntry) -> usize {
        let mut queues = self.queues.write();
        let max = queues.max_errors;
        push_bounded(&mut queues.errors, entry, max)
    }

    /// Retrieve messages matching a filter, oldest-first.
    pub fn messages(&self, filter: &LogFilter) -> Vec<LogEntry> {
        filter.apply(self.queues.read().messages.iter())
    }

    /// Retrieve errors matching a filter, oldest-first.
    pub fn errors(&self, filter: &LogFilter) -> Vec<ErrorEntry> {
        filter.apply(self.queues.read().errors.iter())
    }

    /// Most recent error, if any.
    pub fn last_error(&self) -> Option<ErrorEntry> {
        self.queues.read().errors.back().cloned()
    }

    pub fn message_count(&self) -> usize {
        self.queues.read().messages.len()
    }

    pub fn error_count(&self) -> usize {
        self.queues.read().errors.len()
    }

    /// Current capacities as `(messages, errors)`.
    pub fn capacity(&self) -> (usize, usize) {
        let queues = self.queues.read();
        (queues.max_messages, queues.max_errors)
    }

    /// Change capacities, evicting the oldest entries if the queues shrink.
    ///
    /// Returns how many entries were evicted.
    pub fn set_capacity(&self, max_messages: usize, max_errors: usize) -> usize {
        let mut queues = self.queues.write();
        queues.max_messages = max_messages;
        queues.max_errors = max_errors;
        truncate_front(&mut queues.messages, max_messages)
            + truncate_front(&mut queues.errors, max_errors)
    }

    /// Remove all entries, returning `(messages, errors)` removed.
    pub fn clear(&self) -> (usize, usize) {
        let mut queues = self.queues.write();
        let counts = (queues.messages.len(), queues.errors.len());
        queues.messages.clear();
        queues.errors.clear();
        counts
    }
}

fn push_bounded<T>(queue: &mut VecDeque<T>, entry: T, max: usize) -> usize {
    if max == 0 {
        return 1;
    }
    queue.push_back(entry);
    truncate_front(queue, max)
}

fn truncate_front<T>(queue: &mut VecDeque<T>, max: usize) -> usize {
    let excess = queue.len().saturating_sub(max);
    queue.drain(..excess);
    excess
}
