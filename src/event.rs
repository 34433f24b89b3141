//! Diagnostics channel.
//!
//! The assembler and simulator report what they do as [`LogEntry`] values
//! pushed into an [`EventSink`]. Nothing in the core ever reads an entry
//! back; sinks exist purely for observers.
//!
//! Two sinks are provided:
//! - [`LogSink`] forwards every entry to the `log` facade and keeps nothing.
//! - [`EventLog`] keeps the full history, forwards to `log`, and broadcasts
//!   each entry to any number of subscribers.

use chrono::{DateTime, Local};
use serde::{Serialize, Deserialize};
use std::fmt;

/// Severity of a diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Success,
}

impl LogLevel {
    fn as_log_level(self) -> log::Level {
        match self {
            LogLevel::Info => log::Level::Debug,
            LogLevel::Success => log::Level::Info,
            LogLevel::Warning => log::Level::Warn,
            LogLevel::Error => log::Level::Error,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Success => "SUCCESS",
        })
    }
}

/// The component an entry comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogContext {
    Fetch,
    Decode,
    ExecuteMri,
    ExecuteNmri,
    ExecuteIo,
    Directive,
    System,
    Lexer,
    Parser,
    Assembler,
}

impl LogContext {
    pub fn tag(self) -> &'static str {
        match self {
            LogContext::Fetch => "FETCH",
            LogContext::Decode => "DECODE",
            LogContext::ExecuteMri => "EXECUTE_MRI",
            LogContext::ExecuteNmri => "EXECUTE_NMRI",
            LogContext::ExecuteIo => "EXECUTE_IO",
            LogContext::Directive => "DIRECTIVE",
            LogContext::System => "SYSTEM",
            LogContext::Lexer => "LEXER",
            LogContext::Parser => "PARSER",
            LogContext::Assembler => "ASSEMBLER",
        }
    }

    fn target(self) -> &'static str {
        match self {
            LogContext::Fetch => "mano::fetch",
            LogContext::Decode => "mano::decode",
            LogContext::ExecuteMri => "mano::execute_mri",
            LogContext::ExecuteNmri => "mano::execute_nmri",
            LogContext::ExecuteIo => "mano::execute_io",
            LogContext::Directive => "mano::directive",
            LogContext::System => "mano::system",
            LogContext::Lexer => "mano::lexer",
            LogContext::Parser => "mano::parser",
            LogContext::Assembler => "mano::assembler",
        }
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One diagnostic event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub context: LogContext,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(context: LogContext, level: LogLevel, message: String) -> Self {
        Self { timestamp: Local::now(), context, level, message }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] [{}] {}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.context,
            self.level,
            self.message
        )
    }
}

/// Receiver of diagnostic events.
pub trait EventSink {
    /// Accept one entry.
    fn record(&mut self, entry: LogEntry);

    fn emit(&mut self, context: LogContext, level: LogLevel, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.record(LogEntry::new(context, level, message.into()));
    }

    fn info(&mut self, context: LogContext, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.emit(context, LogLevel::Info, message);
    }

    fn warn(&mut self, context: LogContext, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.emit(context, LogLevel::Warning, message);
    }

    fn error(&mut self, context: LogContext, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.emit(context, LogLevel::Error, message);
    }

    fn success(&mut self, context: LogContext, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.emit(context, LogLevel::Success, message);
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn record(&mut self, entry: LogEntry) {
        (**self).record(entry);
    }
}

fn forward(entry: &LogEntry) {
    log::log!(
        target: entry.context.target(),
        entry.level.as_log_level(),
        "{}",
        entry.message
    );
}

/// Sink that only forwards to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn record(&mut self, entry: LogEntry) {
        forward(&entry);
    }
}

/// Handle returned by [`EventLog::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&LogEntry)>;

/// Event history with broadcast to subscribers.
#[derive(Default)]
pub struct EventLog {
    entries: Vec<LogEntry>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_id: u64,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. It is called once for every entry already in the
    /// history, then for every new entry.
    pub fn subscribe<F>(&mut self, mut listener: F) -> SubscriptionId
    where
        F: FnMut(&LogEntry) + 'static,
    {
        for entry in &self.entries {
            listener(entry);
        }
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn by_level(&self, level: LogLevel) -> Vec<&LogEntry> {
        self.entries.iter().filter(|e| e.level == level).collect()
    }

    pub fn by_context(&self, context: LogContext) -> Vec<&LogEntry> {
        self.entries.iter().filter(|e| e.context == context).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl EventSink for EventLog {
    fn record(&mut self, entry: LogEntry) {
        forward(&entry);
        for (_, listener) in &mut self.listeners {
            listener(&entry);
        }
        self.entries.push(entry);
    }
}

impl fmt::Debug for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLog")
            .field("entries", &self.entries.len())
            .field("subscribers", &self.listeners.len())
            .finish()
    }
}
