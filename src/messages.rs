//! Run-level message sink.
//!
//! Every report run owns one [`Messages`] value. Messages are tagged with the
//! template currently being expanded, forwarded to the `log` facade and kept
//! so the caller can inspect them once the run is finished. A message whose
//! formatted text was already emitted during the run is dropped, so a broken
//! placeholder inside a 10 000 row result shows up once instead of 10 000
//! times.

use std::collections::HashSet;
use std::fmt;

/// Severity of a message, ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Level {
    fn as_log_level(self) -> log::Level {
        match self {
            Level::Error => log::Level::Error,
            Level::Warn => log::Level::Warn,
            Level::Info => log::Level::Info,
            Level::Debug => log::Level::Debug,
            Level::Trace => log::Level::Trace,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        };
        f.write_str(label)
    }
}

/// A single emitted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub level: Level,
    /// Name of the template being expanded when the message was emitted.
    pub context: Option<String>,
    pub text: String,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(ctx) => write!(f, "[{}] {}", ctx, self.text),
            None => f.write_str(&self.text),
        }
    }
}

/// De-duplicating message sink for one report run.
#[derive(Debug, Default)]
pub struct Messages {
    context: Option<String>,
    seen: HashSet<(Level, String)>,
    entries: Vec<Message>,
}

impl Messages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the context attached to following messages.
    ///
    /// Returns the previous context so a caller can restore it.
    pub fn set_context(&mut self, context: Option<String>) -> Option<String> {
        std::mem::replace(&mut self.context, context)
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.emit(Level::Error, text.into());
    }

    pub fn warn(&mut self, text: impl Into<String>) {
        self.emit(Level::Warn, text.into());
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.emit(Level::Info, text.into());
    }

    pub fn debug(&mut self, text: impl Into<String>) {
        self.emit(Level::Debug, text.into());
    }

    pub fn trace(&mut self, text: impl Into<String>) {
        self.emit(Level::Trace, text.into());
    }

    /// Whether debug output would reach the log at all.
    ///
    /// Used to skip building expensive debug strings.
    pub fn is_debug(&self) -> bool {
        log::log_enabled!(log::Level::Debug)
    }

    pub fn is_trace(&self) -> bool {
        log::log_enabled!(log::Level::Trace)
    }

    fn emit(&mut self, level: Level, text: String) {
        let message = Message {
            level,
            context: self.context.clone(),
            text,
        };
        let formatted = message.to_string();
        if !self.seen.insert((level, formatted.clone())) {
            return;
        }
        log::log!(level.as_log_level(), "{}", formatted);
        self.entries.push(message);
    }

    /// All messages emitted so far, in order.
    pub fn entries(&self) -> &[Message] {
        &self.entries
    }

    pub fn count(&self, level: Level) -> usize {
        self.entries.iter().filter(|m| m.level == level).count()
    }

    pub fn error_count(&self) -> usize {
        self.count(Level::Error)
    }

    /// Messages of exactly the given level.
    pub fn with_level(&self, level: Level) -> impl Iterator<Item = &Message> {
        self.entries.iter().filter(move |m| m.level == level)
    }
}
