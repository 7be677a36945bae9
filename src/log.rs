//! Diagnostic log sink shared by the devices and the execution controls.
//!
//! The most recent lines are kept in memory so an inspector can show them,
//! and can be echoed to stderr as they arrive. Once the capacity is reached
//! the oldest line is dropped for each new one.

use std::collections::VecDeque;
use std::fmt::Display;
use std::io::Write;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Severity of a log line.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::Info => f.pad("INFO"),
            Level::Warn => f.pad("WARN"),
            Level::Error => f.pad("ERROR"),
        }
    }
}

/// One recorded diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub level: Level,
    pub message: String,
}

/// Lines retained when no capacity is given.
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug)]
pub struct Log {
    entries: VecDeque<Entry>,
    capacity: usize,
    echo: bool,
    color: bool,
}

impl Default for Log {
    fn default() -> Self {
        Self::new()
    }
}

impl Log {
    /// A log that only records.
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: DEFAULT_CAPACITY,
            echo: false,
            color: false,
        }
    }

    /// A log that records and also writes each line to stderr.
    pub fn echoing(color: bool) -> Self {
        Self {
            echo: true,
            color,
            ..Self::new()
        }
    }

    /// Keep at most `lines` entries (at least one).
    pub fn with_capacity(mut self, lines: usize) -> Self {
        self.capacity = lines.max(1);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Level::Info, message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(Level::Warn, message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Level::Error, message.into());
    }

    /// Retained entries, oldest first.
    pub fn entries(&self) -> &VecDeque<Entry> {
        &self.entries
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.message.as_str())
    }

    /// All messages joined by newlines, oldest first.
    pub fn text(&self) -> String {
        self.lines().collect::<Vec<_>>().join("\n")
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().any(|l| l.contains(needle))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn push(&mut self, level: Level, message: String) {
        if self.echo {
            self.emit(level, &message);
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(Entry { level, message });
    }

    fn emit(&self, level: Level, message: &str) {
        let choice = if self.color {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };
        let mut stderr = StandardStream::stderr(choice);
        let mut spec = ColorSpec::new();
        match level {
            Level::Warn => {
                spec.set_fg(Some(Color::Yellow)).set_bold(true);
            }
            Level::Error => {
                spec.set_fg(Some(Color::Red)).set_bold(true);
            }
            Level::Info => {
                spec.clear();
            }
        }
        let _ = stderr.set_color(&spec);
        let _ = write!(stderr, "[{:5}] ", level);
        let _ = writeln!(stderr, "{}", message);
        let _ = stderr.reset();
    }
}
