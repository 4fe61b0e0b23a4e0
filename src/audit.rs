//! Bounded, insertion-ordered audit log of decisions taken.
//!
//! Entries are appended by the decision pipeline only and never mutated.
//! The log is a ring: once capacity is reached the oldest entry is
//! discarded for each new one. Retrieval drains oldest-first.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::rule::{Action, Category};

/// Default entry retention before the oldest entries are discarded.
pub const DEFAULT_LOG_CAPACITY: usize = 1024;

/// Maximum byte length of the recorded process name.
pub const PROCESS_NAME_MAX: usize = 255;

/// Maximum byte length of the free-text details field.
pub const DETAILS_MAX: usize = 511;

/// One recorded decision.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    /// Rule that fired; 0 if none.
    pub rule_id: u32,
    pub category: Category,
    pub action: Action,
    /// Subject process id.
    pub pid: u32,
    /// Subject process name.
    pub process: String,
    /// Event target the rule matched against.
    pub target: String,
    pub details: String,
}

impl LogEntry {
    /// Stamp a new entry. Over-long strings are truncated at a character
    /// boundary rather than rejected; audit must not fail.
    pub fn new(
        rule_id: u32,
        category: Category,
        action: Action,
        pid: u32,
        process: &str,
        target: &str,
        details: &str,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            rule_id,
            category,
            action,
            pid,
            process: truncated(process, PROCESS_NAME_MAX),
            target: truncated(target, crate::rule::TARGET_MAX),
            details: truncated(details, DETAILS_MAX),
        }
    }
}

fn truncated(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

/// The audit ring.
pub struct AuditLog {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append an entry, discarding the oldest at capacity.
    pub fn append(&self, entry: LogEntry) {
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Remove and return up to `max` oldest entries.
    pub fn drain(&self, max: usize) -> Vec<LogEntry> {
        let mut entries = self.entries.lock();
        let n = max.min(entries.len());
        entries.drain(..n).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}
