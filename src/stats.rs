//! Per-category block counters and the last-event timestamp.
//!
//! Increments are independent atomics; snapshots are read without locking
//! and are eventually consistent across fields.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::Serialize;

use crate::rule::Category;

#[derive(Default)]
pub struct Stats {
    exec_blocks: AtomicU64,
    dns_blocks: AtomicU64,
    network_blocks: AtomicU64,
    total_events: AtomicU64,
    /// Epoch milliseconds of the most recently evaluated event; 0 = never.
    last_event_ms: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one blocked event in its category and in the global total.
    pub fn record_block(&self, category: Category) {
        let counter = match category {
            Category::Exec => &self.exec_blocks,
            Category::Dns => &self.dns_blocks,
            Category::Network => &self.network_blocks,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.total_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Overwrite the last-event timestamp. Called for every evaluated
    /// event, not just blocks.
    pub fn touch(&self) {
        self.last_event_ms
            .store(Utc::now().timestamp_millis() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            exec_blocks: self.exec_blocks.load(Ordering::Relaxed),
            dns_blocks: self.dns_blocks.load(Ordering::Relaxed),
            network_blocks: self.network_blocks.load(Ordering::Relaxed),
            total_events: self.total_events.load(Ordering::Relaxed),
            last_event_ms: self.last_event_ms.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub exec_blocks: u64,
    pub dns_blocks: u64,
    pub network_blocks: u64,
    pub total_events: u64,
    pub last_event_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_bumps_category_and_total() {
        let stats = Stats::new();
        stats.record_block(Category::Exec);
        stats.record_block(Category::Dns);
        stats.record_block(Category::Dns);

        let snap = stats.snapshot();
        assert_eq!(snap.exec_blocks, 1);
        assert_eq!(snap.dns_blocks, 2);
        assert_eq!(snap.network_blocks, 0);
        assert_eq!(snap.total_events, 3);
    }

    #[test]
    fn test_touch_overwrites_last_event() {
        let stats = Stats::new();
        assert_eq!(stats.snapshot().last_event_ms, 0);
        stats.touch();
        let first = stats.snapshot().last_event_ms;
        assert!(first > 0);
        stats.touch();
        assert!(stats.snapshot().last_event_ms >= first);
    }
}
