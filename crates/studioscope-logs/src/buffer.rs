use serde::Serialize;
use std::collections::VecDeque;

use studioscope_types::{LogLevel, LogRecord};

/// Bounded ring buffer keeping the most recent records of a scan
pub struct RecordBuffer {
    /// Internal storage
    entries: VecDeque<LogRecord>,

    /// Maximum capacity
    capacity: usize,
}

impl RecordBuffer {
    /// Create a new buffer with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    /// Push a new record, evicting the oldest if at capacity
    pub fn push(&mut self, record: LogRecord) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(record);
    }

    /// Get record count per log level
    pub fn level_counts(&self) -> LevelCounts {
        LevelCounts::from_records(&self.entries)
    }

    /// Total record count
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consume the buffer, oldest record first
    pub fn into_records(self) -> Vec<LogRecord> {
        self.entries.into()
    }
}

/// Counts per log level
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LevelCounts {
    pub debug: usize,
    pub info: usize,
    pub warning: usize,
    pub error: usize,
    pub unknown: usize,
}

impl LevelCounts {
    /// Tally records by level
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a LogRecord>) -> Self {
        let mut counts = Self::default();

        for record in records {
            match record.level {
                LogLevel::Trace | LogLevel::Debug | LogLevel::Verbose => counts.debug += 1,
                LogLevel::Info => counts.info += 1,
                LogLevel::Warning => counts.warning += 1,
                LogLevel::Error | LogLevel::Fatal => counts.error += 1,
                LogLevel::Unknown => counts.unknown += 1,
            }
        }

        counts
    }

    pub fn total(&self) -> usize {
        self.debug + self.info + self.warning + self.error + self.unknown
    }
}
