use std::sync::LazyLock;

use regex::Regex;

use studioscope_types::{LogLevel, LogRecord};

/// Timestamp, relative clock, thread id, sequence number, optional level,
/// bracketed category, message
static LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d{4}-\d{2}-\d{2}T[\d:.]+Z),[\d.]+,[0-9a-fA-F]+,\d+(?:,(\w+))?\s*\[([^\]]+)\]\s*(.*)$",
    )
    .expect("line pattern is valid")
});

/// Log parser for extracting structure from raw log lines
pub struct LogParser;

impl LogParser {
    /// Parse one raw line into a [`LogRecord`]
    ///
    /// Returns `None` for banners, blank lines and anything else that does
    /// not follow the structured record shape.
    pub fn parse(raw: &str, line_num: u64) -> Option<LogRecord> {
        let line = raw.trim();
        let caps = LINE_RE.captures(line)?;

        let level = caps
            .get(2)
            .map(|m| LogLevel::from_str(m.as_str()))
            .unwrap_or(LogLevel::Info);

        Some(LogRecord {
            timestamp: caps[1].to_string(),
            level,
            category: caps[3].to_string(),
            message: caps[4].to_string(),
            line_num,
            run_context: None,
            raw: line.to_string(),
        })
    }
}
