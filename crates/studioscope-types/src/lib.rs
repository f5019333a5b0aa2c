//! Shared types for studioscope
//!
//! This crate contains the records produced by the log parser, the run-context
//! index, and the option/result records exchanged with the query engine.

use serde::{Deserialize, Serialize};

// ============================================================================
// Contract Constants
// ============================================================================

/// Hard cap on the UTF-8 size of one query's text output
pub const MAX_OUTPUT_BYTES: usize = 32_000;

/// Default cap on the number of entries returned by error extraction
pub const DEFAULT_MAX_ERRORS: usize = 100;

/// Categories read by default: normal output, warning and error tiers
pub const DEFAULT_CATEGORIES: &[&str] = &["FLog::Output", "FLog::Warning", "FLog::Error"];

/// Categories whose records are always reported by error extraction
pub const ERROR_CATEGORIES: &[&str] = &["FLog::Error", "FLog::Warning", "DFLog::Error"];

// ============================================================================
// Log Types
// ============================================================================

/// Log severity level
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Verbose,
    #[default]
    Info,
    Warning,
    Error,
    Fatal,
    Unknown,
}

impl LogLevel {
    /// Parse the optional level token of a log line
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trace" => Self::Trace,
            "debug" => Self::Debug,
            "verbose" => Self::Verbose,
            "info" | "information" => Self::Info,
            "warn" | "warning" => Self::Warning,
            "error" | "err" => Self::Error,
            "fatal" | "critical" => Self::Fatal,
            _ => Self::Unknown,
        }
    }

    /// Canonical name, as it appears in log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "Trace",
            Self::Debug => "Debug",
            Self::Verbose => "Verbose",
            Self::Info => "Info",
            Self::Warning => "Warning",
            Self::Error => "Error",
            Self::Fatal => "Fatal",
            Self::Unknown => "Unknown",
        }
    }

    /// Whether this level counts as an error for error extraction
    pub fn is_error_level(&self) -> bool {
        matches!(self, Self::Warning | Self::Error | Self::Fatal)
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse execution mode a log line was emitted in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunContext {
    Play,
    Edit,
    #[default]
    Unknown,
}

impl RunContext {
    /// Parse a user-supplied context name
    ///
    /// `server` and `client` are accepted as aliases of `play`.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "play" | "server" | "client" => Some(Self::Play),
            "edit" => Some(Self::Edit),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Short prefix used when output lines carry a context label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Play => "[P]",
            Self::Edit => "[E]",
            Self::Unknown => "[?]",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Edit => "edit",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single parsed log line
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Timestamp in its original textual form
    pub timestamp: String,

    /// Level token, `Info` when the line carries none
    pub level: LogLevel,

    /// Bracketed category, e.g. `FLog::Output`
    pub category: String,

    /// Payload after the category
    pub message: String,

    /// 1-based position of the raw line in the file
    pub line_num: u64,

    /// Resolved lazily by the query engine
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_context: Option<RunContext>,

    /// Original trimmed line
    #[serde(skip)]
    pub raw: String,
}

impl LogRecord {
    /// Clock part (`HH:MM:SS`) of the timestamp, if present
    pub fn clock_time(&self) -> Option<&str> {
        self.timestamp.get(11..19)
    }
}

// ============================================================================
// Run-Context Index Types
// ============================================================================

/// One contiguous span of lines emitted under a single state label
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContextRange {
    /// Raw state label, e.g. `Edit` or `PlayServer`
    pub state: String,

    pub start_line: u64,

    /// `None` means the range is open and extends to the end of the file
    pub end_line: Option<u64>,

    /// Best-effort, may be empty
    pub start_time: String,

    /// Best-effort, may be empty
    pub end_time: String,
}

impl RunContextRange {
    /// Open a new range at `start_line`
    pub fn open(state: impl Into<String>, start_line: u64, start_time: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            start_line,
            end_line: None,
            start_time: start_time.into(),
            end_time: String::new(),
        }
    }

    /// Check whether a line falls inside this range
    pub fn contains(&self, line_num: u64) -> bool {
        line_num >= self.start_line && self.end_line.is_none_or(|end| line_num <= end)
    }
}

// ============================================================================
// Query Options
// ============================================================================

/// Options for bounded incremental reads and pattern searches
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    /// Exclusive lower line bound
    pub after_line: Option<u64>,

    /// Exclusive upper line bound
    pub before_line: Option<u64>,

    pub start_date: Option<String>,
    pub end_date: Option<String>,

    /// Prefix each output line with `[HH:MM:SS]`
    pub timestamps: bool,

    /// Category allow-list; `None` uses [`DEFAULT_CATEGORIES`], empty allows all
    pub categories: Option<Vec<String>>,

    pub apply_exclusion_filter: bool,

    /// Hard filter on the resolved run-context
    pub run_context: Option<RunContext>,

    /// Prefix each output line with `[P]`/`[E]`/`[?]`
    pub include_context_label: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            after_line: None,
            before_line: None,
            start_date: None,
            end_date: None,
            timestamps: false,
            categories: None,
            apply_exclusion_filter: true,
            run_context: None,
            include_context_label: false,
        }
    }
}

/// Options for date-range reads
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DateQueryOptions {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub timestamps: bool,
    pub categories: Option<Vec<String>>,
    pub apply_exclusion_filter: bool,
    pub run_context: Option<RunContext>,
    pub include_context_label: bool,
}

impl Default for DateQueryOptions {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            timestamps: true,
            categories: None,
            apply_exclusion_filter: true,
            run_context: None,
            include_context_label: false,
        }
    }
}

impl From<DateQueryOptions> for ReadOptions {
    fn from(opts: DateQueryOptions) -> Self {
        Self {
            after_line: None,
            before_line: None,
            start_date: opts.start_date,
            end_date: opts.end_date,
            timestamps: opts.timestamps,
            categories: opts.categories,
            apply_exclusion_filter: opts.apply_exclusion_filter,
            run_context: opts.run_context,
            include_context_label: opts.include_context_label,
        }
    }
}

/// Options for error extraction
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorQueryOptions {
    pub after_line: Option<u64>,
    pub before_line: Option<u64>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,

    /// Cap on the returned list; the total count is never capped
    pub max_errors: usize,

    pub run_context: Option<RunContext>,
    pub apply_exclusion_filter: bool,
}

impl Default for ErrorQueryOptions {
    fn default() -> Self {
        Self {
            after_line: None,
            before_line: None,
            start_date: None,
            end_date: None,
            max_errors: DEFAULT_MAX_ERRORS,
            run_context: None,
            apply_exclusion_filter: true,
        }
    }
}

/// Options for fetching the most recent records of a log
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RecentOptions {
    /// Maximum number of records returned
    pub limit: usize,

    /// Category allow-list; `None` uses [`DEFAULT_CATEGORIES`], empty allows all
    pub categories: Option<Vec<String>>,

    /// Only keep records of exactly this level
    pub min_level: Option<LogLevel>,

    pub apply_exclusion_filter: bool,
}

impl Default for RecentOptions {
    fn default() -> Self {
        Self {
            limit: 100,
            categories: None,
            min_level: None,
            apply_exclusion_filter: true,
        }
    }
}

// ============================================================================
// Query Results
// ============================================================================

/// Formatted result of a read, search or date-range query
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Emitted lines joined by `\n`
    pub logs: String,

    /// First emitted line number, 0 when nothing was emitted
    pub start_line: u64,

    /// Last emitted line number, 0 when nothing was emitted
    pub last_line: u64,

    /// Number of lines emitted
    pub match_count: usize,

    /// Matching lines left out because of the byte budget
    pub remaining: usize,

    pub has_more: bool,

    /// Set when the query itself was malformed; the rest of the result is empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResult {
    /// The "no results" shape
    pub fn empty() -> Self {
        Self::default()
    }

    /// An empty result carrying a query-level error
    pub fn with_error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// One structured entry returned by error extraction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub line: u64,
    pub timestamp: String,
    pub message: String,
    pub category: String,
    pub level: LogLevel,
    pub run_context: RunContext,
}

/// Result of error extraction
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub has_error: bool,

    /// True total of matches in range, independent of `max_errors`
    pub error_count: usize,

    pub errors: Vec<ErrorEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ErrorReport {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Whether the returned list was cut short by `max_errors`
    pub fn is_truncated(&self) -> bool {
        self.error_count > self.errors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_str() {
        assert_eq!(LogLevel::from_str("Warning"), LogLevel::Warning);
        assert_eq!(LogLevel::from_str("error"), LogLevel::Error);
        assert_eq!(LogLevel::from_str("Info"), LogLevel::Info);
        assert_eq!(LogLevel::from_str("Bogus"), LogLevel::Unknown);
    }

    #[test]
    fn test_run_context_aliases() {
        assert_eq!(RunContext::from_str("server"), Some(RunContext::Play));
        assert_eq!(RunContext::from_str("Client"), Some(RunContext::Play));
        assert_eq!(RunContext::from_str("edit"), Some(RunContext::Edit));
        assert_eq!(RunContext::from_str("nope"), None);
    }

    #[test]
    fn test_range_contains() {
        let mut range = RunContextRange::open("Edit", 5, "");
        assert!(!range.contains(4));
        assert!(range.contains(5));
        assert!(range.contains(10_000));

        range.end_line = Some(9);
        assert!(range.contains(9));
        assert!(!range.contains(10));
    }

    #[test]
    fn test_date_options_convert_without_line_bounds() {
        let read: ReadOptions = DateQueryOptions::default().into();
        assert!(read.timestamps);
        assert!(read.after_line.is_none());
        assert!(read.before_line.is_none());
        assert!(read.apply_exclusion_filter);
    }

    #[test]
    fn test_error_report_truncation() {
        let report = ErrorReport {
            has_error: true,
            error_count: 2,
            errors: Vec::new(),
            error: None,
        };
        assert!(report.is_truncated());
    }
}
