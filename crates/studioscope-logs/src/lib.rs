//! Log processing for studioscope
//!
//! This crate provides log parsing, noise exclusion, run-context indexing,
//! bounded incremental queries and log directory discovery.

mod buffer;
mod context;
mod directory;
mod error;
mod exclusion;
mod filter;
mod parser;
mod query;
mod reader;
mod side_index;
mod timestamp;

pub use buffer::{LevelCounts, RecordBuffer};
pub use context::{
    ContextClassifier, DEFAULT_STATE, RunContextIndex, build_index, context_for_line,
    transition_state,
};
pub use directory::LogDirectory;
pub use error::{LogError, Result};
pub use exclusion::{BUILTIN_EXCLUDE_CONTAINS, BUILTIN_EXCLUDE_PREFIXES, ExclusionFilter};
pub use filter::{CompiledFilter, is_error_record};
pub use parser::LogParser;
pub use query::{LogQuery, find_errors, read_by_date, read_from, search};
pub use side_index::{CachedCommandLine, DEFAULT_INDEX_FILE, LogIndexCache, extract_command_line};
pub use timestamp::{DateRange, in_range, parse_timestamp};

// Re-export types used in our public API
pub use studioscope_types::{
    DEFAULT_CATEGORIES, DEFAULT_MAX_ERRORS, DateQueryOptions, ERROR_CATEGORIES, MAX_OUTPUT_BYTES, ErrorEntry, ErrorQueryOptions, ErrorReport, LogLevel, LogRecord,
    QueryResult, ReadOptions, RecentOptions, RunContext, RunContextRange,
};
