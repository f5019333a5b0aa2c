use regex::Regex;
use std::collections::HashSet;

use studioscope_types::{DEFAULT_CATEGORIES, ERROR_CATEGORIES, LogLevel, LogRecord};

use crate::error::{LogError, Result};
use crate::exclusion::ExclusionFilter;
use crate::timestamp::DateRange;

/// Compiled per-record predicate shared by every query
///
/// Combines the category allow-list, the exclusion filter, the calendar
/// range and an optional message pattern. Run-context filtering needs the
/// file-level index and is applied by the query engine.
#[derive(Clone)]
pub struct CompiledFilter {
    /// Message pattern (if any)
    regex: Option<Regex>,

    /// Categories to include (empty = all)
    categories: HashSet<String>,

    /// Noise filter (if applied)
    exclusion: Option<ExclusionFilter>,

    date_range: DateRange,

    /// Exact level to keep (if any)
    level: Option<LogLevel>,

    /// Keep only warnings, errors and error-prone categories
    errors_only: bool,
}

impl CompiledFilter {
    /// Create a case-insensitive message filter
    ///
    /// An empty pattern matches every message.
    pub fn new_case_insensitive(pattern: &str) -> Result<Self> {
        let regex = if pattern.is_empty() {
            None
        } else {
            Some(
                Regex::new(&format!("(?i){}", pattern)).map_err(|e| LogError::InvalidPattern {
                    pattern: pattern.to_string(),
                    source: e,
                })?,
            )
        };

        Ok(Self {
            regex,
            categories: HashSet::new(),
            exclusion: None,
            date_range: DateRange::default(),
            level: None,
            errors_only: false,
        })
    }

    /// A filter that matches everything
    pub fn any() -> Self {
        Self {
            regex: None,
            categories: HashSet::new(),
            exclusion: None,
            date_range: DateRange::default(),
            level: None,
            errors_only: false,
        }
    }

    /// Set the category allow-list
    ///
    /// `None` selects [`DEFAULT_CATEGORIES`]; an empty list allows every category.
    pub fn with_categories(mut self, categories: Option<&[String]>) -> Self {
        self.categories = match categories {
            Some(list) => list.iter().cloned().collect(),
            None => DEFAULT_CATEGORIES.iter().map(|s| s.to_string()).collect(),
        };
        self
    }

    /// Apply an exclusion filter to messages
    pub fn with_exclusion(mut self, exclusion: Option<ExclusionFilter>) -> Self {
        self.exclusion = exclusion;
        self
    }

    pub fn with_date_range(mut self, date_range: DateRange) -> Self {
        self.date_range = date_range;
        self
    }

    /// Keep only records of exactly this level
    pub fn with_level(mut self, level: Option<LogLevel>) -> Self {
        self.level = level;
        self
    }

    /// Keep only records that count as errors
    pub fn errors_only(mut self) -> Self {
        self.errors_only = true;
        self
    }

    /// Check if a record passes every filter dimension
    pub fn matches(&self, record: &LogRecord) -> bool {
        if !self.categories.is_empty() && !self.categories.contains(&record.category) {
            return false;
        }

        if self.level.is_some_and(|level| level != record.level) {
            return false;
        }

        if self.errors_only && !is_error_record(record) {
            return false;
        }

        if let Some(exclusion) = &self.exclusion {
            if exclusion.should_exclude(&record.message) {
                return false;
            }
        }

        if !self.date_range.contains(&record.timestamp) {
            return false;
        }

        match &self.regex {
            Some(re) => re.is_match(&record.message),
            None => true,
        }
    }

}

impl std::fmt::Debug for CompiledFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledFilter")
            .field("regex", &self.regex.as_ref().map(Regex::as_str))
            .field("categories", &self.categories)
            .field("exclusion", &self.exclusion.is_some())
            .field("date_range", &self.date_range)
            .field("level", &self.level)
            .field("errors_only", &self.errors_only)
            .finish()
    }
}

/// Check whether a record counts as an error
pub fn is_error_record(record: &LogRecord) -> bool {
    record.level.is_error_level() || ERROR_CATEGORIES.contains(&record.category.as_str())
}
