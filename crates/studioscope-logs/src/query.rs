//! Query engine
//!
//! Every query streams the log once, top to bottom, through the same
//! pipeline: line bounds, parse, [`CompiledFilter`], run-context. Queries
//! that produce text then pass survivors through a byte-budgeted emitter;
//! error extraction collects structured entries under a count cap instead.

use std::path::{Path, PathBuf};

use tracing::debug;

use studioscope_types::{
    DateQueryOptions, ErrorEntry, ErrorQueryOptions, ErrorReport, LogRecord, MAX_OUTPUT_BYTES,
    QueryResult, ReadOptions, RecentOptions, RunContext,
};

use crate::buffer::RecordBuffer;
use crate::context::{ContextClassifier, RunContextIndex};
use crate::error::{LogError, Result};
use crate::exclusion::ExclusionFilter;
use crate::filter::CompiledFilter;
use crate::parser::LogParser;
use crate::reader::{NumberedLines, open_log};
use crate::timestamp::DateRange;

/// Exclusive line-number window of a scan
#[derive(Clone, Copy, Debug, Default)]
struct LineBounds {
    after: Option<u64>,
    before: Option<u64>,
}

/// Whether and how a scan resolves run-context
#[derive(Clone, Copy, Debug, Default)]
struct ContextMode {
    /// Drop records whose context differs
    only: Option<RunContext>,

    /// Attach the context to every surviving record
    resolve: bool,
}

impl ContextMode {
    fn needed(&self) -> bool {
        self.resolve || self.only.is_some()
    }
}

/// Output shape of a text query
#[derive(Clone, Copy, Debug)]
struct LineFormat {
    line_numbers: bool,
    context_label: bool,
    timestamps: bool,
}

impl LineFormat {
    fn render(&self, record: &LogRecord) -> String {
        let mut out = String::with_capacity(record.message.len() + 24);
        if self.line_numbers {
            out.push_str(&record.line_num.to_string());
            out.push('|');
        }
        if self.context_label {
            out.push_str(record.run_context.unwrap_or_default().label());
            out.push(' ');
        }
        if self.timestamps {
            out.push('[');
            out.push_str(record.clock_time().unwrap_or(""));
            out.push_str("] ");
        }
        out.push_str(&record.message);
        out
    }
}

/// Accumulates formatted lines under the byte budget
///
/// Every offered record counts as a match. Lines are emitted until one
/// would push the output past the budget; from then on records are only
/// counted. The first line is always emitted, whatever its size.
struct BudgetedOutput {
    lines: Vec<String>,
    bytes: usize,
    budget: usize,
    start_line: u64,
    last_line: u64,
    matched: usize,
    exceeded: bool,
}

impl BudgetedOutput {
    fn new(budget: usize) -> Self {
        Self {
            lines: Vec::new(),
            bytes: 0,
            budget,
            start_line: 0,
            last_line: 0,
            matched: 0,
            exceeded: false,
        }
    }

    fn offer(&mut self, record: &LogRecord, format: LineFormat) {
        self.matched += 1;
        if self.exceeded {
            return;
        }

        let line = format.render(record);
        let line_bytes = line.len() + 1;
        if self.bytes + line_bytes > self.budget && !self.lines.is_empty() {
            self.exceeded = true;
            return;
        }

        if self.lines.is_empty() {
            self.start_line = record.line_num;
        }
        self.last_line = record.line_num;
        self.bytes += line_bytes;
        self.lines.push(line);
    }

    fn finish(self) -> QueryResult {
        let emitted = self.lines.len();
        let remaining = self.matched - emitted;
        QueryResult {
            logs: self.lines.join("\n"),
            start_line: self.start_line,
            last_line: self.last_line,
            match_count: emitted,
            remaining,
            has_more: remaining > 0,
            error: None,
        }
    }
}

/// Queries against one log file
///
/// Holds the exclusion rules and label classification used by every query.
/// A prebuilt [`RunContextIndex`] can be attached to avoid rescanning the
/// file for run-context on every call.
#[derive(Clone, Debug)]
pub struct LogQuery {
    path: PathBuf,
    exclusion: ExclusionFilter,
    classifier: ContextClassifier,
    index: Option<RunContextIndex>,
    budget: usize,
}

impl LogQuery {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            exclusion: ExclusionFilter::default(),
            classifier: ContextClassifier::default(),
            index: None,
            budget: MAX_OUTPUT_BYTES,
        }
    }

    /// Replace the exclusion rules
    pub fn with_exclusion(mut self, exclusion: ExclusionFilter) -> Self {
        self.exclusion = exclusion;
        self
    }

    /// Replace the state label classification table
    ///
    /// Also applies to an index attached with [`LogQuery::with_index`].
    pub fn with_classifier(mut self, classifier: ContextClassifier) -> Self {
        self.index = self
            .index
            .map(|index| index.with_classifier(classifier.clone()));
        self.classifier = classifier;
        self
    }

    /// Reuse a prebuilt run-context index instead of scanning per query
    ///
    /// The index is relabelled with this query's classification table.
    pub fn with_index(mut self, index: RunContextIndex) -> Self {
        self.index = Some(index.with_classifier(self.classifier.clone()));
        self
    }

    #[cfg(test)]
    pub(crate) fn with_budget(mut self, budget: usize) -> Self {
        self.budget = budget;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Build the run-context index of this file
    pub fn run_context_index(&self) -> Result<RunContextIndex> {
        Ok(RunContextIndex::build(&self.path)?.with_classifier(self.classifier.clone()))
    }

    /// Bounded incremental read of user-visible output
    pub fn read_from(&self, opts: &ReadOptions) -> Result<QueryResult> {
        let filter = match self.text_filter(CompiledFilter::any(), opts) {
            Ok(filter) => filter,
            Err(e) => return Ok(QueryResult::with_error(e.to_string())),
        };
        let format = LineFormat {
            line_numbers: false,
            context_label: opts.include_context_label,
            timestamps: opts.timestamps,
        };
        let result = self.collect_text(&filter, opts, format)?;
        debug!(
            path = %self.path.display(),
            emitted = result.match_count,
            remaining = result.remaining,
            "read_from complete"
        );
        Ok(result)
    }

    /// Case-insensitive regex search over messages
    ///
    /// An invalid pattern is reported in the result's `error` field.
    pub fn search(&self, pattern: &str, opts: &ReadOptions) -> Result<QueryResult> {
        let filter = match CompiledFilter::new_case_insensitive(pattern)
            .and_then(|filter| self.text_filter(filter, opts))
        {
            Ok(filter) => filter,
            Err(e) => return Ok(QueryResult::with_error(e.to_string())),
        };
        let format = LineFormat {
            line_numbers: true,
            context_label: opts.include_context_label,
            timestamps: opts.timestamps,
        };
        let result = self.collect_text(&filter, opts, format)?;
        debug!(
            path = %self.path.display(),
            pattern,
            emitted = result.match_count,
            remaining = result.remaining,
            "search complete"
        );
        Ok(result)
    }

    /// Read by calendar range only, timestamps on by default
    pub fn read_by_date(&self, opts: &DateQueryOptions) -> Result<QueryResult> {
        self.read_from(&ReadOptions::from(opts.clone()))
    }

    /// Extract warnings and errors as structured entries
    pub fn find_errors(&self, opts: &ErrorQueryOptions) -> Result<ErrorReport> {
        let date_range =
            match DateRange::parse(opts.start_date.as_deref(), opts.end_date.as_deref()) {
                Ok(range) => range,
                Err(e) => return Ok(ErrorReport::with_error(e.to_string())),
            };
        let filter = CompiledFilter::any()
            .errors_only()
            .with_exclusion(self.exclusion_for(opts.apply_exclusion_filter))
            .with_date_range(date_range);
        let bounds = LineBounds {
            after: opts.after_line,
            before: opts.before_line,
        };
        let mode = ContextMode {
            only: opts.run_context,
            resolve: true,
        };

        let mut report = ErrorReport::empty();
        self.scan(bounds, &filter, mode, |record| {
            report.error_count += 1;
            if report.errors.len() < opts.max_errors {
                report.errors.push(ErrorEntry {
                    line: record.line_num,
                    run_context: record.run_context.unwrap_or_default(),
                    level: record.level,
                    timestamp: record.timestamp,
                    message: record.message,
                    category: record.category,
                });
            }
        })?;
        report.has_error = report.error_count > 0;

        debug!(
            path = %self.path.display(),
            error_count = report.error_count,
            returned = report.errors.len(),
            "find_errors complete"
        );
        Ok(report)
    }

    /// The most recent matching records, oldest first
    pub fn recent(&self, opts: &RecentOptions) -> Result<Vec<LogRecord>> {
        let filter = CompiledFilter::any()
            .with_categories(opts.categories.as_deref())
            .with_level(opts.min_level)
            .with_exclusion(self.exclusion_for(opts.apply_exclusion_filter));

        let mut buffer = RecordBuffer::new(opts.limit);
        self.scan(LineBounds::default(), &filter, ContextMode::default(), |record| {
            buffer.push(record)
        })?;
        Ok(buffer.into_records())
    }

    fn exclusion_for(&self, apply: bool) -> Option<ExclusionFilter> {
        apply.then(|| self.exclusion.clone())
    }

    fn text_filter(&self, filter: CompiledFilter, opts: &ReadOptions) -> Result<CompiledFilter> {
        let date_range = DateRange::parse(opts.start_date.as_deref(), opts.end_date.as_deref())?;
        Ok(filter
            .with_categories(opts.categories.as_deref())
            .with_exclusion(self.exclusion_for(opts.apply_exclusion_filter))
            .with_date_range(date_range))
    }

    fn collect_text(
        &self,
        filter: &CompiledFilter,
        opts: &ReadOptions,
        format: LineFormat,
    ) -> Result<QueryResult> {
        let bounds = LineBounds {
            after: opts.after_line,
            before: opts.before_line,
        };
        let mode = ContextMode {
            only: opts.run_context,
            resolve: opts.include_context_label,
        };

        let mut output = BudgetedOutput::new(self.budget);
        self.scan(bounds, filter, mode, |record| output.offer(&record, format))?;
        Ok(output.finish())
    }

    /// Stream the file through the shared pipeline
    ///
    /// A missing file visits nothing.
    fn scan<F>(
        &self,
        bounds: LineBounds,
        filter: &CompiledFilter,
        mode: ContextMode,
        mut visit: F,
    ) -> Result<()>
    where
        F: FnMut(LogRecord),
    {
        let Some(reader) = open_log(&self.path)? else {
            debug!(path = %self.path.display(), "log file not found, returning empty result");
            return Ok(());
        };

        let mut built_index: Option<RunContextIndex> = None;

        for line in NumberedLines::new(reader) {
            let (line_num, raw) = line.map_err(|e| LogError::io(&self.path, e))?;

            if bounds.after.is_some_and(|after| line_num <= after) {
                continue;
            }
            // Line numbers only grow, nothing past this point can match
            if bounds.before.is_some_and(|before| line_num >= before) {
                break;
            }

            let Some(mut record) = LogParser::parse(&raw, line_num) else {
                continue;
            };
            if !filter.matches(&record) {
                continue;
            }

            if mode.needed() {
                if self.index.is_none() && built_index.is_none() {
                    built_index = Some(self.run_context_index()?);
                }
                let context = self
                    .index
                    .as_ref()
                    .or(built_index.as_ref())
                    .map(|index| index.context_for_line(line_num))
                    .unwrap_or_default();
                if mode.only.is_some_and(|wanted| wanted != context) {
                    continue;
                }
                record.run_context = Some(context);
            }

            visit(record);
        }

        Ok(())
    }
}

/// Bounded incremental read, see [`LogQuery::read_from`]
pub fn read_from(path: impl Into<PathBuf>, opts: &ReadOptions) -> Result<QueryResult> {
    LogQuery::new(path).read_from(opts)
}

/// Pattern search, see [`LogQuery::search`]
pub fn search(path: impl Into<PathBuf>, pattern: &str, opts: &ReadOptions) -> Result<QueryResult> {
    LogQuery::new(path).search(pattern, opts)
}

/// Error extraction, see [`LogQuery::find_errors`]
pub fn find_errors(path: impl Into<PathBuf>, opts: &ErrorQueryOptions) -> Result<ErrorReport> {
    LogQuery::new(path).find_errors(opts)
}

/// Date-range read, see [`LogQuery::read_by_date`]
pub fn read_by_date(path: impl Into<PathBuf>, opts: &DateQueryOptions) -> Result<QueryResult> {
    LogQuery::new(path).read_by_date(opts)
}
