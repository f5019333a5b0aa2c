//! Rendering of query results for the terminal

use anyhow::Result;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::PathBuf;

use studioscope_logs::{
    ErrorReport, LevelCounts, LogRecord, QueryResult, RunContextIndex,
};

/// How results are written to stdout
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Text,
}

fn json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn render_query(result: &QueryResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => json(result),
        OutputFormat::Text => {
            if let Some(error) = &result.error {
                return Ok(format!("error: {error}"));
            }
            let mut out = result.logs.clone();
            if result.has_more {
                if !out.is_empty() {
                    out.push('\n');
                }
                write!(
                    out,
                    "... {} more matching lines (continue after line {})",
                    result.remaining, result.last_line
                )?;
            }
            Ok(out)
        }
    }
}

pub fn render_errors(report: &ErrorReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => json(report),
        OutputFormat::Text => {
            if let Some(error) = &report.error {
                return Ok(format!("error: {error}"));
            }
            let mut out = String::new();
            for entry in &report.errors {
                writeln!(
                    out,
                    "{}|{} {} [{}] {} {}",
                    entry.line,
                    entry.run_context.label(),
                    entry.timestamp,
                    entry.level,
                    entry.category,
                    entry.message
                )?;
            }
            if report.is_truncated() {
                write!(
                    out,
                    "{} of {} errors shown",
                    report.errors.len(),
                    report.error_count
                )?;
            } else {
                write!(out, "{} errors", report.error_count)?;
            }
            Ok(out)
        }
    }
}

pub fn render_index(index: &RunContextIndex, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => json(index.ranges()),
        OutputFormat::Text => {
            let mut out = String::new();
            for range in index.ranges() {
                let end = range
                    .end_line
                    .map(|end| end.to_string())
                    .unwrap_or_else(|| "end".to_string());
                let context = index.context_for_line(range.start_line);
                writeln!(
                    out,
                    "{}-{} {} {} {}",
                    range.start_line,
                    end,
                    context.label(),
                    range.state,
                    range.start_time
                )?;
            }
            Ok(out.trim_end().to_string())
        }
    }
}

#[derive(Serialize)]
struct RecentView<'a> {
    counts: &'a LevelCounts,
    records: &'a [LogRecord],
}

pub fn render_records(records: &[LogRecord], format: OutputFormat) -> Result<String> {
    let counts = LevelCounts::from_records(records);
    match format {
        OutputFormat::Json => json(&RecentView {
            counts: &counts,
            records,
        }),
        OutputFormat::Text => {
            let mut out = String::new();
            for record in records {
                writeln!(
                    out,
                    "{}|[{}] [{}] {} {}",
                    record.line_num,
                    record.clock_time().unwrap_or(""),
                    record.level,
                    record.category,
                    record.message
                )?;
            }
            write!(
                out,
                "{} records ({} errors, {} warnings)",
                counts.total(),
                counts.error,
                counts.warning
            )?;
            Ok(out)
        }
    }
}

pub fn render_paths(paths: &[PathBuf], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => json(paths),
        OutputFormat::Text => Ok(paths
            .iter()
            .map(|path| path.display().to_string())
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

pub fn render_removed(removed: usize, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => json(&serde_json::json!({ "removed": removed })),
        OutputFormat::Text => Ok(format!("removed {removed} log files")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studioscope_logs::{ErrorEntry, LogLevel, RunContext, RunContextRange};

    fn result() -> QueryResult {
        QueryResult {
            logs: "one\ntwo".to_string(),
            start_line: 3,
            last_line: 4,
            match_count: 2,
            remaining: 5,
            has_more: true,
            error: None,
        }
    }

    #[test]
    fn test_query_text_footer() {
        let text = render_query(&result(), OutputFormat::Text).unwrap();
        assert_eq!(
            text,
            "one\ntwo\n... 5 more matching lines (continue after line 4)"
        );
    }

    #[test]
    fn test_query_json_fields() {
        let text = render_query(&result(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["last_line"], 4);
        assert_eq!(value["has_more"], true);
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_query_error_text() {
        let text = render_query(&QueryResult::with_error("Invalid date: x"), OutputFormat::Text)
            .unwrap();
        assert_eq!(text, "error: Invalid date: x");
    }

    #[test]
    fn test_errors_text_truncated() {
        let report = ErrorReport {
            has_error: true,
            error_count: 3,
            errors: vec![ErrorEntry {
                line: 7,
                timestamp: "2026-02-03T08:00:00.000Z".to_string(),
                message: "boom".to_string(),
                category: "FLog::Error".to_string(),
                level: LogLevel::Error,
                run_context: RunContext::Play,
            }],
            error: None,
        };
        let text = render_errors(&report, OutputFormat::Text).unwrap();
        assert!(text.starts_with("7|[P] 2026-02-03T08:00:00.000Z [Error] FLog::Error boom"));
        assert!(text.ends_with("1 of 3 errors shown"));
    }

    #[test]
    fn test_index_text() {
        let mut first = RunContextRange::open("Edit", 1, "t0");
        first.end_line = Some(3);
        let index = RunContextIndex::from_ranges(vec![
            first,
            RunContextRange::open("PlayServer", 4, "t1"),
        ]);
        let text = render_index(&index, OutputFormat::Text).unwrap();
        assert_eq!(text, "1-3 [E] Edit t0\n4-end [P] PlayServer t1");
    }

    #[test]
    fn test_records_summary() {
        let records = vec![LogRecord {
            timestamp: "2026-02-03T08:09:10.000Z".to_string(),
            level: LogLevel::Warning,
            category: "FLog::Output".to_string(),
            message: "careful".to_string(),
            line_num: 2,
            run_context: None,
            raw: String::new(),
        }];
        let text = render_records(&records, OutputFormat::Text).unwrap();
        assert_eq!(
            text,
            "2|[08:09:10] [Warning] FLog::Output careful\n1 records (0 errors, 1 warnings)"
        );
    }
}
