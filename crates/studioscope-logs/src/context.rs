//! Run-context index
//!
//! Studio logs its game-state transitions (edit mode, play server, play
//! client) through a state-manager category. Scanning those markers once
//! yields contiguous line ranges, each tagged with the raw state label,
//! from which the coarse [`RunContext`] of any line can be looked up.

use std::io::BufRead;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, trace};

use studioscope_types::{LogRecord, RunContext, RunContextRange};

use crate::error::{LogError, Result};
use crate::parser::LogParser;
use crate::reader::{NumberedLines, open_log};

/// State assumed before the first transition marker
pub const DEFAULT_STATE: &str = "Edit";

/// Categories containing this marker belong to the state manager
const STATE_CATEGORY_MARKER: &str = "GameState";

static TRANSITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"StudioGameStateType_([A-Za-z0-9]+)\s*$").expect("transition pattern is valid")
});

/// Extract the new state label if the record is a transition marker
pub fn transition_state(record: &LogRecord) -> Option<&str> {
    if !record.category.contains(STATE_CATEGORY_MARKER) {
        return None;
    }
    TRANSITION_RE
        .captures(&record.message)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Ordered substring table mapping raw state labels to a coarse context
///
/// Matching is case-sensitive and the first matching rule wins. Labels
/// matching no rule classify as [`RunContext::Unknown`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextClassifier {
    rules: Vec<(String, RunContext)>,
}

impl Default for ContextClassifier {
    fn default() -> Self {
        Self {
            rules: vec![
                ("Server".to_string(), RunContext::Play),
                ("Client".to_string(), RunContext::Play),
                ("Edit".to_string(), RunContext::Edit),
            ],
        }
    }
}

impl ContextClassifier {
    /// Append a rule, consulted after the existing ones
    pub fn with_rule(mut self, substring: impl Into<String>, context: RunContext) -> Self {
        self.rules.push((substring.into(), context));
        self
    }

    pub fn classify(&self, state: &str) -> RunContext {
        self.rules
            .iter()
            .find(|(substring, _)| state.contains(substring.as_str()))
            .map(|(_, context)| *context)
            .unwrap_or(RunContext::Unknown)
    }
}

/// Line ranges of a log file tagged with their run state
///
/// Built with one full scan; reuse it for every lookup within a query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunContextIndex {
    ranges: Vec<RunContextRange>,
    classifier: ContextClassifier,
}

impl RunContextIndex {
    /// Scan a log file and build its index
    ///
    /// A missing file yields the single open default range.
    pub fn build(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let index = match open_log(path)? {
            Some(reader) => Self::from_reader(reader).map_err(|e| LogError::io(path, e))?,
            None => Self::from_ranges(vec![RunContextRange::open(DEFAULT_STATE, 1, "")]),
        };
        debug!(path = %path.display(), ranges = index.ranges.len(), "built run-context index");
        Ok(index)
    }

    /// Build from any line source
    pub fn from_reader<R: BufRead>(reader: R) -> std::io::Result<Self> {
        let mut ranges = Vec::new();
        let mut current = RunContextRange::open(DEFAULT_STATE, 1, "");
        let mut last_time = String::new();

        for line in NumberedLines::new(reader) {
            let (line_num, raw) = line?;
            let Some(record) = LogParser::parse(&raw, line_num) else {
                continue;
            };

            if let Some(state) = transition_state(&record) {
                trace!(line_num, state, "run state transition");
                if line_num == current.start_line {
                    // Nothing precedes the marker in this range; relabel it
                    current.state = state.to_string();
                    current.start_time = record.timestamp.clone();
                } else {
                    current.end_line = Some(line_num - 1);
                    current.end_time = std::mem::take(&mut last_time);
                    let next = RunContextRange::open(state, line_num, record.timestamp.clone());
                    ranges.push(std::mem::replace(&mut current, next));
                }
            } else if current.start_time.is_empty() {
                current.start_time = record.timestamp.clone();
            }

            last_time = record.timestamp;
        }

        current.end_time = last_time;
        ranges.push(current);
        Ok(Self::from_ranges(ranges))
    }

    /// Wrap precomputed ranges, sorted by start line
    pub fn from_ranges(ranges: Vec<RunContextRange>) -> Self {
        Self {
            ranges,
            classifier: ContextClassifier::default(),
        }
    }

    /// Replace the label classification table
    pub fn with_classifier(mut self, classifier: ContextClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn ranges(&self) -> &[RunContextRange] {
        &self.ranges
    }

    pub fn into_ranges(self) -> Vec<RunContextRange> {
        self.ranges
    }

    /// Find the range containing a line
    pub fn range_for_line(&self, line_num: u64) -> Option<&RunContextRange> {
        find_range(&self.ranges, line_num)
    }

    /// Resolve the coarse run-context of a line
    pub fn context_for_line(&self, line_num: u64) -> RunContext {
        self.range_for_line(line_num)
            .map(|range| self.classifier.classify(&range.state))
            .unwrap_or(RunContext::Unknown)
    }
}

/// Scan a log file and return its run-context ranges
pub fn build_index(path: impl AsRef<Path>) -> Result<Vec<RunContextRange>> {
    RunContextIndex::build(path).map(RunContextIndex::into_ranges)
}

/// Resolve the run-context of a line against prebuilt ranges
///
/// Uses the default classification table.
pub fn context_for_line(line_num: u64, ranges: &[RunContextRange]) -> RunContext {
    find_range(ranges, line_num)
        .map(|range| ContextClassifier::default().classify(&range.state))
        .unwrap_or(RunContext::Unknown)
}

/// Binary search over ranges sorted by start line
fn find_range(ranges: &[RunContextRange], line_num: u64) -> Option<&RunContextRange> {
    let idx = ranges.partition_point(|r| r.start_line <= line_num);
    let range = ranges.get(idx.checked_sub(1)?)?;
    range.contains(line_num).then_some(range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn state_line(time: &str, state: &str) -> String {
        format!(
            "2026-02-03T{time}Z,1.0,1a2b,3 [FLog::StudioGameStateManager] Game state changed to StudioGameStateType_{state}"
        )
    }

    fn output_line(time: &str, msg: &str) -> String {
        format!("2026-02-03T{time}Z,1.0,1a2b,3 [FLog::Output] {msg}")
    }

    fn index_of(lines: &[String]) -> RunContextIndex {
        RunContextIndex::from_reader(Cursor::new(lines.join("\n"))).unwrap()
    }

    #[test]
    fn test_no_transitions_single_open_range() {
        let index = index_of(&[output_line("08:00:00.000", "a"), "banner".to_string()]);
        assert_eq!(index.ranges().len(), 1);
        let range = &index.ranges()[0];
        assert_eq!(range.state, DEFAULT_STATE);
        assert_eq!(range.start_line, 1);
        assert_eq!(range.end_line, None);
        assert_eq!(range.start_time, "2026-02-03T08:00:00.000Z");
        assert_eq!(index.context_for_line(2), RunContext::Edit);
    }

    #[test]
    fn test_transitions_split_ranges() {
        let lines = vec![
            output_line("08:00:00.000", "editing"),
            state_line("08:00:01.000", "PlayServer"),
            output_line("08:00:02.000", "server up"),
            state_line("08:00:03.000", "PlayClient"),
            output_line("08:00:04.000", "client up"),
            state_line("08:00:05.000", "Edit"),
            output_line("08:00:06.000", "back"),
        ];
        let index = index_of(&lines);
        let ranges = index.ranges();
        assert_eq!(ranges.len(), 4);
        assert_eq!((ranges[0].start_line, ranges[0].end_line), (1, Some(1)));
        assert_eq!((ranges[1].start_line, ranges[1].end_line), (2, Some(3)));
        assert_eq!(ranges[1].state, "PlayServer");
        assert_eq!(ranges[1].start_time, "2026-02-03T08:00:01.000Z");
        assert_eq!(ranges[1].end_time, "2026-02-03T08:00:02.000Z");
        assert_eq!(ranges[3].end_line, None);

        assert_eq!(index.context_for_line(1), RunContext::Edit);
        assert_eq!(index.context_for_line(3), RunContext::Play);
        assert_eq!(index.context_for_line(5), RunContext::Play);
        assert_eq!(index.context_for_line(7), RunContext::Edit);
        assert_eq!(index.context_for_line(10_000), RunContext::Edit);
        assert_eq!(index.context_for_line(0), RunContext::Unknown);
    }

    #[test]
    fn test_transition_on_first_line_relabels() {
        let lines = vec![
            state_line("08:00:00.000", "PlayServer"),
            output_line("08:00:01.000", "x"),
        ];
        let index = index_of(&lines);
        assert_eq!(index.ranges().len(), 1);
        assert_eq!(index.ranges()[0].state, "PlayServer");
        assert_eq!(index.context_for_line(2), RunContext::Play);
    }

    #[test]
    fn test_marker_outside_state_category_ignored() {
        let lines = vec![output_line("08:00:00.000", "StudioGameStateType_PlayServer")];
        let index = index_of(&lines);
        assert_eq!(index.ranges().len(), 1);
        assert_eq!(index.ranges()[0].state, DEFAULT_STATE);
    }

    #[test]
    fn test_unknown_label_degrades() {
        let lines = vec![
            output_line("08:00:00.000", "a"),
            state_line("08:00:01.000", "Paused"),
        ];
        let index = index_of(&lines);
        assert_eq!(index.context_for_line(2), RunContext::Unknown);

        let classifier = ContextClassifier::default().with_rule("Paused", RunContext::Play);
        let index = index.with_classifier(classifier);
        assert_eq!(index.context_for_line(2), RunContext::Play);
    }

    #[test]
    fn test_classifier_is_case_sensitive() {
        let classifier = ContextClassifier::default();
        assert_eq!(classifier.classify("PlayServer"), RunContext::Play);
        assert_eq!(classifier.classify("PlayClient"), RunContext::Play);
        assert_eq!(classifier.classify("Edit"), RunContext::Edit);
        assert_eq!(classifier.classify("edit"), RunContext::Unknown);
    }

    #[test]
    fn test_free_functions_match_index() {
        let lines = vec![
            output_line("08:00:00.000", "a"),
            state_line("08:00:01.000", "PlayServer"),
        ];
        let ranges = index_of(&lines).into_ranges();
        assert_eq!(context_for_line(1, &ranges), RunContext::Edit);
        assert_eq!(context_for_line(2, &ranges), RunContext::Play);
        assert_eq!(context_for_line(500, &ranges), RunContext::Play);
        assert_eq!(context_for_line(0, &ranges), RunContext::Unknown);
    }

    #[test]
    fn test_free_lookup_on_borrowed_ranges() {
        let mut first = RunContextRange::open("Edit", 1, "");
        first.end_line = Some(4);
        let mut second = RunContextRange::open("PlayClient", 5, "");
        second.end_line = Some(9);
        let ranges = [first, second];

        assert_eq!(context_for_line(4, &ranges), RunContext::Edit);
        assert_eq!(context_for_line(5, &ranges), RunContext::Play);
        assert_eq!(context_for_line(9, &ranges), RunContext::Play);
        assert_eq!(context_for_line(10, &ranges), RunContext::Unknown);
        assert_eq!(context_for_line(3, &[]), RunContext::Unknown);
    }

    #[test]
    fn test_build_missing_file() {
        let ranges = build_index("/definitely/not/here.log").unwrap();
        assert_eq!(ranges, vec![RunContextRange::open(DEFAULT_STATE, 1, "")]);
    }
}
