//! Memoized command-line index for log files
//!
//! Studio writes the command line it was launched with near the top of each
//! log. Extracting it means opening every candidate log, so results are
//! cached on disk keyed by file name and invalidated when the file's
//! modification time changes. A corrupt or unreadable cache is treated as
//! empty and a failed save only logs a warning.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use tracing::{debug, warn};

use crate::reader::{NumberedLines, open_log};

/// Default cache file name, stored next to the logs
pub const DEFAULT_INDEX_FILE: &str = ".studioscope_log_index.json";

/// Only the head of a log carries the command line
const COMMAND_LINE_SCAN_LINES: u64 = 31;

const COMMAND_LINE_MARKER: &str = "Command line:";
const STUDIO_EXECUTABLE: &str = "RobloxStudioBeta.exe";

/// Cached command line of one log file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedCommandLine {
    pub cmdline: Option<String>,
    pub mtime_ns: u64,
}

/// On-disk map of log file name to cached command line
#[derive(Debug, Default)]
pub struct LogIndexCache {
    path: PathBuf,
    entries: BTreeMap<String, CachedCommandLine>,
    dirty: bool,
}

impl LogIndexCache {
    /// Load the cache, falling back to empty on any failure
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = fs::read_to_string(&path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default();
        Self {
            path,
            entries,
            dirty: false,
        }
    }

    /// Save the cache to disk if anything changed
    pub fn save(&mut self) {
        if !self.dirty {
            return;
        }
        if let Some(parent) = self.path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        match serde_json::to_string_pretty(&self.entries) {
            Ok(content) => match fs::write(&self.path, content) {
                Ok(()) => self.dirty = false,
                Err(e) => warn!(path = %self.path.display(), error = %e, "failed to write log index"),
            },
            Err(e) => warn!(error = %e, "failed to serialize log index"),
        }
    }

    /// Get a cached entry if it is still valid for the given mtime
    pub fn get(&self, file_name: &str, mtime_ns: u64) -> Option<&CachedCommandLine> {
        self.entries
            .get(file_name)
            .filter(|entry| entry.mtime_ns == mtime_ns)
    }

    /// Command line of a log file, extracting it when the cache is stale
    ///
    /// Returns `None` when the file is gone or carries no command line.
    pub fn command_line(&mut self, log_path: &Path) -> Option<String> {
        let file_name = log_path.file_name()?.to_string_lossy().into_owned();
        let mtime_ns = modified_ns(log_path)?;

        if let Some(cached) = self.get(&file_name, mtime_ns) {
            return cached.cmdline.clone();
        }

        debug!(path = %log_path.display(), "log index miss, extracting command line");
        let cmdline = extract_command_line(log_path);
        self.entries.insert(
            file_name,
            CachedCommandLine {
                cmdline: cmdline.clone(),
                mtime_ns,
            },
        );
        self.dirty = true;
        cmdline
    }

    /// Command lines of many logs, saving the cache once afterwards
    ///
    /// Logs without a command line are left out.
    pub fn command_lines(&mut self, log_paths: &[PathBuf]) -> Vec<(PathBuf, String)> {
        let found = log_paths
            .iter()
            .filter_map(|path| self.command_line(path).map(|cmd| (path.clone(), cmd)))
            .collect();
        self.save();
        found
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Read the launch command line from the head of a log, bypassing the cache
pub fn extract_command_line(log_path: &Path) -> Option<String> {
    let reader = open_log(log_path).ok()??;
    command_line_from_reader(reader)
}

fn command_line_from_reader<R: BufRead>(reader: R) -> Option<String> {
    let mut found_marker = false;
    for line in NumberedLines::new(reader) {
        let (line_num, raw) = line.ok()?;
        if line_num > COMMAND_LINE_SCAN_LINES {
            break;
        }
        let line = raw.trim();
        if line.contains(COMMAND_LINE_MARKER) {
            found_marker = true;
            continue;
        }
        if found_marker && line.contains(STUDIO_EXECUTABLE) {
            return Some(line.to_string());
        }
    }
    None
}

/// Modification time in nanoseconds since the epoch
pub(crate) fn modified_ns(path: &Path) -> Option<u64> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    let nanos = modified.duration_since(UNIX_EPOCH).ok()?.as_nanos();
    u64::try_from(nanos).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const HEAD: &str = "\
2026-02-03T08:52:00.000Z,0.1,1a,1 [FLog::Output] Studio starting
Command line:
\"C:\\Roblox\\RobloxStudioBeta.exe\" -task EditFile -localPlaceFile \"C:\\games\\demo.rbxl\"
2026-02-03T08:52:01.000Z,0.2,1a,2 [FLog::Output] ready
";

    #[test]
    fn test_extract_from_head() {
        let cmd = command_line_from_reader(Cursor::new(HEAD)).unwrap();
        assert!(cmd.contains("-localPlaceFile"));
    }

    #[test]
    fn test_marker_required() {
        let input = "\"C:\\RobloxStudioBeta.exe\" -task EditFile\n";
        assert!(command_line_from_reader(Cursor::new(input)).is_none());
    }

    #[test]
    fn test_command_line_past_head_ignored() {
        let mut input = String::new();
        for _ in 0..40 {
            input.push_str("filler\n");
        }
        input.push_str(HEAD);
        assert!(command_line_from_reader(Cursor::new(input)).is_none());
    }

    #[test]
    fn test_cache_roundtrip_and_invalidation() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("0.1_20260203_Studio_abc_last.log");
        fs::write(&log, HEAD).unwrap();
        let index_path = dir.path().join(DEFAULT_INDEX_FILE);

        let mut cache = LogIndexCache::load(&index_path);
        assert!(cache.is_empty());
        assert!(cache.command_line(&log).is_some());
        cache.save();

        let reloaded = LogIndexCache::load(&index_path);
        assert_eq!(reloaded.len(), 1);
        let mtime = modified_ns(&log).unwrap();
        let name = log.file_name().unwrap().to_string_lossy().into_owned();
        assert!(reloaded.get(&name, mtime).is_some());
        assert!(reloaded.get(&name, mtime + 1).is_none());
    }

    #[test]
    fn test_corrupt_cache_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join(DEFAULT_INDEX_FILE);
        fs::write(&index_path, "{not json").unwrap();
        let cache = LogIndexCache::load(&index_path);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_missing_log_has_no_command_line() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = LogIndexCache::load(dir.path().join(DEFAULT_INDEX_FILE));
        assert!(cache.command_line(&dir.path().join("gone.log")).is_none());
        assert!(cache.is_empty());
    }
}
