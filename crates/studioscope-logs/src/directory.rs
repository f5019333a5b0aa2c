use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::{Duration, SystemTime};

use regex::Regex;
use tracing::{debug, warn};

use crate::error::{LogError, Result};
use crate::side_index::{DEFAULT_INDEX_FILE, LogIndexCache};

/// How many of the newest logs are considered when matching a session
const SESSION_SEARCH_DEPTH: usize = 20;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

static PLACE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-placeId\s+(\d+)").expect("place id pattern is valid"));

/// Directory holding Studio session logs
#[derive(Clone, Debug)]
pub struct LogDirectory {
    root: PathBuf,
    index_file: PathBuf,
}

impl LogDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let index_file = root.join(DEFAULT_INDEX_FILE);
        Self { root, index_file }
    }

    /// Use a different location for the command-line cache
    pub fn with_index_file(mut self, index_file: impl Into<PathBuf>) -> Self {
        self.index_file = index_file.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Studio logs, newest first
    pub fn studio_logs(&self, limit: usize) -> Result<Vec<PathBuf>> {
        let mut logs: Vec<(PathBuf, SystemTime)> = self
            .log_files()?
            .into_iter()
            .filter(|(path, _)| is_studio_log(path))
            .collect();
        logs.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(logs.into_iter().take(limit).map(|(path, _)| path).collect())
    }

    /// The most recently modified Studio log
    pub fn latest(&self) -> Result<Option<PathBuf>> {
        Ok(self.studio_logs(1)?.into_iter().next())
    }

    /// Delete `.log` files not modified for more than `days` days
    ///
    /// Files that cannot be removed are skipped. Returns the number deleted.
    pub fn clean(&self, days: u64) -> Result<usize> {
        let threshold = Duration::from_secs(days.saturating_mul(SECONDS_PER_DAY));
        let now = SystemTime::now();
        let mut removed = 0;

        for (path, modified) in self.log_files()? {
            let age = now.duration_since(modified).unwrap_or_default();
            if age <= threshold {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "failed to remove old log"),
            }
        }

        debug!(root = %self.root.display(), removed, "cleaned old logs");
        Ok(removed)
    }

    /// Newest log whose launch command line opened this local place file
    pub fn find_by_place_path(&self, place_path: &str) -> Result<Option<PathBuf>> {
        let needle = normalize_path(place_path);
        self.find_session(|cmdline| normalize_path(cmdline).contains(&needle))
    }

    /// Newest log whose launch command line opened this cloud place
    pub fn find_by_place_id(&self, place_id: u64) -> Result<Option<PathBuf>> {
        self.find_session(|cmdline| place_id_of(cmdline) == Some(place_id))
    }

    fn find_session<F>(&self, matches: F) -> Result<Option<PathBuf>>
    where
        F: Fn(&str) -> bool,
    {
        let logs = self.studio_logs(SESSION_SEARCH_DEPTH)?;
        let mut cache = LogIndexCache::load(&self.index_file);
        let found = cache
            .command_lines(&logs)
            .into_iter()
            .find(|(_, cmdline)| matches(cmdline))
            .map(|(path, _)| path);
        Ok(found)
    }

    /// Every `.log` file in the directory with its modification time
    fn log_files(&self) -> Result<Vec<(PathBuf, SystemTime)>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(LogError::io(&self.root, e)),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| LogError::io(&self.root, e))?;
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "log") {
                continue;
            }
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            if let Ok(modified) = metadata.modified() {
                files.push((path, modified));
            }
        }
        Ok(files)
    }
}

fn is_studio_log(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().contains("Studio"))
        .unwrap_or(false)
}

/// Cloud place id a command line was launched with
fn place_id_of(cmdline: &str) -> Option<u64> {
    PLACE_ID_RE
        .captures(cmdline)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Lowercase with backslash separators, so paths compare across conventions
fn normalize_path(path: &str) -> String {
    path.replace('/', "\\").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::thread;

    fn write_studio_log(dir: &Path, name: &str, cmdline: &str) -> PathBuf {
        let path = dir.join(name);
        let content = format!(
            "2026-02-03T08:52:00.000Z,0.1,1a,1 [FLog::Output] boot\nCommand line:\n{cmdline}\n"
        );
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = LogDirectory::new("/definitely/not/a/log/dir");
        assert!(dir.studio_logs(10).unwrap().is_empty());
        assert!(dir.latest().unwrap().is_none());
        assert_eq!(dir.clean(7).unwrap(), 0);
        assert!(dir.find_by_place_id(1).unwrap().is_none());
    }

    #[test]
    fn test_studio_logs_newest_first() {
        let tmp = tempfile::tempdir().unwrap();
        write_studio_log(tmp.path(), "a_Studio_1_last.log", "x");
        thread::sleep(Duration::from_millis(20));
        let newer = write_studio_log(tmp.path(), "b_Studio_2_last.log", "y");
        File::create(tmp.path().join("player_3.log")).unwrap();
        File::create(tmp.path().join("notes.txt")).unwrap();

        let dir = LogDirectory::new(tmp.path());
        let logs = dir.studio_logs(10).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(dir.latest().unwrap(), Some(newer));
    }

    #[test]
    fn test_find_by_place_path_normalizes() {
        let tmp = tempfile::tempdir().unwrap();
        let log = write_studio_log(
            tmp.path(),
            "a_Studio_1_last.log",
            "\"C:\\Roblox\\RobloxStudioBeta.exe\" -task EditFile -localPlaceFile \"C:\\Games\\Demo.rbxl\"",
        );
        let dir = LogDirectory::new(tmp.path());
        assert_eq!(dir.find_by_place_path("c:/games/demo.rbxl").unwrap(), Some(log));
        assert!(dir.find_by_place_path("c:/games/other.rbxl").unwrap().is_none());
        assert!(tmp.path().join(DEFAULT_INDEX_FILE).exists());
    }

    #[test]
    fn test_find_by_place_id() {
        let tmp = tempfile::tempdir().unwrap();
        let log = write_studio_log(
            tmp.path(),
            "a_Studio_1_last.log",
            "\"C:\\Roblox\\RobloxStudioBeta.exe\" -task EditPlace -placeId 12345 -universeId 9",
        );
        let dir = LogDirectory::new(tmp.path());
        assert_eq!(dir.find_by_place_id(12345).unwrap(), Some(log));
        assert!(dir.find_by_place_id(1234).unwrap().is_none());
        assert!(dir.find_by_place_id(123456).unwrap().is_none());
    }

    #[test]
    fn test_place_id_is_whole_number() {
        assert_eq!(place_id_of("x.exe -placeId 12345 -universeId 9"), Some(12345));
        assert_eq!(place_id_of("x.exe -placeId   77"), Some(77));
        assert_eq!(place_id_of("x.exe -task EditFile -localPlaceFile a.rbxl"), None);
        assert_ne!(place_id_of("x.exe -placeId 12345"), Some(1234));
    }

    #[test]
    fn test_find_by_place_id_skips_prefix_sibling() {
        let tmp = tempfile::tempdir().unwrap();
        let wanted = write_studio_log(
            tmp.path(),
            "a_Studio_1_last.log",
            "\"C:\\Roblox\\RobloxStudioBeta.exe\" -task EditPlace -placeId 1234",
        );
        thread::sleep(Duration::from_millis(20));
        write_studio_log(
            tmp.path(),
            "b_Studio_2_last.log",
            "\"C:\\Roblox\\RobloxStudioBeta.exe\" -task EditPlace -placeId 12345",
        );
        let dir = LogDirectory::new(tmp.path());
        assert_eq!(dir.find_by_place_id(1234).unwrap(), Some(wanted));
    }

    #[test]
    fn test_clean_keeps_fresh_logs() {
        let tmp = tempfile::tempdir().unwrap();
        write_studio_log(tmp.path(), "a_Studio_1_last.log", "x");
        let dir = LogDirectory::new(tmp.path());
        assert_eq!(dir.clean(7).unwrap(), 0);
        assert_eq!(dir.studio_logs(10).unwrap().len(), 1);
    }
}
