use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use studioscope_logs::{DEFAULT_INDEX_FILE, ExclusionFilter};

use crate::output::OutputFormat;

const CONFIG_ENV: &str = "STUDIOSCOPE_CONFIG";
const LOG_DIR_ENV: &str = "STUDIOSCOPE_LOG_DIR";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding Studio logs
    pub log_dir: Option<String>,

    /// Command-line cache location, defaults to a file inside `log_dir`
    pub index_file: Option<String>,

    pub output: OutputConfig,
    pub exclusion: ExclusionConfig,
    pub follow: FollowConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExclusionConfig {
    pub extra_prefixes: Vec<String>,
    pub extra_contains: Vec<String>,

    /// Start from an empty rule set instead of the built-in noise list
    pub disable_builtin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowConfig {
    pub poll_interval_ms: u64,
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
        }
    }
}

impl Config {
    /// Load the config file and apply environment overrides
    ///
    /// An explicit path must exist. Otherwise `$STUDIOSCOPE_CONFIG` and then
    /// `~/.config/studioscope/config.toml` are tried, falling back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let lookup = |key: &str| env::var(key).ok();

        let path = match explicit {
            Some(path) => {
                let path = resolve_path(path);
                if !path.exists() {
                    bail!("config file not found: {}", path.display());
                }
                Some(path)
            }
            None => lookup(CONFIG_ENV)
                .map(|raw| resolve_path(Path::new(&raw)))
                .or_else(default_config_path)
                .filter(|path| path.exists()),
        };

        let mut cfg = match path {
            Some(path) => {
                let raw = fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config: {}", path.display()))?;
                Self::from_toml(&raw)
                    .with_context(|| format!("failed to parse config: {}", path.display()))?
            }
            None => Self::default(),
        };
        cfg.apply_overrides(lookup);
        Ok(cfg)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(LOG_DIR_ENV).filter(|dir| !dir.is_empty()) {
            self.log_dir = Some(dir);
        }
    }

    /// Effective log directory
    pub fn log_dir(&self) -> PathBuf {
        match &self.log_dir {
            Some(dir) => resolve_path(Path::new(dir)),
            None => default_log_dir(|key| env::var(key).ok()),
        }
    }

    /// Effective command-line cache location
    pub fn index_file(&self) -> PathBuf {
        match &self.index_file {
            Some(path) => resolve_path(Path::new(path)),
            None => self.log_dir().join(DEFAULT_INDEX_FILE),
        }
    }

    /// Exclusion rules after applying the `[exclusion]` table
    pub fn exclusion_filter(&self) -> ExclusionFilter {
        let base = if self.exclusion.disable_builtin {
            ExclusionFilter::none()
        } else {
            ExclusionFilter::default()
        };
        base.with_prefixes(self.exclusion.extra_prefixes.iter().cloned())
            .with_contains(self.exclusion.extra_contains.iter().cloned())
    }
}

fn default_config_path() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    Some(home.join(".config/studioscope/config.toml"))
}

/// Where Studio writes its logs on this machine
fn default_log_dir<F>(lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(local) = lookup("LOCALAPPDATA").filter(|dir| !dir.is_empty()) {
        return Path::new(&local).join("Roblox").join("logs");
    }
    match dirs::home_dir() {
        Some(home) => home.join("Library/Logs/Roblox"),
        None => PathBuf::from("."),
    }
}

fn resolve_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    if let Some(home) = dirs::home_dir() {
        if raw == "~" {
            return home;
        }
        if let Some(rest) = raw.strip_prefix("~/") {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
