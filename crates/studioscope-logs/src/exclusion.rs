//! Exclusion rules for Studio-internal noise
//!
//! User script output (`print`/`warn`) carries no special prefix, so the
//! filter works as a deny-list of known system messages: literal prefixes
//! and literal substrings.

/// Messages starting with any of these are internal noise
pub const BUILTIN_EXCLUDE_PREFIXES: &[&str] = &[
    // Studio internal info
    "Info:",
    // Version and architecture banners
    "RobloxGitHash:",
    "Studio Version:",
    "Studio Architecture:",
    "Server RobloxGitHash:",
    "Server Prefix:",
    "*******",
    // Policy and URLs
    "Creating PolicyContext",
    "BaseUrl:",
    "settingsUrl:",
    // Session info
    "Session GUID",
    "Machine GUID",
    "Studio Launch Intent",
    "Is Studio Configured",
    // Paths and assets
    "Reflection::load",
    "setAssetFolder",
    "setExtraAssetFolder",
    "isSupportedInstallLocation",
    // Locale
    "preferredLocale",
    "systemLocale",
    // GPU and drivers
    "Studio D3D",
    "ESGamePerfMonitor",
    // Frameworks and plugins
    "ABTestFramework",
    "Loading Lua Ribbon",
    "TeamCreateWidget",
    "Web returned cloud plugins",
    "The MCP Studio plugin",
    // Flags
    "Flag ",
    // Crash recovery
    "Evaluating deferred",
    "已创建自动恢复文件",
    "Auto-recovery file",
    // Networking
    "Started network server",
    "New connection from",
    "Disconnect from",
    "Connecting to",
    "Joining game",
    "! Joining game",
    // Players
    "Player ",
    // Code completion
    "sendMLCodeCompletionHttpRequest",
    // Update manager
    "UpdateManager::",
    // Style rules
    "Warning: Failed to apply StyleRule",
    // Child events
    "On child added called",
    "On child removed called",
    // Unhandled actions
    "Action ",
];

/// Messages containing any of these are internal noise
pub const BUILTIN_EXCLUDE_CONTAINS: &[&str] = &[
    "referenced from Lua",
    "Redundant Flag ID",
    "Asset (Image)",
    "load failed:",
];

/// Pure predicate deciding whether a message is internal noise
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExclusionFilter {
    prefixes: Vec<String>,
    contains: Vec<String>,
    drop_blank: bool,
}

impl Default for ExclusionFilter {
    fn default() -> Self {
        Self {
            prefixes: BUILTIN_EXCLUDE_PREFIXES.iter().map(|s| s.to_string()).collect(),
            contains: BUILTIN_EXCLUDE_CONTAINS.iter().map(|s| s.to_string()).collect(),
            drop_blank: true,
        }
    }
}

impl ExclusionFilter {
    /// A filter that excludes nothing
    pub fn none() -> Self {
        Self {
            prefixes: Vec::new(),
            contains: Vec::new(),
            drop_blank: false,
        }
    }

    /// Add prefix rules
    pub fn with_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefixes.extend(prefixes.into_iter().map(Into::into));
        self
    }

    /// Add substring rules
    pub fn with_contains<I, S>(mut self, contains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.contains.extend(contains.into_iter().map(Into::into));
        self
    }

    /// Drop messages that are empty or whitespace only
    pub fn dropping_blank(mut self, drop_blank: bool) -> Self {
        self.drop_blank = drop_blank;
        self
    }

    /// Check whether a message should be dropped
    pub fn should_exclude(&self, message: &str) -> bool {
        if self.drop_blank && message.trim().is_empty() {
            return true;
        }

        if self.prefixes.iter().any(|p| message.starts_with(p.as_str())) {
            return true;
        }

        self.contains.iter().any(|s| message.contains(s.as_str()))
    }

    /// Keep only the messages that survive the filter
    pub fn filter_messages<'a>(&self, messages: &[&'a str]) -> Vec<&'a str> {
        messages
            .iter()
            .copied()
            .filter(|m| !self.should_exclude(m))
            .collect()
    }

    /// Total number of rules
    pub fn len(&self) -> usize {
        self.prefixes.len() + self.contains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty() && self.contains.is_empty() && !self.drop_blank
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_prefixes() {
        let filter = ExclusionFilter::default();
        assert!(filter.should_exclude("Info: loading place"));
        assert!(filter.should_exclude("Flag FFlagFoo referenced from Lua isn't defined"));
        assert!(filter.should_exclude("Player Alice joined"));
        assert!(filter.should_exclude("已创建自动恢复文件: foo.rbxl"));
    }

    #[test]
    fn test_builtin_contains() {
        let filter = ExclusionFilter::default();
        assert!(filter.should_exclude("Asset (Image) 123 load failed: 404"));
        assert!(filter.should_exclude("something Redundant Flag ID: 7"));
    }

    #[test]
    fn test_user_output_kept() {
        let filter = ExclusionFilter::default();
        assert!(!filter.should_exclude("[TEST] hello from a script"));
        assert!(!filter.should_exclude("Players service ready"));
    }

    #[test]
    fn test_blank_messages() {
        assert!(ExclusionFilter::default().should_exclude("   "));
        assert!(!ExclusionFilter::none().should_exclude(""));
    }

    #[test]
    fn test_empty_rule_set_excludes_nothing() {
        let filter = ExclusionFilter::none();
        assert!(filter.is_empty());
        assert!(!filter.should_exclude("Info: anything"));
    }

    #[test]
    fn test_custom_rules() {
        let filter = ExclusionFilter::none()
            .with_prefixes(["DEBUG>"])
            .with_contains(["heartbeat"]);
        assert!(filter.should_exclude("DEBUG> x"));
        assert!(filter.should_exclude("server heartbeat ok"));
        assert!(!filter.should_exclude("x DEBUG>"));
        assert_eq!(filter.len(), 2);
    }

    #[test]
    fn test_filter_messages() {
        let filter = ExclusionFilter::default();
        let kept = filter.filter_messages(&["Info: x", "hello", "", "Player joined"]);
        assert_eq!(kept, vec!["hello"]);
    }
}
