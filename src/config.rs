// Cache configuration.
// Loaded from the user's config directory when present, with defaults that
// match the Canvas grading workflow.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Duration;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::cache::{MarkerWindows, StalenessPolicy, TERMINAL_GRADES};
use crate::error::Result;

/// Tunable knobs for the caching layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long a non-terminal grade stays trustworthy, in seconds.
    pub freshness_window_secs: i64,
    /// Grades that exempt a submission from re-fetching.
    pub terminal_grades: Vec<String>,
    /// How long a cached user roster listing stays complete, in days.
    pub user_marker_window_days: i64,
    /// How long cached group and group-category listings stay complete,
    /// in days.
    pub group_marker_window_days: i64,
    /// How long every other cached listing stays complete, in days.
    pub default_marker_window_days: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            freshness_window_secs: 5 * 60,
            terminal_grades: TERMINAL_GRADES.iter().map(|g| g.to_string()).collect(),
            user_marker_window_days: 2,
            group_marker_window_days: 5,
            default_marker_window_days: 7,
        }
    }
}

impl CacheConfig {
    /// The staleness policy this configuration describes.
    pub fn policy(&self) -> StalenessPolicy {
        StalenessPolicy {
            freshness_window: Duration::seconds(self.freshness_window_secs),
            terminal_grades: self.terminal_grades.clone(),
            marker_windows: MarkerWindows {
                user: Duration::days(self.user_marker_window_days),
                group: Duration::days(self.group_marker_window_days),
                default: Duration::days(self.default_marker_window_days),
            },
        }
    }

    /// Path of the config file (~/.config/canvas-cache/config.json on Linux).
    pub fn path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "canvas-cache")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Load the configuration from the default location, falling back to
    /// defaults when no file exists.
    pub fn load() -> Result<Self> {
        match Self::path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load the configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config = serde_json::from_str(&contents)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_the_grading_workflow() {
        let config = CacheConfig::default();
        assert_eq!(config.freshness_window_secs, 300);
        assert!(config.terminal_grades.iter().any(|g| g == "A"));
        assert!(config.terminal_grades.iter().any(|g| g == "complete"));

        let policy = config.policy();
        assert_eq!(policy.freshness_window, Duration::minutes(5));
        assert_eq!(policy.marker_windows, MarkerWindows::default());
    }

    #[test]
    fn marker_windows_are_configurable() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, r#"{"user_marker_window_days": 1}"#).unwrap();

        let config = CacheConfig::load_from(&path).unwrap();
        let windows = config.policy().marker_windows;
        assert_eq!(windows.user, Duration::days(1));
        // The other windows keep their defaults.
        assert_eq!(windows.group, Duration::days(5));
        assert_eq!(windows.default, Duration::days(7));
    }

    #[test]
    fn loads_partial_config_over_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        let mut file = fs::File::create(&path).unwrap();
        write!(file, r#"{{"freshness_window_secs": 120}}"#).unwrap();

        let config = CacheConfig::load_from(&path).unwrap();
        assert_eq!(config.freshness_window_secs, 120);
        // Unspecified fields keep their defaults.
        assert!(!config.terminal_grades.is_empty());
    }

    #[test]
    fn rejects_malformed_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();

        assert!(CacheConfig::load_from(&path).is_err());
    }
}
