use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::size;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub overview: OverviewConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub ui: UiConfig,

    #[serde(default)]
    pub delete: DeleteConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    #[serde(default = "default_max_large_files")]
    pub max_large_files: usize,

    /// Human-readable size, e.g. "100MB"
    #[serde(default = "default_min_large_file_size")]
    pub min_large_file_size: String,

    #[serde(default = "default_cpu_multiplier")]
    pub cpu_multiplier: usize,

    #[serde(default = "default_min_workers")]
    pub min_workers: usize,

    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(default = "default_max_dir_workers")]
    pub max_dir_workers: usize,

    #[serde(default = "default_fallback_walk_timeout")]
    pub fallback_walk_timeout_secs: u64,

    /// Report logical length instead of allocated blocks.
    #[serde(default)]
    pub apparent_size: bool,

    #[serde(default)]
    pub extra_fold_dirs: Vec<String>,

    #[serde(default)]
    pub extra_fold_patterns: Vec<String>,

    #[serde(default)]
    pub extra_skip_extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_true")]
    pub use_du: bool,

    #[serde(default = "default_use_index")]
    pub use_index: bool,

    #[serde(default = "default_du_timeout")]
    pub du_timeout_secs: u64,

    #[serde(default = "default_index_timeout")]
    pub index_timeout_secs: u64,

    #[serde(default = "default_open_timeout")]
    pub open_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverviewConfig {
    #[serde(default = "default_max_concurrent_overview")]
    pub max_concurrent: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Unset means cached results stay valid until a deletion invalidates them.
    #[serde(default)]
    pub max_age_hours: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    #[serde(default = "default_viewport")]
    pub entry_viewport: usize,

    #[serde(default = "default_viewport")]
    pub large_viewport: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteConfig {
    /// Move to the system trash instead of removing permanently.
    #[serde(default)]
    pub use_trash: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            max_large_files: default_max_large_files(),
            min_large_file_size: default_min_large_file_size(),
            cpu_multiplier: default_cpu_multiplier(),
            min_workers: default_min_workers(),
            max_workers: default_max_workers(),
            max_dir_workers: default_max_dir_workers(),
            fallback_walk_timeout_secs: default_fallback_walk_timeout(),
            apparent_size: false,
            extra_fold_dirs: Vec::new(),
            extra_fold_patterns: Vec::new(),
            extra_skip_extensions: Vec::new(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            use_du: true,
            use_index: default_use_index(),
            du_timeout_secs: default_du_timeout(),
            index_timeout_secs: default_index_timeout(),
            open_timeout_secs: default_open_timeout(),
        }
    }
}

impl Default for OverviewConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent_overview(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_age_hours: None,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            entry_viewport: default_viewport(),
            large_viewport: default_viewport(),
        }
    }
}

fn default_true() -> bool { true }
fn default_use_index() -> bool { cfg!(target_os = "macos") }
fn default_max_entries() -> usize { 30 }
fn default_max_large_files() -> usize { 30 }
fn default_min_large_file_size() -> String { "100MB".to_string() }
fn default_cpu_multiplier() -> usize { 4 }
fn default_min_workers() -> usize { 16 }
fn default_max_workers() -> usize { 64 }
fn default_max_dir_workers() -> usize { 32 }
fn default_fallback_walk_timeout() -> u64 { 300 }
fn default_du_timeout() -> u64 { 30 }
fn default_index_timeout() -> u64 { 10 }
fn default_open_timeout() -> u64 { 5 }
fn default_max_concurrent_overview() -> usize { 3 }
fn default_tick_ms() -> u64 { 120 }
fn default_viewport() -> usize { 20 }

impl ScanConfig {
    /// Minimum size for the large-file list, in bytes.
    pub fn min_large_file_bytes(&self) -> u64 {
        match size::parse_size(&self.min_large_file_size) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(
                    "invalid min_large_file_size {:?}: {}; using 100MB",
                    self.min_large_file_size, e
                );
                100 * 1024 * 1024
            }
        }
    }

    pub fn fallback_walk_timeout(&self) -> Duration {
        Duration::from_secs(self.fallback_walk_timeout_secs)
    }
}

impl ToolsConfig {
    pub fn du_timeout(&self) -> Duration {
        Duration::from_secs(self.du_timeout_secs)
    }

    pub fn index_timeout(&self) -> Duration {
        Duration::from_secs(self.index_timeout_secs)
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_secs(self.open_timeout_secs)
    }
}

/// Largest hour count a `chrono::Duration` can hold (millisecond range).
const MAX_AGE_HOURS_LIMIT: u64 = (i64::MAX / 1000 / 3600) as u64;

impl CacheConfig {
    /// Configured maximum record age. Absurdly large values are clamped.
    pub fn max_age(&self) -> Option<chrono::Duration> {
        self.max_age_hours
            .map(|h| chrono::Duration::hours(h.min(MAX_AGE_HOURS_LIMIT) as i64))
    }
}

impl Config {
    /// Get the config file path: <config dir>/spacelens/config.toml
    pub fn config_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "", "spacelens")
            .context("Could not determine a home directory for the config file")?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Load config from file or return defaults
    pub fn load() -> Self {
        match Self::config_path() {
            Ok(path) if path.exists() => match fs::read_to_string(&path) {
                Ok(content) => Self::from_toml(&content).unwrap_or_else(|e| {
                    warn!("Failed to parse config file {}: {:#}", path.display(), e);
                    Self::default()
                }),
                Err(e) => {
                    warn!("Failed to read config file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            _ => Self::default(),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid config TOML")
    }

    /// Save config to file
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, toml).context("Failed to write config file")?;

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.scan.max_entries, 30);
        assert_eq!(config.scan.max_large_files, 30);
        assert_eq!(config.scan.min_large_file_bytes(), 100 * 1024 * 1024);
        assert_eq!(config.overview.max_concurrent, 3);
        assert!(config.cache.enabled);
        assert!(config.cache.max_age().is_none());
        assert!(!config.delete.use_trash);
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = Config::from_toml(
            r#"
            [scan]
            max_entries = 50
            min_large_file_size = "1GB"

            [cache]
            max_age_hours = 24
            "#,
        )
        .unwrap();

        assert_eq!(config.scan.max_entries, 50);
        assert_eq!(config.scan.max_large_files, 30);
        assert_eq!(config.scan.min_large_file_bytes(), 1024 * 1024 * 1024);
        assert_eq!(config.cache.max_age(), Some(chrono::Duration::hours(24)));
        assert_eq!(config.ui.tick_ms, 120);
    }

    #[test]
    fn test_invalid_size_falls_back() {
        let scan = ScanConfig {
            min_large_file_size: "lots".into(),
            ..ScanConfig::default()
        };
        assert_eq!(scan.min_large_file_bytes(), 100 * 1024 * 1024);
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut config = Config::default();
        config.scan.extra_fold_dirs.push("vendor-cache".into());
        let text = toml::to_string_pretty(&config).unwrap();
        let back = Config::from_toml(&text).unwrap();
        assert_eq!(back.scan.extra_fold_dirs, vec!["vendor-cache".to_string()]);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(Config::from_toml("[scan\nmax_entries = ").is_err());
    }

    #[test]
    fn test_huge_max_age_is_clamped() {
        let config = CacheConfig {
            max_age_hours: Some(u64::MAX),
            ..CacheConfig::default()
        };
        let max_age = config.max_age().unwrap();
        assert!(max_age > chrono::Duration::days(365 * 1000));

        let config = CacheConfig {
            max_age_hours: Some(48),
            ..CacheConfig::default()
        };
        assert_eq!(config.max_age(), Some(chrono::Duration::hours(48)));
    }
}
