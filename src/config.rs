//! Runtime configuration and file ignore rules.
//!
//! Configuration is read from TOML. Every section is optional and falls back
//! to the defaults shown here:
//!
//! ```toml
//! [filters]
//! filenames = ["Thumbs.db", ".DS_Store", "desktop.ini"]
//! extensions = ["tmp", "crdownload", "part", "partial"]
//! patterns = []
//! regex = []
//!
//! [labels]
//! other_files = "Other Files"
//! unknown_sources = "Unknown Sources"
//! files_bin = "Files Bin"
//!
//! [pipeline]
//! workers_per_cpu = 4
//! min_workers = 2
//! max_workers = 32
//!
//! [lock]
//! retry_interval_ms = 10
//! timeout_ms = 30000
//! ```

use crate::paths::StatePaths;
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Suffix of the sidecar stream that carries download provenance.
pub const ZONE_IDENTIFIER_SUFFIX: &str = ":Zone.Identifier";

/// Errors that can occur during configuration loading and compilation.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),
    #[error("Invalid glob pattern '{0}'")]
    InvalidGlobPattern(String),
    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },
    #[error("IO error reading configuration: {0}")]
    IoError(String),
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub filters: FilterRules,
    pub labels: Labels,
    pub pipeline: PipelineConfig,
    pub lock: LockPolicy,
}

/// Files matching any of these rules are left where they are.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterRules {
    /// Exact file names.
    pub filenames: Vec<String>,
    /// Extensions, case-insensitive, with or without the leading dot.
    pub extensions: Vec<String>,
    /// Glob patterns matched against the full path.
    pub patterns: Vec<String>,
    /// Regex patterns matched against the file name.
    pub regex: Vec<String>,
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            filenames: ["Thumbs.db", ".DS_Store", "desktop.ini"]
                .map(String::from)
                .to_vec(),
            extensions: ["tmp", "crdownload", "part", "partial"]
                .map(String::from)
                .to_vec(),
            patterns: Vec::new(),
            regex: Vec::new(),
        }
    }
}

/// Folder names used when a file has no better destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Labels {
    pub other_files: String,
    pub unknown_sources: String,
    pub files_bin: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            other_files: "Other Files".to_string(),
            unknown_sources: "Unknown Sources".to_string(),
            files_bin: "Files Bin".to_string(),
        }
    }
}

/// Sizing of the classification worker pool.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub workers_per_cpu: usize,
    pub min_workers: usize,
    pub max_workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers_per_cpu: 4,
            min_workers: 2,
            max_workers: 32,
        }
    }
}

impl PipelineConfig {
    /// Worker count for a machine with `parallelism` hardware threads.
    pub fn worker_count(&self, parallelism: usize) -> usize {
        let min = self.min_workers.max(1);
        let max = self.max_workers.max(min);
        parallelism
            .max(1)
            .saturating_mul(self.workers_per_cpu.max(1))
            .clamp(min, max)
    }
}

/// How long to wait for the action log lock.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct LockPolicy {
    pub retry_interval_ms: u64,
    pub timeout_ms: u64,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            retry_interval_ms: 10,
            timeout_ms: 30_000,
        }
    }
}

impl LockPolicy {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms.max(1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl AppConfig {
    /// Load configuration, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. `config.toml` in the state directory
    /// 3. `~/.config/reshelf/config.toml`
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error only if an explicitly provided file cannot be loaded.
    pub fn load(config_path: Option<&Path>, paths: &StatePaths) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let mut candidates = vec![paths.config.clone()];
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".config").join("reshelf").join("config.toml"));
        }

        for candidate in candidates {
            if !candidate.exists() {
                continue;
            }
            match Self::load_from_file(&candidate) {
                Ok(config) => {
                    debug!(path = %candidate.display(), "loaded configuration");
                    return Ok(config);
                }
                Err(e) => warn!(path = %candidate.display(), error = %e, "ignoring configuration"),
            }
        }

        Ok(Self::default())
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }
}

impl FilterRules {
    /// Compile into matchers.
    ///
    /// # Errors
    ///
    /// Returns an error if any regex or glob patterns are invalid.
    pub fn compile(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(self)
    }
}

/// Pre-compiled ignore rules.
#[derive(Debug, Default)]
pub struct CompiledFilters {
    filenames: HashSet<String>,
    extensions: HashSet<String>,
    patterns: Vec<Pattern>,
    regexes: Vec<Regex>,
}

impl CompiledFilters {
    fn new(rules: &FilterRules) -> Result<Self, ConfigError> {
        let patterns = rules
            .patterns
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let regexes = rules
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            filenames: rules.filenames.iter().cloned().collect(),
            extensions: rules
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            patterns,
            regexes,
        })
    }

    /// True when the file must be left alone by every mode.
    pub fn is_ignored(&self, file_path: &Path) -> bool {
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if file_name.ends_with(ZONE_IDENTIFIER_SUFFIX) {
            return true;
        }

        if self.filenames.contains(file_name.as_ref()) {
            return true;
        }

        if let Some(ext) = file_path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            if self.extensions.contains(&ext_lower) {
                return true;
            }
        }

        if self
            .patterns
            .iter()
            .any(|pattern| pattern.matches_path(file_path))
        {
            return true;
        }

        self.regexes.iter().any(|regex| regex.is_match(&file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_rules_ignore_partial_downloads() {
        let compiled = FilterRules::default().compile().unwrap();

        assert!(compiled.is_ignored(Path::new("movie.mp4.crdownload")));
        assert!(compiled.is_ignored(Path::new("setup.PART")));
        assert!(compiled.is_ignored(Path::new("Thumbs.db")));
        assert!(compiled.is_ignored(Path::new("desktop.ini")));
        assert!(!compiled.is_ignored(Path::new("photo.jpg")));
    }

    #[test]
    fn test_sidecar_streams_always_ignored() {
        let compiled = CompiledFilters::default();
        assert!(compiled.is_ignored(Path::new("setup.exe:Zone.Identifier")));
        assert!(!compiled.is_ignored(Path::new("setup.exe")));
    }

    #[test]
    fn test_extensions_accept_leading_dot() {
        let rules = FilterRules {
            extensions: vec![".BAK".to_string()],
            ..FilterRules::default()
        };
        let compiled = rules.compile().unwrap();

        assert!(compiled.is_ignored(Path::new("notes.bak")));
        assert!(!compiled.is_ignored(Path::new("notes.txt")));
    }

    #[test]
    fn test_glob_and_regex_rules() {
        let rules = FilterRules {
            patterns: vec!["**/cache/**".to_string()],
            regex: vec![r"^~\$".to_string()],
            ..FilterRules::default()
        };
        let compiled = rules.compile().unwrap();

        assert!(compiled.is_ignored(Path::new("app/cache/blob.bin")));
        assert!(compiled.is_ignored(Path::new("~$report.docx")));
        assert!(!compiled.is_ignored(Path::new("app/my_cache/blob.bin")));
    }

    #[test]
    fn test_invalid_patterns_return_error() {
        let bad_glob = FilterRules {
            patterns: vec!["[invalid".to_string()],
            ..FilterRules::default()
        };
        assert!(bad_glob.compile().is_err());

        let bad_regex = FilterRules {
            regex: vec!["[invalid(".to_string()],
            ..FilterRules::default()
        };
        assert!(matches!(
            bad_regex.compile(),
            Err(ConfigError::InvalidRegexPattern { .. })
        ));
    }

    #[test]
    fn test_worker_count_is_clamped() {
        let config = PipelineConfig::default();
        assert_eq!(config.worker_count(0), 4);
        assert_eq!(config.worker_count(1), 4);
        assert_eq!(config.worker_count(4), 16);
        assert_eq!(config.worker_count(64), 32);

        let tiny = PipelineConfig {
            workers_per_cpu: 1,
            min_workers: 2,
            max_workers: 1,
        };
        assert_eq!(tiny.worker_count(1), 2);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let paths = StatePaths::at(temp_dir.path());
        fs::write(&paths.config, "[labels]\nother_files = \"Misc\"\n").unwrap();

        let config = AppConfig::load(Some(&paths.config), &paths).unwrap();
        assert_eq!(config.labels.other_files, "Misc");
        assert_eq!(config.labels.unknown_sources, "Unknown Sources");
        assert_eq!(config.lock.retry_interval_ms, 10);
        assert_eq!(config.pipeline.max_workers, 32);
    }

    #[test]
    fn test_explicit_missing_config_is_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let paths = StatePaths::at(temp_dir.path());
        let missing = temp_dir.path().join("missing.toml");

        assert!(matches!(
            AppConfig::load(Some(&missing), &paths),
            Err(ConfigError::ConfigNotFound(_))
        ));
    }

    #[test]
    fn test_invalid_state_config_falls_back_to_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let paths = StatePaths::at(temp_dir.path());
        fs::write(&paths.config, "this is = = not toml").unwrap();

        let config = AppConfig::load(None, &paths).unwrap();
        assert_eq!(config.labels.files_bin, "Files Bin");
    }
}
