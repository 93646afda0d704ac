//! Configuration file management for airboard.
//!
//! Reads/writes `~/.airboard/config.yaml` with resolver, feed and data
//! source settings. A missing file means defaults; a present file with a
//! malformed value is an error rather than a silent default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::feed::{
    FeedSettings, DEFAULT_PAGE_SIZE, DEFAULT_RECENCY_WINDOW_SECS, DEFAULT_REFRESH_INTERVAL_SECS,
};
use crate::resolver::{ResolverSettings, DEFAULT_FALLBACK_CODE, DEFAULT_RADIUS_KM};
use crate::types::{AirboardError, Result};

pub const DEFAULT_ENDPOINT: &str = "https://flight-api-worker.rrosset91.workers.dev";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Longest accepted refresh interval: one day.
pub const MAX_REFRESH_INTERVAL_SECS: u64 = 86_400;

/// Full configuration structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub resolver: ResolverConfig,
    pub feed: FeedConfig,
    pub source: SourceConfig,
    /// Optional airport directory JSON; built-in table when absent.
    pub directory: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolverConfig {
    pub radius_km: f64,
    pub fallback_enabled: bool,
    pub fallback_code: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    pub page_size: usize,
    pub recency_window_secs: i64,
    pub refresh_interval_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    Live,
    Fixture,
}

impl SourceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceMode::Live => "live",
            SourceMode::Fixture => "fixture",
        }
    }
}

impl std::str::FromStr for SourceMode {
    type Err = AirboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "live" => Ok(SourceMode::Live),
            "fixture" | "mock" => Ok(SourceMode::Fixture),
            other => Err(AirboardError::Config(format!("unknown source mode: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    pub mode: SourceMode,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            resolver: ResolverConfig {
                radius_km: DEFAULT_RADIUS_KM,
                fallback_enabled: false,
                fallback_code: DEFAULT_FALLBACK_CODE.into(),
            },
            feed: FeedConfig {
                page_size: DEFAULT_PAGE_SIZE,
                recency_window_secs: DEFAULT_RECENCY_WINDOW_SECS,
                refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            },
            source: SourceConfig {
                mode: SourceMode::Live,
                endpoint: DEFAULT_ENDPOINT.into(),
                timeout_secs: DEFAULT_TIMEOUT_SECS,
            },
            directory: None,
        }
    }
}

impl Config {
    pub fn resolver_settings(&self) -> ResolverSettings {
        ResolverSettings {
            radius_km: self.resolver.radius_km,
            fallback_enabled: self.resolver.fallback_enabled,
            fallback_code: self.resolver.fallback_code.clone(),
        }
    }

    pub fn feed_settings(&self) -> FeedSettings {
        FeedSettings {
            page_size: self.feed.page_size,
            recency_window_secs: self.feed.recency_window_secs,
            refresh_interval: Duration::from_secs(self.feed.refresh_interval_secs),
        }
    }

    /// Check values that parse but make no sense.
    pub fn validate(&self) -> Result<()> {
        if self.feed.page_size == 0 {
            return Err(AirboardError::Config("feed.page_size must be > 0".into()));
        }
        if !(1..=MAX_REFRESH_INTERVAL_SECS).contains(&self.feed.refresh_interval_secs) {
            return Err(AirboardError::Config(format!(
                "feed.refresh_interval_secs must be between 1 and {MAX_REFRESH_INTERVAL_SECS}"
            )));
        }
        if self.feed.recency_window_secs < 0 {
            return Err(AirboardError::Config(
                "feed.recency_window_secs must be >= 0".into(),
            ));
        }
        if !self.resolver.radius_km.is_finite() || self.resolver.radius_km < 0.0 {
            return Err(AirboardError::Config(
                "resolver.radius_km must be >= 0".into(),
            ));
        }
        Ok(())
    }
}

/// Get the config directory path (`~/.airboard/`).
pub fn config_dir() -> PathBuf {
    dirs_home().join(".airboard")
}

/// Get the config file path.
pub fn config_file() -> PathBuf {
    config_dir().join("config.yaml")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Load config from `path`, or defaults if the file doesn't exist.
pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let text = std::fs::read_to_string(path)?;
    let config = parse_config(&text)?;
    config.validate()?;
    Ok(config)
}

/// Load config from `~/.airboard/config.yaml`.
pub fn load_config() -> Result<Config> {
    load_config_from(&config_file())
}

/// Save config to `path`, creating parent directories.
pub fn save_config_to(config: &Config, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, serialize_config(config))?;
    Ok(())
}

/// Save config to `~/.airboard/config.yaml`.
pub fn save_config(config: &Config) -> Result<PathBuf> {
    let path = config_file();
    save_config_to(config, &path)?;
    Ok(path)
}

/// Parse simple YAML-like config text.
pub fn parse_config(text: &str) -> Result<Config> {
    let mut config = Config::default();
    let mut current_section: Option<String> = None;

    for (lineno, line) in text.lines().enumerate() {
        let stripped = line.trim();
        if stripped.is_empty() || stripped.starts_with('#') {
            continue;
        }

        let is_indented = line.starts_with("  ") || line.starts_with('\t');

        let Some((key, val)) = stripped.split_once(':') else {
            return Err(AirboardError::Config(format!(
                "line {}: expected `key: value`",
                lineno + 1
            )));
        };
        let key = key.trim();
        let val = val.trim();

        if !is_indented {
            if val.is_empty() {
                current_section = Some(key.to_string());
                continue;
            }
            current_section = None;
            if key == "directory" {
                config.directory = parse_string_value(val);
            }
            continue;
        }

        let Some(section) = current_section.as_deref() else {
            continue;
        };
        match (section, key) {
            ("resolver", "radius_km") => config.resolver.radius_km = parse_number(key, val)?,
            ("resolver", "fallback_enabled") => {
                config.resolver.fallback_enabled = parse_bool(key, val)?
            }
            ("resolver", "fallback_code") => {
                if let Some(v) = parse_string_value(val) {
                    config.resolver.fallback_code = v.to_ascii_uppercase();
                }
            }
            ("feed", "page_size") => config.feed.page_size = parse_number(key, val)?,
            ("feed", "recency_window_secs") => {
                config.feed.recency_window_secs = parse_number(key, val)?
            }
            ("feed", "refresh_interval_secs") => {
                config.feed.refresh_interval_secs = parse_number(key, val)?
            }
            ("source", "mode") => {
                if let Some(v) = parse_string_value(val) {
                    config.source.mode = v.parse()?;
                }
            }
            ("source", "endpoint") => {
                if let Some(v) = parse_string_value(val) {
                    config.source.endpoint = v;
                }
            }
            ("source", "timeout_secs") => config.source.timeout_secs = parse_number(key, val)?,
            _ => {}
        }
    }

    Ok(config)
}

fn parse_string_value(val: &str) -> Option<String> {
    if val == "null" || val == "~" || val.is_empty() {
        return None;
    }
    // Strip quotes
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return Some(val[1..val.len() - 1].to_string());
    }
    Some(val.to_string())
}

fn parse_number<T: std::str::FromStr>(key: &str, val: &str) -> Result<T> {
    val.parse()
        .map_err(|_| AirboardError::Config(format!("{key}: not a valid number: {val:?}")))
}

fn parse_bool(key: &str, val: &str) -> Result<bool> {
    match val.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" => Ok(true),
        "false" | "no" | "off" => Ok(false),
        _ => Err(AirboardError::Config(format!("{key}: not a boolean: {val:?}"))),
    }
}

/// Serialize config to YAML-like text.
pub fn serialize_config(config: &Config) -> String {
    let mut lines = vec!["# airboard configuration".to_string(), String::new()];

    lines.push("resolver:".into());
    lines.push(format!("  radius_km: {}", config.resolver.radius_km));
    lines.push(format!("  fallback_enabled: {}", config.resolver.fallback_enabled));
    lines.push(format!("  fallback_code: \"{}\"", config.resolver.fallback_code));
    lines.push(String::new());

    lines.push("feed:".into());
    lines.push(format!("  page_size: {}", config.feed.page_size));
    lines.push(format!("  recency_window_secs: {}", config.feed.recency_window_secs));
    lines.push(format!("  refresh_interval_secs: {}", config.feed.refresh_interval_secs));
    lines.push(String::new());

    lines.push("source:".into());
    lines.push(format!("  mode: {}", config.source.mode.as_str()));
    lines.push(format!("  endpoint: \"{}\"", config.source.endpoint));
    lines.push(format!("  timeout_secs: {}", config.source.timeout_secs));
    lines.push(String::new());

    match &config.directory {
        Some(path) => lines.push(format!("directory: \"{path}\"")),
        None => lines.push("directory: null".into()),
    }

    lines.join("\n") + "\n"
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
