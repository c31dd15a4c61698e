use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_ENV_PREFIX: &str = "YT_OPTIMIZE";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub theme: ThemeConfig,
    #[serde(default)]
    pub site: SiteConfig,
}

/// Fixed delays that let the host page settle before the engine acts.
///
/// These are compatibility shims for a host that rebuilds its DOM and
/// recomputes player geometry asynchronously, not timing guarantees.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimingConfig {
    #[serde(default = "default_navigation_settle", with = "humantime_serde")]
    pub navigation_settle: Duration,
    #[serde(default = "default_resize_settle", with = "humantime_serde")]
    pub resize_settle: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            navigation_settle: default_navigation_settle(),
            resize_settle: default_resize_settle(),
        }
    }
}

fn default_navigation_settle() -> Duration {
    Duration::from_millis(1000)
}

fn default_resize_settle() -> Duration {
    Duration::from_millis(100)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayoutConfig {
    #[serde(default = "default_min_columns")]
    pub min_columns: u32,
    #[serde(default = "default_max_columns")]
    pub max_columns: u32,
    #[serde(default = "default_columns")]
    pub default_columns: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            min_columns: default_min_columns(),
            max_columns: default_max_columns(),
            default_columns: default_columns(),
        }
    }
}

fn default_min_columns() -> u32 {
    3
}

fn default_max_columns() -> u32 {
    8
}

fn default_columns() -> u32 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilterConfig {
    #[serde(default = "default_members_labels")]
    pub members_labels: Vec<String>,
    #[serde(default = "default_progress_threshold")]
    pub default_progress_threshold: u32,
    #[serde(default = "default_publish_threshold")]
    pub default_publish_threshold: u32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            members_labels: default_members_labels(),
            default_progress_threshold: default_progress_threshold(),
            default_publish_threshold: default_publish_threshold(),
        }
    }
}

fn default_members_labels() -> Vec<String> {
    vec!["会员专享".into(), "Members only".into()]
}

fn default_progress_threshold() -> u32 {
    90
}

fn default_publish_threshold() -> u32 {
    12
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThemeConfig {
    #[serde(default = "default_dark_backdrop")]
    pub dark_backdrop: String,
    #[serde(default = "default_light_backdrop")]
    pub light_backdrop: String,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            dark_backdrop: default_dark_backdrop(),
            light_backdrop: default_light_backdrop(),
        }
    }
}

fn default_dark_backdrop() -> String {
    "#0f0f0f".into()
}

fn default_light_backdrop() -> String {
    "#f9f9f9".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SiteConfig {
    #[serde(default = "default_home_url")]
    pub home_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            home_url: default_home_url(),
        }
    }
}

fn default_home_url() -> String {
    "https://www.youtube.com/".into()
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            cfg = read_config_file(path)?;
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            cfg = read_config_file(&default_path)?;
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    apply_env(&mut cfg, prefix);
    normalize(&mut cfg);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn apply_env(cfg: &mut Config, prefix: &str) {
    let upper_prefix = format!("{}_", prefix.to_uppercase());
    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            apply_env_value(cfg, &normalized, value);
        }
    }
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "timing.navigation_settle" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.timing.navigation_settle = duration;
            }
        }
        "timing.resize_settle" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.timing.resize_settle = duration;
            }
        }
        "layout.min_columns" => {
            if let Ok(parsed) = value.parse::<u32>() {
                cfg.layout.min_columns = parsed;
            }
        }
        "layout.max_columns" => {
            if let Ok(parsed) = value.parse::<u32>() {
                cfg.layout.max_columns = parsed;
            }
        }
        "layout.default_columns" => {
            if let Ok(parsed) = value.parse::<u32>() {
                cfg.layout.default_columns = parsed;
            }
        }
        "filter.members_labels" => {
            cfg.filter.members_labels = value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        "filter.default_progress_threshold" => {
            if let Ok(parsed) = value.parse::<u32>() {
                cfg.filter.default_progress_threshold = parsed;
            }
        }
        "filter.default_publish_threshold" => {
            if let Ok(parsed) = value.parse::<u32>() {
                cfg.filter.default_publish_threshold = parsed;
            }
        }
        "theme.dark_backdrop" => cfg.theme.dark_backdrop = value,
        "theme.light_backdrop" => cfg.theme.light_backdrop = value,
        "site.home_url" => cfg.site.home_url = value,
        _ => {}
    }
}

fn normalize(cfg: &mut Config) {
    let layout = &mut cfg.layout;
    layout.min_columns = layout.min_columns.max(1);
    if layout.max_columns < layout.min_columns {
        layout.max_columns = layout.min_columns;
    }
    layout.default_columns = layout
        .default_columns
        .clamp(layout.min_columns, layout.max_columns);

    let filter = &mut cfg.filter;
    filter.default_progress_threshold = filter.default_progress_threshold.clamp(1, 100);
    filter.default_publish_threshold = filter.default_publish_threshold.max(1);
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("yt-optimize").join("config.yaml"))
}
