//! Typed access to the flat preference store.
//!
//! Readers never fail: missing or malformed values fall back to defaults.
//! Writers go straight to the store; there is no cached copy to invalidate.

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::config::{Config, FilterConfig, LayoutConfig};
use crate::hotkeys::{self, HotkeyAction};
use crate::quality::{self, FullscreenPolicy, QualityPolicy};
use crate::storage::PreferenceStore;

pub mod keys {
    pub const DEFAULT_QUALITY: &str = "yt-default-quality";
    pub const DEFAULT_SPEED: &str = "yt-default-speed";
    pub const AUTO_WEB_FULLSCREEN: &str = "yt-auto-webfullscreen";
    pub const FULLSCREEN_FIXED: &str = "yt-auto-fullscreen-quality";
    pub const FULLSCREEN_QUALITY: &str = "yt-fullscreen-quality-value";
    pub const FULLSCREEN_SCREEN_FIT: &str = "yt-fullscreen-max-quality";
    pub const FULLSCREEN_VIDEO_MAX: &str = "yt-fullscreen-video-max-quality";
    pub const SHORTS_ONE_X: &str = "yt-shorts-one-x-speed";
    pub const FILTER_ENABLED: &str = "yt-filter-enabled";
    pub const FILTER_HOME: &str = "yt-filter-home";
    pub const FILTER_RELATED: &str = "yt-filter-related";
    pub const FILTER_MEMBERS_ONLY: &str = "yt-filter-members-only";
    pub const FILTER_KEYWORDS: &str = "yt-filter-keywords";
    pub const FILTER_WORDS: &str = "yt-filter-words";
    pub const FILTER_PROGRESS: &str = "yt-filter-progress";
    pub const FILTER_PROGRESS_THRESHOLD: &str = "yt-filter-progress-threshold";
    pub const FILTER_PUBLISH: &str = "yt-filter-publish-time-enabled";
    pub const FILTER_PUBLISH_THRESHOLD: &str = "yt-filter-publish-time-threshold";
    pub const HOTKEY_TOGGLE_PREFIX: &str = "yt-hotkey-toggle-";
    pub const HOTKEY_KEY_PREFIX: &str = "yt-hotkey-key-";
    pub const COLUMNS: &str = "yt_home_columns";
    pub const COLUMNS_ENABLED: &str = "yt_home_columns_enabled";
    pub const SLIDER_VISIBLE: &str = "yt_home_slider_visible";

    /// Plain on/off keys.
    pub const FLAGS: [&str; 11] = [
        AUTO_WEB_FULLSCREEN,
        SHORTS_ONE_X,
        FILTER_ENABLED,
        FILTER_HOME,
        FILTER_RELATED,
        FILTER_MEMBERS_ONLY,
        FILTER_KEYWORDS,
        FILTER_PROGRESS,
        FILTER_PUBLISH,
        COLUMNS_ENABLED,
        SLIDER_VISIBLE,
    ];
}

pub const SPEED_OPTIONS: [f64; 11] = [1.0, 1.25, 1.5, 2.0, 2.5, 3.0, 4.0, 5.0, 8.0, 10.0, 16.0];
pub const DEFAULT_SPEED: f64 = 2.0;

#[derive(Debug, thiserror::Error)]
pub enum PrefError {
    #[error("unknown preference key {0:?}")]
    UnknownKey(String),
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: &'static str,
    },
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn PreferenceStore>,
    layout: LayoutConfig,
    filter: FilterConfig,
}

impl Preferences {
    pub fn new(store: Arc<dyn PreferenceStore>, config: &Config) -> Self {
        Self {
            store,
            layout: config.layout.clone(),
            filter: config.filter.clone(),
        }
    }

    pub fn store(&self) -> &Arc<dyn PreferenceStore> {
        &self.store
    }

    pub fn members_labels(&self) -> &[String] {
        &self.filter.members_labels
    }

    fn flag(&self, key: &str) -> bool {
        self.store.get(key).as_deref() == Some("true")
    }

    pub fn set_flag(&self, key: &str, on: bool) -> Result<()> {
        self.store.set(key, if on { "true" } else { "false" })
    }

    fn int(&self, key: &str) -> Option<i64> {
        let raw = self.store.get(key)?;
        match leading_int(&raw) {
            Some(value) => Some(value),
            None => {
                debug!(key, value = raw.as_str(), "ignoring malformed integer preference");
                None
            }
        }
    }

    pub fn default_quality(&self) -> String {
        self.stored_default_quality()
            .unwrap_or_else(|| quality::DEFAULT_QUALITY.to_string())
    }

    /// The default quality only when the user picked one.
    pub fn stored_default_quality(&self) -> Option<String> {
        self.store.get(keys::DEFAULT_QUALITY).filter(|q| !q.is_empty())
    }

    pub fn set_default_quality(&self, code: &str) -> Result<()> {
        self.store.set(keys::DEFAULT_QUALITY, code)
    }

    pub fn default_speed(&self) -> f64 {
        let Some(raw) = self.store.get(keys::DEFAULT_SPEED) else {
            return DEFAULT_SPEED;
        };
        match raw.trim().parse::<f64>() {
            Ok(speed) if speed.is_finite() && speed > 0.0 => speed,
            _ => {
                debug!(value = raw.as_str(), "ignoring malformed speed preference");
                DEFAULT_SPEED
            }
        }
    }

    pub fn set_default_speed(&self, speed: f64) -> Result<()> {
        self.store.set(keys::DEFAULT_SPEED, &speed.to_string())
    }

    pub fn auto_web_fullscreen(&self) -> bool {
        self.flag(keys::AUTO_WEB_FULLSCREEN)
    }

    pub fn shorts_one_x(&self) -> bool {
        self.flag(keys::SHORTS_ONE_X)
    }

    /// Reads the three on-fullscreen flags in precedence order, so even an
    /// inconsistent store yields a single policy.
    pub fn fullscreen_policy(&self) -> FullscreenPolicy {
        if self.flag(keys::FULLSCREEN_VIDEO_MAX) {
            FullscreenPolicy::VideoMax
        } else if self.flag(keys::FULLSCREEN_SCREEN_FIT) {
            FullscreenPolicy::ScreenFit
        } else if self.flag(keys::FULLSCREEN_FIXED) {
            FullscreenPolicy::Fixed
        } else {
            FullscreenPolicy::Off
        }
    }

    /// Writes all three flags so at most one is on.
    pub fn set_fullscreen_policy(&self, policy: FullscreenPolicy) -> Result<()> {
        self.set_flag(keys::FULLSCREEN_FIXED, policy == FullscreenPolicy::Fixed)?;
        self.set_flag(
            keys::FULLSCREEN_SCREEN_FIT,
            policy == FullscreenPolicy::ScreenFit,
        )?;
        self.set_flag(
            keys::FULLSCREEN_VIDEO_MAX,
            policy == FullscreenPolicy::VideoMax,
        )
    }

    pub fn quality_policy(&self) -> QualityPolicy {
        QualityPolicy::resolve(
            self.fullscreen_policy(),
            self.stored_default_quality().is_some(),
        )
    }

    pub fn fullscreen_quality(&self) -> String {
        self.store
            .get(keys::FULLSCREEN_QUALITY)
            .filter(|q| !q.is_empty())
            .unwrap_or_else(|| quality::DEFAULT_QUALITY.to_string())
    }

    pub fn set_fullscreen_quality(&self, code: &str) -> Result<()> {
        self.store.set(keys::FULLSCREEN_QUALITY, code)
    }

    pub fn filter_enabled(&self) -> bool {
        self.flag(keys::FILTER_ENABLED)
    }

    pub fn filter_home(&self) -> bool {
        self.flag(keys::FILTER_HOME)
    }

    pub fn filter_related(&self) -> bool {
        self.flag(keys::FILTER_RELATED)
    }

    pub fn filter_members_only(&self) -> bool {
        self.flag(keys::FILTER_MEMBERS_ONLY)
    }

    pub fn filter_keywords(&self) -> bool {
        self.flag(keys::FILTER_KEYWORDS)
    }

    pub fn filter_progress(&self) -> bool {
        self.flag(keys::FILTER_PROGRESS)
    }

    pub fn filter_publish(&self) -> bool {
        self.flag(keys::FILTER_PUBLISH)
    }

    pub fn keywords(&self) -> Vec<String> {
        let Some(raw) = self.store.get(keys::FILTER_WORDS) else {
            return Vec::new();
        };
        serde_json::from_str::<Vec<String>>(&raw).unwrap_or_else(|err| {
            debug!(error = %err, "keyword list is not a JSON string array");
            Vec::new()
        })
    }

    fn write_keywords(&self, words: &[String]) -> Result<()> {
        let encoded = serde_json::to_string(words)?;
        self.store.set(keys::FILTER_WORDS, &encoded)
    }

    /// Returns false when the keyword is blank or already present.
    pub fn add_keyword(&self, word: &str) -> Result<bool> {
        let word = word.trim();
        let mut words = self.keywords();
        if word.is_empty() || words.iter().any(|w| w == word) {
            return Ok(false);
        }
        words.push(word.to_string());
        self.write_keywords(&words)?;
        Ok(true)
    }

    pub fn remove_keyword(&self, word: &str) -> Result<bool> {
        let mut words = self.keywords();
        let before = words.len();
        words.retain(|w| w != word);
        if words.len() == before {
            return Ok(false);
        }
        self.write_keywords(&words)?;
        Ok(true)
    }

    pub fn progress_threshold(&self) -> u32 {
        match self.int(keys::FILTER_PROGRESS_THRESHOLD) {
            Some(value) if value != 0 => value.clamp(1, 100) as u32,
            _ => self.filter.default_progress_threshold,
        }
    }

    pub fn set_progress_threshold(&self, value: i64) -> Result<()> {
        let clamped = value.clamp(1, 100);
        self.store
            .set(keys::FILTER_PROGRESS_THRESHOLD, &clamped.to_string())
    }

    pub fn publish_threshold(&self) -> u32 {
        match self.int(keys::FILTER_PUBLISH_THRESHOLD) {
            Some(value) if value != 0 => value.clamp(1, i64::from(u32::MAX)) as u32,
            _ => self.filter.default_publish_threshold,
        }
    }

    pub fn set_publish_threshold(&self, value: i64) -> Result<()> {
        let clamped = value.max(1);
        self.store
            .set(keys::FILTER_PUBLISH_THRESHOLD, &clamped.to_string())
    }

    pub fn hotkey_enabled(&self, action: HotkeyAction) -> bool {
        self.flag(&toggle_key(action))
    }

    pub fn set_hotkey_enabled(&self, action: HotkeyAction, on: bool) -> Result<()> {
        self.set_flag(&toggle_key(action), on)
    }

    /// The bound key, or the action's default when unset or invalid.
    pub fn hotkey_key(&self, action: HotkeyAction) -> char {
        self.store
            .get(&binding_key(action))
            .and_then(|raw| hotkeys::normalize_binding(&raw))
            .unwrap_or_else(|| action.default_key())
    }

    /// Stores a valid single-letter binding, otherwise clears the stored
    /// key so the default applies. Returns the stored letter.
    pub fn bind_hotkey(&self, action: HotkeyAction, input: &str) -> Result<Option<char>> {
        let key = binding_key(action);
        match hotkeys::normalize_binding(input) {
            Some(letter) => {
                self.store.set(&key, &letter.to_string())?;
                Ok(Some(letter))
            }
            None => {
                self.store.remove(&key)?;
                Ok(None)
            }
        }
    }

    pub fn columns(&self) -> u32 {
        let (min, max) = self.columns_range();
        let value = match self.int(keys::COLUMNS) {
            Some(value) if value != 0 => value,
            _ => i64::from(self.layout.default_columns),
        };
        value.clamp(i64::from(min), i64::from(max)) as u32
    }

    /// Stores the clamped count and returns it.
    pub fn set_columns(&self, columns: i64) -> Result<u32> {
        let (min, max) = self.columns_range();
        let clamped = columns.clamp(i64::from(min), i64::from(max)) as u32;
        self.store.set(keys::COLUMNS, &clamped.to_string())?;
        Ok(clamped)
    }

    pub fn columns_range(&self) -> (u32, u32) {
        (self.layout.min_columns, self.layout.max_columns)
    }

    pub fn columns_enabled(&self) -> bool {
        self.flag(keys::COLUMNS_ENABLED)
    }

    /// Visible unless explicitly switched off.
    pub fn slider_visible(&self) -> bool {
        self.store.get(keys::SLIDER_VISIBLE).as_deref() != Some("false")
    }

    /// Validated write of a raw key/value pair, as typed on the command line.
    pub fn apply_raw(&self, key: &str, value: &str) -> Result<(), PrefError> {
        let invalid = |reason| PrefError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason,
        };
        match key {
            keys::DEFAULT_QUALITY | keys::FULLSCREEN_QUALITY => {
                if quality::lookup(value).is_none() {
                    return Err(invalid("not a known quality level"));
                }
                self.store.set(key, value)?;
            }
            keys::DEFAULT_SPEED => {
                let speed = value
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|s| SPEED_OPTIONS.contains(s))
                    .ok_or_else(|| invalid("not one of the offered speeds"))?;
                self.set_default_speed(speed)?;
            }
            keys::FULLSCREEN_SCREEN_FIT | keys::FULLSCREEN_VIDEO_MAX | keys::FULLSCREEN_FIXED => {
                let on = parse_bool(value).ok_or_else(|| invalid("expected true or false"))?;
                let policy = match key {
                    keys::FULLSCREEN_SCREEN_FIT => FullscreenPolicy::ScreenFit,
                    keys::FULLSCREEN_VIDEO_MAX => FullscreenPolicy::VideoMax,
                    _ => FullscreenPolicy::Fixed,
                };
                if on {
                    self.set_fullscreen_policy(policy)?;
                } else if self.fullscreen_policy() == policy {
                    self.set_fullscreen_policy(FullscreenPolicy::Off)?;
                } else {
                    self.set_flag(key, false)?;
                }
            }
            keys::FILTER_WORDS => {
                let words: Vec<String> = serde_json::from_str(value)
                    .map_err(|_| invalid("expected a JSON array of strings"))?;
                let mut cleaned: Vec<String> = Vec::new();
                for word in words {
                    let word = word.trim().to_string();
                    if !word.is_empty() && !cleaned.contains(&word) {
                        cleaned.push(word);
                    }
                }
                self.write_keywords(&cleaned)?;
            }
            keys::FILTER_PROGRESS_THRESHOLD => {
                let parsed = leading_int(value).ok_or_else(|| invalid("expected an integer"))?;
                self.set_progress_threshold(parsed)?;
            }
            keys::FILTER_PUBLISH_THRESHOLD => {
                let parsed = leading_int(value).ok_or_else(|| invalid("expected an integer"))?;
                self.set_publish_threshold(parsed)?;
            }
            keys::COLUMNS => {
                let parsed = leading_int(value).ok_or_else(|| invalid("expected an integer"))?;
                self.set_columns(parsed)?;
            }
            _ if keys::FLAGS.contains(&key) => {
                let on = parse_bool(value).ok_or_else(|| invalid("expected true or false"))?;
                self.set_flag(key, on)?;
            }
            _ => {
                if let Some(action) = key
                    .strip_prefix(keys::HOTKEY_TOGGLE_PREFIX)
                    .and_then(HotkeyAction::from_id)
                {
                    let on = parse_bool(value).ok_or_else(|| invalid("expected true or false"))?;
                    self.set_hotkey_enabled(action, on)?;
                } else if let Some(action) = key
                    .strip_prefix(keys::HOTKEY_KEY_PREFIX)
                    .and_then(HotkeyAction::from_id)
                {
                    self.bind_hotkey(action, value)?;
                } else {
                    return Err(PrefError::UnknownKey(key.to_string()));
                }
            }
        }
        Ok(())
    }

    /// Removes a stored value so its default applies again.
    pub fn reset(&self, key: &str) -> Result<(), PrefError> {
        if !is_known_key(key) {
            return Err(PrefError::UnknownKey(key.to_string()));
        }
        self.store.remove(key)?;
        Ok(())
    }

    /// Every preference with the value the engine would use.
    pub fn effective(&self) -> Vec<(String, String)> {
        let on = |b: bool| b.to_string();
        let mut out = vec![
            (keys::DEFAULT_QUALITY.to_string(), self.default_quality()),
            (keys::DEFAULT_SPEED.to_string(), self.default_speed().to_string()),
            (keys::AUTO_WEB_FULLSCREEN.to_string(), on(self.auto_web_fullscreen())),
            (
                keys::FULLSCREEN_FIXED.to_string(),
                on(self.fullscreen_policy() == FullscreenPolicy::Fixed),
            ),
            (keys::FULLSCREEN_QUALITY.to_string(), self.fullscreen_quality()),
            (
                keys::FULLSCREEN_SCREEN_FIT.to_string(),
                on(self.fullscreen_policy() == FullscreenPolicy::ScreenFit),
            ),
            (
                keys::FULLSCREEN_VIDEO_MAX.to_string(),
                on(self.fullscreen_policy() == FullscreenPolicy::VideoMax),
            ),
            (keys::SHORTS_ONE_X.to_string(), on(self.shorts_one_x())),
            (keys::FILTER_ENABLED.to_string(), on(self.filter_enabled())),
            (keys::FILTER_HOME.to_string(), on(self.filter_home())),
            (keys::FILTER_RELATED.to_string(), on(self.filter_related())),
            (keys::FILTER_MEMBERS_ONLY.to_string(), on(self.filter_members_only())),
            (keys::FILTER_KEYWORDS.to_string(), on(self.filter_keywords())),
            (
                keys::FILTER_WORDS.to_string(),
                serde_json::to_string(&self.keywords()).unwrap_or_else(|_| "[]".into()),
            ),
            (keys::FILTER_PROGRESS.to_string(), on(self.filter_progress())),
            (
                keys::FILTER_PROGRESS_THRESHOLD.to_string(),
                self.progress_threshold().to_string(),
            ),
            (keys::FILTER_PUBLISH.to_string(), on(self.filter_publish())),
            (
                keys::FILTER_PUBLISH_THRESHOLD.to_string(),
                self.publish_threshold().to_string(),
            ),
        ];
        for action in HotkeyAction::ALL {
            out.push((toggle_key(action), on(self.hotkey_enabled(action))));
            out.push((binding_key(action), self.hotkey_key(action).to_string()));
        }
        out.push((keys::COLUMNS.to_string(), self.columns().to_string()));
        out.push((keys::COLUMNS_ENABLED.to_string(), on(self.columns_enabled())));
        out.push((keys::SLIDER_VISIBLE.to_string(), on(self.slider_visible())));
        out
    }
}

fn toggle_key(action: HotkeyAction) -> String {
    format!("{}{}", keys::HOTKEY_TOGGLE_PREFIX, action.id())
}

fn binding_key(action: HotkeyAction) -> String {
    format!("{}{}", keys::HOTKEY_KEY_PREFIX, action.id())
}

pub fn is_known_key(key: &str) -> bool {
    const VALUED: [&str; 10] = [
        keys::DEFAULT_QUALITY,
        keys::FULLSCREEN_FIXED,
        keys::DEFAULT_SPEED,
        keys::FULLSCREEN_QUALITY,
        keys::FULLSCREEN_SCREEN_FIT,
        keys::FULLSCREEN_VIDEO_MAX,
        keys::FILTER_WORDS,
        keys::FILTER_PROGRESS_THRESHOLD,
        keys::FILTER_PUBLISH_THRESHOLD,
        keys::COLUMNS,
    ];
    if VALUED.contains(&key) || keys::FLAGS.contains(&key) {
        return true;
    }
    [keys::HOTKEY_TOGGLE_PREFIX, keys::HOTKEY_KEY_PREFIX]
        .iter()
        .filter_map(|prefix| key.strip_prefix(prefix))
        .any(|id| HotkeyAction::from_id(id).is_some())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Integer prefix of `raw`, so `"12px"` reads as 12.
fn leading_int(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    let end = trimmed
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());
    trimmed[..end].parse().ok()
}
