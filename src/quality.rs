//! Playback quality levels and the policies that pick one.

use std::fmt;

use tracing::{debug, info};

use crate::host::Host;
use crate::prefs::Preferences;
use crate::probe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityLevel {
    pub code: &'static str,
    pub label: &'static str,
    pub height: u32,
}

/// Known levels, best first. Position in this table is the ranking.
pub const LEVELS: [QualityLevel; 9] = [
    QualityLevel {
        code: "highres",
        label: "8K",
        height: 4320,
    },
    QualityLevel {
        code: "hd2160",
        label: "4K",
        height: 2160,
    },
    QualityLevel {
        code: "hd1440",
        label: "1440p",
        height: 1440,
    },
    QualityLevel {
        code: "hd1080",
        label: "1080p",
        height: 1080,
    },
    QualityLevel {
        code: "hd720",
        label: "720p",
        height: 720,
    },
    QualityLevel {
        code: "large",
        label: "480p",
        height: 480,
    },
    QualityLevel {
        code: "medium",
        label: "360p",
        height: 360,
    },
    QualityLevel {
        code: "small",
        label: "240p",
        height: 240,
    },
    QualityLevel {
        code: "tiny",
        label: "144p",
        height: 144,
    },
];

pub const DEFAULT_QUALITY: &str = "hd1080";

pub fn lookup(code: &str) -> Option<&'static QualityLevel> {
    LEVELS.iter().find(|level| level.code == code)
}

/// 0 is best; unknown codes rank after every known level.
pub fn rank(code: &str) -> usize {
    LEVELS
        .iter()
        .position(|level| level.code == code)
        .unwrap_or(LEVELS.len())
}

/// Vertical resolution implied by a level code: the digits it carries, or 0
/// for codes without any (`large`, `highres`).
pub fn level_height(code: &str) -> u32 {
    let digits: String = code.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

/// First level, in host order, that does not exceed `target` by more than
/// 100 pixels.
pub fn select_screen_fit(levels: &[String], target: f64) -> Option<&str> {
    levels
        .iter()
        .find(|code| f64::from(level_height(code)) <= target + 100.0)
        .map(String::as_str)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FullscreenPolicy {
    #[default]
    Off,
    Fixed,
    ScreenFit,
    VideoMax,
}

impl fmt::Display for FullscreenPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FullscreenPolicy::Off => "off",
            FullscreenPolicy::Fixed => "fixed",
            FullscreenPolicy::ScreenFit => "screen-fit",
            FullscreenPolicy::VideoMax => "video-max",
        };
        f.write_str(name)
    }
}

/// The single quality policy in force, summarizing the stored flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityPolicy {
    None,
    FixedDefault,
    FixedOnFullscreen,
    ScreenFitOnFullscreen,
    VideoMaxOnFullscreen,
}

impl QualityPolicy {
    pub fn resolve(fullscreen: FullscreenPolicy, has_default: bool) -> Self {
        match fullscreen {
            FullscreenPolicy::VideoMax => QualityPolicy::VideoMaxOnFullscreen,
            FullscreenPolicy::ScreenFit => QualityPolicy::ScreenFitOnFullscreen,
            FullscreenPolicy::Fixed => QualityPolicy::FixedOnFullscreen,
            FullscreenPolicy::Off if has_default => QualityPolicy::FixedDefault,
            FullscreenPolicy::Off => QualityPolicy::None,
        }
    }
}

impl fmt::Display for QualityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QualityPolicy::None => "none",
            QualityPolicy::FixedDefault => "fixed-default",
            QualityPolicy::FixedOnFullscreen => "fixed-on-fullscreen",
            QualityPolicy::ScreenFitOnFullscreen => "screen-fit-on-fullscreen",
            QualityPolicy::VideoMaxOnFullscreen => "video-max-on-fullscreen",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullscreenTrigger {
    Enter,
    Exit,
}

pub fn apply_quality<H: Host + ?Sized>(host: &mut H, code: &str) -> bool {
    let applied = host.set_playback_quality(code);
    if applied {
        info!(quality = code, "playback quality set");
    } else {
        debug!(quality = code, "player quality setter unavailable");
    }
    applied
}

pub fn apply_default_quality<H: Host + ?Sized>(host: &mut H, prefs: &Preferences) -> bool {
    apply_quality(host, &prefs.default_quality())
}

/// Fullscreen-driven quality switching. Holds the quality seen on entry so
/// it can be restored on exit.
#[derive(Debug, Default)]
pub struct QualityEngine {
    pre_entry: Option<String>,
    armed: bool,
}

impl QualityEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts reacting to fullscreen changes. Arming twice is a no-op.
    pub fn arm(&mut self) {
        self.armed = true;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn pre_entry(&self) -> Option<&str> {
        self.pre_entry.as_deref()
    }

    /// Returns the quality code applied, if any.
    pub fn apply_quality_policy<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        prefs: &Preferences,
        trigger: FullscreenTrigger,
    ) -> Option<String> {
        let policy = prefs.fullscreen_policy();
        if policy == FullscreenPolicy::Off {
            return None;
        }
        match trigger {
            FullscreenTrigger::Enter => {
                self.pre_entry = host.playback_quality();
                let target = match policy {
                    FullscreenPolicy::VideoMax => host
                        .available_quality_levels()
                        .and_then(|levels| levels.into_iter().next()),
                    FullscreenPolicy::ScreenFit => screen_fit_target(host),
                    FullscreenPolicy::Fixed => Some(prefs.fullscreen_quality()),
                    FullscreenPolicy::Off => None,
                };
                let Some(target) = target else {
                    debug!(%policy, "no fullscreen quality matched");
                    return None;
                };
                apply_quality(host, &target).then_some(target)
            }
            FullscreenTrigger::Exit => {
                let target = prefs
                    .stored_default_quality()
                    .or_else(|| self.pre_entry.clone())?;
                if host.playback_quality().as_deref() == Some(target.as_str()) {
                    return None;
                }
                apply_quality(host, &target).then_some(target)
            }
        }
    }
}

fn screen_fit_target<H: Host + ?Sized>(host: &H) -> Option<String> {
    let player = probe::player(host)?;
    let rect = host.bounding_rect(player)?;
    let ratio = host.device_pixel_ratio();
    let target = (rect.width * ratio).max(rect.height * ratio);
    let levels = host.available_quality_levels()?;
    select_screen_fit(&levels, target).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::fixtures::*;
    use crate::host::Rect;
    use crate::storage::MemoryStore;
    use std::sync::Arc;
    use url::Url;

    fn levels() -> Vec<String> {
        STANDARD_LEVELS.iter().map(|l| l.to_string()).collect()
    }

    fn prefs_with(entries: &[(&str, &str)]) -> Preferences {
        let store = MemoryStore::with_entries(entries.iter().copied());
        Preferences::new(Arc::new(store), &crate::config::Config::default())
    }

    fn watch() -> WatchPage {
        watch_page(Url::parse(WATCH_URL).unwrap(), false)
    }

    #[test]
    fn heights_come_from_digits_only() {
        assert_eq!(level_height("hd720"), 720);
        assert_eq!(level_height("hd2160"), 2160);
        assert_eq!(level_height("large"), 0);
        assert_eq!(level_height("highres"), 0);
        assert_eq!(level_height("auto"), 0);
    }

    #[test]
    fn screen_fit_accepts_digitless_levels() {
        let small_screen: Vec<String> = ["hd1080", "hd720", "large", "medium", "small", "tiny"]
            .iter()
            .map(|l| l.to_string())
            .collect();
        assert_eq!(select_screen_fit(&small_screen, 300.0), Some("large"));

        let with_highres: Vec<String> = ["highres", "hd2160", "hd1080"]
            .iter()
            .map(|l| l.to_string())
            .collect();
        assert_eq!(select_screen_fit(&with_highres, 1000.0), Some("highres"));
    }

    #[test]
    fn ranking_follows_table_not_strings() {
        assert!(rank("hd2160") < rank("hd720"));
        assert!(rank("large") < rank("medium"));
        assert!(rank("tiny") < rank("unknown"));
    }

    #[test]
    fn screen_fit_picks_first_level_within_margin() {
        assert_eq!(select_screen_fit(&levels(), 700.0), Some("hd720"));
        assert_eq!(select_screen_fit(&levels(), 2100.0), Some("hd2160"));
        assert_eq!(select_screen_fit(&["hd1080".to_string()], 300.0), None);
    }

    #[test]
    fn disabled_policies_do_nothing() {
        let mut page = watch();
        let mut engine = QualityEngine::new();
        let prefs = prefs_with(&[]);
        assert_eq!(
            engine.apply_quality_policy(&mut page.doc, &prefs, FullscreenTrigger::Enter),
            None
        );
        assert_eq!(engine.pre_entry(), None);
    }

    #[test]
    fn video_max_wins_over_other_flags() {
        let mut page = watch();
        let mut engine = QualityEngine::new();
        let prefs = prefs_with(&[
            ("yt-auto-fullscreen-quality", "true"),
            ("yt-fullscreen-video-max-quality", "true"),
        ]);
        let applied = engine.apply_quality_policy(&mut page.doc, &prefs, FullscreenTrigger::Enter);
        assert_eq!(applied.as_deref(), Some("hd2160"));
        assert_eq!(engine.pre_entry(), Some("hd1080"));
    }

    #[test]
    fn screen_fit_uses_player_box_and_pixel_ratio() {
        let mut page = watch();
        page.doc.set_rect(
            page.player,
            Rect {
                width: 640.0,
                height: 360.0,
            },
        );
        page.doc.set_device_pixel_ratio(2.0);
        let mut engine = QualityEngine::new();
        let prefs = prefs_with(&[("yt-fullscreen-max-quality", "true")]);
        let applied = engine.apply_quality_policy(&mut page.doc, &prefs, FullscreenTrigger::Enter);
        assert_eq!(applied.as_deref(), Some("hd1080"));
    }

    #[test]
    fn exit_prefers_stored_default() {
        let mut page = watch();
        let mut engine = QualityEngine::new();
        let prefs = prefs_with(&[
            ("yt-auto-fullscreen-quality", "true"),
            ("yt-fullscreen-quality-value", "hd1440"),
            ("yt-default-quality", "hd720"),
        ]);
        engine.apply_quality_policy(&mut page.doc, &prefs, FullscreenTrigger::Enter);
        assert_eq!(page.doc.playback_quality().as_deref(), Some("hd1440"));
        let restored = engine.apply_quality_policy(&mut page.doc, &prefs, FullscreenTrigger::Exit);
        assert_eq!(restored.as_deref(), Some("hd720"));
    }

    #[test]
    fn exit_restores_pre_entry_without_default() {
        let mut page = watch();
        let mut engine = QualityEngine::new();
        let prefs = prefs_with(&[
            ("yt-auto-fullscreen-quality", "true"),
            ("yt-fullscreen-quality-value", "hd1440"),
        ]);
        engine.apply_quality_policy(&mut page.doc, &prefs, FullscreenTrigger::Enter);
        let restored = engine.apply_quality_policy(&mut page.doc, &prefs, FullscreenTrigger::Exit);
        assert_eq!(restored.as_deref(), Some("hd1080"));
        assert_eq!(
            page.doc.player_model().unwrap().applied,
            vec!["hd1440".to_string(), "hd1080".to_string()]
        );
    }

    #[test]
    fn exit_skips_when_already_at_target() {
        let mut page = watch();
        let mut engine = QualityEngine::new();
        let prefs = prefs_with(&[("yt-fullscreen-video-max-quality", "true")]);
        page.doc.player_model_mut().unwrap().levels = Some(Vec::new());
        engine.apply_quality_policy(&mut page.doc, &prefs, FullscreenTrigger::Enter);
        assert_eq!(
            engine.apply_quality_policy(&mut page.doc, &prefs, FullscreenTrigger::Exit),
            None
        );
        assert!(page.doc.player_model().unwrap().applied.is_empty());
    }

    #[test]
    fn missing_level_list_skips_video_max_and_screen_fit() {
        for flag in ["yt-fullscreen-video-max-quality", "yt-fullscreen-max-quality"] {
            let mut page = watch();
            let model = page.doc.player_model_mut().unwrap();
            model.levels = None;
            model.quality = None;
            let mut engine = QualityEngine::new();
            let prefs = prefs_with(&[(flag, "true")]);
            assert_eq!(
                engine.apply_quality_policy(&mut page.doc, &prefs, FullscreenTrigger::Enter),
                None,
                "{flag}"
            );
            assert_eq!(engine.pre_entry(), None);
            assert!(page.doc.player_model().unwrap().applied.is_empty());
        }
    }

    #[test]
    fn missing_player_element_is_a_no_op() {
        let mut page = watch();
        let player_element = page.doc.query(None, "ytd-player").unwrap();
        page.doc.remove(player_element);
        let mut engine = QualityEngine::new();
        let prefs = prefs_with(&[
            ("yt-auto-fullscreen-quality", "true"),
            ("yt-default-quality", "hd720"),
        ]);
        for trigger in [FullscreenTrigger::Enter, FullscreenTrigger::Exit] {
            assert_eq!(
                engine.apply_quality_policy(&mut page.doc, &prefs, trigger),
                None
            );
        }
        assert_eq!(engine.pre_entry(), None);
        assert!(page.doc.player_model().unwrap().applied.is_empty());
    }

    #[test]
    fn policy_summary() {
        assert_eq!(
            QualityPolicy::resolve(FullscreenPolicy::Off, false),
            QualityPolicy::None
        );
        assert_eq!(
            QualityPolicy::resolve(FullscreenPolicy::Off, true),
            QualityPolicy::FixedDefault
        );
        assert_eq!(
            QualityPolicy::resolve(FullscreenPolicy::ScreenFit, true),
            QualityPolicy::ScreenFitOnFullscreen
        );
    }
}
