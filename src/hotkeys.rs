use std::fmt;

use crate::host::KeyChord;
use crate::prefs::Preferences;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HotkeyAction {
    WebFullscreen,
    OpenSettings,
    IncreaseSpeed,
    ToggleSubtitle,
    ShowStats,
    GoHome,
    RotateVideo,
}

impl HotkeyAction {
    pub const ALL: [HotkeyAction; 7] = [
        HotkeyAction::WebFullscreen,
        HotkeyAction::OpenSettings,
        HotkeyAction::IncreaseSpeed,
        HotkeyAction::ToggleSubtitle,
        HotkeyAction::ShowStats,
        HotkeyAction::GoHome,
        HotkeyAction::RotateVideo,
    ];

    /// Identifier used in the `yt-hotkey-*` preference keys.
    pub fn id(self) -> &'static str {
        match self {
            HotkeyAction::WebFullscreen => "webfullscreen",
            HotkeyAction::OpenSettings => "open-settings",
            HotkeyAction::IncreaseSpeed => "increase-speed",
            HotkeyAction::ToggleSubtitle => "toggle-subtitle",
            HotkeyAction::ShowStats => "show-stats",
            HotkeyAction::GoHome => "go-home",
            HotkeyAction::RotateVideo => "rotate-video",
        }
    }

    pub fn default_key(self) -> char {
        match self {
            HotkeyAction::WebFullscreen => 'w',
            HotkeyAction::OpenSettings => 's',
            HotkeyAction::IncreaseSpeed => 'x',
            HotkeyAction::ToggleSubtitle => 'c',
            HotkeyAction::ShowStats => 'd',
            HotkeyAction::GoHome => 'h',
            HotkeyAction::RotateVideo => 'r',
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.id() == id)
    }

    /// Open-settings is the only action that needs Ctrl+Shift held.
    pub fn needs_ctrl_shift(self) -> bool {
        self == HotkeyAction::OpenSettings
    }
}

impl fmt::Display for HotkeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Lowercases and trims user input; only a single `a`-`z` letter is a valid
/// binding.
pub fn normalize_binding(input: &str) -> Option<char> {
    let lowered = input.trim().to_lowercase();
    let mut chars = lowered.chars();
    let first = chars.next()?;
    if chars.next().is_some() || !first.is_ascii_lowercase() {
        return None;
    }
    Some(first)
}

/// Enabled actions whose binding matches `chord`.
pub fn matching_actions(chord: &KeyChord, prefs: &Preferences) -> Vec<HotkeyAction> {
    let Some(letter) = chord.letter() else {
        return Vec::new();
    };
    HotkeyAction::ALL
        .into_iter()
        .filter(|action| prefs.hotkey_enabled(*action) && prefs.hotkey_key(*action) == letter)
        .filter(|action| {
            if action.needs_ctrl_shift() {
                chord.ctrl && chord.shift
            } else {
                !chord.ctrl && !chord.alt && !chord.meta
            }
        })
        .collect()
}

pub fn next_speed(current: f64) -> f64 {
    if current >= 4.0 {
        1.0
    } else {
        current * 2.0
    }
}

pub fn next_rotation(current: u32) -> u32 {
    (current + 90) % 360
}

/// Chord the host player binds to its stats overlay.
pub fn stats_chord() -> KeyChord {
    KeyChord {
        key: "D".into(),
        ctrl: true,
        shift: true,
        alt: true,
        meta: false,
    }
}
