//! The host page port.
//!
//! Everything the engine knows about the page comes through [`Host`]: DOM
//! queries and writes, the host player object, and browser signals. A browser
//! embedding implements it over the live document; [`crate::dom::Document`]
//! implements it in memory.

use url::Url;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Rect {
    pub width: f64,
    pub height: f64,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct KeyChord {
    pub key: String,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
}

impl KeyChord {
    pub fn plain(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn ctrl_shift(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ctrl: true,
            shift: true,
            ..Self::default()
        }
    }

    pub fn is_escape(&self) -> bool {
        self.key == "Escape"
    }

    /// Lowercased key when the key names a single character.
    pub fn letter(&self) -> Option<char> {
        let mut chars = self.key.chars();
        let first = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        first.to_lowercase().next()
    }
}

pub trait Host {
    /// Elements matching `selector` in document order, limited to descendants
    /// of `scope` when given. Unparseable selectors match nothing.
    fn query_all(&self, scope: Option<NodeId>, selector: &str) -> Vec<NodeId>;

    fn query(&self, scope: Option<NodeId>, selector: &str) -> Option<NodeId> {
        self.query_all(scope, selector).into_iter().next()
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;
    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str);
    fn remove_attribute(&mut self, node: NodeId, name: &str);

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attribute(node, "class")
            .map(|list| list.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    /// Flips `class` on `node` and reports whether it is present afterwards.
    fn toggle_class(&mut self, node: NodeId, class: &str) -> bool {
        let current = self.attribute(node, "class").unwrap_or_default();
        let mut classes: Vec<&str> = current.split_whitespace().collect();
        let present = if let Some(pos) = classes.iter().position(|c| *c == class) {
            classes.remove(pos);
            false
        } else {
            classes.push(class);
            true
        };
        let joined = classes.join(" ");
        self.set_attribute(node, "class", &joined);
        present
    }

    fn text_content(&self, node: NodeId) -> String;
    fn set_text_content(&mut self, node: NodeId, text: &str);
    fn children(&self, node: NodeId) -> Vec<NodeId>;
    fn is_connected(&self, node: NodeId) -> bool;

    fn create_element(&mut self, parent: NodeId, tag: &str) -> NodeId;
    fn remove(&mut self, node: NodeId);
    fn click(&mut self, node: NodeId);

    fn bounding_rect(&self, node: NodeId) -> Option<Rect>;
    fn device_pixel_ratio(&self) -> f64;
    fn fullscreen_element(&self) -> Option<NodeId>;

    fn location(&self) -> Url;
    fn navigate(&mut self, url: &Url);

    /// Fires a window `resize` event so the host player recomputes its canvas.
    fn dispatch_resize(&mut self);
    fn dispatch_key_chord(&mut self, chord: &KeyChord);

    // Host player object. `None`/`false` means the method is absent on this
    // host version.
    fn playback_quality(&self) -> Option<String>;
    fn available_quality_levels(&self) -> Option<Vec<String>>;
    fn set_playback_quality(&mut self, code: &str) -> bool;

    fn playback_rate(&self) -> Option<f64>;
    fn set_playback_rate(&mut self, rate: f64) -> bool;
}

/// Presentation layer the engine calls into. Rendering is the implementor's
/// business; the engine only asks for these effects.
pub trait SettingsUi {
    fn is_open(&self) -> bool;
    fn open(&mut self);
    fn close(&mut self);
    fn ensure_control_bar(&mut self);
    fn show_column_slider(&mut self, columns: u32);
    fn hide_column_slider(&mut self);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoSettingsUi;

impl SettingsUi for NoSettingsUi {
    fn is_open(&self) -> bool {
        false
    }

    fn open(&mut self) {}

    fn close(&mut self) {}

    fn ensure_control_bar(&mut self) {}

    fn show_column_slider(&mut self, _columns: u32) {}

    fn hide_column_slider(&mut self) {}
}

/// Keeps the requested UI state in plain fields so callers can inspect it.
#[derive(Debug, Default, Clone)]
pub struct RecordingUi {
    pub open: bool,
    pub control_bar_ensured: usize,
    pub slider: Option<u32>,
}

impl SettingsUi for RecordingUi {
    fn is_open(&self) -> bool {
        self.open
    }

    fn open(&mut self) {
        self.open = true;
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn ensure_control_bar(&mut self) {
        self.control_bar_ensured += 1;
    }

    fn show_column_slider(&mut self, columns: u32) {
        self.slider = Some(columns);
    }

    fn hide_column_slider(&mut self) {
        self.slider = None;
    }
}
