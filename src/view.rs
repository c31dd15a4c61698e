//! Theater, native fullscreen and the synthetic web fullscreen.
//!
//! Web fullscreen is layered on top of theater mode: entering forces theater
//! on, leaving puts theater back the way it was before entry. The only state
//! kept outside the DOM is the per-player snapshot needed for that restore.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::config::ThemeConfig;
use crate::host::{Host, NodeId};
use crate::probe;
use crate::style;

pub const BACKDROP_ID: &str = "webfullscreen-bg";

const FIXED_VIEWPORT: [(&str, &str); 5] = [
    ("position", "fixed !important"),
    ("top", "0 !important"),
    ("left", "0 !important"),
    ("width", "100vw !important"),
    ("height", "100vh !important"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayMode {
    pub theater: bool,
    pub web_fullscreen: bool,
    pub native_fullscreen: bool,
}

pub fn display_mode<H: Host + ?Sized>(host: &H) -> DisplayMode {
    DisplayMode {
        theater: probe::is_theater_mode(host),
        web_fullscreen: probe::is_web_fullscreen(host),
        native_fullscreen: probe::is_native_fullscreen(host),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSnapshot {
    pub was_theater: bool,
    pub player_style: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Skipped,
    Entered,
    Exited,
}

impl ToggleOutcome {
    /// Whether the player geometry changed and the host needs a resize.
    pub fn changed(self) -> bool {
        self != ToggleOutcome::Skipped
    }
}

/// Clicks the host's size button when theater differs from `on`.
pub fn set_theater_mode<H: Host + ?Sized>(host: &mut H, on: bool) {
    let (Some(_), Some(button)) = (
        host.query(None, probe::WATCH_FLEXY),
        host.query(None, probe::SIZE_BUTTON),
    ) else {
        debug!("theater controls not rendered");
        return;
    };
    if probe::is_theater_mode(host) == on {
        return;
    }
    host.click(button);
}

#[derive(Debug, Default)]
pub struct ViewModeController {
    snapshots: HashMap<NodeId, ViewSnapshot>,
}

impl ViewModeController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, player: NodeId) -> Option<&ViewSnapshot> {
        self.snapshots.get(&player)
    }

    pub fn toggle_web_fullscreen<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        theme: &ThemeConfig,
    ) -> ToggleOutcome {
        let (Some(player), Some(container)) = (
            probe::player(host),
            host.query(None, probe::PLAYER_CONTAINER),
        ) else {
            debug!("player not rendered; web fullscreen skipped");
            return ToggleOutcome::Skipped;
        };
        let full_bleed = host.query(None, probe::FULL_BLEED_CONTAINER);

        self.snapshots.retain(|node, _| host.is_connected(*node));
        if !self.snapshots.contains_key(&player) {
            let snapshot = ViewSnapshot {
                was_theater: probe::is_theater_mode(host),
                player_style: host.attribute(player, "style"),
            };
            self.snapshots.insert(player, snapshot);
        }

        if host.toggle_class(player, probe::WEB_FULLSCREEN_CLASS) {
            self.enter(host, player, container, full_bleed, theme);
            info!("entered web fullscreen");
            ToggleOutcome::Entered
        } else {
            self.exit(host, player, container, full_bleed);
            info!("left web fullscreen");
            ToggleOutcome::Exited
        }
    }

    /// Leaves web fullscreen when it is active; otherwise does nothing.
    pub fn exit_web_fullscreen<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        theme: &ThemeConfig,
    ) -> ToggleOutcome {
        if !probe::is_web_fullscreen(host) {
            return ToggleOutcome::Skipped;
        }
        self.toggle_web_fullscreen(host, theme)
    }

    fn enter<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        player: NodeId,
        container: NodeId,
        full_bleed: Option<NodeId>,
        theme: &ThemeConfig,
    ) {
        set_theater_mode(host, true);
        if let Some(snapshot) = self.snapshots.get_mut(&player) {
            snapshot.player_style = host.attribute(player, "style");
        }

        let body = host.query(None, "body");
        if host.query(None, &format!("#{BACKDROP_ID}")).is_none() {
            if let Some(body) = body {
                let color = if probe::is_dark_theme(host) {
                    theme.dark_backdrop.as_str()
                } else {
                    theme.light_backdrop.as_str()
                };
                let backdrop = host.create_element(body, "div");
                host.set_attribute(backdrop, "id", BACKDROP_ID);
                style::set_css_text(
                    host,
                    backdrop,
                    &[
                        ("position", "fixed"),
                        ("top", "0"),
                        ("left", "0"),
                        ("width", "100vw"),
                        ("height", "100vh"),
                        ("z-index", "9997"),
                        ("background-color", color),
                    ],
                );
            }
        }

        if let Some(full_bleed) = full_bleed {
            style::set_css_text(host, full_bleed, &layer(9998));
        }
        style::set_css_text(host, container, &layer(9999));
        style::set_css_text(
            host,
            player,
            &[
                ("position", "absolute !important"),
                ("top", "0 !important"),
                ("left", "0 !important"),
                ("width", "100% !important"),
                ("height", "100% !important"),
            ],
        );
        if let Some(body) = body {
            style::set_property(host, body, "overflow", "hidden");
        }
    }

    fn exit<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        player: NodeId,
        container: NodeId,
        full_bleed: Option<NodeId>,
    ) {
        let snapshot = self.snapshots.remove(&player);
        let was_theater = snapshot.as_ref().map(|s| s.was_theater).unwrap_or(false);
        set_theater_mode(host, was_theater);

        if let Some(full_bleed) = full_bleed {
            style::clear(host, full_bleed);
        }
        style::clear(host, container);
        match snapshot.and_then(|s| s.player_style).filter(|s| !s.is_empty()) {
            Some(original) => host.set_attribute(player, "style", &original),
            None => style::clear(host, player),
        }
        if let Some(body) = host.query(None, "body") {
            style::set_property(host, body, "overflow", "");
        }
        if let Some(backdrop) = host.query(None, &format!("#{BACKDROP_ID}")) {
            host.remove(backdrop);
        }
    }
}

fn layer(z_index: u32) -> Vec<(&'static str, String)> {
    let mut declarations: Vec<(&'static str, String)> = FIXED_VIEWPORT
        .iter()
        .map(|(name, value)| (*name, value.to_string()))
        .collect();
    declarations.push(("z-index", format!("{z_index} !important")));
    declarations
}
