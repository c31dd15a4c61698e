//! Event entry point tying the page policies together.
//!
//! The embedding forwards host signals to [`Engine::handle`] and advances the
//! virtual clock with [`Engine::tick`]. Nothing here blocks or spawns; every
//! decision re-reads the host.

use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Config;
use crate::feed::{FeedFilter, FilterReport};
use crate::host::{Host, KeyChord, NoSettingsUi, SettingsUi};
use crate::hotkeys::{self, HotkeyAction};
use crate::layout;
use crate::prefs::Preferences;
use crate::probe::{self, PageKind};
use crate::quality::{self, FullscreenPolicy, FullscreenTrigger, QualityEngine};
use crate::style;
use crate::timers::{Deferred, TimerQueue};
use crate::view::{self, ToggleOutcome, ViewModeController};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuCommand {
    OpenSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Load,
    NavigateFinish,
    DomMutated,
    FullscreenChange,
    VideoEnded,
    KeyDown(KeyChord),
    MenuCommand(MenuCommand),
}

pub struct Engine<U: SettingsUi = NoSettingsUi> {
    config: Config,
    prefs: Preferences,
    ui: U,
    view: ViewModeController,
    quality: QualityEngine,
    feed: FeedFilter,
    timers: TimerQueue<Deferred>,
}

impl Engine<NoSettingsUi> {
    pub fn new(config: Config, prefs: Preferences) -> Self {
        Self::with_ui(config, prefs, NoSettingsUi)
    }
}

impl<U: SettingsUi> Engine<U> {
    pub fn with_ui(config: Config, prefs: Preferences, ui: U) -> Self {
        Self {
            config,
            prefs,
            ui,
            view: ViewModeController::new(),
            quality: QualityEngine::new(),
            feed: FeedFilter::new(),
            timers: TimerQueue::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn prefs(&self) -> &Preferences {
        &self.prefs
    }

    pub fn ui(&self) -> &U {
        &self.ui
    }

    pub fn ui_mut(&mut self) -> &mut U {
        &mut self.ui
    }

    pub fn view(&self) -> &ViewModeController {
        &self.view
    }

    pub fn feed(&self) -> &FeedFilter {
        &self.feed
    }

    pub fn quality(&self) -> &QualityEngine {
        &self.quality
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn next_timer_due(&self) -> Option<Duration> {
        self.timers.next_due()
    }

    pub fn handle<H: Host + ?Sized>(&mut self, host: &mut H, event: HostEvent) {
        match event {
            HostEvent::Load | HostEvent::NavigateFinish => {
                debug!("scheduling apply-all");
                self.timers
                    .schedule(self.config.timing.navigation_settle, Deferred::ApplyAll);
            }
            HostEvent::DomMutated => {
                self.feed.on_mutation(host, &self.prefs);
            }
            HostEvent::FullscreenChange => self.on_fullscreen_change(host),
            HostEvent::VideoEnded => {
                self.exit_web_fullscreen(host);
            }
            HostEvent::KeyDown(chord) => {
                self.on_key_down(host, &chord);
            }
            HostEvent::MenuCommand(MenuCommand::OpenSettings) => self.ui.open(),
        }
    }

    /// Runs every deferred task due at `now`, measured from the embedding's
    /// epoch.
    pub fn tick<H: Host + ?Sized>(&mut self, host: &mut H, now: Duration) {
        for task in self.timers.drain_due(now) {
            match task {
                Deferred::Resize => host.dispatch_resize(),
                Deferred::ApplyAll => self.apply_all(host),
            }
        }
    }

    pub fn apply_all<H: Host + ?Sized>(&mut self, host: &mut H) {
        let page = probe::page_kind(&host.location());
        debug!(?page, "applying page policies");

        quality::apply_default_quality(host, &self.prefs);
        self.apply_default_speed(host);
        self.apply_shorts_speed(host, page);
        self.apply_auto_web_fullscreen(host, page);
        if probe::has_video(host) {
            self.quality.arm();
        }
        self.feed.setup(host, &self.prefs);
        self.ui.ensure_control_bar();
        layout::apply_layout(host, &mut self.ui, &self.prefs, page);
    }

    pub fn toggle_web_fullscreen<H: Host + ?Sized>(&mut self, host: &mut H) -> ToggleOutcome {
        let outcome = self.view.toggle_web_fullscreen(host, &self.config.theme);
        self.after_view_change(outcome);
        outcome
    }

    pub fn exit_web_fullscreen<H: Host + ?Sized>(&mut self, host: &mut H) -> ToggleOutcome {
        let outcome = self.view.exit_web_fullscreen(host, &self.config.theme);
        self.after_view_change(outcome);
        outcome
    }

    fn after_view_change(&mut self, outcome: ToggleOutcome) {
        if outcome.changed() {
            self.timers
                .schedule(self.config.timing.resize_settle, Deferred::Resize);
        }
    }

    fn apply_default_speed<H: Host + ?Sized>(&self, host: &mut H) {
        let speed = self.prefs.default_speed();
        if host.set_playback_rate(speed) {
            info!(speed, "playback speed set");
        } else {
            debug!("no video element; speed not applied");
        }
    }

    fn apply_shorts_speed<H: Host + ?Sized>(&self, host: &mut H, page: PageKind) {
        if page != PageKind::Shorts || !self.prefs.shorts_one_x() {
            return;
        }
        match host.playback_rate() {
            Some(rate) if rate != 1.0 => {
                host.set_playback_rate(1.0);
                info!("shorts playback forced to 1x");
            }
            _ => {}
        }
    }

    fn apply_auto_web_fullscreen<H: Host + ?Sized>(&mut self, host: &mut H, page: PageKind) {
        if !self.prefs.auto_web_fullscreen() {
            return;
        }
        if page == PageKind::Watch {
            if probe::player(host).is_some() && !probe::is_web_fullscreen(host) {
                self.toggle_web_fullscreen(host);
            }
        } else {
            self.exit_web_fullscreen(host);
        }
    }

    fn on_fullscreen_change<H: Host + ?Sized>(&mut self, host: &mut H) {
        if !self.quality.is_armed() {
            return;
        }
        let trigger = if probe::is_native_fullscreen(host) {
            FullscreenTrigger::Enter
        } else {
            FullscreenTrigger::Exit
        };
        self.quality.apply_quality_policy(host, &self.prefs, trigger);
    }

    /// Returns whether the chord triggered anything.
    pub fn on_key_down<H: Host + ?Sized>(&mut self, host: &mut H, chord: &KeyChord) -> bool {
        if chord.is_escape() {
            if self.ui.is_open() {
                self.ui.close();
                return true;
            }
            return self.exit_web_fullscreen(host).changed();
        }
        let actions = hotkeys::matching_actions(chord, &self.prefs);
        for action in &actions {
            self.run_hotkey(host, *action);
        }
        !actions.is_empty()
    }

    pub fn run_hotkey<H: Host + ?Sized>(&mut self, host: &mut H, action: HotkeyAction) {
        debug!(%action, "hotkey");
        match action {
            HotkeyAction::WebFullscreen => {
                self.toggle_web_fullscreen(host);
            }
            HotkeyAction::OpenSettings => self.ui.open(),
            HotkeyAction::IncreaseSpeed => {
                if let Some(current) = host.playback_rate() {
                    let next = hotkeys::next_speed(current);
                    host.set_playback_rate(next);
                    info!(speed = next, "playback speed cycled");
                }
            }
            HotkeyAction::ToggleSubtitle => {
                if let Some(button) = host.query(None, probe::SUBTITLES_BUTTON) {
                    host.click(button);
                }
            }
            HotkeyAction::ShowStats => host.dispatch_key_chord(&hotkeys::stats_chord()),
            HotkeyAction::GoHome => self.go_home(host),
            HotkeyAction::RotateVideo => {
                let Some(video) = host.query(None, "video") else {
                    return;
                };
                let angle = hotkeys::next_rotation(probe::video_rotation(host, video));
                style::set_property(host, video, "transform", &format!("rotate({angle}deg)"));
                style::set_property(host, video, "transform-origin", "center center");
                info!(angle, "video rotated");
            }
        }
    }

    fn go_home<H: Host + ?Sized>(&self, host: &mut H) {
        if host.location().path() == "/" {
            debug!("already on the home page");
            return;
        }
        match Url::parse(&self.config.site.home_url) {
            Ok(home) => host.navigate(&home),
            Err(err) => warn!(url = self.config.site.home_url.as_str(), error = %err, "invalid home url"),
        }
    }

    pub fn set_default_quality<H: Host + ?Sized>(&mut self, host: &mut H, code: &str) {
        persist("default quality", self.prefs.set_default_quality(code));
        quality::apply_quality(host, code);
    }

    pub fn set_default_speed<H: Host + ?Sized>(&mut self, host: &mut H, speed: f64) {
        persist("default speed", self.prefs.set_default_speed(speed));
        self.apply_default_speed(host);
    }

    pub fn set_fullscreen_policy(&mut self, policy: FullscreenPolicy) {
        persist("fullscreen policy", self.prefs.set_fullscreen_policy(policy));
    }

    pub fn set_fullscreen_quality(&mut self, code: &str) {
        persist("fullscreen quality", self.prefs.set_fullscreen_quality(code));
    }

    /// Adds a title keyword and filters the feed again with it.
    pub fn add_keyword<H: Host + ?Sized>(&mut self, host: &mut H, word: &str) -> bool {
        match self.prefs.add_keyword(word) {
            Ok(added) => {
                if added {
                    self.refilter(host);
                }
                added
            }
            Err(err) => {
                warn!(error = %err, "failed to store keyword");
                false
            }
        }
    }

    pub fn remove_keyword(&mut self, word: &str) -> bool {
        self.prefs.remove_keyword(word).unwrap_or_else(|err| {
            warn!(error = %err, "failed to store keyword");
            false
        })
    }

    pub fn set_columns<H: Host + ?Sized>(&mut self, host: &mut H, columns: i64) -> Option<u32> {
        let stored = layout::set_columns(host, &self.prefs, columns);
        match stored {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(error = %err, "failed to store column count");
                None
            }
        }
    }

    pub fn set_columns_enabled<H: Host + ?Sized>(&mut self, host: &mut H, on: bool) {
        persist(
            "columns toggle",
            self.prefs.set_flag(crate::prefs::keys::COLUMNS_ENABLED, on),
        );
        if on {
            let page = probe::page_kind(&host.location());
            layout::apply_layout(host, &mut self.ui, &self.prefs, page);
        } else {
            layout::disable_columns(host, &mut self.ui);
        }
    }

    /// Re-runs the feed filter over items not seen yet.
    pub fn refilter<H: Host + ?Sized>(&mut self, host: &mut H) -> FilterReport {
        self.feed.on_mutation(host, &self.prefs)
    }

    pub fn display_mode<H: Host + ?Sized>(&self, host: &H) -> view::DisplayMode {
        view::display_mode(host)
    }
}

fn persist<T>(what: &str, result: Result<T>) {
    if let Err(err) = result {
        warn!(setting = what, error = %err, "preference write failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::fixtures::*;
    use crate::dom::DispatchedEvent;
    use crate::host::RecordingUi;
    use crate::storage::MemoryStore;
    use std::sync::Arc;

    fn engine(entries: &[(&str, &str)]) -> Engine<RecordingUi> {
        let config = Config::default();
        let store = MemoryStore::with_entries(entries.iter().copied());
        let prefs = Preferences::new(Arc::new(store), &config);
        Engine::with_ui(config, prefs, RecordingUi::default())
    }

    fn watch() -> WatchPage {
        watch_page(Url::parse(WATCH_URL).unwrap(), true)
    }

    #[test]
    fn navigation_applies_after_settle_delay() {
        let mut page = watch();
        let mut engine = engine(&[("yt-default-quality", "hd720"), ("yt-default-speed", "1.5")]);
        engine.handle(&mut page.doc, HostEvent::NavigateFinish);
        engine.tick(&mut page.doc, Duration::from_millis(999));
        assert_eq!(page.doc.playback_quality().as_deref(), Some("hd1080"));

        engine.tick(&mut page.doc, Duration::from_millis(1000));
        assert_eq!(page.doc.playback_quality().as_deref(), Some("hd720"));
        assert_eq!(page.doc.playback_rate(), Some(1.5));
        assert!(engine.quality().is_armed());
        assert_eq!(engine.ui().control_bar_ensured, 1);
    }

    #[test]
    fn toggle_schedules_one_resize() {
        let mut page = watch();
        let mut engine = engine(&[]);
        assert_eq!(engine.toggle_web_fullscreen(&mut page.doc), ToggleOutcome::Entered);
        assert_eq!(engine.pending_timers(), 1);
        engine.tick(&mut page.doc, Duration::from_millis(100));
        assert_eq!(page.doc.events(), &[DispatchedEvent::Resize]);
    }

    #[test]
    fn escape_closes_modal_before_leaving_web_fullscreen() {
        let mut page = watch();
        let mut engine = engine(&[]);
        engine.toggle_web_fullscreen(&mut page.doc);
        engine.handle(&mut page.doc, HostEvent::MenuCommand(MenuCommand::OpenSettings));
        assert!(engine.ui().open);

        let escape = KeyChord::plain("Escape");
        assert!(engine.on_key_down(&mut page.doc, &escape));
        assert!(!engine.ui().open);
        assert!(probe::is_web_fullscreen(&page.doc));

        assert!(engine.on_key_down(&mut page.doc, &escape));
        assert!(!probe::is_web_fullscreen(&page.doc));
        assert!(!engine.on_key_down(&mut page.doc, &escape));
    }

    #[test]
    fn video_end_leaves_web_fullscreen() {
        let mut page = watch();
        let mut engine = engine(&[]);
        engine.toggle_web_fullscreen(&mut page.doc);
        engine.handle(&mut page.doc, HostEvent::VideoEnded);
        assert!(!probe::is_web_fullscreen(&page.doc));
    }

    #[test]
    fn auto_web_fullscreen_enters_on_watch_and_leaves_elsewhere() {
        let mut page = watch();
        let mut engine = engine(&[("yt-auto-webfullscreen", "true")]);
        engine.apply_all(&mut page.doc);
        assert!(probe::is_web_fullscreen(&page.doc));
        engine.apply_all(&mut page.doc);
        assert!(probe::is_web_fullscreen(&page.doc));

        page.doc
            .set_location(Url::parse("https://www.youtube.com/feed/history").unwrap());
        engine.apply_all(&mut page.doc);
        assert!(!probe::is_web_fullscreen(&page.doc));
    }

    #[test]
    fn shorts_forced_to_normal_speed() {
        let mut page = watch_page(Url::parse(SHORTS_URL).unwrap(), false);
        let mut engine = engine(&[("yt-shorts-one-x-speed", "true"), ("yt-default-speed", "3")]);
        engine.apply_all(&mut page.doc);
        assert_eq!(page.doc.playback_rate(), Some(1.0));
    }

    #[test]
    fn fullscreen_change_runs_quality_policy_once_armed() {
        let mut page = watch();
        let mut engine = engine(&[("yt-fullscreen-video-max-quality", "true")]);
        page.doc.set_fullscreen(Some(page.player));
        engine.handle(&mut page.doc, HostEvent::FullscreenChange);
        assert_eq!(page.doc.playback_quality().as_deref(), Some("hd1080"));

        engine.apply_all(&mut page.doc);
        engine.handle(&mut page.doc, HostEvent::FullscreenChange);
        assert_eq!(page.doc.playback_quality().as_deref(), Some("hd2160"));

        page.doc.set_fullscreen(None);
        engine.handle(&mut page.doc, HostEvent::FullscreenChange);
        assert_eq!(page.doc.playback_quality().as_deref(), Some("hd1080"));
    }

    #[test]
    fn hotkeys_drive_player_actions() {
        let mut page = watch();
        let mut engine = engine(&[
            ("yt-hotkey-toggle-increase-speed", "true"),
            ("yt-hotkey-toggle-rotate-video", "true"),
            ("yt-hotkey-toggle-show-stats", "true"),
            ("yt-hotkey-toggle-toggle-subtitle", "true"),
            ("yt-hotkey-toggle-go-home", "true"),
        ]);
        for _ in 0..3 {
            engine.on_key_down(&mut page.doc, &KeyChord::plain("x"));
        }
        assert_eq!(page.doc.playback_rate(), Some(1.0));

        engine.on_key_down(&mut page.doc, &KeyChord::plain("r"));
        engine.on_key_down(&mut page.doc, &KeyChord::plain("r"));
        assert_eq!(
            style::property(&page.doc, page.video, "transform").as_deref(),
            Some("rotate(180deg)")
        );
        assert_eq!(
            style::property(&page.doc, page.video, "transform-origin").as_deref(),
            Some("center center")
        );

        engine.on_key_down(&mut page.doc, &KeyChord::plain("c"));
        assert_eq!(
            page.doc.attribute(page.subtitles_button, "aria-pressed").as_deref(),
            Some("")
        );

        engine.on_key_down(&mut page.doc, &KeyChord::plain("d"));
        engine.on_key_down(&mut page.doc, &KeyChord::plain("h"));
        assert_eq!(
            page.doc.events(),
            &[
                DispatchedEvent::KeyChord(hotkeys::stats_chord()),
                DispatchedEvent::Navigate(Url::parse(HOME_URL).unwrap()),
            ]
        );
        engine.on_key_down(&mut page.doc, &KeyChord::plain("h"));
        assert_eq!(page.doc.events().len(), 2);
    }

    #[test]
    fn home_route_applies_columns_and_slider() {
        let mut page = home_page(Url::parse(HOME_URL).unwrap());
        let mut engine = engine(&[("yt_home_columns_enabled", "true"), ("yt_home_columns", "4")]);
        engine.apply_all(&mut page.doc);
        assert_eq!(engine.ui().slider, Some(4));
        assert!(page.doc.query(None, "#yt-custom-columns-style").is_some());

        engine.set_columns_enabled(&mut page.doc, false);
        assert_eq!(engine.ui().slider, None);
        assert!(page.doc.query(None, "#yt-custom-columns-style").is_none());
    }

    #[test]
    fn mutations_only_filter_after_setup() {
        let mut page = home_page(Url::parse(HOME_URL).unwrap());
        let grid = page.grid;
        let mut engine = engine(&[
            ("yt-filter-enabled", "true"),
            ("yt-filter-home", "true"),
            ("yt-filter-progress", "true"),
        ]);
        let spec = FeedItemSpec {
            title: "Seen it",
            progress: Some("100%"),
            ..FeedItemSpec::default()
        };
        let early = add_feed_item(&mut page.doc, grid, &spec);
        engine.handle(&mut page.doc, HostEvent::DomMutated);
        assert!(page.doc.attribute(early, "data-yt-filtered").is_none());

        engine.apply_all(&mut page.doc);
        assert!(style::is_hidden(&page.doc, early));
        let late = add_feed_item(&mut page.doc, grid, &spec);
        engine.handle(&mut page.doc, HostEvent::DomMutated);
        assert!(style::is_hidden(&page.doc, late));
        assert_eq!(engine.feed().hidden_total(), 2);
    }
}
