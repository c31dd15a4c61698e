use std::sync::Arc;
use std::time::Duration;

use tempfile::tempdir;
use url::Url;
use yt_optimize::config::Config;
use yt_optimize::dom::fixtures::*;
use yt_optimize::dom::DispatchedEvent;
use yt_optimize::host::{Host, KeyChord, RecordingUi};
use yt_optimize::prefs::Preferences;
use yt_optimize::probe;
use yt_optimize::quality::FullscreenPolicy;
use yt_optimize::storage::{self, MemoryStore, SqliteStore};
use yt_optimize::style;
use yt_optimize::view::BACKDROP_ID;
use yt_optimize::{Engine, HostEvent};

fn memory_engine(entries: &[(&str, &str)]) -> Engine<RecordingUi> {
    let config = Config::default();
    let store = MemoryStore::with_entries(entries.iter().copied());
    let prefs = Preferences::new(Arc::new(store), &config);
    Engine::with_ui(config, prefs, RecordingUi::default())
}

fn key(chord: KeyChord) -> HostEvent {
    HostEvent::KeyDown(chord)
}

#[test]
fn web_fullscreen_hotkey_round_trip_restores_page() {
    let mut page = watch_page(Url::parse(WATCH_URL).unwrap(), true);
    page.doc.set_attribute(page.player, "style", "width: 640px;");
    let mut engine = memory_engine(&[("yt-hotkey-toggle-webfullscreen", "true")]);

    engine.handle(&mut page.doc, key(KeyChord::plain("w")));
    assert!(probe::is_web_fullscreen(&page.doc));
    assert!(probe::is_theater_mode(&page.doc));
    let backdrop = page.doc.query(None, &format!("#{BACKDROP_ID}")).unwrap();
    assert_eq!(
        style::property(&page.doc, backdrop, "background-color").as_deref(),
        Some(Config::default().theme.dark_backdrop.as_str())
    );

    engine.tick(&mut page.doc, Duration::from_millis(99));
    assert!(page.doc.events().is_empty());
    engine.tick(&mut page.doc, Duration::from_millis(100));
    assert_eq!(page.doc.take_events(), vec![DispatchedEvent::Resize]);

    engine.handle(&mut page.doc, key(KeyChord::plain("W")));
    assert!(!probe::is_web_fullscreen(&page.doc));
    assert!(!probe::is_theater_mode(&page.doc));
    assert_eq!(
        page.doc.attribute(page.player, "style").as_deref(),
        Some("width: 640px;")
    );
    assert_eq!(page.doc.attribute(page.player_container, "style"), None);
    assert_eq!(page.doc.attribute(page.full_bleed, "style"), None);
    assert!(page.doc.query(None, &format!("#{BACKDROP_ID}")).is_none());
}

#[test]
fn open_settings_needs_ctrl_shift() {
    let mut page = watch_page(Url::parse(WATCH_URL).unwrap(), false);
    let mut engine = memory_engine(&[("yt-hotkey-toggle-open-settings", "true")]);
    engine.handle(&mut page.doc, key(KeyChord::plain("s")));
    assert!(!engine.ui().open);
    engine.handle(&mut page.doc, key(KeyChord::ctrl_shift("S")));
    assert!(engine.ui().open);
    engine.handle(&mut page.doc, key(KeyChord::plain("Escape")));
    assert!(!engine.ui().open);
}

#[test]
fn disabled_hotkeys_do_nothing() {
    let mut page = watch_page(Url::parse(WATCH_URL).unwrap(), false);
    let mut engine = memory_engine(&[]);
    for letter in ["w", "x", "c", "d", "h", "r"] {
        engine.handle(&mut page.doc, key(KeyChord::plain(letter)));
    }
    assert!(page.doc.events().is_empty());
    assert!(!probe::is_web_fullscreen(&page.doc));
    assert_eq!(page.doc.playback_rate(), Some(1.0));
}

#[test]
fn screen_fit_quality_tracks_player_size() {
    let mut page = watch_page(Url::parse(WATCH_URL).unwrap(), false);
    page.doc.set_device_pixel_ratio(1.5);
    let mut engine = memory_engine(&[]);
    engine.set_fullscreen_policy(FullscreenPolicy::ScreenFit);
    engine.apply_all(&mut page.doc);

    page.doc.set_fullscreen(Some(page.player));
    engine.handle(&mut page.doc, HostEvent::FullscreenChange);
    assert_eq!(page.doc.playback_quality().as_deref(), Some("hd1440"));

    page.doc.set_fullscreen(None);
    engine.handle(&mut page.doc, HostEvent::FullscreenChange);
    assert_eq!(page.doc.playback_quality().as_deref(), Some("hd1080"));
}

#[test]
fn home_feed_filters_by_every_rule() {
    let mut page = home_page(Url::parse(HOME_URL).unwrap());
    let grid = page.grid;
    let mut engine = memory_engine(&[
        ("yt-filter-enabled", "true"),
        ("yt-filter-home", "true"),
        ("yt-filter-members-only", "true"),
        ("yt-filter-keywords", "true"),
        ("yt-filter-publish-time-enabled", "true"),
    ]);
    let members = add_feed_item(
        &mut page.doc,
        grid,
        &FeedItemSpec {
            title: "Behind the scenes",
            badge: Some("Members only"),
            published: Some("3 days ago"),
            ..FeedItemSpec::default()
        },
    );
    let old = add_feed_item(
        &mut page.doc,
        grid,
        &FeedItemSpec {
            title: "Classic upload",
            published: Some("2 years ago"),
            ..FeedItemSpec::default()
        },
    );
    let fresh = add_feed_item(
        &mut page.doc,
        grid,
        &FeedItemSpec {
            title: "Live Stream Highlights",
            published: Some("1 month ago"),
            ..FeedItemSpec::default()
        },
    );

    engine.handle(&mut page.doc, HostEvent::Load);
    engine.tick(&mut page.doc, Duration::from_secs(1));
    assert!(style::is_hidden(&page.doc, members));
    assert!(style::is_hidden(&page.doc, old));
    assert!(!style::is_hidden(&page.doc, fresh));

    // Items already judged visible are not re-examined.
    assert!(engine.add_keyword(&mut page.doc, "live stream"));
    assert!(!style::is_hidden(&page.doc, fresh));
    let later = add_feed_item(
        &mut page.doc,
        grid,
        &FeedItemSpec {
            title: "LIVE STREAM replay",
            published: Some("1 month ago"),
            ..FeedItemSpec::default()
        },
    );
    engine.handle(&mut page.doc, HostEvent::DomMutated);
    assert!(style::is_hidden(&page.doc, later));
    assert_eq!(engine.feed().hidden_total(), 3);
}

#[test]
fn related_feed_only_when_enabled() {
    let mut page = watch_page(Url::parse(WATCH_URL).unwrap(), false);
    let sidebar = page.doc.element(page.flexy, "div", &[("id", "related")]);
    let spec = FeedItemSpec {
        tag: Some("ytd-compact-video-renderer"),
        title: "Watched already",
        progress: Some("95%"),
        ..FeedItemSpec::default()
    };
    let item = add_feed_item(&mut page.doc, sidebar, &spec);

    let mut engine = memory_engine(&[
        ("yt-filter-enabled", "true"),
        ("yt-filter-home", "true"),
        ("yt-filter-progress", "true"),
    ]);
    engine.apply_all(&mut page.doc);
    assert!(!style::is_hidden(&page.doc, item));

    let mut engine = memory_engine(&[
        ("yt-filter-enabled", "true"),
        ("yt-filter-related", "true"),
        ("yt-filter-progress", "true"),
    ]);
    engine.apply_all(&mut page.doc);
    assert!(style::is_hidden(&page.doc, item));
}

#[test]
fn preferences_persist_through_sqlite() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("prefs.db");
    let config = Config::default();

    {
        let store = SqliteStore::open(storage::Options {
            path: Some(path.clone()),
        })
        .unwrap();
        let prefs = Preferences::new(Arc::new(store), &config);
        let mut engine = Engine::new(config.clone(), prefs);
        let mut page = home_page(Url::parse(HOME_URL).unwrap());
        assert_eq!(engine.set_columns(&mut page.doc, 7), Some(7));
        engine.set_columns_enabled(&mut page.doc, true);
        let tag = page.doc.query(None, "#yt-custom-columns-style").unwrap();
        assert!(page.doc.text_content(tag).contains("items-per-row: 7"));
    }

    let store = SqliteStore::open(storage::Options { path: Some(path) }).unwrap();
    let prefs = Preferences::new(Arc::new(store), &config);
    assert_eq!(prefs.columns(), 7);
    assert!(prefs.columns_enabled());
}
