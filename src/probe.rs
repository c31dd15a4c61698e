//! Read-only facts derived from the host page.
//!
//! Nothing here is cached: every call re-reads the live DOM, so a caller
//! always sees the state the host left behind after its own re-renders.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::host::{Host, NodeId};
use crate::style;

pub const PLAYER: &str = ".html5-video-player";
pub const PLAYER_CONTAINER: &str = "#player-container";
pub const FULL_BLEED_CONTAINER: &str = "#full-bleed-container";
pub const WATCH_FLEXY: &str = "ytd-watch-flexy";
pub const SIZE_BUTTON: &str = ".ytp-size-button";
pub const SUBTITLES_BUTTON: &str = ".ytp-subtitles-button";
pub const PAGE_MANAGER: &str = "ytd-page-manager";
pub const WEB_FULLSCREEN_CLASS: &str = "webfullscreen";
pub const FILTER_MARK: &str = "data-yt-filtered";

const TITLE: &str = "h3[title]";
const MEMBERS_BADGE: &str = "ytd-badge-supported-renderer .yt-badge-shape__text";
const WATCHED_SEGMENT: &str = ".ytThumbnailOverlayProgressBarHostWatchedProgressBarSegment";

static PERCENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([\d.]+)%").expect("valid percent regex"));
static MONTHS_AGO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+)\s*(?:个月前|months?\s+ago)").expect("valid months regex")
});
static YEARS_AGO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+)\s*(?:年前|years?\s+ago)").expect("valid years regex"));
static ROTATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"rotate\((-?\d+)deg\)").expect("valid rotate regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Home,
    Watch,
    Shorts,
    Other,
}

pub fn page_kind(location: &Url) -> PageKind {
    let path = location.path();
    if path == "/" {
        PageKind::Home
    } else if path.starts_with("/shorts/") {
        PageKind::Shorts
    } else if path == "/watch" && location.query_pairs().any(|(k, _)| k == "v") {
        PageKind::Watch
    } else {
        PageKind::Other
    }
}

pub fn player<H: Host + ?Sized>(host: &H) -> Option<NodeId> {
    host.query(None, PLAYER)
}

pub fn is_theater_mode<H: Host + ?Sized>(host: &H) -> bool {
    host.query(None, WATCH_FLEXY)
        .map(|flexy| host.attribute(flexy, "theater").is_some())
        .unwrap_or(false)
}

pub fn is_web_fullscreen<H: Host + ?Sized>(host: &H) -> bool {
    player(host)
        .map(|p| host.has_class(p, WEB_FULLSCREEN_CLASS))
        .unwrap_or(false)
}

pub fn is_native_fullscreen<H: Host + ?Sized>(host: &H) -> bool {
    host.fullscreen_element().is_some()
}

pub fn is_dark_theme<H: Host + ?Sized>(host: &H) -> bool {
    let Some(root) = host.query(None, "html") else {
        return false;
    };
    matches!(host.attribute(root, "dark").as_deref(), Some("") | Some("true"))
        || host.has_class(root, "dark")
}

pub fn has_video<H: Host + ?Sized>(host: &H) -> bool {
    host.query(None, "video").is_some()
}

pub fn item_title<H: Host + ?Sized>(host: &H, item: NodeId) -> String {
    host.query(Some(item), TITLE)
        .and_then(|title| host.attribute(title, "title"))
        .map(|t| t.trim().to_string())
        .unwrap_or_default()
}

pub fn is_members_only<H: Host + ?Sized>(host: &H, item: NodeId, labels: &[String]) -> bool {
    host.query_all(Some(item), MEMBERS_BADGE)
        .into_iter()
        .any(|badge| {
            let text = host.text_content(badge);
            let text = text.trim();
            labels.iter().any(|label| label == text)
        })
}

/// Watched share of an item, 0 when no progress bar can be read.
pub fn watched_percent<H: Host + ?Sized>(host: &H, item: NodeId) -> f64 {
    host.query(Some(item), WATCHED_SEGMENT)
        .and_then(|bar| width_percent(host, bar))
        .or_else(|| {
            fallback_progress_bar(host, item).and_then(|bar| width_percent(host, bar))
        })
        .unwrap_or(0.0)
}

// First element child of the second div anywhere under the first link.
fn fallback_progress_bar<H: Host + ?Sized>(host: &H, item: NodeId) -> Option<NodeId> {
    let link = host.query(Some(item), "a")?;
    let overlay = *host.query_all(Some(link), "div").get(1)?;
    host.children(overlay).into_iter().next()
}

fn width_percent<H: Host + ?Sized>(host: &H, bar: NodeId) -> Option<f64> {
    style::property(host, bar, "width").and_then(|width| percent(&width))
}

fn percent(input: &str) -> Option<f64> {
    PERCENT
        .captures(input)
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .filter(|value| value.is_finite())
}

pub fn parse_percent(input: &str) -> f64 {
    percent(input).unwrap_or(0.0)
}

pub fn publish_age_months<H: Host + ?Sized>(host: &H, item: NodeId) -> u32 {
    let spans = host.query_all(Some(item), "span");
    spans
        .iter()
        .position(|span| host.text_content(*span).trim() == "•")
        .and_then(|idx| spans.get(idx + 1))
        .map(|span| parse_publish_age(&host.text_content(*span)))
        .unwrap_or(0)
}

/// Months since publication from the host's relative age text.
pub fn parse_publish_age(text: &str) -> u32 {
    if let Some(caps) = MONTHS_AGO.captures(text) {
        return caps[1].parse().unwrap_or(0);
    }
    if let Some(caps) = YEARS_AGO.captures(text) {
        return caps[1].parse::<u32>().map(|y| y.saturating_mul(12)).unwrap_or(0);
    }
    0
}

/// Current clockwise rotation of `video` in degrees, in `[0, 360)`.
pub fn video_rotation<H: Host + ?Sized>(host: &H, video: NodeId) -> u32 {
    style::property(host, video, "transform")
        .and_then(|transform| {
            ROTATE
                .captures(&transform)
                .and_then(|caps| caps[1].parse::<i64>().ok())
        })
        .map(|deg| deg.rem_euclid(360) as u32)
        .unwrap_or(0)
}
