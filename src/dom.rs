//! In-memory document implementing [`Host`].
//!
//! Elements live in an arena indexed by [`NodeId`]. Host behaviors the engine
//! relies on (the theater button flipping an attribute, the player object)
//! are modelled as data so a page can be assembled and inspected in tests.

use std::collections::HashMap;

use tracing::debug;
use url::Url;

use crate::host::{Host, KeyChord, NodeId, Rect};
use crate::selector::{ElementTree, Selector};

#[derive(Debug, Clone)]
struct Element {
    tag: String,
    attributes: Vec<(String, String)>,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    connected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickAction {
    ToggleAttribute { target: NodeId, name: String },
    ToggleClass { target: NodeId, class: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchedEvent {
    Resize,
    KeyChord(KeyChord),
    Navigate(Url),
}

/// The host player object. `None` fields model methods missing on a host
/// version.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerModel {
    pub quality: Option<String>,
    pub levels: Option<Vec<String>>,
    pub settable: bool,
    pub applied: Vec<String>,
}

impl PlayerModel {
    pub fn new(quality: &str, levels: &[&str]) -> Self {
        Self {
            quality: Some(quality.to_string()),
            levels: Some(levels.iter().map(|l| l.to_string()).collect()),
            settable: true,
            applied: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Element>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
    clicks: HashMap<NodeId, ClickAction>,
    rects: HashMap<NodeId, Rect>,
    device_pixel_ratio: f64,
    fullscreen: Option<NodeId>,
    location: Url,
    player: Option<PlayerModel>,
    media_rate: f64,
    events: Vec<DispatchedEvent>,
    mutations: usize,
}

impl Document {
    pub fn new(location: Url) -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            head: NodeId(0),
            body: NodeId(0),
            clicks: HashMap::new(),
            rects: HashMap::new(),
            device_pixel_ratio: 1.0,
            fullscreen: None,
            location,
            player: None,
            media_rate: 1.0,
            events: Vec::new(),
            mutations: 0,
        };
        let root = doc.alloc(None, "html");
        doc.head = doc.alloc(Some(root), "head");
        doc.body = doc.alloc(Some(root), "body");
        doc.root = root;
        doc
    }

    pub fn parse(href: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(href)?))
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Builder shorthand: appends `tag` under `parent` with attributes.
    pub fn element(&mut self, parent: NodeId, tag: &str, attributes: &[(&str, &str)]) -> NodeId {
        let node = self.alloc(Some(parent), tag);
        for (name, value) in attributes {
            self.nodes[node.0 as usize]
                .attributes
                .push((name.to_string(), value.to_string()));
        }
        node
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) {
        if let Some(el) = self.get_mut(node) {
            el.text = text.to_string();
        }
    }

    pub fn on_click(&mut self, node: NodeId, action: ClickAction) {
        self.clicks.insert(node, action);
    }

    pub fn set_rect(&mut self, node: NodeId, rect: Rect) {
        self.rects.insert(node, rect);
    }

    pub fn set_device_pixel_ratio(&mut self, ratio: f64) {
        self.device_pixel_ratio = ratio;
    }

    pub fn set_fullscreen(&mut self, node: Option<NodeId>) {
        self.fullscreen = node;
    }

    pub fn set_location(&mut self, location: Url) {
        self.location = location;
    }

    pub fn install_player(&mut self, player: PlayerModel) {
        self.player = Some(player);
    }

    pub fn player_model(&self) -> Option<&PlayerModel> {
        self.player.as_ref()
    }

    pub fn player_model_mut(&mut self) -> Option<&mut PlayerModel> {
        self.player.as_mut()
    }

    pub fn events(&self) -> &[DispatchedEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<DispatchedEvent> {
        std::mem::take(&mut self.events)
    }

    /// Number of DOM writes so far; every attribute write, insertion and
    /// removal counts, as it would for a mutation observer.
    pub fn mutation_count(&self) -> usize {
        self.mutations
    }

    fn alloc(&mut self, parent: Option<NodeId>, tag: &str) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let connected = parent.map(|p| self.is_connected(p)).unwrap_or(true);
        self.nodes.push(Element {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
            text: String::new(),
            parent,
            children: Vec::new(),
            connected,
        });
        if let Some(parent) = parent {
            if let Some(el) = self.get_mut(parent) {
                el.children.push(id);
            }
        }
        id
    }

    fn get(&self, node: NodeId) -> Option<&Element> {
        self.nodes.get(node.0 as usize)
    }

    fn get_mut(&mut self, node: NodeId) -> Option<&mut Element> {
        self.nodes.get_mut(node.0 as usize)
    }

    fn disconnect(&mut self, node: NodeId) {
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if let Some(el) = self.get_mut(current) {
                el.connected = false;
                stack.extend(el.children.iter().copied());
            }
        }
    }

    fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self
            .get(scope)
            .map(|el| el.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(current) = stack.pop() {
            out.push(current);
            if let Some(el) = self.get(current) {
                stack.extend(el.children.iter().rev().copied());
            }
        }
        out
    }
}

impl ElementTree for Document {
    type Node = NodeId;

    fn tag(&self, node: NodeId) -> &str {
        self.get(node).map(|el| el.tag.as_str()).unwrap_or("")
    }

    fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.get(node)?
            .attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.get(node)?.parent
    }
}

impl Host for Document {
    fn query_all(&self, scope: Option<NodeId>, selector: &str) -> Vec<NodeId> {
        let parsed = match Selector::parse(selector) {
            Ok(parsed) => parsed,
            Err(err) => {
                debug!(selector, error = %err, "unsupported selector");
                return Vec::new();
            }
        };
        let mut candidates = Vec::new();
        if scope.is_none() {
            candidates.push(self.root);
        }
        candidates.extend(self.descendants(scope.unwrap_or(self.root)));
        candidates
            .into_iter()
            .filter(|node| self.is_connected(*node) && parsed.matches(self, *node))
            .collect()
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.attr(node, name).map(str::to_string)
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        let Some(el) = self.get_mut(node) else {
            return;
        };
        match el
            .attributes
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some((_, existing)) => *existing = value.to_string(),
            None => el.attributes.push((name.to_string(), value.to_string())),
        }
        self.mutations += 1;
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) {
        let Some(el) = self.get_mut(node) else {
            return;
        };
        let before = el.attributes.len();
        el.attributes.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        if el.attributes.len() != before {
            self.mutations += 1;
        }
    }

    fn text_content(&self, node: NodeId) -> String {
        let mut text = self.get(node).map(|el| el.text.clone()).unwrap_or_default();
        for child in self.descendants(node) {
            if let Some(el) = self.get(child) {
                text.push_str(&el.text);
            }
        }
        text
    }

    fn set_text_content(&mut self, node: NodeId, text: &str) {
        let children = self.children(node);
        for child in children {
            self.remove(child);
        }
        if let Some(el) = self.get_mut(node) {
            el.text = text.to_string();
            self.mutations += 1;
        }
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.get(node)
            .map(|el| el.children.clone())
            .unwrap_or_default()
    }

    fn is_connected(&self, node: NodeId) -> bool {
        self.get(node).map(|el| el.connected).unwrap_or(false)
    }

    fn create_element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let node = self.alloc(Some(parent), tag);
        self.mutations += 1;
        node
    }

    fn remove(&mut self, node: NodeId) {
        let Some(parent) = self.get(node).and_then(|el| el.parent) else {
            return;
        };
        if let Some(el) = self.get_mut(parent) {
            el.children.retain(|child| *child != node);
        }
        if let Some(el) = self.get_mut(node) {
            el.parent = None;
        }
        self.disconnect(node);
        self.mutations += 1;
    }

    fn click(&mut self, node: NodeId) {
        if !self.is_connected(node) {
            return;
        }
        match self.clicks.get(&node).cloned() {
            Some(ClickAction::ToggleAttribute { target, name }) => {
                if self.attr(target, &name).is_some() {
                    self.remove_attribute(target, &name);
                } else {
                    self.set_attribute(target, &name, "");
                }
            }
            Some(ClickAction::ToggleClass { target, class }) => {
                self.toggle_class(target, &class);
            }
            None => {}
        }
    }

    fn bounding_rect(&self, node: NodeId) -> Option<Rect> {
        if !self.is_connected(node) {
            return None;
        }
        Some(self.rects.get(&node).copied().unwrap_or_default())
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.device_pixel_ratio
    }

    fn fullscreen_element(&self) -> Option<NodeId> {
        self.fullscreen.filter(|node| self.is_connected(*node))
    }

    fn location(&self) -> Url {
        self.location.clone()
    }

    fn navigate(&mut self, url: &Url) {
        self.location = url.clone();
        self.events.push(DispatchedEvent::Navigate(url.clone()));
    }

    fn dispatch_resize(&mut self) {
        self.events.push(DispatchedEvent::Resize);
    }

    fn dispatch_key_chord(&mut self, chord: &KeyChord) {
        self.events.push(DispatchedEvent::KeyChord(chord.clone()));
    }

    fn playback_quality(&self) -> Option<String> {
        self.query(None, "ytd-player")?;
        self.player.as_ref()?.quality.clone()
    }

    fn available_quality_levels(&self) -> Option<Vec<String>> {
        self.query(None, "ytd-player")?;
        self.player.as_ref()?.levels.clone()
    }

    fn set_playback_quality(&mut self, code: &str) -> bool {
        if self.query(None, "ytd-player").is_none() {
            return false;
        }
        match self.player.as_mut() {
            Some(player) if player.settable => {
                player.quality = Some(code.to_string());
                player.applied.push(code.to_string());
                true
            }
            _ => false,
        }
    }

    fn playback_rate(&self) -> Option<f64> {
        self.query(None, "video")?;
        Some(self.media_rate)
    }

    fn set_playback_rate(&mut self, rate: f64) -> bool {
        if self.query(None, "video").is_none() {
            return false;
        }
        self.media_rate = rate;
        true
    }
}

/// Page layouts shaped like the host site's markup.
#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures {
    use super::*;

    pub const WATCH_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
    pub const HOME_URL: &str = "https://www.youtube.com/";
    pub const SHORTS_URL: &str = "https://www.youtube.com/shorts/abc123";

    pub const STANDARD_LEVELS: &[&str] = &[
        "hd2160", "hd1440", "hd1080", "hd720", "large", "medium", "small", "tiny",
    ];

    #[derive(Debug, Clone)]
    pub struct WatchPage {
        pub doc: Document,
        pub flexy: NodeId,
        pub full_bleed: NodeId,
        pub player_container: NodeId,
        pub player: NodeId,
        pub video: NodeId,
        pub size_button: NodeId,
        pub subtitles_button: NodeId,
        pub page_manager: NodeId,
    }

    pub fn watch_page(location: Url, dark: bool) -> WatchPage {
        let mut doc = Document::new(location);
        let root = doc.root();
        if dark {
            doc.set_attribute(root, "dark", "");
        }
        let body = doc.body();
        let app = doc.element(body, "ytd-app", &[]);
        let page_manager = doc.element(app, "ytd-page-manager", &[]);
        let flexy = doc.element(page_manager, "ytd-watch-flexy", &[]);
        let full_bleed = doc.element(flexy, "div", &[("id", "full-bleed-container")]);
        let player_container = doc.element(full_bleed, "div", &[("id", "player-container")]);
        let ytd_player = doc.element(player_container, "ytd-player", &[]);
        let player = doc.element(
            ytd_player,
            "div",
            &[("class", "html5-video-player ytp-large-width-mode")],
        );
        let video = doc.element(player, "video", &[("class", "video-stream")]);
        let controls = doc.element(player, "div", &[("class", "ytp-right-controls")]);
        let subtitles_button = doc.element(
            controls,
            "button",
            &[("class", "ytp-subtitles-button ytp-button")],
        );
        let size_button = doc.element(controls, "button", &[("class", "ytp-size-button ytp-button")]);
        doc.on_click(
            size_button,
            ClickAction::ToggleAttribute {
                target: flexy,
                name: "theater".into(),
            },
        );
        doc.on_click(
            subtitles_button,
            ClickAction::ToggleAttribute {
                target: subtitles_button,
                name: "aria-pressed".into(),
            },
        );
        doc.set_rect(
            player,
            Rect {
                width: 1280.0,
                height: 720.0,
            },
        );
        doc.install_player(PlayerModel::new("hd1080", STANDARD_LEVELS));
        doc.mutations = 0;

        WatchPage {
            doc,
            flexy,
            full_bleed,
            player_container,
            player,
            video,
            size_button,
            subtitles_button,
            page_manager,
        }
    }

    #[derive(Debug, Clone)]
    pub struct HomePage {
        pub doc: Document,
        pub page_manager: NodeId,
        pub grid: NodeId,
    }

    pub fn home_page(location: Url) -> HomePage {
        let mut doc = Document::new(location);
        let body = doc.body();
        let app = doc.element(body, "ytd-app", &[]);
        let page_manager = doc.element(app, "ytd-page-manager", &[]);
        let browse = doc.element(page_manager, "ytd-browse", &[]);
        let grid = doc.element(browse, "ytd-rich-grid-renderer", &[]);
        doc.mutations = 0;
        HomePage {
            doc,
            page_manager,
            grid,
        }
    }

    #[derive(Debug, Clone, Default)]
    pub struct FeedItemSpec<'a> {
        pub tag: Option<&'a str>,
        pub title: &'a str,
        pub badge: Option<&'a str>,
        /// Width of the dedicated watched-progress segment, e.g. `"95%"`.
        pub progress: Option<&'a str>,
        /// Width of the generic thumbnail overlay used when the dedicated
        /// segment is missing.
        pub fallback_progress: Option<&'a str>,
        pub published: Option<&'a str>,
    }

    pub fn add_feed_item(doc: &mut Document, parent: NodeId, spec: &FeedItemSpec<'_>) -> NodeId {
        let item = doc.element(parent, spec.tag.unwrap_or("ytd-rich-item-renderer"), &[]);
        let link = doc.element(item, "a", &[("id", "thumbnail")]);
        doc.element(link, "div", &[("class", "thumbnail-image")]);
        let overlay = doc.element(link, "div", &[("class", "thumbnail-overlay")]);
        if let Some(width) = spec.fallback_progress {
            let style = format!("width: {width};");
            doc.element(overlay, "div", &[("style", style.as_str())]);
        }
        if let Some(width) = spec.progress {
            let style = format!("width: {width};");
            doc.element(
                link,
                "div",
                &[
                    (
                        "class",
                        "ytThumbnailOverlayProgressBarHostWatchedProgressBarSegment",
                    ),
                    ("style", style.as_str()),
                ],
            );
        }
        doc.element(item, "h3", &[("title", spec.title)]);
        if let Some(label) = spec.badge {
            let badges = doc.element(item, "ytd-badge-supported-renderer", &[]);
            let shape = doc.element(badges, "div", &[("class", "yt-badge-shape")]);
            let text = doc.element(shape, "span", &[("class", "yt-badge-shape__text")]);
            doc.set_text(text, label);
        }
        let meta = doc.element(item, "div", &[("class", "metadata-row")]);
        let views = doc.element(meta, "span", &[]);
        doc.set_text(views, "1.2M views");
        if let Some(published) = spec.published {
            let dot = doc.element(meta, "span", &[]);
            doc.set_text(dot, " • ");
            let age = doc.element(meta, "span", &[]);
            doc.set_text(age, published);
        }
        item
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn url(href: &str) -> Url {
        Url::parse(href).unwrap()
    }

    #[test]
    fn query_respects_scope_and_document_order() {
        let mut page = home_page(url(HOME_URL));
        let grid = page.grid;
        let first = add_feed_item(
            &mut page.doc,
            grid,
            &FeedItemSpec {
                title: "first",
                ..FeedItemSpec::default()
            },
        );
        let second = add_feed_item(
            &mut page.doc,
            grid,
            &FeedItemSpec {
                title: "second",
                ..FeedItemSpec::default()
            },
        );
        assert_eq!(
            page.doc.query_all(None, "ytd-rich-item-renderer"),
            vec![first, second]
        );
        let title = page.doc.query(Some(second), "h3[title]").unwrap();
        assert_eq!(page.doc.attribute(title, "title").as_deref(), Some("second"));
        assert!(page.doc.query(Some(first), "ytd-rich-item-renderer").is_none());
    }

    #[test]
    fn removed_subtrees_stop_matching() {
        let mut page = watch_page(url(WATCH_URL), false);
        let player = page.player;
        assert!(page.doc.query(None, "video").is_some());
        page.doc.remove(player);
        assert!(page.doc.query(None, "video").is_none());
        assert!(!page.doc.is_connected(page.video));
        assert_eq!(page.doc.playback_rate(), None);
    }

    #[test]
    fn size_button_click_flips_theater() {
        let mut page = watch_page(url(WATCH_URL), false);
        assert!(page.doc.attribute(page.flexy, "theater").is_none());
        page.doc.click(page.size_button);
        assert_eq!(page.doc.attribute(page.flexy, "theater").as_deref(), Some(""));
        page.doc.click(page.size_button);
        assert!(page.doc.attribute(page.flexy, "theater").is_none());
    }

    #[test]
    fn player_api_can_be_absent() {
        let mut page = watch_page(url(WATCH_URL), false);
        assert_eq!(page.doc.playback_quality().as_deref(), Some("hd1080"));
        page.doc.player_model_mut().unwrap().levels = None;
        assert_eq!(page.doc.available_quality_levels(), None);
        page.doc.player_model_mut().unwrap().settable = false;
        assert!(!page.doc.set_playback_quality("hd720"));
    }

    #[test]
    fn text_content_concatenates_descendants() {
        let mut doc = Document::parse(HOME_URL).unwrap();
        let body = doc.body();
        let outer = doc.element(body, "div", &[]);
        doc.set_text(outer, "a");
        let inner = doc.element(outer, "span", &[]);
        doc.set_text(inner, "b");
        assert_eq!(doc.text_content(outer), "ab");
    }
}
