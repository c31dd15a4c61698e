//! Recommendation feed filtering.
//!
//! Each feed item is examined once. The verdict is written back as a
//! `data-yt-filtered` mark (`"1"` hidden, `"0"` kept) and marked items are
//! skipped on later passes, so re-running after every DOM mutation only
//! touches newly rendered items.

use tracing::{debug, info};

use crate::host::{Host, NodeId};
use crate::prefs::Preferences;
use crate::probe;
use crate::style;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Home,
    Related,
}

impl Surface {
    pub fn item_selector(self) -> &'static str {
        match self {
            Surface::Home => "ytd-rich-item-renderer",
            Surface::Related => "ytd-compact-video-renderer",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSettings {
    pub enabled: bool,
    pub home: bool,
    pub related: bool,
    pub members_only: bool,
    pub keywords_enabled: bool,
    pub keywords: Vec<String>,
    pub progress: bool,
    pub progress_threshold: u32,
    pub publish: bool,
    pub publish_threshold: u32,
    pub members_labels: Vec<String>,
}

impl FilterSettings {
    pub fn from_prefs(prefs: &Preferences) -> Self {
        Self {
            enabled: prefs.filter_enabled(),
            home: prefs.filter_home(),
            related: prefs.filter_related(),
            members_only: prefs.filter_members_only(),
            keywords_enabled: prefs.filter_keywords(),
            keywords: prefs.keywords(),
            progress: prefs.filter_progress(),
            progress_threshold: prefs.progress_threshold(),
            publish: prefs.filter_publish(),
            publish_threshold: prefs.publish_threshold(),
            members_labels: prefs.members_labels().to_vec(),
        }
    }

    /// Surfaces a pass should scan; empty when filtering is off.
    pub fn active_surfaces(&self) -> Vec<Surface> {
        if !self.enabled {
            return Vec::new();
        }
        let mut surfaces = Vec::new();
        if self.home || self.publish {
            surfaces.push(Surface::Home);
        }
        if self.related {
            surfaces.push(Surface::Related);
        }
        surfaces
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedItem {
    pub title: String,
    pub members_only: bool,
    pub watched_percent: f64,
    pub publish_age_months: u32,
}

impl FeedItem {
    pub fn read<H: Host + ?Sized>(host: &H, item: NodeId, settings: &FilterSettings) -> Self {
        Self {
            title: probe::item_title(host, item),
            members_only: settings.members_only
                && probe::is_members_only(host, item, &settings.members_labels),
            watched_percent: probe::watched_percent(host, item),
            publish_age_months: probe::publish_age_months(host, item),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Verdict {
    pub members_only: bool,
    pub keyword: bool,
    pub progress: bool,
    pub publish: bool,
}

impl Verdict {
    pub fn hidden(&self) -> bool {
        self.members_only || self.keyword || self.progress || self.publish
    }
}

pub fn classify(item: &FeedItem, settings: &FilterSettings) -> Verdict {
    let title = item.title.to_lowercase();
    Verdict {
        members_only: settings.members_only && item.members_only,
        keyword: settings.keywords_enabled
            && settings
                .keywords
                .iter()
                .any(|word| title.contains(&word.to_lowercase())),
        progress: settings.progress
            && item.watched_percent >= f64::from(settings.progress_threshold),
        publish: settings.publish && item.publish_age_months >= settings.publish_threshold,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterReport {
    pub examined: usize,
    pub hidden: usize,
}

/// One filtering pass over unmarked items of every active surface.
pub fn evaluate_and_filter_feed<H: Host + ?Sized>(host: &mut H, prefs: &Preferences) -> FilterReport {
    let settings = FilterSettings::from_prefs(prefs);
    let mut report = FilterReport::default();
    for surface in settings.active_surfaces() {
        let selector = format!("{}:not([{}])", surface.item_selector(), probe::FILTER_MARK);
        for item in host.query_all(None, &selector) {
            let facts = FeedItem::read(host, item, &settings);
            let verdict = classify(&facts, &settings);
            report.examined += 1;
            if verdict.hidden() {
                style::set_property(host, item, "display", "none");
                host.set_attribute(item, probe::FILTER_MARK, "1");
                report.hidden += 1;
                info!(title = facts.title.as_str(), ?verdict, "feed item hidden");
            } else {
                host.set_attribute(item, probe::FILTER_MARK, "0");
            }
        }
    }
    report
}

/// Tracks the single node the feed observer is attached to.
#[derive(Debug, Default)]
pub struct FeedFilter {
    observed: Option<NodeId>,
    hidden_total: usize,
}

impl FeedFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches to `ytd-page-manager` unless already attached to the same
    /// node, then runs an eager pass.
    pub fn setup<H: Host + ?Sized>(&mut self, host: &mut H, prefs: &Preferences) -> FilterReport {
        let Some(target) = host.query(None, probe::PAGE_MANAGER) else {
            debug!("page manager missing; feed filter not attached");
            return FilterReport::default();
        };
        if self.observed != Some(target) {
            debug!(?target, "feed observer attached");
            self.observed = Some(target);
        }
        self.run(host, prefs)
    }

    pub fn is_observing<H: Host + ?Sized>(&self, host: &H) -> bool {
        self.observed.is_some_and(|node| host.is_connected(node))
    }

    pub fn observed(&self) -> Option<NodeId> {
        self.observed
    }

    /// Mutation callback; a no-op until [`FeedFilter::setup`] found a target.
    pub fn on_mutation<H: Host + ?Sized>(&mut self, host: &mut H, prefs: &Preferences) -> FilterReport {
        if !self.is_observing(host) {
            return FilterReport::default();
        }
        self.run(host, prefs)
    }

    pub fn hidden_total(&self) -> usize {
        self.hidden_total
    }

    fn run<H: Host + ?Sized>(&mut self, host: &mut H, prefs: &Preferences) -> FilterReport {
        let report = evaluate_and_filter_feed(host, prefs);
        self.hidden_total += report.hidden;
        report
    }
}
