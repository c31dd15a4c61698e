//! Home grid density: items per row, plus the on-page slider.

use tracing::debug;

use crate::host::{Host, SettingsUi};
use crate::prefs::Preferences;
use crate::probe::PageKind;

pub const COLUMNS_STYLE_ID: &str = "yt-custom-columns-style";

pub fn columns_css(columns: u32) -> String {
    format!("ytd-rich-grid-renderer {{ --ytd-rich-grid-items-per-row: {columns} !important; }}")
}

/// Creates or refreshes the columns style tag when the feature is on and
/// removes it when off.
pub fn apply_columns_style<H: Host + ?Sized>(host: &mut H, prefs: &Preferences) {
    let existing = host.query(None, &format!("#{COLUMNS_STYLE_ID}"));
    if !prefs.columns_enabled() {
        if let Some(tag) = existing {
            host.remove(tag);
        }
        return;
    }
    let tag = match existing {
        Some(tag) => tag,
        None => {
            let Some(head) = host.query(None, "head") else {
                debug!("document head missing; columns style skipped");
                return;
            };
            let tag = host.create_element(head, "style");
            host.set_attribute(tag, "id", COLUMNS_STYLE_ID);
            tag
        }
    };
    let css = columns_css(prefs.columns());
    if host.text_content(tag) != css {
        host.set_text_content(tag, &css);
    }
}

pub fn disable_columns<H: Host + ?Sized, U: SettingsUi + ?Sized>(host: &mut H, ui: &mut U) {
    ui.hide_column_slider();
    if let Some(tag) = host.query(None, &format!("#{COLUMNS_STYLE_ID}")) {
        host.remove(tag);
    }
}

/// Route-aware density pass run on every apply-all.
pub fn apply_layout<H: Host + ?Sized, U: SettingsUi + ?Sized>(
    host: &mut H,
    ui: &mut U,
    prefs: &Preferences,
    page: PageKind,
) {
    if page == PageKind::Home {
        apply_columns_style(host, prefs);
        if prefs.columns_enabled() && prefs.slider_visible() {
            ui.show_column_slider(prefs.columns());
        } else {
            ui.hide_column_slider();
        }
    } else if !prefs.slider_visible() {
        ui.hide_column_slider();
    }
}

/// Slider callback: stores the clamped value and restyles the grid.
pub fn set_columns<H: Host + ?Sized>(host: &mut H, prefs: &Preferences, columns: i64) -> anyhow::Result<u32> {
    let stored = prefs.set_columns(columns)?;
    apply_columns_style(host, prefs);
    Ok(stored)
}
