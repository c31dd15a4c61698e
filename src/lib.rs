#![allow(clippy::uninlined_format_args)]

pub mod config;
pub mod dom;
pub mod engine;
pub mod feed;
pub mod host;
pub mod hotkeys;
pub mod layout;
pub mod logging;
pub mod prefs;
pub mod probe;
pub mod quality;
pub mod selector;
pub mod storage;
pub mod style;
pub mod timers;
pub mod view;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use engine::{Engine, HostEvent, MenuCommand};
