pub mod events;
pub mod glyph;
pub mod locator;
pub mod logging;
pub mod monitor;
pub mod overlay;
pub mod probe;
pub mod render;
pub mod service;
pub mod settings;
pub mod state;
pub mod tray;
#[cfg(windows)]
pub mod win_util;
