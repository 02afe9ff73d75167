use crate::render::Rgba;
use crate::state::Palette;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
    /// Badge diameter in logical pixels (scaled by the display DPI factor).
    #[serde(default = "default_badge_size")]
    pub badge_size: u32,
    /// Offset from the caret's bottom-left corner to the badge anchor.
    #[serde(default = "default_offset")]
    pub offset: (i32, i32),
    /// Colors as "#RRGGBB" or "#RRGGBBAA" hex strings.
    #[serde(default = "default_latin_color")]
    pub latin_color: String,
    #[serde(default = "default_native_color")]
    pub native_color: String,
    #[serde(default = "default_caps_color")]
    pub caps_color: String,
    /// Draw a one-character glyph on top of the colored circle.
    #[serde(default = "default_show_glyph")]
    pub show_glyph: bool,
    /// Show the badge in plain Latin state too. When `false` the badge only
    /// appears for native IME mode and Caps Lock.
    #[serde(default = "default_show_latin")]
    pub show_latin: bool,
    /// Poll period of the event loop in milliseconds. Accessibility events
    /// wake the loop earlier; the poll covers transitions that fire no event.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Upper bound for each cross-process IME state query.
    #[serde(default = "default_ime_timeout_ms")]
    pub ime_timeout_ms: u64,
    /// When enabled the application initialises the logger at debug level.
    #[serde(default)]
    pub debug_logging: bool,
}

fn default_badge_size() -> u32 {
    12
}

fn default_offset() -> (i32, i32) {
    (0, 2)
}

fn default_latin_color() -> String {
    "#0078FF".into()
}

fn default_native_color() -> String {
    "#FF7800".into()
}

fn default_caps_color() -> String {
    "#00C800".into()
}

fn default_show_glyph() -> bool {
    true
}

fn default_show_latin() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    15
}

fn default_ime_timeout_ms() -> u64 {
    50
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            badge_size: default_badge_size(),
            offset: default_offset(),
            latin_color: default_latin_color(),
            native_color: default_native_color(),
            caps_color: default_caps_color(),
            show_glyph: true,
            show_latin: true,
            poll_interval_ms: default_poll_interval_ms(),
            ime_timeout_ms: default_ime_timeout_ms(),
            debug_logging: false,
        }
    }
}

impl Settings {
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn palette(&self) -> Palette {
        let defaults = Palette::default();
        Palette {
            latin_color: parse_color(&self.latin_color).unwrap_or(defaults.latin_color),
            native_color: parse_color(&self.native_color).unwrap_or(defaults.native_color),
            caps_color: parse_color(&self.caps_color).unwrap_or(defaults.caps_color),
            show_glyph: self.show_glyph,
            ..defaults
        }
    }

    /// Badge diameter bounded to a drawable range, whatever the file says.
    pub fn badge_diameter(&self) -> u32 {
        self.badge_size.clamp(4, 256)
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn ime_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.ime_timeout_ms.clamp(10, 500))
    }
}

/// Resolve the settings file location, preferring the user configuration
/// directory and falling back next to the executable.
pub fn settings_path() -> PathBuf {
    if let Some(dir) = dirs_next::config_dir() {
        return dir.join("caret-indicator").join("settings.json");
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.join("settings.json")))
        .unwrap_or_else(|| PathBuf::from("settings.json"))
}

/// Parse "#RRGGBB" (alpha defaults to opaque) or "#RRGGBBAA".
pub fn parse_color(value: &str) -> Option<Rgba> {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 && hex.len() != 8 {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    Some(Rgba {
        r: channel(0..2)?,
        g: channel(2..4)?,
        b: channel(4..6)?,
        a: if hex.len() == 8 { channel(6..8)? } else { 255 },
    })
}

#[cfg(test)]
mod tests {
    use super::{parse_color, Settings};
    use crate::render::Rgba;

    #[test]
    fn parses_six_and_eight_digit_colors() {
        assert_eq!(parse_color("#FF7800"), Some(Rgba::rgb(0xff, 0x78, 0x00)));
        assert_eq!(
            parse_color("00C800A0"),
            Some(Rgba {
                r: 0,
                g: 0xc8,
                b: 0,
                a: 0xa0
            })
        );
        assert_eq!(parse_color("#12345"), None);
        assert_eq!(parse_color("not-a-color"), None);
    }

    #[test]
    fn invalid_colors_fall_back_to_palette_defaults() {
        let settings = Settings {
            latin_color: "garbage".into(),
            ..Settings::default()
        };
        let palette = settings.palette();
        assert_eq!(palette.latin_color, Rgba::rgb(0x00, 0x78, 0xff));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let settings: Settings = serde_json::from_str("{\"badge_size\": 20}").unwrap();
        assert_eq!(settings.badge_size, 20);
        assert_eq!(settings.poll_interval_ms, 15);
        assert!(settings.show_latin);
    }

    #[test]
    fn badge_diameter_is_clamped_to_a_drawable_range() {
        // An absurd configured size must never reach the rasterizer; it would
        // ask for a multi-gigabyte frame.
        let settings = Settings {
            badge_size: 70_000,
            ..Settings::default()
        };
        assert_eq!(settings.badge_diameter(), 256);
        let settings = Settings {
            badge_size: 0,
            ..Settings::default()
        };
        assert_eq!(settings.badge_diameter(), 4);
        assert_eq!(Settings::default().badge_diameter(), 12);
    }

    #[test]
    fn timeout_is_clamped_to_a_sane_range() {
        let settings = Settings {
            ime_timeout_ms: 0,
            ..Settings::default()
        };
        assert_eq!(settings.ime_timeout().as_millis(), 10);
        let settings = Settings {
            ime_timeout_ms: 60_000,
            ..Settings::default()
        };
        assert_eq!(settings.ime_timeout().as_millis(), 500);
    }
}
