use crate::render::Rgba;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputCategory {
    Latin,
    NativeIme,
    CapsLock,
}

/// The badge content derived from one probe cycle. Recomputed fresh every
/// cycle; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputState {
    pub category: InputCategory,
    pub color: Rgba,
    pub glyph: Option<char>,
}

/// Colors and glyphs for the three categories, resolved once from settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub latin_color: Rgba,
    pub latin_glyph: char,
    pub native_color: Rgba,
    pub native_glyph: char,
    pub caps_color: Rgba,
    pub caps_glyph: char,
    pub show_glyph: bool,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            latin_color: Rgba::rgb(0x00, 0x78, 0xff),
            latin_glyph: 'E',
            native_color: Rgba::rgb(0xff, 0x78, 0x00),
            native_glyph: '中',
            caps_color: Rgba::rgb(0x00, 0xc8, 0x00),
            caps_glyph: 'A',
            show_glyph: true,
        }
    }
}

impl Palette {
    pub fn state_for(&self, category: InputCategory) -> InputState {
        let (color, glyph) = match category {
            InputCategory::Latin => (self.latin_color, self.latin_glyph),
            InputCategory::NativeIme => (self.native_color, self.native_glyph),
            InputCategory::CapsLock => (self.caps_color, self.caps_glyph),
        };
        InputState {
            category,
            color,
            glyph: self.show_glyph.then_some(glyph),
        }
    }
}

/// Category precedence: Caps Lock beats everything, including an open IME in
/// native conversion mode. A closed IME or an alphanumeric conversion mode
/// both mean Latin.
pub fn classify(caps_latched: bool, ime_open: bool, conversion_native: bool) -> InputCategory {
    if caps_latched {
        InputCategory::CapsLock
    } else if ime_open && conversion_native {
        InputCategory::NativeIme
    } else {
        InputCategory::Latin
    }
}

#[cfg(test)]
mod tests {
    use super::{classify, InputCategory, Palette};

    #[test]
    fn caps_lock_short_circuits_every_ime_combination() {
        for ime_open in [false, true] {
            for native in [false, true] {
                assert_eq!(classify(true, ime_open, native), InputCategory::CapsLock);
            }
        }
    }

    #[test]
    fn native_mode_requires_open_ime() {
        assert_eq!(classify(false, true, true), InputCategory::NativeIme);
        assert_eq!(classify(false, false, true), InputCategory::Latin);
        assert_eq!(classify(false, true, false), InputCategory::Latin);
        assert_eq!(classify(false, false, false), InputCategory::Latin);
    }

    #[test]
    fn palette_suppresses_glyphs_when_disabled() {
        let mut palette = Palette::default();
        assert_eq!(palette.state_for(InputCategory::CapsLock).glyph, Some('A'));
        palette.show_glyph = false;
        assert_eq!(palette.state_for(InputCategory::CapsLock).glyph, None);
    }
}
