use crate::glyph::glyph_mask;
use anyhow::Result;

/// Position hysteresis in pixels. Caret coordinates reported by the
/// accessibility layer jitter by a pixel or two between queries; re-compositing
/// for those is wasted work at high poll rates.
pub const POSITION_HYSTERESIS: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Self = Self {
        r: 255,
        g: 255,
        b: 255,
        a: 255,
    };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Channel floor for fill colors: the opaque-alpha pass keys on non-zero
    /// color channels, so a pure-black fill would vanish entirely.
    fn visible(self) -> Self {
        if self.r == 0 && self.g == 0 && self.b == 0 {
            Self {
                r: 1,
                g: 1,
                b: 1,
                a: self.a,
            }
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RgbaBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0u8; width as usize * height as usize * 4],
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba {
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        Rgba {
            r: self.pixels[idx],
            g: self.pixels[idx + 1],
            b: self.pixels[idx + 2],
            a: self.pixels[idx + 3],
        }
    }

    fn set_rgb(&mut self, x: u32, y: u32, color: Rgba) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        self.pixels[idx] = color.r;
        self.pixels[idx + 1] = color.g;
        self.pixels[idx + 2] = color.b;
        // Alpha is intentionally left untouched here. Software rasterization
        // into a premultiplied surface does not produce a usable alpha channel
        // as a side effect of filling; `force_opaque_alpha` runs as an explicit
        // post-pass instead.
    }
}

/// Visual description of one badge frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadgeStyle {
    /// Logical diameter in pixels at DPI scale 1.0.
    pub diameter: u32,
    pub color: Rgba,
    pub glyph: Option<char>,
}

/// Physical (pixel) diameter of a badge at the given DPI scale.
pub fn scaled_diameter(logical: u32, dpi_scale: f32) -> u32 {
    ((logical as f32) * dpi_scale).round().max(1.0) as u32
}

/// Rasterize a badge into a fresh transparent buffer: a filled circle in the
/// state color with the optional glyph centered in white.
pub fn rasterize_badge(style: BadgeStyle, dpi_scale: f32) -> RgbaBuffer {
    let size = scaled_diameter(style.diameter, dpi_scale);
    let mut frame = RgbaBuffer::new(size, size);
    let fill = style.color.visible();

    let center = (size as f32 - 1.0) / 2.0;
    let radius = size as f32 / 2.0;
    let radius_sq = radius * radius;
    for y in 0..size {
        for x in 0..size {
            let dx = x as f32 - center;
            let dy = y as f32 - center;
            if dx * dx + dy * dy <= radius_sq {
                frame.set_rgb(x, y, fill);
            }
        }
    }

    if let Some(glyph) = style.glyph {
        draw_glyph(&mut frame, glyph, size);
    }

    force_opaque_alpha(&mut frame);
    frame
}

/// Scale the 8x8 glyph mask to roughly 70% of the badge and stamp it centered
/// in white, nearest-neighbor. The glyph grows with the badge, so DPI scaling
/// of the badge scales the glyph proportionally.
fn draw_glyph(frame: &mut RgbaBuffer, glyph: char, badge_size: u32) {
    let Some(mask) = glyph_mask(glyph) else {
        tracing::debug!(%glyph, "no embedded mask for glyph, drawing circle only");
        return;
    };

    let cell = (badge_size * 7 / 10).max(1);
    let origin = (badge_size - cell) / 2;
    for ty in 0..cell {
        for tx in 0..cell {
            let mx = (tx * 8 / cell).min(7);
            let my = (ty * 8 / cell).min(7);
            if mask[my as usize] & (0x80 >> mx) != 0 {
                frame.set_rgb(origin + tx, origin + ty, Rgba::WHITE);
            }
        }
    }
}

/// Force every drawn pixel fully opaque. Filling through a DC-style surface
/// leaves alpha at zero, which a per-pixel-alpha composite would treat as
/// fully transparent; without this pass the badge never becomes visible.
pub fn force_opaque_alpha(frame: &mut RgbaBuffer) {
    for px in frame.pixels.chunks_exact_mut(4) {
        if px[0] != 0 || px[1] != 0 || px[2] != 0 {
            px[3] = 255;
        }
    }
}

/// Destination for finished frames. The production implementation composites
/// onto the layered overlay window; tests substitute a recording stub.
pub trait Compositor {
    fn composite(&mut self, origin: (i32, i32), frame: &RgbaBuffer) -> Result<()>;
    fn hide(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct RenderCache {
    point: (i32, i32),
    style: BadgeStyle,
    dpi_scale: f32,
}

/// Renders badges through a [`Compositor`], skipping composites that would be
/// imperceptible against the previously presented frame.
pub struct BadgeRenderer {
    cache: Option<RenderCache>,
}

impl BadgeRenderer {
    pub fn new() -> Self {
        Self { cache: None }
    }

    /// Returns `true` when a composite was performed, `false` when the frame
    /// was absorbed by the cache. A failed composite leaves the cache
    /// untouched so the next cycle retries from scratch.
    pub fn render(
        &mut self,
        compositor: &mut dyn Compositor,
        point: (i32, i32),
        style: BadgeStyle,
        dpi_scale: f32,
    ) -> Result<bool> {
        if let Some(cache) = self.cache {
            let dx = (point.0 - cache.point.0).abs();
            let dy = (point.1 - cache.point.1).abs();
            if dx <= POSITION_HYSTERESIS
                && dy <= POSITION_HYSTERESIS
                && cache.style == style
                && cache.dpi_scale == dpi_scale
            {
                return Ok(false);
            }
        }

        let frame = rasterize_badge(style, dpi_scale);
        compositor.composite(point, &frame)?;
        self.cache = Some(RenderCache {
            point,
            style,
            dpi_scale,
        });
        Ok(true)
    }

    /// Hide the badge and forget the presented frame so the next render
    /// composites unconditionally.
    pub fn hide(&mut self, compositor: &mut dyn Compositor) {
        compositor.hide();
        self.cache = None;
    }
}

impl Default for BadgeRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        force_opaque_alpha, rasterize_badge, scaled_diameter, BadgeStyle, Rgba, RgbaBuffer,
    };

    fn style(diameter: u32, glyph: Option<char>) -> BadgeStyle {
        BadgeStyle {
            diameter,
            color: Rgba::rgb(0xff, 0x78, 0x00),
            glyph,
        }
    }

    #[test]
    fn drawn_pixels_are_opaque_and_background_stays_transparent() {
        let frame = rasterize_badge(style(12, Some('A')), 1.0);
        for y in 0..frame.height {
            for x in 0..frame.width {
                let px = frame.pixel(x, y);
                if px.r != 0 || px.g != 0 || px.b != 0 {
                    assert_eq!(px.a, 255, "drawn pixel ({x},{y}) must be opaque");
                } else {
                    assert_eq!(px.a, 0, "untouched pixel ({x},{y}) must stay clear");
                }
            }
        }
        // Corners lie outside the circle.
        assert_eq!(frame.pixel(0, 0).a, 0);
        // The center is inside it.
        assert_eq!(frame.pixel(6, 6).a, 255);
    }

    #[test]
    fn alpha_pass_only_touches_drawn_pixels() {
        let mut buf = RgbaBuffer::new(2, 1);
        buf.pixels[0..4].copy_from_slice(&[10, 0, 0, 0]);
        force_opaque_alpha(&mut buf);
        assert_eq!(buf.pixel(0, 0).a, 255);
        assert_eq!(buf.pixel(1, 0).a, 0);
    }

    #[test]
    fn dpi_scale_doubles_pixel_dimensions() {
        let base = rasterize_badge(style(12, Some('A')), 1.0);
        let scaled = rasterize_badge(style(12, Some('A')), 2.0);
        assert_eq!(base.width, 12);
        assert_eq!(scaled.width, 24);
        assert_eq!(scaled.height, base.height * 2);
        assert_eq!(scaled_diameter(15, 1.5), 23);
    }

    #[test]
    fn glyph_is_stamped_in_white_inside_the_circle() {
        let plain = rasterize_badge(style(24, None), 1.0);
        let lettered = rasterize_badge(style(24, Some('A')), 1.0);
        assert_ne!(plain, lettered);
        let white = (0..24 * 24)
            .filter(|i| lettered.pixel(i % 24, i / 24) == Rgba::WHITE)
            .count();
        assert!(white > 0, "glyph must contribute white pixels");
    }

    #[test]
    fn pure_black_badges_stay_visible() {
        let frame = rasterize_badge(
            BadgeStyle {
                diameter: 12,
                color: Rgba::rgb(0, 0, 0),
                glyph: None,
            },
            1.0,
        );
        let center = frame.pixel(6, 6);
        assert_eq!(center.a, 255, "black fill must survive the alpha pass");
        assert_eq!((center.r, center.g, center.b), (1, 1, 1));
    }

    #[test]
    fn unknown_glyph_falls_back_to_plain_circle() {
        let plain = rasterize_badge(style(16, None), 1.0);
        let unknown = rasterize_badge(style(16, Some('?')), 1.0);
        assert_eq!(plain, unknown);
    }
}
