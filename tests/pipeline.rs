//! One full probe-locate-render pass over the platform-independent pipeline,
//! with fakes standing in for the Win32 seams.

use anyhow::Result;
use caret_indicator::locator::{AnchorChain, AnchorSource, CaretRect};
use caret_indicator::monitor::MonitorRect;
use caret_indicator::probe::{probe_input_state, ImeQuery, QueryTarget, CONVERSION_MODE_NATIVE};
use caret_indicator::render::{BadgeRenderer, Compositor, BadgeStyle, RgbaBuffer};
use caret_indicator::state::{InputCategory, Palette};
use std::time::Duration;

/// Foreground app with an open IME composing native text.
struct NativeImeTarget;

impl QueryTarget for NativeImeTarget {
    fn caps_lock_latched(&self) -> bool {
        false
    }

    fn send_query(&self, query: ImeQuery, _timeout: Duration) -> Option<usize> {
        Some(match query {
            ImeQuery::OpenStatus => 1,
            ImeQuery::ConversionMode => CONVERSION_MODE_NATIVE,
        })
    }
}

struct CaretAt(CaretRect);

impl AnchorSource for CaretAt {
    fn name(&self) -> &'static str {
        "caret-fixture"
    }

    fn locate(&mut self) -> Option<CaretRect> {
        Some(self.0)
    }
}

#[derive(Default)]
struct Presented {
    origin: Option<(i32, i32)>,
    frame: Option<RgbaBuffer>,
}

impl Compositor for Presented {
    fn composite(&mut self, origin: (i32, i32), frame: &RgbaBuffer) -> Result<()> {
        self.origin = Some(origin);
        self.frame = Some(frame.clone());
        Ok(())
    }

    fn hide(&mut self) {
        self.origin = None;
        self.frame = None;
    }
}

#[test]
fn native_ime_badge_lands_below_the_caret() {
    let palette = Palette::default();
    let state = probe_input_state(&NativeImeTarget, &palette, Duration::from_millis(50));
    assert_eq!(state.category, InputCategory::NativeIme);

    let monitors = [MonitorRect {
        x: 0,
        y: 0,
        width: 1920,
        height: 1080,
    }];
    let mut chain = AnchorChain::new((0, 2));
    chain.push(Box::new(CaretAt(CaretRect {
        x: 100,
        y: 200,
        height: 16,
    })));
    let anchor = chain.resolve(&monitors).unwrap();
    assert_eq!(anchor, (100, 218));

    let style = BadgeStyle {
        diameter: 12,
        color: state.color,
        glyph: state.glyph,
    };
    let mut out = Presented::default();
    let mut renderer = BadgeRenderer::new();
    assert!(renderer.render(&mut out, anchor, style, 1.0).unwrap());

    assert_eq!(out.origin, Some((100, 218)));
    let frame = out.frame.unwrap();
    assert_eq!((frame.width, frame.height), (12, 12));
    // (1,6) lies inside the circle but left of the centered glyph box, so it
    // carries the native-mode color, fully opaque.
    let rim = frame.pixel(1, 6);
    assert_eq!((rim.r, rim.g, rim.b), (0xff, 0x78, 0x00));
    assert_eq!(rim.a, 255);
    // The glyph itself is stamped in white somewhere inside the circle.
    let has_white = (0..frame.height)
        .flat_map(|y| (0..frame.width).map(move |x| (x, y)))
        .any(|(x, y)| {
            let px = frame.pixel(x, y);
            (px.r, px.g, px.b) == (255, 255, 255)
        });
    assert!(has_white, "glyph pixels missing from the frame");
}

#[test]
fn caret_loss_keeps_the_previous_frame() {
    struct Lost;
    impl AnchorSource for Lost {
        fn name(&self) -> &'static str {
            "lost"
        }
        fn locate(&mut self) -> Option<CaretRect> {
            None
        }
    }

    let monitors = [MonitorRect {
        x: 0,
        y: 0,
        width: 800,
        height: 600,
    }];
    let mut chain = AnchorChain::new((0, 2));
    chain.push(Box::new(Lost));
    // No anchor: the caller skips the frame instead of hiding or moving.
    assert_eq!(chain.resolve(&monitors), None);
}
