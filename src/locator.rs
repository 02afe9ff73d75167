use crate::monitor::{monitor_containing, MonitorRect};

/// A caret rectangle reported by one locator strategy, in screen coordinates.
/// The badge anchors at the bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaretRect {
    pub x: i32,
    pub y: i32,
    pub height: i32,
}

impl CaretRect {
    pub fn anchor(&self, offset: (i32, i32)) -> (i32, i32) {
        (self.x + offset.0, self.y + self.height + offset.1)
    }
}

/// One strategy for locating the caret. Strategies are tried in order; `None`
/// falls through to the next one.
pub trait AnchorSource {
    fn name(&self) -> &'static str;
    fn locate(&mut self) -> Option<CaretRect>;
}

/// Ordered chain of locator strategies. The production chain ends with the
/// pointer position, which only fails if the cursor itself cannot be read, so
/// resolving effectively never fails.
pub struct AnchorChain {
    sources: Vec<Box<dyn AnchorSource>>,
    offset: (i32, i32),
}

impl AnchorChain {
    pub fn new(offset: (i32, i32)) -> Self {
        Self {
            sources: Vec::new(),
            offset,
        }
    }

    pub fn push(&mut self, source: Box<dyn AnchorSource>) {
        self.sources.push(source);
    }

    /// Resolve the on-screen anchor point. A candidate is accepted only when
    /// it lies on a known monitor (stale caret rectangles from minimized
    /// windows resolve to nonsense coordinates); accepted points are clamped
    /// to that monitor's work area. With no monitor information at all the
    /// containment check is waived rather than rejecting every candidate.
    pub fn resolve(&mut self, monitors: &[MonitorRect]) -> Option<(i32, i32)> {
        for source in &mut self.sources {
            let Some(rect) = source.locate() else {
                continue;
            };
            let candidate = rect.anchor(self.offset);
            if monitors.is_empty() {
                return Some(candidate);
            }
            match monitor_containing(monitors, candidate) {
                Some(monitor) => return Some(monitor.clamp(candidate)),
                None => {
                    tracing::trace!(
                        source = source.name(),
                        ?candidate,
                        "anchor candidate off every monitor, trying next strategy"
                    );
                }
            }
        }
        None
    }
}

/// The default strategy order: accessibility text range, legacy GUI-thread
/// caret, IME composition window, then the mouse pointer.
#[cfg(windows)]
pub fn default_chain(offset: (i32, i32)) -> AnchorChain {
    let mut chain = AnchorChain::new(offset);
    chain.push(Box::new(platform::UiaCaretSource::new()));
    chain.push(Box::new(platform::GuiThreadCaretSource));
    chain.push(Box::new(platform::ImeCompositionSource));
    chain.push(Box::new(platform::PointerSource));
    chain
}

#[cfg(windows)]
mod platform {
    use super::{AnchorSource, CaretRect};
    use windows::core::Interface;
    use windows::Win32::Foundation::{BOOL, POINT};
    use windows::Win32::Graphics::Gdi::ClientToScreen;
    use windows::Win32::System::Com::{
        CoCreateInstance, CoInitializeEx, CLSCTX_ALL, COINIT_MULTITHREADED,
    };
    use windows::Win32::System::Ole::{
        SafeArrayAccessData, SafeArrayDestroy, SafeArrayGetLBound, SafeArrayGetUBound,
        SafeArrayUnaccessData,
    };
    use windows::Win32::UI::Accessibility::{
        CUIAutomation, IUIAutomation, IUIAutomationTextPattern2, IUIAutomationTextRange,
        TextUnit_Character, UIA_TextPattern2Id,
    };
    use windows::Win32::UI::Input::Ime::{
        ImmGetCompositionWindow, ImmGetContext, ImmReleaseContext, CFS_POINT, COMPOSITIONFORM,
    };
    use windows::Win32::UI::WindowsAndMessaging::{
        GetCursorPos, GetForegroundWindow, GetGUIThreadInfo, GUITHREADINFO,
    };

    /// UI Automation caret range query. Works across frameworks that expose
    /// TextPattern2 (editors, browsers) where the legacy caret API reports
    /// nothing.
    pub struct UiaCaretSource {
        automation: Option<IUIAutomation>,
    }

    impl UiaCaretSource {
        pub fn new() -> Self {
            let automation = unsafe {
                // COM may already be initialized on this thread; that is fine.
                let _ = CoInitializeEx(None, COINIT_MULTITHREADED);
                CoCreateInstance(&CUIAutomation, None, CLSCTX_ALL)
                    .map_err(|err| {
                        tracing::warn!(?err, "ui automation unavailable, strategy disabled");
                        err
                    })
                    .ok()
            };
            Self { automation }
        }

        unsafe fn first_bounding_rect(range: &IUIAutomationTextRange) -> Option<CaretRect> {
            let rects = range.GetBoundingRectangles().ok()?;
            if rects.is_null() {
                return None;
            }
            let lower = SafeArrayGetLBound(&*rects, 1).ok()?;
            let upper = SafeArrayGetUBound(&*rects, 1).ok()?;
            let count = (upper - lower + 1) as usize;
            let mut result = None;
            if count >= 4 {
                let mut data: *mut std::ffi::c_void = std::ptr::null_mut();
                if SafeArrayAccessData(&*rects, &mut data).is_ok() {
                    // Each rectangle is four doubles: left, top, width, height.
                    let doubles = std::slice::from_raw_parts(data as *const f64, count);
                    result = Some(CaretRect {
                        x: doubles[0] as i32,
                        y: doubles[1] as i32,
                        height: doubles[3] as i32,
                    });
                    let _ = SafeArrayUnaccessData(&*rects);
                }
            }
            let _ = SafeArrayDestroy(rects);
            result
        }
    }

    impl AnchorSource for UiaCaretSource {
        fn name(&self) -> &'static str {
            "uia-caret-range"
        }

        fn locate(&mut self) -> Option<CaretRect> {
            let automation = self.automation.as_ref()?;
            unsafe {
                let focused = automation.GetFocusedElement().ok()?;
                let pattern = focused.GetCurrentPattern(UIA_TextPattern2Id).ok()?;
                let text: IUIAutomationTextPattern2 = pattern.cast().ok()?;
                let mut active = BOOL::default();
                let range = text.GetCaretRange(&mut active).ok()?;

                if let Some(rect) = Self::first_bounding_rect(&range) {
                    return Some(rect);
                }
                // A degenerate caret range has no rectangles; widening it to
                // the enclosing character usually produces one.
                range.ExpandToEnclosingUnit(TextUnit_Character).ok()?;
                Self::first_bounding_rect(&range)
            }
        }
    }

    /// Legacy Win32 caret query. Covers classic controls (edit boxes,
    /// Notepad) that still maintain a system caret.
    pub struct GuiThreadCaretSource;

    impl AnchorSource for GuiThreadCaretSource {
        fn name(&self) -> &'static str {
            "gui-thread-caret"
        }

        fn locate(&mut self) -> Option<CaretRect> {
            unsafe {
                let mut info = GUITHREADINFO {
                    cbSize: std::mem::size_of::<GUITHREADINFO>() as u32,
                    ..Default::default()
                };
                GetGUIThreadInfo(0, &mut info).ok()?;
                if info.hwndCaret.0.is_null() {
                    return None;
                }
                let rc = info.rcCaret;
                // Windows without a live caret report an empty or zeroed rect.
                if rc.bottom <= rc.top || (rc.left == 0 && rc.top == 0 && rc.bottom == 0) {
                    return None;
                }
                let mut pt = POINT {
                    x: rc.left,
                    y: rc.top,
                };
                let _ = ClientToScreen(info.hwndCaret, &mut pt);
                Some(CaretRect {
                    x: pt.x,
                    y: pt.y,
                    height: rc.bottom - rc.top,
                })
            }
        }
    }

    /// Position of the IME composition window, for applications that place it
    /// at the caret but expose neither a system caret nor TextPattern2.
    pub struct ImeCompositionSource;

    impl AnchorSource for ImeCompositionSource {
        fn name(&self) -> &'static str {
            "ime-composition"
        }

        fn locate(&mut self) -> Option<CaretRect> {
            unsafe {
                let hwnd = GetForegroundWindow();
                if hwnd.0.is_null() {
                    return None;
                }
                let himc = ImmGetContext(hwnd);
                if himc.0.is_null() {
                    return None;
                }
                let mut form = COMPOSITIONFORM::default();
                let mut rect = None;
                if ImmGetCompositionWindow(himc, &mut form).as_bool()
                    && (form.dwStyle & CFS_POINT) != 0
                {
                    let mut pt = POINT {
                        x: form.ptCurrentPos.x,
                        y: form.ptCurrentPos.y,
                    };
                    let _ = ClientToScreen(hwnd, &mut pt);
                    rect = Some(CaretRect {
                        x: pt.x,
                        y: pt.y,
                        height: 20,
                    });
                }
                let _ = ImmReleaseContext(hwnd, himc);
                rect
            }
        }
    }

    /// Terminal fallback: the mouse pointer, nudged down-right so the badge
    /// does not sit under the pointer itself.
    pub struct PointerSource;

    const POINTER_NUDGE: (i32, i32) = (2, 18);

    impl AnchorSource for PointerSource {
        fn name(&self) -> &'static str {
            "pointer"
        }

        fn locate(&mut self) -> Option<CaretRect> {
            let mut pt = POINT::default();
            unsafe { GetCursorPos(&mut pt).ok()? };
            Some(CaretRect {
                x: pt.x + POINTER_NUDGE.0,
                y: pt.y + POINTER_NUDGE.1,
                height: 0,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AnchorChain, AnchorSource, CaretRect};
    use crate::monitor::MonitorRect;

    struct FixedSource {
        rect: Option<CaretRect>,
    }

    impl FixedSource {
        fn some(x: i32, y: i32, height: i32) -> Self {
            Self {
                rect: Some(CaretRect { x, y, height }),
            }
        }

        fn none() -> Self {
            Self { rect: None }
        }
    }

    impl AnchorSource for FixedSource {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn locate(&mut self) -> Option<CaretRect> {
            self.rect
        }
    }

    fn monitors() -> Vec<MonitorRect> {
        vec![MonitorRect {
            x: 0,
            y: 0,
            width: 1920,
            height: 1080,
        }]
    }

    #[test]
    fn first_successful_source_wins() {
        let mut chain = AnchorChain::new((2, 2));
        chain.push(Box::new(FixedSource::some(100, 200, 16)));
        chain.push(Box::new(FixedSource::some(500, 500, 16)));
        // Anchor is the bottom-left of the rect plus the configured offset.
        assert_eq!(chain.resolve(&monitors()), Some((102, 218)));
    }

    #[test]
    fn failing_sources_fall_through() {
        let mut chain = AnchorChain::new((0, 0));
        chain.push(Box::new(FixedSource::none()));
        chain.push(Box::new(FixedSource::none()));
        chain.push(Box::new(FixedSource::some(30, 40, 10)));
        assert_eq!(chain.resolve(&monitors()), Some((30, 50)));
    }

    #[test]
    fn off_monitor_candidates_are_rejected() {
        let mut chain = AnchorChain::new((0, 0));
        // Stale rect from a minimized window: far outside any monitor.
        chain.push(Box::new(FixedSource::some(-32000, -32000, 16)));
        chain.push(Box::new(FixedSource::some(50, 60, 12)));
        assert_eq!(chain.resolve(&monitors()), Some((50, 72)));
    }

    #[test]
    fn accepted_points_are_clamped_to_the_work_area() {
        let mut chain = AnchorChain::new((0, 0));
        chain.push(Box::new(FixedSource::some(1915, 1070, 8)));
        assert_eq!(chain.resolve(&monitors()), Some((1915, 1078)));
    }

    #[test]
    fn empty_monitor_list_waives_containment() {
        let mut chain = AnchorChain::new((1, 1));
        chain.push(Box::new(FixedSource::some(10, 20, 5)));
        assert_eq!(chain.resolve(&[]), Some((11, 26)));
    }

    #[test]
    fn exhausted_chain_yields_none() {
        let mut chain = AnchorChain::new((0, 0));
        chain.push(Box::new(FixedSource::none()));
        assert_eq!(chain.resolve(&monitors()), None);
    }
}
