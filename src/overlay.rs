use crate::render::{Compositor, RgbaBuffer};
use anyhow::Result;

/// Click-through, never-activated badge window. Presenting goes through
/// `UpdateLayeredWindow` with per-pixel alpha, so the window needs no paint
/// handling of its own. On non-Windows builds this is an inert stub that keeps
/// the rendering pipeline compilable and testable.
#[derive(Debug)]
pub struct OverlaySurface {
    #[cfg(windows)]
    window: platform::LayeredWindow,
}

impl OverlaySurface {
    pub fn new() -> Result<Self> {
        Ok(Self {
            #[cfg(windows)]
            window: platform::LayeredWindow::create()?,
        })
    }

    /// DPI scale factor of the display hosting the overlay, 1.0 at 96 dpi.
    pub fn dpi_scale(&self) -> f32 {
        #[cfg(windows)]
        {
            self.window.dpi_scale()
        }

        #[cfg(not(windows))]
        {
            1.0
        }
    }
}

impl Compositor for OverlaySurface {
    fn composite(&mut self, origin: (i32, i32), frame: &RgbaBuffer) -> Result<()> {
        #[cfg(windows)]
        {
            self.window.present(origin, frame)
        }

        #[cfg(not(windows))]
        {
            let _ = (origin, frame);
            Ok(())
        }
    }

    fn hide(&mut self) {
        #[cfg(windows)]
        self.window.hide();
    }
}

#[cfg(windows)]
mod platform {
    use crate::render::RgbaBuffer;
    use crate::win_util::widestring;
    use anyhow::Result;
    use std::mem;
    use std::ptr;
    use std::sync::Once;
    use windows::core::PCWSTR;
    use windows::Win32::Foundation::{COLORREF, HANDLE, HWND, LPARAM, LRESULT, POINT, SIZE, WPARAM};
    use windows::Win32::Graphics::Gdi::{
        CreateCompatibleDC, CreateDIBSection, DeleteDC, DeleteObject, GetDC, ReleaseDC,
        SelectObject, AC_SRC_ALPHA, AC_SRC_OVER, BITMAPINFO, BITMAPINFOHEADER, BI_RGB,
        BLENDFUNCTION, DIB_RGB_COLORS, HDC,
    };
    use windows::Win32::System::LibraryLoader::GetModuleHandleW;
    use windows::Win32::UI::HiDpi::GetDpiForWindow;
    use windows::Win32::UI::WindowsAndMessaging::{
        CreateWindowExW, DefWindowProcW, DestroyWindow, RegisterClassW, SetWindowPos, ShowWindow,
        UpdateLayeredWindow, HWND_TOPMOST, SWP_NOACTIVATE, SWP_NOMOVE, SWP_NOSIZE, SW_HIDE,
        SW_SHOWNA, ULW_ALPHA, WINDOW_STYLE, WNDCLASSW, WS_EX_LAYERED, WS_EX_NOACTIVATE,
        WS_EX_TOOLWINDOW, WS_EX_TOPMOST, WS_EX_TRANSPARENT, WS_POPUP,
    };

    unsafe extern "system" fn badge_wndproc(
        hwnd: HWND,
        msg: u32,
        wparam: WPARAM,
        lparam: LPARAM,
    ) -> LRESULT {
        // All drawing happens via UpdateLayeredWindow, so the default handling
        // is sufficient for every message.
        unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) }
    }

    #[derive(Debug)]
    pub(super) struct LayeredWindow {
        hwnd: HWND,
        visible: bool,
    }

    impl LayeredWindow {
        pub fn create() -> Result<Self> {
            static REGISTER_CLASS: Once = Once::new();
            let class_name = widestring("CaretIndicatorBadge");
            let hinstance = unsafe { GetModuleHandleW(PCWSTR::null()) }?;

            REGISTER_CLASS.call_once(|| unsafe {
                let wc = WNDCLASSW {
                    hInstance: hinstance.into(),
                    lpszClassName: PCWSTR(class_name.as_ptr()),
                    lpfnWndProc: Some(badge_wndproc),
                    ..Default::default()
                };
                let _ = RegisterClassW(&wc);
            });

            // WS_EX_TRANSPARENT makes the badge click-through and
            // WS_EX_NOACTIVATE keeps focus with the window being observed.
            let hwnd = unsafe {
                CreateWindowExW(
                    WS_EX_LAYERED
                        | WS_EX_TOPMOST
                        | WS_EX_TRANSPARENT
                        | WS_EX_NOACTIVATE
                        | WS_EX_TOOLWINDOW,
                    PCWSTR(class_name.as_ptr()),
                    PCWSTR::null(),
                    WINDOW_STYLE(WS_POPUP.0),
                    0,
                    0,
                    0,
                    0,
                    None,
                    None,
                    hinstance,
                    None,
                )?
            };

            Ok(Self {
                hwnd,
                visible: false,
            })
        }

        pub fn dpi_scale(&self) -> f32 {
            let dpi = unsafe { GetDpiForWindow(self.hwnd) };
            if dpi == 0 {
                1.0
            } else {
                dpi as f32 / 96.0
            }
        }

        /// Move the window to `origin` and replace its contents with `frame`
        /// in one atomic update.
        pub fn present(&mut self, origin: (i32, i32), frame: &RgbaBuffer) -> Result<()> {
            if frame.width == 0 || frame.height == 0 {
                return Ok(());
            }

            unsafe {
                let screen_dc = GetDC(HWND::default());
                if screen_dc.0.is_null() {
                    anyhow::bail!("screen device context unavailable");
                }
                let presented = self.present_with_dc(screen_dc, origin, frame);
                ReleaseDC(HWND::default(), screen_dc);
                presented
            }
        }

        unsafe fn present_with_dc(
            &mut self,
            screen_dc: HDC,
            origin: (i32, i32),
            frame: &RgbaBuffer,
        ) -> Result<()> {
            let mem_dc = unsafe { CreateCompatibleDC(screen_dc) };
            if mem_dc.0.is_null() {
                anyhow::bail!("failed to create memory device context");
            }

            let mut bmi = BITMAPINFO::default();
            bmi.bmiHeader = BITMAPINFOHEADER {
                biSize: mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: frame.width as i32,
                // Negative height selects a top-down bitmap, matching the
                // frame buffer's row order.
                biHeight: -(frame.height as i32),
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                ..Default::default()
            };

            let mut bits: *mut core::ffi::c_void = ptr::null_mut();
            let dib = match unsafe {
                CreateDIBSection(
                    mem_dc,
                    &bmi,
                    DIB_RGB_COLORS,
                    &mut bits,
                    HANDLE::default(),
                    0,
                )
            } {
                Ok(dib) if !bits.is_null() => dib,
                Ok(dib) => {
                    unsafe {
                        let _ = DeleteObject(dib);
                        let _ = DeleteDC(mem_dc);
                    }
                    anyhow::bail!("dib section has no pixel storage");
                }
                Err(err) => {
                    unsafe {
                        let _ = DeleteDC(mem_dc);
                    }
                    return Err(err.into());
                }
            };

            let old_bitmap = unsafe { SelectObject(mem_dc, dib) };
            unsafe {
                copy_premultiplied_bgra(frame, bits as *mut u8);
            }

            if !self.visible {
                unsafe {
                    let _ = ShowWindow(self.hwnd, SW_SHOWNA);
                }
                self.visible = true;
            }

            let destination = POINT {
                x: origin.0,
                y: origin.1,
            };
            let size = SIZE {
                cx: frame.width as i32,
                cy: frame.height as i32,
            };
            let source = POINT::default();
            let blend = BLENDFUNCTION {
                BlendOp: AC_SRC_OVER as u8,
                SourceConstantAlpha: 255,
                AlphaFormat: AC_SRC_ALPHA as u8,
                ..Default::default()
            };

            let presented = unsafe {
                UpdateLayeredWindow(
                    self.hwnd,
                    Some(screen_dc),
                    Some(&destination),
                    Some(&size),
                    Some(mem_dc),
                    Some(&source),
                    COLORREF(0),
                    Some(&blend),
                    ULW_ALPHA,
                )
            };

            unsafe {
                SelectObject(mem_dc, old_bitmap);
                let _ = DeleteObject(dib);
                let _ = DeleteDC(mem_dc);
                // Fullscreen apps reassert their z-order aggressively; pin the
                // badge back on top after every update.
                let _ = SetWindowPos(
                    self.hwnd,
                    HWND_TOPMOST,
                    0,
                    0,
                    0,
                    0,
                    SWP_NOMOVE | SWP_NOSIZE | SWP_NOACTIVATE,
                );
            }

            presented?;
            Ok(())
        }

        pub fn hide(&mut self) {
            if self.visible {
                unsafe {
                    let _ = ShowWindow(self.hwnd, SW_HIDE);
                }
                self.visible = false;
            }
        }
    }

    impl Drop for LayeredWindow {
        fn drop(&mut self) {
            if !self.hwnd.0.is_null() {
                unsafe {
                    let _ = DestroyWindow(self.hwnd);
                }
            }
        }
    }

    /// `UpdateLayeredWindow` expects premultiplied BGRA.
    unsafe fn copy_premultiplied_bgra(frame: &RgbaBuffer, bits: *mut u8) {
        let out = unsafe { std::slice::from_raw_parts_mut(bits, frame.pixels.len()) };
        for (src, dst) in frame
            .pixels
            .chunks_exact(4)
            .zip(out.chunks_exact_mut(4))
        {
            let a = src[3] as u32;
            dst[0] = ((src[2] as u32 * a + 127) / 255) as u8;
            dst[1] = ((src[1] as u32 * a + 127) / 255) as u8;
            dst[2] = ((src[0] as u32 * a + 127) / 255) as u8;
            dst[3] = src[3];
        }
    }
}
