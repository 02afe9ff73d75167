use crate::state::{classify, InputState, Palette};
use std::time::Duration;

/// Queries sent to the foreground application's default IME window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImeQuery {
    OpenStatus,
    ConversionMode,
}

/// Bit set in the conversion mode word when the IME composes native-script
/// text (IME_CMODE_NATIVE).
pub const CONVERSION_MODE_NATIVE: usize = 0x0001;

/// Seam between the probe logic and the platform. Implementations must honor
/// the timeout on `send_query`: the target belongs to a foreign, possibly hung
/// process and the probe loop must never stall behind it. `None` means the
/// target is missing or did not answer in time.
pub trait QueryTarget {
    fn caps_lock_latched(&self) -> bool;
    fn send_query(&self, query: ImeQuery, timeout: Duration) -> Option<usize>;
}

/// Derive the current input state, first match wins: Caps Lock, then an open
/// IME in native conversion mode, then Latin. Timeouts and missing windows
/// fall through silently; this never fails and never blocks beyond two
/// bounded query round-trips.
pub fn probe_input_state(
    target: &dyn QueryTarget,
    palette: &Palette,
    timeout: Duration,
) -> InputState {
    let caps = target.caps_lock_latched();

    // Skip the cross-process round-trips entirely when Caps Lock already
    // decides the outcome.
    let (open, native) = if caps {
        (false, false)
    } else {
        match target.send_query(ImeQuery::OpenStatus, timeout) {
            Some(status) if status != 0 => {
                let mode = target
                    .send_query(ImeQuery::ConversionMode, timeout)
                    .unwrap_or(0);
                (true, mode & CONVERSION_MODE_NATIVE != 0)
            }
            _ => (false, false),
        }
    };

    palette.state_for(classify(caps, open, native))
}

#[cfg(windows)]
pub use platform::ForegroundImeTarget;

/// The target the service probes in production.
pub fn default_query_target() -> Box<dyn QueryTarget + Send> {
    #[cfg(windows)]
    {
        Box::new(ForegroundImeTarget)
    }

    #[cfg(not(windows))]
    {
        Box::new(DisconnectedTarget)
    }
}

/// Stand-in where no input system exists; everything reads as plain Latin.
#[cfg(not(windows))]
struct DisconnectedTarget;

#[cfg(not(windows))]
impl QueryTarget for DisconnectedTarget {
    fn caps_lock_latched(&self) -> bool {
        false
    }

    fn send_query(&self, _query: ImeQuery, _timeout: Duration) -> Option<usize> {
        None
    }
}

#[cfg(windows)]
mod platform {
    use super::{ImeQuery, QueryTarget};
    use std::time::Duration;
    use windows::Win32::Foundation::{HWND, LPARAM, WPARAM};
    use windows::Win32::UI::Input::Ime::ImmGetDefaultIMEWnd;
    use windows::Win32::UI::Input::KeyboardAndMouse::{GetKeyState, VK_CAPITAL};
    use windows::Win32::UI::WindowsAndMessaging::{
        GetForegroundWindow, GetGUIThreadInfo, GetWindowThreadProcessId, SendMessageTimeoutW,
        GUITHREADINFO, SMTO_ABORTIFHUNG,
    };

    const WM_IME_CONTROL: u32 = 0x283;
    const IMC_GETOPENSTATUS: usize = 0x5;
    const IMC_GETCONVERSIONMODE: usize = 0x1;

    /// Probes the IME window owned by whichever window currently holds the
    /// input focus.
    #[derive(Debug, Default)]
    pub struct ForegroundImeTarget;

    impl ForegroundImeTarget {
        /// The foreground window is often only the top-level frame; the GUI
        /// thread info exposes the focused child that actually owns the input
        /// context.
        fn focused_window(&self) -> HWND {
            unsafe {
                let fore = GetForegroundWindow();
                if fore.0.is_null() {
                    return HWND::default();
                }
                let thread_id = GetWindowThreadProcessId(fore, None);
                let mut info = GUITHREADINFO {
                    cbSize: std::mem::size_of::<GUITHREADINFO>() as u32,
                    ..Default::default()
                };
                if GetGUIThreadInfo(thread_id, &mut info).is_ok() {
                    if !info.hwndFocus.0.is_null() {
                        return info.hwndFocus;
                    }
                    if !info.hwndActive.0.is_null() {
                        return info.hwndActive;
                    }
                }
                fore
            }
        }
    }

    impl QueryTarget for ForegroundImeTarget {
        fn caps_lock_latched(&self) -> bool {
            // The low-order bit of GetKeyState reports the toggle latch.
            unsafe { (GetKeyState(VK_CAPITAL.0 as i32) & 1) != 0 }
        }

        fn send_query(&self, query: ImeQuery, timeout: Duration) -> Option<usize> {
            let ime_hwnd = unsafe { ImmGetDefaultIMEWnd(self.focused_window()) };
            if ime_hwnd.0.is_null() {
                return None;
            }

            let wparam = match query {
                ImeQuery::OpenStatus => IMC_GETOPENSTATUS,
                ImeQuery::ConversionMode => IMC_GETCONVERSIONMODE,
            };
            let mut result: usize = 0;
            let ret = unsafe {
                SendMessageTimeoutW(
                    ime_hwnd,
                    WM_IME_CONTROL,
                    WPARAM(wparam),
                    LPARAM(0),
                    SMTO_ABORTIFHUNG,
                    timeout.as_millis() as u32,
                    Some(&mut result),
                )
            };
            if ret.0 != 0 {
                Some(result)
            } else {
                tracing::trace!(?query, "ime query timed out or target vanished");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{probe_input_state, ImeQuery, QueryTarget, CONVERSION_MODE_NATIVE};
    use crate::state::{InputCategory, Palette};
    use std::time::Duration;

    struct FakeTarget {
        caps: bool,
        open: Option<usize>,
        mode: Option<usize>,
    }

    impl QueryTarget for FakeTarget {
        fn caps_lock_latched(&self) -> bool {
            self.caps
        }

        fn send_query(&self, query: ImeQuery, _timeout: Duration) -> Option<usize> {
            match query {
                ImeQuery::OpenStatus => self.open,
                ImeQuery::ConversionMode => self.mode,
            }
        }
    }

    const TIMEOUT: Duration = Duration::from_millis(50);

    #[test]
    fn open_native_ime_yields_native_state() {
        let target = FakeTarget {
            caps: false,
            open: Some(1),
            mode: Some(CONVERSION_MODE_NATIVE),
        };
        let state = probe_input_state(&target, &Palette::default(), TIMEOUT);
        assert_eq!(state.category, InputCategory::NativeIme);
        assert_eq!(state.glyph, Some('中'));
    }

    #[test]
    fn unanswered_queries_degrade_to_latin() {
        let target = FakeTarget {
            caps: false,
            open: None,
            mode: None,
        };
        let state = probe_input_state(&target, &Palette::default(), TIMEOUT);
        assert_eq!(state.category, InputCategory::Latin);
    }

    #[test]
    fn conversion_mode_timeout_means_alphanumeric() {
        let target = FakeTarget {
            caps: false,
            open: Some(1),
            mode: None,
        };
        let state = probe_input_state(&target, &Palette::default(), TIMEOUT);
        assert_eq!(state.category, InputCategory::Latin);
    }

    #[test]
    fn caps_lock_wins_over_open_native_ime() {
        let target = FakeTarget {
            caps: true,
            open: Some(1),
            mode: Some(CONVERSION_MODE_NATIVE),
        };
        let state = probe_input_state(&target, &Palette::default(), TIMEOUT);
        assert_eq!(state.category, InputCategory::CapsLock);
        assert_eq!(state.glyph, Some('A'));
    }
}
