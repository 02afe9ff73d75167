use anyhow::Result;
use std::sync::Arc;

/// Receives a ping whenever the system reports that focus, caret position or
/// window geometry may have changed. Callbacks arrive on the thread that
/// installed the hook, inside its message pump.
pub trait ChangeListener: Send + Sync {
    fn changed(&self);
}

/// Accessibility event subscription covering the focus-to-location-change
/// event range. The subscription only shortens reaction time; the polling
/// loop remains the correctness backstop, so running without a hook (or on a
/// non-Windows build) merely degrades latency.
#[derive(Debug, Default)]
pub struct FocusEventHook {
    #[cfg(windows)]
    backend: platform::WinEventBackend,
}

impl FocusEventHook {
    pub fn subscribe(&mut self, listener: Arc<dyn ChangeListener>) -> Result<()> {
        #[cfg(windows)]
        {
            self.backend.install(listener)
        }

        #[cfg(not(windows))]
        {
            let _ = listener;
            Ok(())
        }
    }

    pub fn unsubscribe(&mut self) {
        #[cfg(windows)]
        self.backend.uninstall();
    }
}

#[cfg(windows)]
mod platform {
    use super::ChangeListener;
    use anyhow::Result;
    use once_cell::sync::Lazy;
    use std::sync::{Arc, Mutex};
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::Accessibility::{SetWinEventHook, UnhookWinEvent, HWINEVENTHOOK};
    use windows::Win32::UI::WindowsAndMessaging::{
        EVENT_OBJECT_FOCUS, EVENT_OBJECT_LOCATIONCHANGE, WINEVENT_OUTOFCONTEXT,
        WINEVENT_SKIPOWNPROCESS,
    };

    // The WinEvent callback carries no user data pointer, so the listener
    // lives in a process-wide slot.
    static LISTENER: Lazy<Mutex<Option<Arc<dyn ChangeListener>>>> =
        Lazy::new(|| Mutex::new(None));

    unsafe extern "system" fn win_event_proc(
        _hook: HWINEVENTHOOK,
        _event: u32,
        _hwnd: HWND,
        _id_object: i32,
        _id_child: i32,
        _event_thread: u32,
        _event_time: u32,
    ) {
        if let Ok(slot) = LISTENER.lock() {
            if let Some(listener) = slot.as_ref() {
                listener.changed();
            }
        }
    }

    #[derive(Debug, Default)]
    pub(super) struct WinEventBackend {
        hook: Option<HWINEVENTHOOK>,
    }

    impl WinEventBackend {
        pub fn install(&mut self, listener: Arc<dyn ChangeListener>) -> Result<()> {
            if self.hook.is_some() {
                return Ok(());
            }

            if let Ok(mut slot) = LISTENER.lock() {
                *slot = Some(listener);
            }

            // EVENT_OBJECT_FOCUS through EVENT_OBJECT_LOCATIONCHANGE covers
            // focus moves, caret moves and window moves in one registration.
            let hook = unsafe {
                SetWinEventHook(
                    EVENT_OBJECT_FOCUS,
                    EVENT_OBJECT_LOCATIONCHANGE,
                    None,
                    Some(win_event_proc),
                    0,
                    0,
                    WINEVENT_OUTOFCONTEXT | WINEVENT_SKIPOWNPROCESS,
                )
            };
            if hook.0.is_null() {
                if let Ok(mut slot) = LISTENER.lock() {
                    *slot = None;
                }
                anyhow::bail!("failed to install accessibility event hook");
            }

            self.hook = Some(hook);
            Ok(())
        }

        pub fn uninstall(&mut self) {
            if let Some(hook) = self.hook.take() {
                unsafe {
                    let _ = UnhookWinEvent(hook);
                }
            }
            if let Ok(mut slot) = LISTENER.lock() {
                *slot = None;
            }
        }
    }

    impl Drop for WinEventBackend {
        fn drop(&mut self) {
            self.uninstall();
        }
    }
}
