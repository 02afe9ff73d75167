use anyhow::Result;
use std::path::PathBuf;

/// Notification area icon with the control menu (open settings, restart,
/// about, exit). Owns an invisible message window; `run_message_loop` blocks
/// the calling thread until the user exits.
pub struct Tray {
    #[cfg(windows)]
    backend: platform::TrayBackend,
}

impl Tray {
    pub fn new(settings_file: PathBuf) -> Result<Self> {
        Ok(Self {
            #[cfg(windows)]
            backend: platform::TrayBackend::create(settings_file)?,
        })
    }

    pub fn run_message_loop(&self) {
        #[cfg(windows)]
        self.backend.run_message_loop();
    }
}

#[cfg(windows)]
mod platform {
    use crate::win_util::widestring;
    use anyhow::Result;
    use once_cell::sync::Lazy;
    use std::path::PathBuf;
    use std::sync::{Mutex, Once};
    use windows::core::{w, PCWSTR};
    use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, POINT, WPARAM};
    use windows::Win32::System::LibraryLoader::{GetModuleFileNameW, GetModuleHandleW};
    use windows::Win32::UI::Shell::{
        ShellExecuteW, Shell_NotifyIconW, NIF_ICON, NIF_MESSAGE, NIF_TIP, NIM_ADD, NIM_DELETE,
        NOTIFYICONDATAW,
    };
    use windows::Win32::UI::WindowsAndMessaging::{
        AppendMenuW, CreatePopupMenu, CreateWindowExW, DefWindowProcW, DestroyMenu, DestroyWindow,
        DispatchMessageW, GetCursorPos, GetMessageW, LoadIconW, MessageBoxW, PostQuitMessage,
        RegisterClassW, SetForegroundWindow, TrackPopupMenu, TranslateMessage, IDI_APPLICATION,
        MB_ICONINFORMATION, MB_OK, MF_SEPARATOR, MF_STRING, MSG, SW_SHOW, TPM_BOTTOMALIGN,
        TPM_LEFTALIGN, WINDOW_EX_STYLE, WINDOW_STYLE, WM_COMMAND, WM_DESTROY, WM_RBUTTONUP,
        WM_USER, WNDCLASSW,
    };

    const WM_TRAYICON: u32 = WM_USER + 1;
    const TRAY_ICON_ID: u32 = 1;

    const IDM_OPEN_SETTINGS: u32 = 1001;
    const IDM_RESTART: u32 = 1002;
    const IDM_ABOUT: u32 = 1003;
    const IDM_EXIT: u32 = 1004;

    // The tray window procedure has no user data pointer to smuggle state
    // through, so the settings file location lives here.
    static SETTINGS_FILE: Lazy<Mutex<Option<PathBuf>>> = Lazy::new(|| Mutex::new(None));

    pub(super) struct TrayBackend {
        hwnd: HWND,
    }

    impl TrayBackend {
        pub fn create(settings_file: PathBuf) -> Result<Self> {
            if let Ok(mut slot) = SETTINGS_FILE.lock() {
                *slot = Some(settings_file);
            }

            static REGISTER_CLASS: Once = Once::new();
            let class_name = widestring("CaretIndicatorTray");
            let hinstance = unsafe { GetModuleHandleW(PCWSTR::null()) }?;

            REGISTER_CLASS.call_once(|| unsafe {
                let wc = WNDCLASSW {
                    hInstance: hinstance.into(),
                    lpszClassName: PCWSTR(class_name.as_ptr()),
                    lpfnWndProc: Some(tray_wndproc),
                    ..Default::default()
                };
                let _ = RegisterClassW(&wc);
            });

            let hwnd = unsafe {
                CreateWindowExW(
                    WINDOW_EX_STYLE::default(),
                    PCWSTR(class_name.as_ptr()),
                    PCWSTR::null(),
                    WINDOW_STYLE::default(),
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

            let icon = unsafe { LoadIconW(None, IDI_APPLICATION) }?;
            let mut nid = NOTIFYICONDATAW {
                cbSize: std::mem::size_of::<NOTIFYICONDATAW>() as u32,
                hWnd: hwnd,
                uID: TRAY_ICON_ID,
                uFlags: NIF_ICON | NIF_MESSAGE | NIF_TIP,
                uCallbackMessage: WM_TRAYICON,
                hIcon: icon,
                ..Default::default()
            };
            let tip = widestring("Caret Indicator");
            let len = tip.len().min(nid.szTip.len() - 1);
            nid.szTip[..len].copy_from_slice(&tip[..len]);

            if !unsafe { Shell_NotifyIconW(NIM_ADD, &nid) }.as_bool() {
                unsafe {
                    let _ = DestroyWindow(hwnd);
                }
                anyhow::bail!("failed to register the notification area icon");
            }

            Ok(Self { hwnd })
        }

        pub fn run_message_loop(&self) {
            let mut msg = MSG::default();
            unsafe {
                while GetMessageW(&mut msg, None, 0, 0).as_bool() {
                    let _ = TranslateMessage(&msg);
                    DispatchMessageW(&msg);
                }
            }
        }
    }

    impl Drop for TrayBackend {
        fn drop(&mut self) {
            let nid = NOTIFYICONDATAW {
                cbSize: std::mem::size_of::<NOTIFYICONDATAW>() as u32,
                hWnd: self.hwnd,
                uID: TRAY_ICON_ID,
                ..Default::default()
            };
            unsafe {
                let _ = Shell_NotifyIconW(NIM_DELETE, &nid);
                let _ = DestroyWindow(self.hwnd);
            }
        }
    }

    unsafe extern "system" fn tray_wndproc(
        hwnd: HWND,
        msg: u32,
        wparam: WPARAM,
        lparam: LPARAM,
    ) -> LRESULT {
        match msg {
            WM_TRAYICON => {
                if lparam.0 as u32 == WM_RBUTTONUP {
                    if let Err(err) = unsafe { show_context_menu(hwnd) } {
                        tracing::debug!(?err, "failed to show tray menu");
                    }
                }
                LRESULT(0)
            }
            WM_COMMAND => {
                match wparam.0 as u32 {
                    IDM_OPEN_SETTINGS => open_settings_file(),
                    IDM_RESTART => {
                        restart_self();
                        unsafe { PostQuitMessage(0) };
                    }
                    IDM_ABOUT => show_about(),
                    IDM_EXIT => unsafe { PostQuitMessage(0) },
                    _ => {}
                }
                LRESULT(0)
            }
            WM_DESTROY => {
                unsafe { PostQuitMessage(0) };
                LRESULT(0)
            }
            _ => unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) },
        }
    }

    unsafe fn show_context_menu(hwnd: HWND) -> Result<()> {
        unsafe {
            let menu = CreatePopupMenu()?;
            let _ = AppendMenuW(
                menu,
                MF_STRING,
                IDM_OPEN_SETTINGS as usize,
                w!("Open settings"),
            );
            let _ = AppendMenuW(menu, MF_STRING, IDM_RESTART as usize, w!("Restart"));
            let _ = AppendMenuW(menu, MF_STRING, IDM_ABOUT as usize, w!("About"));
            let _ = AppendMenuW(menu, MF_SEPARATOR, 0, PCWSTR::null());
            let _ = AppendMenuW(menu, MF_STRING, IDM_EXIT as usize, w!("Exit"));

            let mut pos = POINT::default();
            GetCursorPos(&mut pos)?;

            // Without a foreground claim the menu stays open after clicking
            // elsewhere.
            let _ = SetForegroundWindow(hwnd);
            let _ = TrackPopupMenu(
                menu,
                TPM_LEFTALIGN | TPM_BOTTOMALIGN,
                pos.x,
                pos.y,
                0,
                hwnd,
                None,
            );
            let _ = DestroyMenu(menu);
        }
        Ok(())
    }

    fn open_settings_file() {
        let path = match SETTINGS_FILE.lock() {
            Ok(slot) => slot.clone(),
            Err(_) => None,
        };
        let Some(path) = path else {
            return;
        };
        let Some(path) = path.to_str() else {
            tracing::warn!(?path, "settings path is not valid unicode");
            return;
        };
        let path_w = widestring(path);
        unsafe {
            let _ = ShellExecuteW(
                None,
                w!("open"),
                PCWSTR(path_w.as_ptr()),
                PCWSTR::null(),
                PCWSTR::null(),
                SW_SHOW,
            );
        }
    }

    fn show_about() {
        let text = widestring(concat!(
            "Caret Indicator ",
            env!("CARGO_PKG_VERSION"),
            "\n\nShows the active input mode (Latin, native IME, Caps Lock)\n",
            "as a small badge next to the text caret."
        ));
        unsafe {
            let _ = MessageBoxW(
                None,
                PCWSTR(text.as_ptr()),
                w!("About Caret Indicator"),
                MB_OK | MB_ICONINFORMATION,
            );
        }
    }

    fn restart_self() {
        let mut path = [0u16; 512];
        let len = unsafe { GetModuleFileNameW(None, &mut path) };
        if len == 0 {
            tracing::warn!("could not resolve the executable path, restart skipped");
            return;
        }
        unsafe {
            let _ = ShellExecuteW(
                None,
                w!("open"),
                PCWSTR(path.as_ptr()),
                PCWSTR::null(),
                PCWSTR::null(),
                SW_SHOW,
            );
        }
    }
}
