#![cfg_attr(all(windows, not(debug_assertions)), windows_subsystem = "windows")]

use anyhow::Result;
use caret_indicator::logging;
use caret_indicator::service::IndicatorService;
use caret_indicator::settings::{self, Settings};
use caret_indicator::tray::Tray;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn main() -> Result<()> {
    let settings_file = settings::settings_path();
    let settings = Settings::load(&settings_file).unwrap_or_else(|err| {
        eprintln!("settings file is invalid, falling back to defaults: {err:#}");
        Settings::default()
    });
    logging::init(settings.debug_logging);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting");

    // Materialize the defaults on first run so "Open settings" in the tray
    // menu has a file to show.
    if !settings_file.exists() {
        if let Err(err) = settings.save(&settings_file) {
            tracing::warn!(?err, path = ?settings_file, "could not write default settings");
        }
    }

    acquire_single_instance()?;

    #[cfg(windows)]
    enable_dpi_awareness();

    let running = Arc::new(AtomicBool::new(true));
    let worker = {
        // The overlay window, the accessibility hook and COM all want to live
        // on the thread that pumps their messages, so the service constructs
        // everything on its own thread.
        let settings = settings.clone();
        let running = Arc::clone(&running);
        std::thread::spawn(move || match IndicatorService::new(settings) {
            Ok(mut service) => service.run(&running),
            Err(err) => tracing::error!(?err, "indicator service failed to start"),
        })
    };

    let tray = Tray::new(settings_file)?;
    tray.run_message_loop();

    tracing::info!("shutting down");
    running.store(false, Ordering::SeqCst);
    if worker.join().is_err() {
        tracing::error!("indicator service thread panicked");
    }
    Ok(())
}

#[cfg(windows)]
fn acquire_single_instance() -> Result<()> {
    use windows::core::w;
    use windows::Win32::Foundation::{CloseHandle, GetLastError, ERROR_ALREADY_EXISTS};
    use windows::Win32::System::Threading::CreateMutexW;

    // A restarted instance can race the teardown of the old process, so the
    // mutex gets a short grace period before we give up.
    for attempt in 0..10 {
        let handle = unsafe { CreateMutexW(None, true, w!("caret-indicator-single-instance")) }?;
        if unsafe { GetLastError() } != ERROR_ALREADY_EXISTS {
            // Held for the lifetime of the process.
            std::mem::forget(handle);
            return Ok(());
        }
        unsafe {
            let _ = CloseHandle(handle);
        }
        if attempt < 9 {
            std::thread::sleep(std::time::Duration::from_millis(200));
        }
    }
    anyhow::bail!("another instance is already running")
}

#[cfg(not(windows))]
fn acquire_single_instance() -> Result<()> {
    Ok(())
}

/// Without per-monitor awareness the system would scale the overlay bitmap
/// and report virtualized caret coordinates on high-DPI displays.
#[cfg(windows)]
fn enable_dpi_awareness() {
    use windows::Win32::UI::HiDpi::{
        SetProcessDpiAwarenessContext, DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2,
    };

    if let Err(err) =
        unsafe { SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2) }
    {
        tracing::debug!(?err, "per-monitor dpi awareness rejected, using the process default");
    }
}
