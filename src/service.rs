use crate::events::{ChangeListener, FocusEventHook};
use crate::locator::AnchorChain;
use crate::monitor::enumerate_work_areas;
use crate::overlay::OverlaySurface;
use crate::probe::{default_query_target, probe_input_state, QueryTarget};
use crate::render::{BadgeRenderer, BadgeStyle};
use crate::settings::Settings;
use crate::state::{InputCategory, Palette};
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};

/// Forwards accessibility event pings into the service's wake channel.
struct WakeListener {
    tx: Mutex<Sender<()>>,
}

impl ChangeListener for WakeListener {
    fn changed(&self) {
        if let Ok(tx) = self.tx.lock() {
            let _ = tx.send(());
        }
    }
}

/// Whether the badge should be on screen at all for this input category.
pub fn should_display(show_latin: bool, category: InputCategory) -> bool {
    show_latin || category != InputCategory::Latin
}

/// Owns the whole pipeline: probe, locator chain, renderer and overlay
/// window. Everything lives on one thread; the overlay window and the
/// accessibility hook both require that their thread pumps messages, which
/// [`IndicatorService::run`] does between cycles.
pub struct IndicatorService {
    settings: Settings,
    palette: Palette,
    probe_target: Box<dyn QueryTarget + Send>,
    chain: AnchorChain,
    renderer: BadgeRenderer,
    surface: OverlaySurface,
    hook: FocusEventHook,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl IndicatorService {
    pub fn new(settings: Settings) -> Result<Self> {
        let palette = settings.palette();
        let (wake_tx, wake_rx) = channel();

        #[cfg(windows)]
        let chain = crate::locator::default_chain(settings.offset);
        #[cfg(not(windows))]
        let chain = AnchorChain::new(settings.offset);

        Ok(Self {
            settings,
            palette,
            probe_target: default_query_target(),
            chain,
            renderer: BadgeRenderer::new(),
            surface: OverlaySurface::new()?,
            hook: FocusEventHook::default(),
            wake_tx,
            wake_rx,
        })
    }

    /// Run until `running` clears. Focus and caret events shorten the
    /// reaction time; the receive timeout is the polling backstop for
    /// transitions that fire no event, such as Caps Lock or an IME mode
    /// toggle in the foreground application.
    pub fn run(&mut self, running: &AtomicBool) {
        let listener = Arc::new(WakeListener {
            tx: Mutex::new(self.wake_tx.clone()),
        });
        if let Err(err) = self.hook.subscribe(listener) {
            tracing::warn!(?err, "no accessibility events, falling back to polling alone");
        }

        while running.load(Ordering::SeqCst) {
            #[cfg(windows)]
            pump_thread_messages();

            self.run_cycle();

            match self.wake_rx.recv_timeout(self.settings.poll_interval()) {
                Ok(()) => {
                    // A focus change fans out into a burst of events; collapse
                    // the burst into the one cycle that follows.
                    while self.wake_rx.try_recv().is_ok() {}
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        self.hook.unsubscribe();
        self.renderer.hide(&mut self.surface);
    }

    /// One probe-locate-render pass. Never blocks beyond the bounded IME
    /// queries and never fails; a cycle that cannot place the badge simply
    /// leaves the previous frame alone.
    fn run_cycle(&mut self) {
        let state = probe_input_state(
            self.probe_target.as_ref(),
            &self.palette,
            self.settings.ime_timeout(),
        );

        if !should_display(self.settings.show_latin, state.category) {
            self.renderer.hide(&mut self.surface);
            return;
        }

        let monitors = enumerate_work_areas();
        let Some(anchor) = self.chain.resolve(&monitors) else {
            return;
        };

        let style = BadgeStyle {
            diameter: self.settings.badge_diameter(),
            color: state.color,
            glyph: state.glyph,
        };
        let scale = self.surface.dpi_scale();
        if let Err(err) = self.renderer.render(&mut self.surface, anchor, style, scale) {
            tracing::debug!(?err, "composite failed, retrying next cycle");
        }
    }
}

/// Deliver pending messages for this thread. Both the out-of-context WinEvent
/// hook and the layered window depend on this running regularly.
#[cfg(windows)]
fn pump_thread_messages() {
    use windows::Win32::UI::WindowsAndMessaging::{
        DispatchMessageW, PeekMessageW, TranslateMessage, MSG, PM_REMOVE,
    };

    let mut msg = MSG::default();
    unsafe {
        while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
}
