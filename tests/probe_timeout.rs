//! The probe must stay responsive when the foreground process is hung.

use caret_indicator::probe::{probe_input_state, ImeQuery, QueryTarget};
use caret_indicator::state::{InputCategory, Palette};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// A target whose answers never arrive. `send_query` honors the timeout the
/// same way the message-timeout platform call does: wait bounded, then give
/// up.
struct HungTarget;

impl QueryTarget for HungTarget {
    fn caps_lock_latched(&self) -> bool {
        false
    }

    fn send_query(&self, _query: ImeQuery, timeout: Duration) -> Option<usize> {
        let (tx, rx) = mpsc::channel::<usize>();
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(5));
            let _ = tx.send(1);
        });
        rx.recv_timeout(timeout).ok()
    }
}

#[test]
fn hung_target_degrades_to_latin_within_the_timeout() {
    let timeout = Duration::from_millis(50);
    let start = Instant::now();
    let state = probe_input_state(&HungTarget, &Palette::default(), timeout);
    let elapsed = start.elapsed();

    assert_eq!(state.category, InputCategory::Latin);
    // Only the open-status query runs before the probe gives up; half a
    // second leaves generous slack for scheduling.
    assert!(
        elapsed < Duration::from_millis(500),
        "probe blocked for {elapsed:?}"
    );
}

#[test]
fn caps_lock_needs_no_round_trips_at_all() {
    struct CapsOnly;
    impl QueryTarget for CapsOnly {
        fn caps_lock_latched(&self) -> bool {
            true
        }
        fn send_query(&self, _query: ImeQuery, _timeout: Duration) -> Option<usize> {
            panic!("caps lock must short-circuit the ime queries");
        }
    }

    let state = probe_input_state(&CapsOnly, &Palette::default(), Duration::from_millis(50));
    assert_eq!(state.category, InputCategory::CapsLock);
}
