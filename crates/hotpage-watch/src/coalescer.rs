//! Change coalescing.
//!
//! Collapses bursts of change events into a single signal, reducing
//! redundant browser reloads when editors emit several events per save.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::event::{ChangeEvent, ChangeKind};

/// Default coalescing window.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

/// "Something relevant changed" token emitted once per burst.
///
/// Carries only diagnostic information for logging.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoalescedSignal {
    /// Name of the last change in the burst.
    pub label: PathBuf,
    /// Full path of the last change in the burst.
    pub full_path: PathBuf,
    /// Kind of the last change in the burst.
    pub kind: ChangeKind,
    /// Number of events folded into this signal.
    pub absorbed: usize,
}

/// Burst waiting for its window to close.
struct Pending {
    last: ChangeEvent,
    absorbed: usize,
    deadline: Instant,
}

/// Thread-safe time-window coalescer.
///
/// The first event of a burst opens a window; every further event before
/// the deadline pushes the deadline back. Once the window closes with no
/// new events, exactly one [`CoalescedSignal`] is drained.
pub struct ChangeCoalescer {
    pending: Mutex<Option<Pending>>,
    window: Duration,
}

impl ChangeCoalescer {
    /// Create a coalescer with the given window.
    pub fn new(window: Duration) -> Self {
        Self {
            pending: Mutex::new(None),
            window,
        }
    }

    /// The configured window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record an event, opening or extending the current window.
    pub fn record(&self, event: ChangeEvent) {
        let mut pending = self.pending.lock().unwrap();
        let deadline = Instant::now() + self.window;

        match pending.as_mut() {
            Some(burst) => {
                burst.last = event;
                burst.absorbed += 1;
                burst.deadline = deadline;
            }
            None => {
                *pending = Some(Pending {
                    last: event,
                    absorbed: 1,
                    deadline,
                });
            }
        }
    }

    /// Take the signal for a burst whose window has closed.
    pub fn drain_ready(&self) -> Option<CoalescedSignal> {
        let mut pending = self.pending.lock().unwrap();
        let now = Instant::now();

        if pending.as_ref().is_none_or(|burst| burst.deadline > now) {
            return None;
        }

        pending.take().map(|burst| CoalescedSignal {
            label: burst.last.changed_name,
            full_path: burst.last.full_path,
            kind: burst.last.kind,
            absorbed: burst.absorbed,
        })
    }

    /// Returns the deadline of the open window, for timer scheduling.
    pub fn next_deadline(&self) -> Option<Instant> {
        let pending = self.pending.lock().unwrap();
        pending.as_ref().map(|burst| burst.deadline)
    }
}

impl Default for ChangeCoalescer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}
