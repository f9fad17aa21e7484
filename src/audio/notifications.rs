//! Hardware change notification plumbing.
//!
//! The OS invokes the topology-changed callback on a thread it owns, with
//! an opaque context; production implementations translate that into plain
//! [`HardwareEvent`]s on an mpsc channel and do nothing else inside the
//! callback. Physical events (plugging a multi-port hub) fire several
//! redundant notifications in quick succession, so the consuming side
//! folds a burst into a single refresh instead of re-enumerating per
//! notification.

use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use super::hardware::HardwareEvent;

/// Quiet period after the last notification before a coalesced refresh
/// runs. The hardware gives no guidance here; this is long enough to fold
/// a USB hub plug-in burst and short enough to feel immediate.
pub const DEFAULT_COALESCE_WINDOW: Duration = Duration::from_millis(200);

/// Creates the topology event channel.
pub fn channel() -> (Sender<HardwareEvent>, Receiver<HardwareEvent>) {
    mpsc::channel()
}
