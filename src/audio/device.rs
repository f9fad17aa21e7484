//! Audio device data model.
//!
//! Defines the core data structures for representing audio endpoints,
//! their capabilities, and related error types.

use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;

/// Opaque per-session hardware handle (Core Audio `AudioObjectID`).
///
/// Only valid until the hardware session changes; never persist it.
pub type DeviceId = u32;

/// Signal direction of a device scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => write!(f, "input"),
            Direction::Output => write!(f, "output"),
        }
    }
}

/// Immutable snapshot of one hardware endpoint.
///
/// Built by the device registry during an enumeration pass. Capability
/// flags are probed fresh on every pass and never cached beyond it.
#[derive(Debug, Clone)]
pub struct AudioDevice {
    /// Per-session hardware handle.
    pub id: DeviceId,

    /// Persistent identifier, stable across reconnects and reboots.
    pub uid: String,

    /// Display name as reported by the hardware.
    pub name: String,

    /// Whether the device carries an input signal path.
    pub has_input: bool,

    /// Whether the device carries an output signal path.
    pub has_output: bool,
}

impl AudioDevice {
    /// Whether the device supports the given signal direction.
    pub fn supports(&self, direction: Direction) -> bool {
        match direction {
            Direction::Input => self.has_input,
            Direction::Output => self.has_output,
        }
    }
}

// Identity is the persistent uid alone: two snapshots of the same physical
// device taken in different hardware sessions carry different `id`s but
// must still compare equal.
impl PartialEq for AudioDevice {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
    }
}

impl Eq for AudioDevice {}

impl Hash for AudioDevice {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uid.hash(state);
    }
}

/// Audio core error types.
///
/// Nothing here is fatal to the process: query failures retain the last
/// good snapshot, write failures leave prior state untouched.
#[derive(Debug, Error)]
pub enum AudioError {
    /// Base enumeration or property size query failed.
    #[error("hardware query failed ({context}): status {status}")]
    HardwareQuery { context: &'static str, status: i32 },

    /// Default-device or volume write failed after exhausting all strategies.
    #[error("hardware write failed ({context}): status {status}")]
    HardwareWrite { context: &'static str, status: i32 },

    /// The controlling thread is gone and can no longer service requests.
    #[error("audio manager is no longer running")]
    Disconnected,
}
