//! Audio endpoint core for a menu-bar utility.
//!
//! Discovers audio hardware endpoints, probes their input/output
//! capabilities, executes default-device selection requests and controls
//! volume through an ordered fallback chain of hardware properties, while
//! keeping one published [`AudioState`] snapshot consistent with the
//! physical topology.
//!
//! ## Structure
//!
//! - [`audio`] holds the hardware-facing components behind the injectable
//!   [`HardwareInterface`] boundary.
//! - [`manager`] runs the controlling thread that owns all state
//!   publication; collaborators talk to [`AudioManager`].

pub mod audio;
pub mod manager;

pub use audio::{AudioDevice, AudioError, AudioState, DeviceId, Direction};
pub use audio::{HardwareEvent, HardwareInterface, VolumeStrategy};
pub use manager::AudioManager;

#[cfg(target_os = "macos")]
pub use audio::coreaudio::CoreAudioHardware;
