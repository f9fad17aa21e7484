//! Hardware-facing audio components.
//!
//! This module provides endpoint enumeration, capability probing, volume
//! control, default-device selection and change notifications behind a
//! single injectable hardware boundary.

pub mod device;
pub mod enumerator;
pub mod hardware;
pub mod notifications;
pub mod policy;
pub mod probe;
pub mod state;
pub mod volume;

#[cfg(target_os = "macos")]
pub mod coreaudio;

#[cfg(test)]
pub(crate) mod testing;

pub use device::{AudioDevice, AudioError, DeviceId, Direction};
pub use enumerator::DeviceRegistry;
pub use hardware::{HardwareEvent, HardwareInterface, VolumeStrategy};
pub use state::AudioState;
