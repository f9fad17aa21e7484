//! Default-device selection.
//!
//! Reads and writes the OS-wide default input/output endpoint. This is the
//! sole path through which device selection changes, whatever triggered the
//! request.

use std::sync::Arc;

use tracing::{info, warn};

use super::device::{AudioDevice, AudioError, DeviceId, Direction};
use super::hardware::HardwareInterface;

/// Controller for the OS-wide default endpoints.
pub struct DefaultDeviceControl {
    hw: Arc<dyn HardwareInterface>,
}

impl DefaultDeviceControl {
    pub fn new(hw: Arc<dyn HardwareInterface>) -> Self {
        Self { hw }
    }

    /// Current OS-wide default endpoint for the direction.
    ///
    /// A failed query reads as "no default": selection reconciliation then
    /// resolves to no selection rather than an error.
    pub fn current(&self, direction: Direction) -> Option<DeviceId> {
        match self.hw.default_device(direction) {
            Ok(id) => id,
            Err(err) => {
                warn!(%direction, %err, "default device query failed");
                None
            }
        }
    }

    /// Make `device` the OS-wide default for `direction`.
    ///
    /// On failure the previous default is left untouched and the error is
    /// surfaced to the caller.
    pub fn set_default(&self, device: &AudioDevice, direction: Direction) -> Result<(), AudioError> {
        self.hw.set_default_device(device.id, direction)?;
        info!(device = %device.name, %direction, "default device changed");
        Ok(())
    }
}
