//! Device enumeration.
//!
//! Builds immutable device snapshots from the hardware endpoint list,
//! partitioned into input and output device lists.

use std::sync::Arc;

use tracing::{debug, warn};

use super::device::{AudioDevice, AudioError, DeviceId, Direction};
use super::hardware::HardwareInterface;
use super::probe::probe;

/// Enumerates hardware endpoints and builds device snapshots.
pub struct DeviceRegistry {
    hw: Arc<dyn HardwareInterface>,
}

impl DeviceRegistry {
    pub fn new(hw: Arc<dyn HardwareInterface>) -> Self {
        Self { hw }
    }

    /// One full enumeration pass.
    ///
    /// Returns the input and output device lists. A device supporting both
    /// directions appears in both. Failure of the base endpoint query
    /// propagates without producing any lists; callers must retain their
    /// last good snapshot. Per-device failures never abort the pass: a
    /// device whose identity cannot be read is skipped, and a device whose
    /// probe fails degrades to no capabilities.
    pub fn refresh(&self) -> Result<(Vec<AudioDevice>, Vec<AudioDevice>), AudioError> {
        let ids = self.hw.device_ids()?;

        let mut inputs = Vec::new();
        let mut outputs = Vec::new();

        for id in ids {
            let Some(device) = self.build_snapshot(id) else {
                continue;
            };
            if device.has_input {
                inputs.push(device.clone());
            }
            if device.has_output {
                outputs.push(device);
            }
        }

        debug!(
            inputs = inputs.len(),
            outputs = outputs.len(),
            "enumeration pass complete"
        );
        Ok((inputs, outputs))
    }

    /// Build one device snapshot, probing capabilities for both scopes.
    fn build_snapshot(&self, id: DeviceId) -> Option<AudioDevice> {
        let name = match self.hw.device_name(id) {
            Ok(name) => name,
            Err(err) => {
                warn!(device = id, %err, "skipping device without readable name");
                return None;
            }
        };
        let uid = match self.hw.device_uid(id) {
            Ok(uid) => uid,
            Err(err) => {
                warn!(device = id, %err, "skipping device without readable uid");
                return None;
            }
        };

        let has_input = probe(self.hw.as_ref(), id, Direction::Input);
        let has_output = probe(self.hw.as_ref(), id, Direction::Output);

        Some(AudioDevice {
            id,
            uid,
            name,
            has_input,
            has_output,
        })
    }
}
