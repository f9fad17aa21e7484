//! Volume control via an ordered fallback chain of hardware properties.
//!
//! Volume exposure differs per device class (built-in, USB, Bluetooth,
//! virtual), so reads and writes walk [`VolumeStrategy::PRIORITY`] and
//! stop at the first strategy that is both present and succeeds.

use std::sync::Arc;

use tracing::debug;

use super::device::{AudioDevice, AudioError, Direction};
use super::hardware::{HardwareInterface, VolumeStrategy};

/// Volume controller for hardware endpoints.
pub struct VolumeControl {
    hw: Arc<dyn HardwareInterface>,
}

impl VolumeControl {
    pub fn new(hw: Arc<dyn HardwareInterface>) -> Self {
        Self { hw }
    }

    /// Read the normalized volume for one direction of a device.
    ///
    /// Returns the value of the first strategy that is present and whose
    /// query succeeds. Returns 1.0 when no strategy yields a value:
    /// absence of volume control (digital passthrough, some virtual
    /// endpoints) is common and is not an error.
    pub fn get(&self, device: &AudioDevice, direction: Direction) -> f32 {
        for strategy in VolumeStrategy::PRIORITY {
            if !self.hw.volume_available(device.id, strategy, direction) {
                continue;
            }
            match self.hw.read_volume(device.id, strategy, direction) {
                Ok(value) => {
                    debug!(device = %device.name, ?strategy, %direction, value, "volume read");
                    return value.clamp(0.0, 1.0);
                }
                Err(err) => {
                    debug!(device = %device.name, ?strategy, %err, "volume read failed, trying next strategy");
                }
            }
        }

        debug!(device = %device.name, %direction, "no volume strategy succeeded, defaulting to 1.0");
        1.0
    }

    /// Write the normalized volume for one direction of a device.
    ///
    /// Stops at the first strategy that confirms the hardware accepted the
    /// write; that confirmation is the only signal on which callers may
    /// update published volume state. Exhausting all strategies yields
    /// [`AudioError::HardwareWrite`].
    pub fn set(
        &self,
        device: &AudioDevice,
        direction: Direction,
        value: f32,
    ) -> Result<(), AudioError> {
        let value = value.clamp(0.0, 1.0);
        let mut last_failure = None;

        for strategy in VolumeStrategy::PRIORITY {
            if !self.hw.volume_available(device.id, strategy, direction) {
                continue;
            }
            match self.hw.write_volume(device.id, strategy, direction, value) {
                Ok(()) => {
                    debug!(device = %device.name, ?strategy, %direction, value, "volume written");
                    return Ok(());
                }
                Err(err) => {
                    debug!(device = %device.name, ?strategy, %err, "volume write failed, trying next strategy");
                    last_failure = Some(err);
                }
            }
        }

        Err(last_failure.unwrap_or(AudioError::HardwareWrite {
            context: "no volume property exposed",
            status: 0,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::{FakeDevice, FakeHardware};

    fn control(hw: &Arc<FakeHardware>) -> VolumeControl {
        VolumeControl::new(Arc::clone(hw) as Arc<dyn HardwareInterface>)
    }

    fn output_device(id: u32, uid: &str) -> AudioDevice {
        AudioDevice {
            id,
            uid: uid.to_string(),
            name: uid.to_string(),
            has_input: false,
            has_output: true,
        }
    }

    #[test]
    fn get_defaults_to_full_volume_without_any_strategy() {
        let hw = Arc::new(FakeHardware::new());
        hw.push_device(FakeDevice::new(1, "passthrough", "Digital Out").with_output());

        let volume = control(&hw).get(&output_device(1, "passthrough"), Direction::Output);
        assert_eq!(volume, 1.0);
    }

    #[test]
    fn set_falls_through_to_next_available_strategy() {
        // Hardware-service property absent, virtual master present: the
        // write lands on the second strategy and round-trips.
        let hw = Arc::new(FakeHardware::new());
        hw.push_device(
            FakeDevice::new(2, "headphones", "Headphones")
                .with_output()
                .with_volume(VolumeStrategy::VirtualMaster, Direction::Output, 0.8),
        );

        let control = control(&hw);
        let device = output_device(2, "headphones");
        control.set(&device, Direction::Output, 0.5).unwrap();
        assert!((control.get(&device, Direction::Output) - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn failing_strategy_is_skipped_for_a_later_success() {
        let hw = Arc::new(FakeHardware::new());
        hw.push_device(
            FakeDevice::new(3, "bt-headset", "BT Headset")
                .with_output()
                .with_volume(VolumeStrategy::HardwareServiceMaster, Direction::Output, 0.9)
                .failing_volume(VolumeStrategy::HardwareServiceMaster, Direction::Output)
                .with_volume(VolumeStrategy::Scalar, Direction::Output, 0.9),
        );

        let control = control(&hw);
        let device = output_device(3, "bt-headset");
        control.set(&device, Direction::Output, 0.25).unwrap();
        assert!((control.get(&device, Direction::Output) - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn exhausted_chain_reports_write_failure_and_changes_nothing() {
        let hw = Arc::new(FakeHardware::new());
        hw.push_device(
            FakeDevice::new(4, "stubborn", "Stubborn")
                .with_output()
                .with_volume(VolumeStrategy::Scalar, Direction::Output, 0.7)
                .rejecting_volume_writes(VolumeStrategy::Scalar, Direction::Output),
        );

        let control = control(&hw);
        let device = output_device(4, "stubborn");
        let err = control.set(&device, Direction::Output, 0.1).unwrap_err();
        assert!(matches!(err, AudioError::HardwareWrite { .. }));
        // The stored value is untouched by the rejected write.
        assert!((control.get(&device, Direction::Output) - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn values_are_clamped_to_unit_range() {
        let hw = Arc::new(FakeHardware::new());
        hw.push_device(
            FakeDevice::new(5, "speakers", "Speakers")
                .with_output()
                .with_volume(VolumeStrategy::Scalar, Direction::Output, 0.5),
        );

        let control = control(&hw);
        let device = output_device(5, "speakers");
        control.set(&device, Direction::Output, 1.7).unwrap();
        assert_eq!(control.get(&device, Direction::Output), 1.0);
    }
}
