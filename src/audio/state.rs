//! Published audio state.

use super::device::{AudioDevice, Direction};

/// Snapshot of the audio topology published to observers.
///
/// Produced by one enumeration pass and replaced wholesale, never patched
/// incrementally, so a failure mid-enumeration can never publish a mix of
/// old and new devices. Selections are re-derived per publication by
/// matching the OS default devices into the fresh lists by uid.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioState {
    pub input_devices: Vec<AudioDevice>,
    pub output_devices: Vec<AudioDevice>,
    pub selected_input: Option<AudioDevice>,
    pub selected_output: Option<AudioDevice>,
    pub input_volume: f32,
    pub output_volume: f32,
}

impl Default for AudioState {
    fn default() -> Self {
        Self {
            input_devices: Vec::new(),
            output_devices: Vec::new(),
            selected_input: None,
            selected_output: None,
            input_volume: 1.0,
            output_volume: 1.0,
        }
    }
}

impl AudioState {
    /// Device list for one direction.
    pub fn devices(&self, direction: Direction) -> &[AudioDevice] {
        match direction {
            Direction::Input => &self.input_devices,
            Direction::Output => &self.output_devices,
        }
    }

    /// Currently selected device for one direction.
    pub fn selected(&self, direction: Direction) -> Option<&AudioDevice> {
        match direction {
            Direction::Input => self.selected_input.as_ref(),
            Direction::Output => self.selected_output.as_ref(),
        }
    }

    /// Published volume for one direction.
    pub fn volume(&self, direction: Direction) -> f32 {
        match direction {
            Direction::Input => self.input_volume,
            Direction::Output => self.output_volume,
        }
    }

    /// Look up a device by its persistent identifier.
    pub fn find_by_uid(&self, direction: Direction, uid: &str) -> Option<&AudioDevice> {
        self.devices(direction).iter().find(|d| d.uid == uid)
    }
}

/// Re-derive a selection after a refresh.
///
/// The OS-reported default device is matched into the fresh list by uid. A
/// device that vanished from the topology resolves to no selection, never
/// a dangling reference.
pub fn reconcile_selection(
    devices: &[AudioDevice],
    default_uid: Option<&str>,
) -> Option<AudioDevice> {
    let uid = default_uid?;
    devices.iter().find(|d| d.uid == uid).cloned()
}
