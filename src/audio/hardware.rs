//! Hardware access boundary.
//!
//! The OS audio subsystem is process-global, so this trait has exactly one
//! production implementation wrapping it; tests inject fakes instead of
//! touching real hardware.

use std::sync::mpsc::Sender;

use super::device::{AudioError, DeviceId, Direction};

/// Hardware-level events delivered from the OS callback thread.
///
/// All variants mean the same thing to consumers: the published snapshot
/// may be stale and a refresh is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareEvent {
    /// The set of available endpoints changed.
    DevicesChanged,

    /// The OS-wide default input endpoint changed.
    DefaultInputChanged,

    /// The OS-wide default output endpoint changed.
    DefaultOutputChanged,
}

/// Volume property variants, each independently scoped by direction.
///
/// Hardware volume exposure is inconsistent across device classes, so
/// reads and writes try these in the fixed order of [`VolumeStrategy::PRIORITY`]
/// rather than branching on device type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VolumeStrategy {
    /// Hardware-service virtual master volume. Most reliable for Bluetooth
    /// and virtual endpoints.
    HardwareServiceMaster,

    /// Device-level virtual master volume.
    VirtualMaster,

    /// Plain volume scalar.
    Scalar,
}

impl VolumeStrategy {
    /// Fallback order for both reads and writes.
    pub const PRIORITY: [VolumeStrategy; 3] = [
        VolumeStrategy::HardwareServiceMaster,
        VolumeStrategy::VirtualMaster,
        VolumeStrategy::Scalar,
    ];
}

/// Boundary to the OS audio subsystem.
///
/// All property calls are synchronous and blocking with no OS-provided
/// timeout: a call either returns promptly or is treated as failed. No
/// retries happen at this layer; callers may re-issue.
pub trait HardwareInterface: Send + Sync {
    /// All endpoint handles currently known to the hardware subsystem.
    fn device_ids(&self) -> Result<Vec<DeviceId>, AudioError>;

    /// Display name of a device.
    fn device_name(&self, id: DeviceId) -> Result<String, AudioError>;

    /// Persistent identifier of a device.
    fn device_uid(&self, id: DeviceId) -> Result<String, AudioError>;

    /// Total channel count across the buffers of the device's stream
    /// configuration for the given direction. The capability probe
    /// primitive: a configuration may list buffers that carry no channels,
    /// and those do not make the device capable.
    fn stream_channel_count(&self, id: DeviceId, direction: Direction) -> Result<u32, AudioError>;

    /// Current OS-wide default endpoint for the direction, if any.
    fn default_device(&self, direction: Direction) -> Result<Option<DeviceId>, AudioError>;

    /// Make the device the OS-wide default endpoint for the direction.
    fn set_default_device(&self, id: DeviceId, direction: Direction) -> Result<(), AudioError>;

    /// Whether the device exposes the given volume property at all.
    fn volume_available(
        &self,
        id: DeviceId,
        strategy: VolumeStrategy,
        direction: Direction,
    ) -> bool;

    /// Read the normalized volume through one specific property.
    fn read_volume(
        &self,
        id: DeviceId,
        strategy: VolumeStrategy,
        direction: Direction,
    ) -> Result<f32, AudioError>;

    /// Write the normalized volume through one specific property.
    fn write_volume(
        &self,
        id: DeviceId,
        strategy: VolumeStrategy,
        direction: Direction,
        value: f32,
    ) -> Result<(), AudioError>;

    /// Register the process-wide topology listener, forwarding events into
    /// `sender`.
    ///
    /// At most one live registration is meaningful per process;
    /// implementations must guard against duplicates. The OS invokes the
    /// underlying callback on a thread it owns, and the callback must do
    /// nothing beyond posting events.
    fn subscribe(&self, sender: Sender<HardwareEvent>) -> Result<(), AudioError>;
}
