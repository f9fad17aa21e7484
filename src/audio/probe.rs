//! Capability probing.

use tracing::debug;

use super::device::{DeviceId, Direction};
use super::hardware::HardwareInterface;

/// Whether the device supports the given signal direction.
///
/// A device carries a direction when its stream configuration totals at
/// least one channel in that scope; buffers without channels do not
/// count. Any query failure (endpoint disconnected mid-probe, permission
/// error) reads as "not capable": capability only partitions device
/// lists, and a false negative is strictly safer than an error that
/// would blank the whole list.
pub fn probe(hw: &dyn HardwareInterface, id: DeviceId, direction: Direction) -> bool {
    match hw.stream_channel_count(id, direction) {
        Ok(channels) => channels > 0,
        Err(err) => {
            debug!(device = id, %direction, %err, "capability probe failed, treating as not capable");
            false
        }
    }
}
