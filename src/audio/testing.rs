//! Scriptable in-memory hardware backend for tests.

use std::collections::{HashMap, HashSet};
use std::sync::mpsc::Sender;
use std::sync::Mutex;

use super::device::{AudioError, DeviceId, Direction};
use super::hardware::{HardwareEvent, HardwareInterface, VolumeStrategy};

/// One simulated endpoint.
#[derive(Debug, Clone)]
pub struct FakeDevice {
    pub id: DeviceId,
    pub uid: String,
    pub name: String,
    input_channels: u32,
    output_channels: u32,
    volumes: HashMap<(VolumeStrategy, Direction), f32>,
    failing_volumes: HashSet<(VolumeStrategy, Direction)>,
    rejecting_volumes: HashSet<(VolumeStrategy, Direction)>,
    identity_fails: bool,
}

impl FakeDevice {
    pub fn new(id: DeviceId, uid: &str, name: &str) -> Self {
        Self {
            id,
            uid: uid.to_string(),
            name: name.to_string(),
            input_channels: 0,
            output_channels: 0,
            volumes: HashMap::new(),
            failing_volumes: HashSet::new(),
            rejecting_volumes: HashSet::new(),
            identity_fails: false,
        }
    }

    pub fn with_input(mut self) -> Self {
        self.input_channels = 1;
        self
    }

    pub fn with_output(mut self) -> Self {
        self.output_channels = 2;
        self
    }

    /// Set the exact channel total the stream configuration reports for a
    /// direction. Zero models an endpoint whose configuration lists
    /// buffers that carry no channels.
    pub fn with_channels(mut self, direction: Direction, channels: u32) -> Self {
        match direction {
            Direction::Input => self.input_channels = channels,
            Direction::Output => self.output_channels = channels,
        }
        self
    }

    /// Expose a volume property with an initial value.
    pub fn with_volume(mut self, strategy: VolumeStrategy, direction: Direction, value: f32) -> Self {
        self.volumes.insert((strategy, direction), value);
        self
    }

    /// The property stays present but every read/write on it errors.
    pub fn failing_volume(mut self, strategy: VolumeStrategy, direction: Direction) -> Self {
        self.failing_volumes.insert((strategy, direction));
        self
    }

    /// Reads succeed, but the hardware silently rejects writes.
    pub fn rejecting_volume_writes(
        mut self,
        strategy: VolumeStrategy,
        direction: Direction,
    ) -> Self {
        self.rejecting_volumes.insert((strategy, direction));
        self
    }

    /// Name and uid queries fail, as for an endpoint that disconnected
    /// mid-enumeration.
    pub fn failing_identity(mut self) -> Self {
        self.identity_fails = true;
        self
    }
}

#[derive(Default)]
struct Inner {
    devices: Vec<FakeDevice>,
    default_input: Option<DeviceId>,
    default_output: Option<DeviceId>,
    enumeration_calls: usize,
    failing_enumeration_calls: HashSet<usize>,
    default_writes_fail: bool,
    subscriptions: usize,
    sender: Option<Sender<HardwareEvent>>,
}

/// In-memory `HardwareInterface` with scriptable failures and call
/// counters.
#[derive(Default)]
pub struct FakeHardware {
    inner: Mutex<Inner>,
}

impl FakeHardware {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn push_device(&self, device: FakeDevice) {
        self.lock().devices.push(device);
    }

    pub fn remove_device(&self, uid: &str) {
        let mut inner = self.lock();
        inner.devices.retain(|d| d.uid != uid);
    }

    pub fn set_default_input(&self, id: Option<DeviceId>) {
        self.lock().default_input = id;
    }

    pub fn set_default_output(&self, id: Option<DeviceId>) {
        self.lock().default_output = id;
    }

    /// Make the n-th `device_ids` call fail (1-based).
    pub fn fail_enumeration_call(&self, call: usize) {
        self.lock().failing_enumeration_calls.insert(call);
    }

    pub fn fail_default_writes(&self, fail: bool) {
        self.lock().default_writes_fail = fail;
    }

    /// Number of base enumeration calls seen so far.
    pub fn enumeration_calls(&self) -> usize {
        self.lock().enumeration_calls
    }

    /// Number of listener registrations seen so far.
    pub fn subscriptions(&self) -> usize {
        self.lock().subscriptions
    }

    /// Deliver a topology event as the OS callback would. Returns whether
    /// anyone was still listening on the other end.
    pub fn emit(&self, event: HardwareEvent) -> bool {
        let sender = self.lock().sender.clone();
        match sender {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }

    fn with_device<T>(
        &self,
        id: DeviceId,
        context: &'static str,
        f: impl FnOnce(&mut FakeDevice) -> Result<T, AudioError>,
    ) -> Result<T, AudioError> {
        let mut inner = self.lock();
        match inner.devices.iter_mut().find(|d| d.id == id) {
            Some(device) => f(device),
            None => Err(AudioError::HardwareQuery {
                context,
                status: -4, // unknown object
            }),
        }
    }
}

impl HardwareInterface for FakeHardware {
    fn device_ids(&self) -> Result<Vec<DeviceId>, AudioError> {
        let mut inner = self.lock();
        inner.enumeration_calls += 1;
        if inner.failing_enumeration_calls.contains(&inner.enumeration_calls) {
            return Err(AudioError::HardwareQuery {
                context: "device list",
                status: -1,
            });
        }
        Ok(inner.devices.iter().map(|d| d.id).collect())
    }

    fn device_name(&self, id: DeviceId) -> Result<String, AudioError> {
        self.with_device(id, "device name", |device| {
            if device.identity_fails {
                Err(AudioError::HardwareQuery {
                    context: "device name",
                    status: -2,
                })
            } else {
                Ok(device.name.clone())
            }
        })
    }

    fn device_uid(&self, id: DeviceId) -> Result<String, AudioError> {
        self.with_device(id, "device uid", |device| {
            if device.identity_fails {
                Err(AudioError::HardwareQuery {
                    context: "device uid",
                    status: -2,
                })
            } else {
                Ok(device.uid.clone())
            }
        })
    }

    fn stream_channel_count(&self, id: DeviceId, direction: Direction) -> Result<u32, AudioError> {
        self.with_device(id, "stream configuration", |device| {
            Ok(match direction {
                Direction::Input => device.input_channels,
                Direction::Output => device.output_channels,
            })
        })
    }

    fn default_device(&self, direction: Direction) -> Result<Option<DeviceId>, AudioError> {
        let inner = self.lock();
        Ok(match direction {
            Direction::Input => inner.default_input,
            Direction::Output => inner.default_output,
        })
    }

    fn set_default_device(&self, id: DeviceId, direction: Direction) -> Result<(), AudioError> {
        let mut inner = self.lock();
        if inner.default_writes_fail {
            return Err(AudioError::HardwareWrite {
                context: "default device",
                status: -10,
            });
        }
        match direction {
            Direction::Input => inner.default_input = Some(id),
            Direction::Output => inner.default_output = Some(id),
        }
        Ok(())
    }

    fn volume_available(&self, id: DeviceId, strategy: VolumeStrategy, direction: Direction) -> bool {
        self.with_device(id, "volume availability", |device| {
            Ok(device.volumes.contains_key(&(strategy, direction)))
        })
        .unwrap_or(false)
    }

    fn read_volume(
        &self,
        id: DeviceId,
        strategy: VolumeStrategy,
        direction: Direction,
    ) -> Result<f32, AudioError> {
        self.with_device(id, "volume read", |device| {
            if device.failing_volumes.contains(&(strategy, direction)) {
                return Err(AudioError::HardwareQuery {
                    context: "volume read",
                    status: -3,
                });
            }
            device
                .volumes
                .get(&(strategy, direction))
                .copied()
                .ok_or(AudioError::HardwareQuery {
                    context: "volume read",
                    status: -3,
                })
        })
    }

    fn write_volume(
        &self,
        id: DeviceId,
        strategy: VolumeStrategy,
        direction: Direction,
        value: f32,
    ) -> Result<(), AudioError> {
        self.with_device(id, "volume write", |device| {
            if device.failing_volumes.contains(&(strategy, direction))
                || device.rejecting_volumes.contains(&(strategy, direction))
            {
                return Err(AudioError::HardwareWrite {
                    context: "volume write",
                    status: -3,
                });
            }
            if !device.volumes.contains_key(&(strategy, direction)) {
                return Err(AudioError::HardwareWrite {
                    context: "volume write",
                    status: -4,
                });
            }
            device.volumes.insert((strategy, direction), value);
            Ok(())
        })
    }

    fn subscribe(&self, sender: Sender<HardwareEvent>) -> Result<(), AudioError> {
        let mut inner = self.lock();
        inner.subscriptions += 1;
        // Process-global listener: a second registration replaces the
        // forwarding target instead of adding a parallel listener.
        inner.sender = Some(sender);
        Ok(())
    }
}
