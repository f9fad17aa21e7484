//! Controlling-thread state machine.
//!
//! All mutation of the published [`AudioState`] happens on one worker
//! thread: the OS callback thread only posts events, callers only post
//! commands with reply channels, and observers receive immutable
//! snapshots. A refresh triggered while another is pending simply
//! supersedes it on publish; refresh is idempotent, so a discarded
//! intermediate result is safe.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use crate::audio::device::{AudioDevice, AudioError, Direction};
use crate::audio::enumerator::DeviceRegistry;
use crate::audio::hardware::{HardwareEvent, HardwareInterface};
use crate::audio::notifications::{self, DEFAULT_COALESCE_WINDOW};
use crate::audio::policy::DefaultDeviceControl;
use crate::audio::state::{reconcile_selection, AudioState};
use crate::audio::volume::VolumeControl;

enum Command {
    Refresh {
        reply: Sender<Result<(), AudioError>>,
    },
    SelectDevice {
        device: AudioDevice,
        direction: Direction,
        reply: Sender<Result<(), AudioError>>,
    },
    SelectByUid {
        uid: String,
        direction: Direction,
        reply: Sender<Result<(), AudioError>>,
    },
    SetVolume {
        device: AudioDevice,
        direction: Direction,
        value: f32,
        reply: Sender<Result<(), AudioError>>,
    },
    SetSelectedVolume {
        direction: Direction,
        value: f32,
        reply: Sender<Result<(), AudioError>>,
    },
    Subscribe {
        sender: Sender<AudioState>,
    },
    Shutdown,
}

enum Message {
    Hardware(HardwareEvent),
    Command(Command),
}

/// Owner of the published audio state.
///
/// Spawns the controlling thread, wires the hardware topology listener
/// into it and exposes the imperative operations collaborators use.
pub struct AudioManager {
    tx: Sender<Message>,
    event_tx: Sender<HardwareEvent>,
    state: Arc<RwLock<AudioState>>,
    worker: Option<JoinHandle<()>>,
    forwarder: Option<JoinHandle<()>>,
}

impl AudioManager {
    /// Start the manager with the default notification coalescing window
    /// and run the initial enumeration pass. A failing initial pass is
    /// logged, not fatal: the manager starts from the default snapshot
    /// and recovers on the next refresh or topology event.
    pub fn spawn(hw: Arc<dyn HardwareInterface>) -> Result<Self, AudioError> {
        Self::with_coalesce_window(hw, DEFAULT_COALESCE_WINDOW)
    }

    /// Start the manager with an explicit coalescing window.
    pub fn with_coalesce_window(
        hw: Arc<dyn HardwareInterface>,
        window: Duration,
    ) -> Result<Self, AudioError> {
        let state = Arc::new(RwLock::new(AudioState::default()));
        let (tx, rx) = mpsc::channel();

        let (event_tx, event_rx) = notifications::channel();
        hw.subscribe(event_tx.clone())?;

        let worker_state = Arc::clone(&state);
        let worker = thread::Builder::new()
            .name("audio-worker".into())
            .spawn(move || Worker::new(hw, worker_state, window).run(rx))
            .map_err(|err| {
                warn!(%err, "failed to spawn audio worker thread");
                AudioError::Disconnected
            })?;

        // Forward OS callback events into the worker mailbox. The
        // hardware backend holds its event sender for the life of the
        // process, so `Drop` wakes this thread with one final event once
        // the mailbox is closed; the failed forward makes it exit.
        let forward = tx.clone();
        let forwarder = thread::spawn(move || {
            while let Ok(event) = event_rx.recv() {
                if forward.send(Message::Hardware(event)).is_err() {
                    break;
                }
            }
        });

        let manager = Self {
            tx,
            event_tx,
            state,
            worker: Some(worker),
            forwarder: Some(forwarder),
        };
        // Hardware may be unresponsive at startup. Collaborators still
        // get a working manager with the default snapshot; the next
        // refresh or topology event recovers the real state.
        if let Err(err) = manager.refresh() {
            warn!(%err, "initial enumeration failed, starting with an empty snapshot");
        }
        Ok(manager)
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> AudioState {
        match self.state.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Re-enumerate now and publish the result.
    pub fn refresh(&self) -> Result<(), AudioError> {
        self.request(|reply| Command::Refresh { reply })
    }

    /// Make `device` the OS default input endpoint.
    pub fn select_input_device(&self, device: &AudioDevice) -> Result<(), AudioError> {
        self.request(|reply| Command::SelectDevice {
            device: device.clone(),
            direction: Direction::Input,
            reply,
        })
    }

    /// Make `device` the OS default output endpoint.
    pub fn select_output_device(&self, device: &AudioDevice) -> Result<(), AudioError> {
        self.request(|reply| Command::SelectDevice {
            device: device.clone(),
            direction: Direction::Output,
            reply,
        })
    }

    /// Select a device by its persistent identifier.
    ///
    /// Used by the settings collaborator to restore a stored choice. A uid
    /// absent from the current snapshot is silently a no-op: the device may
    /// simply not be plugged in right now.
    pub fn select_device_by_uid(&self, uid: &str, direction: Direction) -> Result<(), AudioError> {
        self.request(|reply| Command::SelectByUid {
            uid: uid.to_string(),
            direction,
            reply,
        })
    }

    /// Set the volume of a specific device for one direction.
    ///
    /// Published volume changes only after the hardware confirmed the
    /// write; a rejected write surfaces [`AudioError::HardwareWrite`] and
    /// leaves published state untouched.
    pub fn set_volume(
        &self,
        device: &AudioDevice,
        direction: Direction,
        value: f32,
    ) -> Result<(), AudioError> {
        self.request(|reply| Command::SetVolume {
            device: device.clone(),
            direction,
            value,
            reply,
        })
    }

    /// Set the volume of the currently selected input device, if any.
    pub fn set_input_volume(&self, value: f32) -> Result<(), AudioError> {
        self.request(|reply| Command::SetSelectedVolume {
            direction: Direction::Input,
            value,
            reply,
        })
    }

    /// Set the volume of the currently selected output device, if any.
    pub fn set_output_volume(&self, value: f32) -> Result<(), AudioError> {
        self.request(|reply| Command::SetSelectedVolume {
            direction: Direction::Output,
            value,
            reply,
        })
    }

    /// Receive every published snapshot, starting with the current one.
    pub fn subscribe(&self) -> Receiver<AudioState> {
        let (sender, receiver) = mpsc::channel();
        let _ = self.tx.send(Message::Command(Command::Subscribe { sender }));
        receiver
    }

    fn request(
        &self,
        command: impl FnOnce(Sender<Result<(), AudioError>>) -> Command,
    ) -> Result<(), AudioError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx
            .send(Message::Command(command(reply_tx)))
            .map_err(|_| AudioError::Disconnected)?;
        reply_rx.recv().map_err(|_| AudioError::Disconnected)?
    }
}

impl Drop for AudioManager {
    fn drop(&mut self) {
        let _ = self.tx.send(Message::Command(Command::Shutdown));
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        // The worker mailbox is closed now. One last event makes the
        // forwarder observe the closed mailbox and exit rather than
        // parking on the event channel forever.
        let _ = self.event_tx.send(HardwareEvent::DevicesChanged);
        if let Some(forwarder) = self.forwarder.take() {
            let _ = forwarder.join();
        }
    }
}

/// The controlling thread: sole writer of the published state.
struct Worker {
    hw: Arc<dyn HardwareInterface>,
    registry: DeviceRegistry,
    volume: VolumeControl,
    policy: DefaultDeviceControl,
    state: Arc<RwLock<AudioState>>,
    observers: Vec<Sender<AudioState>>,
    window: Duration,
}

impl Worker {
    fn new(hw: Arc<dyn HardwareInterface>, state: Arc<RwLock<AudioState>>, window: Duration) -> Self {
        Self {
            registry: DeviceRegistry::new(Arc::clone(&hw)),
            volume: VolumeControl::new(Arc::clone(&hw)),
            policy: DefaultDeviceControl::new(Arc::clone(&hw)),
            hw,
            state,
            observers: Vec::new(),
            window,
        }
    }

    fn run(mut self, rx: Receiver<Message>) {
        loop {
            match rx.recv() {
                Ok(Message::Command(Command::Shutdown)) | Err(_) => break,
                Ok(Message::Command(command)) => self.handle_command(command),
                Ok(Message::Hardware(event)) => {
                    if !self.coalesce_and_refresh(event, &rx) {
                        break;
                    }
                }
            }
        }
        debug!("audio worker stopped");
    }

    /// Fold a burst of topology notifications into a single refresh:
    /// keep draining until the coalescing window elapses with no new
    /// event. Commands arriving mid-burst are served immediately.
    /// Returns false when the mailbox closed.
    fn coalesce_and_refresh(&mut self, first: HardwareEvent, rx: &Receiver<Message>) -> bool {
        let mut burst = 1usize;
        loop {
            match rx.recv_timeout(self.window) {
                Ok(Message::Hardware(_)) => burst += 1,
                Ok(Message::Command(Command::Shutdown)) => return false,
                Ok(Message::Command(command)) => self.handle_command(command),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => return false,
            }
        }

        debug!(?first, burst, "topology changed, refreshing");
        if let Err(err) = self.refresh_and_publish() {
            warn!(%err, "refresh after topology change failed, keeping last snapshot");
        }
        true
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Refresh { reply } => {
                let _ = reply.send(self.refresh_and_publish());
            }
            Command::SelectDevice {
                device,
                direction,
                reply,
            } => {
                let _ = reply.send(self.select(&device, direction));
            }
            Command::SelectByUid {
                uid,
                direction,
                reply,
            } => {
                let found = self.current().find_by_uid(direction, &uid).cloned();
                let result = match found {
                    Some(device) => self.select(&device, direction),
                    None => {
                        debug!(uid, %direction, "no device with requested uid, ignoring");
                        Ok(())
                    }
                };
                let _ = reply.send(result);
            }
            Command::SetVolume {
                device,
                direction,
                value,
                reply,
            } => {
                let _ = reply.send(self.set_volume(&device, direction, value));
            }
            Command::SetSelectedVolume {
                direction,
                value,
                reply,
            } => {
                let result = match self.current().selected(direction).cloned() {
                    Some(device) => self.set_volume(&device, direction, value),
                    None => Ok(()),
                };
                let _ = reply.send(result);
            }
            Command::Subscribe { sender } => {
                let _ = sender.send(self.current());
                self.observers.push(sender);
            }
            // Handled in the receive loops.
            Command::Shutdown => {}
        }
    }

    /// One full refresh cycle: enumerate, reconcile selections against the
    /// OS defaults, re-read selected volumes, publish wholesale.
    fn refresh_and_publish(&mut self) -> Result<(), AudioError> {
        let (inputs, outputs) = self.registry.refresh()?;

        let default_input_uid = self.default_uid(Direction::Input);
        let default_output_uid = self.default_uid(Direction::Output);
        let selected_input = reconcile_selection(&inputs, default_input_uid.as_deref());
        let selected_output = reconcile_selection(&outputs, default_output_uid.as_deref());

        let previous = self.current();
        let input_volume = selected_input
            .as_ref()
            .map(|d| self.volume.get(d, Direction::Input))
            .unwrap_or(previous.input_volume);
        let output_volume = selected_output
            .as_ref()
            .map(|d| self.volume.get(d, Direction::Output))
            .unwrap_or(previous.output_volume);

        self.publish(AudioState {
            input_devices: inputs,
            output_devices: outputs,
            selected_input,
            selected_output,
            input_volume,
            output_volume,
        });
        Ok(())
    }

    /// Persistent identifier of the OS default device for a direction.
    fn default_uid(&self, direction: Direction) -> Option<String> {
        let id = self.policy.current(direction)?;
        match self.hw.device_uid(id) {
            Ok(uid) => Some(uid),
            Err(err) => {
                warn!(device = id, %direction, %err, "default device uid query failed");
                None
            }
        }
    }

    fn select(&mut self, device: &AudioDevice, direction: Direction) -> Result<(), AudioError> {
        self.policy.set_default(device, direction)?;

        let mut next = self.current();
        let volume = self.volume.get(device, direction);
        match direction {
            Direction::Input => {
                next.selected_input = Some(device.clone());
                next.input_volume = volume;
            }
            Direction::Output => {
                next.selected_output = Some(device.clone());
                next.output_volume = volume;
            }
        }
        self.publish(next);
        Ok(())
    }

    fn set_volume(
        &mut self,
        device: &AudioDevice,
        direction: Direction,
        value: f32,
    ) -> Result<(), AudioError> {
        // Only a confirmed hardware write may move the published value.
        self.volume.set(device, direction, value)?;

        let mut next = self.current();
        let is_selected = next
            .selected(direction)
            .map(|d| d.uid == device.uid)
            .unwrap_or(false);
        if is_selected {
            match direction {
                Direction::Input => next.input_volume = value.clamp(0.0, 1.0),
                Direction::Output => next.output_volume = value.clamp(0.0, 1.0),
            }
            self.publish(next);
        }
        Ok(())
    }

    fn current(&self) -> AudioState {
        match self.state.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn publish(&mut self, next: AudioState) {
        {
            let mut guard = match self.state.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            *guard = next.clone();
        }
        self.observers.retain(|observer| observer.send(next.clone()).is_ok());
    }
}
