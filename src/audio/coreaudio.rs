//! Core Audio production backend.
//!
//! The one real implementation of [`HardwareInterface`], wrapping the
//! process-global Core Audio object graph. Property selectors are FourCC
//! constants defined locally; core types and entry points come from
//! `coreaudio-sys`.

#![allow(non_snake_case)]

use std::ffi::c_void;
use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Mutex;

use core_foundation::base::TCFType;
use core_foundation::string::{CFString, CFStringRef};
use coreaudio_sys::{
    kAudioObjectSystemObject, AudioBufferList, AudioObjectAddPropertyListener,
    AudioObjectGetPropertyData, AudioObjectGetPropertyDataSize, AudioObjectHasProperty,
    AudioObjectID, AudioObjectPropertyAddress, AudioObjectSetPropertyData, OSStatus,
};
use tracing::debug;

use super::device::{AudioError, DeviceId, Direction};
use super::hardware::{HardwareEvent, HardwareInterface, VolumeStrategy};

// Property selectors.
const PROPERTY_DEVICES: u32 = 0x6465_7623; // 'dev#'
const PROPERTY_DEFAULT_INPUT_DEVICE: u32 = 0x6449_6E20; // 'dIn '
const PROPERTY_DEFAULT_OUTPUT_DEVICE: u32 = 0x646F_7574; // 'dOut'
const PROPERTY_NAME: u32 = 0x6C6E_616D; // 'lnam'
const PROPERTY_DEVICE_UID: u32 = 0x7569_6420; // 'uid '
const PROPERTY_STREAM_CONFIGURATION: u32 = 0x736C_6179; // 'slay'
const PROPERTY_VIRTUAL_MASTER_VOLUME: u32 = 0x766D_7663; // 'vmvc'
const PROPERTY_VOLUME_SCALAR: u32 = 0x766F_6C6D; // 'volm'

// Scopes and elements.
const SCOPE_GLOBAL: u32 = 0x676C_6F62; // 'glob'
const SCOPE_INPUT: u32 = 0x696E_7074; // 'inpt'
const SCOPE_OUTPUT: u32 = 0x6F75_7470; // 'outp'
const ELEMENT_MAIN: u32 = 0;

// The hardware-service property family lives in AudioToolbox, not
// CoreAudio, and reaches volume controls (notably on Bluetooth and
// virtual endpoints) that the plain object properties miss.
#[link(name = "AudioToolbox", kind = "framework")]
extern "C" {
    fn AudioHardwareServiceHasProperty(
        inObjectID: AudioObjectID,
        inAddress: *const AudioObjectPropertyAddress,
    ) -> u8;

    fn AudioHardwareServiceGetPropertyData(
        inObjectID: AudioObjectID,
        inAddress: *const AudioObjectPropertyAddress,
        inQualifierDataSize: u32,
        inQualifierData: *const c_void,
        ioDataSize: *mut u32,
        outData: *mut c_void,
    ) -> OSStatus;

    fn AudioHardwareServiceSetPropertyData(
        inObjectID: AudioObjectID,
        inAddress: *const AudioObjectPropertyAddress,
        inQualifierDataSize: u32,
        inQualifierData: *const c_void,
        inDataSize: u32,
        inData: *const c_void,
    ) -> OSStatus;
}

// The listener registration is process-global, so its forwarding target is
// too. The OS callback reads the sender from here and does nothing else.
static LISTENER_REGISTERED: AtomicBool = AtomicBool::new(false);
static EVENT_SENDER: Mutex<Option<Sender<HardwareEvent>>> = Mutex::new(None);

fn global_address(selector: u32) -> AudioObjectPropertyAddress {
    AudioObjectPropertyAddress {
        mSelector: selector,
        mScope: SCOPE_GLOBAL,
        mElement: ELEMENT_MAIN,
    }
}

fn scoped_address(selector: u32, direction: Direction) -> AudioObjectPropertyAddress {
    AudioObjectPropertyAddress {
        mSelector: selector,
        mScope: match direction {
            Direction::Input => SCOPE_INPUT,
            Direction::Output => SCOPE_OUTPUT,
        },
        mElement: ELEMENT_MAIN,
    }
}

fn volume_selector(strategy: VolumeStrategy) -> u32 {
    match strategy {
        VolumeStrategy::HardwareServiceMaster | VolumeStrategy::VirtualMaster => {
            PROPERTY_VIRTUAL_MASTER_VOLUME
        }
        VolumeStrategy::Scalar => PROPERTY_VOLUME_SCALAR,
    }
}

/// Runs on a thread owned by Core Audio: post events, touch nothing else.
unsafe extern "C" fn topology_listener(
    _object: AudioObjectID,
    address_count: u32,
    addresses: *const AudioObjectPropertyAddress,
    _client_data: *mut c_void,
) -> OSStatus {
    let guard = match EVENT_SENDER.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if let Some(sender) = guard.as_ref() {
        for i in 0..address_count as isize {
            let event = match (*addresses.offset(i)).mSelector {
                PROPERTY_DEFAULT_INPUT_DEVICE => HardwareEvent::DefaultInputChanged,
                PROPERTY_DEFAULT_OUTPUT_DEVICE => HardwareEvent::DefaultOutputChanged,
                _ => HardwareEvent::DevicesChanged,
            };
            let _ = sender.send(event);
        }
    }
    0
}

/// Hardware access through the Core Audio object graph.
#[derive(Default)]
pub struct CoreAudioHardware;

impl CoreAudioHardware {
    pub fn new() -> Self {
        Self
    }

    fn cfstring_property(
        &self,
        id: DeviceId,
        selector: u32,
        context: &'static str,
    ) -> Result<String, AudioError> {
        let address = global_address(selector);
        let mut value: CFStringRef = ptr::null();
        let mut size = mem::size_of::<CFStringRef>() as u32;

        let status = unsafe {
            AudioObjectGetPropertyData(
                id,
                &address,
                0,
                ptr::null(),
                &mut size,
                &mut value as *mut CFStringRef as *mut c_void,
            )
        };
        if status != 0 || value.is_null() {
            return Err(AudioError::HardwareQuery { context, status });
        }

        // Property data follows the create rule: we own the reference.
        let value = unsafe { CFString::wrap_under_create_rule(value) };
        Ok(value.to_string())
    }
}

impl HardwareInterface for CoreAudioHardware {
    fn device_ids(&self) -> Result<Vec<DeviceId>, AudioError> {
        let address = global_address(PROPERTY_DEVICES);
        let mut size: u32 = 0;

        let status = unsafe {
            AudioObjectGetPropertyDataSize(
                kAudioObjectSystemObject,
                &address,
                0,
                ptr::null(),
                &mut size,
            )
        };
        if status != 0 {
            return Err(AudioError::HardwareQuery {
                context: "device list size",
                status,
            });
        }

        let mut ids = vec![0 as AudioObjectID; size as usize / mem::size_of::<AudioObjectID>()];
        let status = unsafe {
            AudioObjectGetPropertyData(
                kAudioObjectSystemObject,
                &address,
                0,
                ptr::null(),
                &mut size,
                ids.as_mut_ptr() as *mut c_void,
            )
        };
        if status != 0 {
            return Err(AudioError::HardwareQuery {
                context: "device list",
                status,
            });
        }

        ids.truncate(size as usize / mem::size_of::<AudioObjectID>());
        Ok(ids)
    }

    fn device_name(&self, id: DeviceId) -> Result<String, AudioError> {
        self.cfstring_property(id, PROPERTY_NAME, "device name")
    }

    fn device_uid(&self, id: DeviceId) -> Result<String, AudioError> {
        self.cfstring_property(id, PROPERTY_DEVICE_UID, "device uid")
    }

    fn stream_channel_count(&self, id: DeviceId, direction: Direction) -> Result<u32, AudioError> {
        let address = scoped_address(PROPERTY_STREAM_CONFIGURATION, direction);
        let mut size: u32 = 0;

        let status =
            unsafe { AudioObjectGetPropertyDataSize(id, &address, 0, ptr::null(), &mut size) };
        if status != 0 {
            return Err(AudioError::HardwareQuery {
                context: "stream configuration size",
                status,
            });
        }
        if (size as usize) < mem::size_of::<AudioBufferList>() {
            return Ok(0);
        }

        // u64 storage keeps the cast to AudioBufferList aligned.
        let mut storage = vec![0u64; (size as usize + 7) / 8];
        let status = unsafe {
            AudioObjectGetPropertyData(
                id,
                &address,
                0,
                ptr::null(),
                &mut size,
                storage.as_mut_ptr() as *mut c_void,
            )
        };
        if status != 0 {
            return Err(AudioError::HardwareQuery {
                context: "stream configuration",
                status,
            });
        }

        // Channels may be spread over several buffers; a configuration
        // whose buffers all carry zero channels is not usable for the
        // direction, so the total is what matters.
        let list = storage.as_ptr() as *const AudioBufferList;
        let channels = unsafe {
            let buffers = (*list).mBuffers.as_ptr();
            (0..(*list).mNumberBuffers as usize)
                .map(|i| (*buffers.add(i)).mNumberChannels)
                .sum()
        };
        Ok(channels)
    }

    fn default_device(&self, direction: Direction) -> Result<Option<DeviceId>, AudioError> {
        let selector = match direction {
            Direction::Input => PROPERTY_DEFAULT_INPUT_DEVICE,
            Direction::Output => PROPERTY_DEFAULT_OUTPUT_DEVICE,
        };
        let address = global_address(selector);
        let mut id: AudioObjectID = 0;
        let mut size = mem::size_of::<AudioObjectID>() as u32;

        let status = unsafe {
            AudioObjectGetPropertyData(
                kAudioObjectSystemObject,
                &address,
                0,
                ptr::null(),
                &mut size,
                &mut id as *mut AudioObjectID as *mut c_void,
            )
        };
        if status != 0 {
            return Err(AudioError::HardwareQuery {
                context: "default device",
                status,
            });
        }
        // kAudioObjectUnknown: no default configured.
        Ok(if id == 0 { None } else { Some(id) })
    }

    fn set_default_device(&self, id: DeviceId, direction: Direction) -> Result<(), AudioError> {
        let selector = match direction {
            Direction::Input => PROPERTY_DEFAULT_INPUT_DEVICE,
            Direction::Output => PROPERTY_DEFAULT_OUTPUT_DEVICE,
        };
        let address = global_address(selector);
        let device_id: AudioObjectID = id;

        let status = unsafe {
            AudioObjectSetPropertyData(
                kAudioObjectSystemObject,
                &address,
                0,
                ptr::null(),
                mem::size_of::<AudioObjectID>() as u32,
                &device_id as *const AudioObjectID as *const c_void,
            )
        };
        if status != 0 {
            return Err(AudioError::HardwareWrite {
                context: "default device",
                status,
            });
        }
        Ok(())
    }

    fn volume_available(&self, id: DeviceId, strategy: VolumeStrategy, direction: Direction) -> bool {
        let address = scoped_address(volume_selector(strategy), direction);
        match strategy {
            VolumeStrategy::HardwareServiceMaster => unsafe {
                AudioHardwareServiceHasProperty(id, &address) != 0
            },
            _ => unsafe { AudioObjectHasProperty(id, &address) != 0 },
        }
    }

    fn read_volume(
        &self,
        id: DeviceId,
        strategy: VolumeStrategy,
        direction: Direction,
    ) -> Result<f32, AudioError> {
        let address = scoped_address(volume_selector(strategy), direction);
        let mut value: f32 = 0.0;
        let mut size = mem::size_of::<f32>() as u32;

        let status = match strategy {
            VolumeStrategy::HardwareServiceMaster => unsafe {
                AudioHardwareServiceGetPropertyData(
                    id,
                    &address,
                    0,
                    ptr::null(),
                    &mut size,
                    &mut value as *mut f32 as *mut c_void,
                )
            },
            _ => unsafe {
                AudioObjectGetPropertyData(
                    id,
                    &address,
                    0,
                    ptr::null(),
                    &mut size,
                    &mut value as *mut f32 as *mut c_void,
                )
            },
        };
        if status != 0 {
            return Err(AudioError::HardwareQuery {
                context: "volume read",
                status,
            });
        }
        Ok(value)
    }

    fn write_volume(
        &self,
        id: DeviceId,
        strategy: VolumeStrategy,
        direction: Direction,
        value: f32,
    ) -> Result<(), AudioError> {
        let address = scoped_address(volume_selector(strategy), direction);
        let size = mem::size_of::<f32>() as u32;

        let status = match strategy {
            VolumeStrategy::HardwareServiceMaster => unsafe {
                AudioHardwareServiceSetPropertyData(
                    id,
                    &address,
                    0,
                    ptr::null(),
                    size,
                    &value as *const f32 as *const c_void,
                )
            },
            _ => unsafe {
                AudioObjectSetPropertyData(
                    id,
                    &address,
                    0,
                    ptr::null(),
                    size,
                    &value as *const f32 as *const c_void,
                )
            },
        };
        if status != 0 {
            return Err(AudioError::HardwareWrite {
                context: "volume write",
                status,
            });
        }
        Ok(())
    }

    fn subscribe(&self, sender: Sender<HardwareEvent>) -> Result<(), AudioError> {
        {
            let mut guard = match EVENT_SENDER.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            *guard = Some(sender);
        }

        if LISTENER_REGISTERED.swap(true, Ordering::SeqCst) {
            debug!("topology listener already registered, replaced forwarding target");
            return Ok(());
        }

        // One registration each for the device list and the two default
        // device selectors, all funnelled through the same callback.
        for selector in [
            PROPERTY_DEVICES,
            PROPERTY_DEFAULT_INPUT_DEVICE,
            PROPERTY_DEFAULT_OUTPUT_DEVICE,
        ] {
            let address = global_address(selector);
            let status = unsafe {
                AudioObjectAddPropertyListener(
                    kAudioObjectSystemObject,
                    &address,
                    Some(topology_listener),
                    ptr::null_mut(),
                )
            };
            if status != 0 {
                LISTENER_REGISTERED.store(false, Ordering::SeqCst);
                return Err(AudioError::HardwareQuery {
                    context: "listener registration",
                    status,
                });
            }
        }
        debug!("topology change listener registered");
        Ok(())
    }
}
