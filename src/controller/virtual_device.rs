//! Scripted in-memory backend for tests
//!
//! [`VirtualDevice`] replays a list of [`Tick`]s, one per `poll()`. When the script runs
//! out, the next poll reports a disconnect so loops always terminate. A shared
//! [`DeviceProbe`] records what the reader did to the device.

use chrono::Local;
use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use super::device::{
    BufferedEvent, DeviceClass, DeviceDescriptor, DeviceError, DeviceStateSnapshot, EventBuffer,
    InputBackend, InputDevice, ObjectDescriptor, ObjectFlags, ObjectType, Offset,
};

/// What a single poll of the virtual device produces
#[derive(Debug, Clone)]
pub enum Tick {
    /// Discrete changes as `(offset, value)` pairs
    Events(Vec<(u32, i32)>),
    /// No change since the last poll
    Quiet,
    /// The device fails to refresh
    Fail(String),
}

/// Counters shared between a test and the device it hands to the reader
#[derive(Debug, Default)]
pub struct DeviceProbe {
    pub opens: Cell<usize>,
    pub acquires: Cell<usize>,
    pub polls: Cell<usize>,
    pub snapshots: Cell<usize>,
    pub releases: Cell<usize>,
}

fn bump(cell: &Cell<usize>) {
    cell.set(cell.get() + 1);
}

pub struct VirtualDevice {
    script: VecDeque<Tick>,
    state: DeviceStateSnapshot,
    buffer: EventBuffer,
    acquire_failure: Option<String>,
    probe: Rc<DeviceProbe>,
}

impl VirtualDevice {
    pub fn new(script: Vec<Tick>, state: DeviceStateSnapshot) -> Self {
        Self {
            script: script.into(),
            state,
            buffer: EventBuffer::with_capacity(0),
            acquire_failure: None,
            probe: Rc::new(DeviceProbe::default()),
        }
    }

    /// Makes `acquire()` fail with `message`
    pub fn refuse_acquire(mut self, message: &str) -> Self {
        self.acquire_failure = Some(message.to_string());
        self
    }

    pub fn probe(&self) -> Rc<DeviceProbe> {
        Rc::clone(&self.probe)
    }
}

impl InputDevice for VirtualDevice {
    fn set_buffer_capacity(&mut self, capacity: usize) {
        self.buffer.set_capacity(capacity);
    }

    fn acquire(&mut self) -> Result<(), DeviceError> {
        bump(&self.probe.acquires);
        match &self.acquire_failure {
            Some(message) => Err(DeviceError::NotConnected(message.clone())),
            None => Ok(()),
        }
    }

    fn poll(&mut self) -> Result<(), DeviceError> {
        bump(&self.probe.polls);
        match self.script.pop_front() {
            Some(Tick::Events(events)) => {
                for (offset, value) in events {
                    self.buffer.push(BufferedEvent {
                        offset: Offset(offset),
                        value,
                        timestamp: Local::now(),
                    });
                }
                Ok(())
            }
            Some(Tick::Quiet) => Ok(()),
            Some(Tick::Fail(message)) => Err(DeviceError::Disconnected(message)),
            None => Err(DeviceError::Disconnected("virtual:0".to_string())),
        }
    }

    fn drain_events(&mut self) -> Vec<BufferedEvent> {
        self.buffer.drain()
    }

    fn take_dropped_count(&mut self) -> usize {
        self.buffer.take_dropped()
    }

    fn snapshot(&self) -> DeviceStateSnapshot {
        bump(&self.probe.snapshots);
        self.state.clone()
    }

    fn release(&mut self) {
        bump(&self.probe.releases);
    }
}

/// Backend serving fixed enumeration results and a single virtual device
pub struct VirtualBackend {
    gamepads: Vec<DeviceDescriptor>,
    joysticks: Vec<DeviceDescriptor>,
    enumerated: Vec<DeviceClass>,
    device: Option<VirtualDevice>,
    probe: Rc<DeviceProbe>,
}

impl VirtualBackend {
    pub fn new(gamepads: Vec<DeviceDescriptor>, joysticks: Vec<DeviceDescriptor>) -> Self {
        Self {
            gamepads,
            joysticks,
            enumerated: Vec::new(),
            device: None,
            probe: Rc::new(DeviceProbe::default()),
        }
    }

    /// Device returned by `open()`; its probe replaces the backend's own
    pub fn with_device(mut self, device: VirtualDevice) -> Self {
        self.probe = device.probe();
        self.device = Some(device);
        self
    }

    pub fn probe(&self) -> Rc<DeviceProbe> {
        Rc::clone(&self.probe)
    }

    pub fn enumerated_classes(&self) -> &[DeviceClass] {
        &self.enumerated
    }
}

impl InputBackend for VirtualBackend {
    fn enumerate(&mut self, class: DeviceClass) -> Vec<DeviceDescriptor> {
        self.enumerated.push(class);
        match class {
            DeviceClass::Gamepad => self.gamepads.clone(),
            DeviceClass::Joystick => self.joysticks.clone(),
        }
    }

    fn open(self, descriptor: &DeviceDescriptor) -> Result<Box<dyn InputDevice>, DeviceError> {
        bump(&self.probe.opens);
        match self.device {
            Some(device) => Ok(Box::new(device)),
            None => Err(DeviceError::NotConnected(descriptor.instance_id.clone())),
        }
    }
}

/// Descriptor of a small device: two axes, two buttons and a hat
pub fn descriptor(instance: usize, name: &str, class: DeviceClass) -> DeviceDescriptor {
    DeviceDescriptor {
        instance,
        instance_id: format!("virtual:{instance}"),
        product_name: name.to_string(),
        class,
        objects: vec![
            object(0, ObjectFlags::AXIS, ObjectType::Axis, Some("X Axis")),
            object(4, ObjectFlags::AXIS, ObjectType::Axis, Some("Y Axis")),
            object(48, ObjectFlags::BUTTON, ObjectType::Button, Some("Trigger")),
            object(49, ObjectFlags::BUTTON, ObjectType::Button, None),
            object(32, ObjectFlags::POV, ObjectType::PointOfView, Some("Hat Switch")),
        ],
    }
}

pub fn object(
    offset: u32,
    flags: ObjectFlags,
    object_type: ObjectType,
    name: Option<&str>,
) -> ObjectDescriptor {
    ObjectDescriptor {
        offset: Offset(offset),
        flags,
        object_type,
        name: name.map(str::to_string),
    }
}
