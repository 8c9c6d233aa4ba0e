//! Device capability layer
//!
//! The reader never talks to an input library directly. Everything it needs from the
//! OS input subsystem goes through two traits:
//!
//! * [`InputBackend`] - enumerates devices by class and opens one of them
//! * [`InputDevice`] - an opened device that can be acquired, polled, drained,
//!   snapshotted and released
//!
//! The gilrs implementation lives in [`super::gilrs_backend`]. Tests drive the same
//! traits with the scripted device from `virtual_device`.

use bitflags::bitflags;
use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::fmt;

/// Stable identifier of one input object on a device
///
/// Join key between buffered events and the labels of the name map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Offset(pub u32);

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Offset {}", self.0)
    }
}

bitflags! {
    /// Semantic flags of a device object. One object may carry several.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ObjectFlags: u8 {
        const AXIS = 1 << 0;
        const BUTTON = 1 << 1;
        const POV = 1 << 2;
        const FORCE_FEEDBACK = 1 << 3;
        const COLLECTION = 1 << 4;
    }
}

impl ObjectFlags {
    /// Objects that get a label in the name map
    pub const REPORTABLE: ObjectFlags = ObjectFlags::AXIS
        .union(ObjectFlags::BUTTON)
        .union(ObjectFlags::POV);
}

/// Declared type of a device object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Axis,
    Slider,
    Button,
    PointOfView,
    Actuator,
    Collection,
    Unknown,
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectType::Axis => "Axis",
            ObjectType::Slider => "Slider",
            ObjectType::Button => "Button",
            ObjectType::PointOfView => "PointOfView",
            ObjectType::Actuator => "Actuator",
            ObjectType::Collection => "Collection",
            ObjectType::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// One entry of a device's capability list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDescriptor {
    pub offset: Offset,
    pub flags: ObjectFlags,
    pub object_type: ObjectType,
    /// Name supplied by the device or its mapping, may be blank
    pub name: Option<String>,
}

/// Device class used for enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    Gamepad,
    Joystick,
}

/// Identity and capabilities of an enumerated device
///
/// Built by the backend at enumeration time and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Backend-local handle used to reopen the device
    pub instance: usize,
    /// Unique device identifier (hyphenated UUID for gilrs devices)
    pub instance_id: String,
    pub product_name: String,
    pub class: DeviceClass,
    pub objects: Vec<ObjectDescriptor>,
}

/// A discrete change queued by the device between two polls
#[derive(Debug, Clone, PartialEq)]
pub struct BufferedEvent {
    pub offset: Offset,
    pub value: i32,
    pub timestamp: DateTime<Local>,
}

/// Reading of a single point-of-view controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PovReading(pub i32);

impl PovReading {
    pub const NEUTRAL: PovReading = PovReading(-1);

    /// Negative values mean no direction is pressed
    pub fn is_neutral(&self) -> bool {
        self.0 < 0
    }
}

/// Full point-in-time state of a device
///
/// Primary axes are ordered X, Y, Z, RotationX, RotationY, RotationZ.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceStateSnapshot {
    pub axes: [i32; 6],
    pub sliders: Vec<i32>,
    pub buttons: Vec<bool>,
    pub povs: Vec<PovReading>,
}

/// Bounded FIFO of buffered events
///
/// Once full, pushing evicts the oldest event and counts it as dropped.
#[derive(Debug, Default)]
pub struct EventBuffer {
    events: VecDeque<BufferedEvent>,
    capacity: usize,
    dropped: usize,
}

impl EventBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        while self.events.len() > capacity {
            self.events.pop_front();
            self.dropped += 1;
        }
    }

    pub fn push(&mut self, event: BufferedEvent) {
        if self.capacity == 0 {
            self.dropped += 1;
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
            self.dropped += 1;
        }
        self.events.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<BufferedEvent> {
        self.events.drain(..).collect()
    }

    pub fn take_dropped(&mut self) -> usize {
        std::mem::take(&mut self.dropped)
    }
}

/// Errors raised by the capability layer
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Failed to initialize input backend: {0}")]
    BackendInit(String),

    #[error("Device {0} is not connected")]
    NotConnected(String),

    #[error("Device {0} was disconnected")]
    Disconnected(String),

    #[error("Device {0} is not acquired")]
    NotAcquired(String),
}

/// Source of input devices
pub trait InputBackend {
    /// Devices of `class` in the order the subsystem reports them
    fn enumerate(&mut self, class: DeviceClass) -> Vec<DeviceDescriptor>;

    /// Opens the device described by `descriptor`, handing it the backend's resources
    fn open(self, descriptor: &DeviceDescriptor) -> Result<Box<dyn InputDevice>, DeviceError>;
}

/// An opened input device
pub trait InputDevice {
    /// Bounds the event buffer. Older events are dropped once `capacity` is exceeded.
    fn set_buffer_capacity(&mut self, capacity: usize);

    fn acquire(&mut self) -> Result<(), DeviceError>;

    /// Refreshes the device state and moves pending changes into the event buffer
    fn poll(&mut self) -> Result<(), DeviceError>;

    /// Returns and clears the buffered events in arrival order
    fn drain_events(&mut self) -> Vec<BufferedEvent>;

    /// Number of events lost to buffer overflow since the last call
    fn take_dropped_count(&mut self) -> usize;

    fn snapshot(&self) -> DeviceStateSnapshot;

    fn release(&mut self);
}
