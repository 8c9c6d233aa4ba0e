//! gilrs-backed implementation of the capability layer
//!
//! Class mapping: devices with an SDL mapping, a named driver mapping or a mapped
//! south face button count as gamepads. Anything else is a generic joystick. Offsets
//! are the raw gilrs event codes.
//!
//! gilrs only learns about axes and buttons outside its mapping once they report a
//! value, so sliders and extra buttons join the snapshot layout as they are first seen.
//!
//! Value conventions:
//! - axes are scaled from `[-1.0, 1.0]` to `-32767..=32767`, with gilrs filters off
//! - button events carry 1 (pressed) or 0 (released)
//! - the D-pad is reported as one POV in hundredths of a degree (0 = up, clockwise),
//!   -1 when centered

use chrono::{DateTime, Local};
use gilrs::ev::{AxisOrBtn, Code};
use gilrs::{
    Axis, Button, Event, EventType, Gamepad, GamepadId, Gilrs, GilrsBuilder, MappingSource,
};
use tracing::{debug, error, info, trace};
use uuid::Uuid;

use super::device::{
    BufferedEvent, DeviceClass, DeviceDescriptor, DeviceError, DeviceStateSnapshot, EventBuffer,
    InputBackend, InputDevice, ObjectDescriptor, ObjectFlags, ObjectType, Offset, PovReading,
};

/// gilrs axes in X, Y, Z, RotationX, RotationY, RotationZ order
const PRIMARY_AXES: [Axis; 6] = [
    Axis::LeftStickX,
    Axis::LeftStickY,
    Axis::LeftZ,
    Axis::RightStickX,
    Axis::RightStickY,
    Axis::RightZ,
];

const DPAD_AXES: [Axis; 2] = [Axis::DPadX, Axis::DPadY];

/// Mapped buttons reported in snapshots; the D-pad only shows up as the POV
const BUTTONS: [Button; 15] = [
    Button::South,
    Button::East,
    Button::North,
    Button::West,
    Button::C,
    Button::Z,
    Button::LeftTrigger,
    Button::LeftTrigger2,
    Button::RightTrigger,
    Button::RightTrigger2,
    Button::Select,
    Button::Start,
    Button::Mode,
    Button::LeftThumb,
    Button::RightThumb,
];

const DPAD_BUTTONS: [Button; 4] = [
    Button::DPadUp,
    Button::DPadDown,
    Button::DPadLeft,
    Button::DPadRight,
];

/// Offset given to the force feedback actuator, which has no event code
const ACTUATOR_OFFSET: Offset = Offset(u32::MAX);

const AXIS_SCALE: f32 = 32767.0;
const DPAD_AXIS_THRESHOLD: f32 = 0.5;

pub struct GilrsBackend {
    gilrs: Gilrs,
}

impl GilrsBackend {
    pub fn new() -> Result<Self, DeviceError> {
        info!("Initializing gilrs controller interface");
        // Deadzone and jitter filters would zero small deflections before they are reported.
        let mut gilrs = match GilrsBuilder::new().with_default_filters(false).build() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(DeviceError::BackendInit(e.to_string()));
            }
        };

        // Connection events queued during initialization would otherwise be reported
        // as input on the first tick.
        while let Some(Event { id, event, .. }) = gilrs.next_event() {
            trace!("Discarding startup event {:?} from {}", event, id);
        }

        Ok(Self { gilrs })
    }
}

impl InputBackend for GilrsBackend {
    fn enumerate(&mut self, class: DeviceClass) -> Vec<DeviceDescriptor> {
        let devices: Vec<DeviceDescriptor> = self
            .gilrs
            .gamepads()
            .filter(|(_, gamepad)| class_of(gamepad) == class)
            .map(|(id, gamepad)| describe(id, &gamepad, class))
            .collect();

        for (idx, device) in devices.iter().enumerate() {
            debug!(
                "  [{}] {:?} '{}' ({}), {} object(s)",
                idx,
                class,
                device.product_name,
                device.instance_id,
                device.objects.len()
            );
        }
        devices
    }

    fn open(self, descriptor: &DeviceDescriptor) -> Result<Box<dyn InputDevice>, DeviceError> {
        let found = self
            .gilrs
            .gamepads()
            .find(|(id, _)| usize::from(*id) == descriptor.instance)
            .map(|(id, gamepad)| (id, Layout::of(&gamepad)));

        let Some((id, layout)) = found else {
            return Err(DeviceError::NotConnected(descriptor.instance_id.clone()));
        };

        debug!(
            "Opened gamepad {} with {} button(s), {} slider(s), dpad: {}",
            id,
            layout.buttons.len(),
            layout.sliders.len(),
            layout.has_dpad()
        );

        Ok(Box::new(GilrsDevice {
            gilrs: self.gilrs,
            id,
            instance_id: descriptor.instance_id.clone(),
            layout,
            buffer: EventBuffer::default(),
            acquired: false,
        }))
    }
}

/// Codes backing each part of a snapshot
///
/// Mapped codes are fixed when the device is opened. Unmapped axes and buttons are
/// appended in the order they are first seen, so existing indices never shift.
#[derive(Debug)]
struct Layout<C = Code> {
    primary: [Option<C>; 6],
    dpad_axes: Vec<C>,
    dpad_buttons: Vec<C>,
    sliders: Vec<C>,
    buttons: Vec<C>,
}

impl Layout {
    fn of(gamepad: &Gamepad<'_>) -> Self {
        let mapped_axes = |axes: &[Axis]| -> Vec<Code> {
            axes.iter().filter_map(|a| gamepad.axis_code(*a)).collect()
        };
        let mapped_buttons = |buttons: &[Button]| -> Vec<Code> {
            buttons.iter().filter_map(|b| gamepad.button_code(*b)).collect()
        };

        let mut layout = Layout::new(
            PRIMARY_AXES.map(|axis| gamepad.axis_code(axis)),
            mapped_axes(&DPAD_AXES[..]),
            mapped_buttons(&DPAD_BUTTONS[..]),
            mapped_buttons(&BUTTONS[..]),
        );
        for (code, _) in gamepad.state().axes() {
            layout.observe_axis(code);
        }
        for (code, _) in gamepad.state().buttons() {
            layout.observe_button(code);
        }
        layout
    }
}

impl<C: Copy + PartialEq> Layout<C> {
    fn new(
        primary: [Option<C>; 6],
        dpad_axes: Vec<C>,
        dpad_buttons: Vec<C>,
        buttons: Vec<C>,
    ) -> Self {
        let mut layout = Self {
            primary,
            dpad_axes,
            dpad_buttons,
            sliders: Vec::new(),
            buttons: Vec::new(),
        };
        for code in buttons {
            layout.observe_button(code);
        }
        layout
    }

    fn has_dpad(&self) -> bool {
        !self.dpad_axes.is_empty() || !self.dpad_buttons.is_empty()
    }

    /// Records an axis code, returns true if it became a new slider
    fn observe_axis(&mut self, code: C) -> bool {
        if self.primary.contains(&Some(code)) || self.dpad_axes.contains(&code) {
            return false;
        }
        push_new(&mut self.sliders, code)
    }

    /// Records a button code, returns true if it became a new snapshot button
    fn observe_button(&mut self, code: C) -> bool {
        if self.dpad_buttons.contains(&code) {
            return false;
        }
        push_new(&mut self.buttons, code)
    }
}

fn push_new<C: PartialEq>(codes: &mut Vec<C>, code: C) -> bool {
    if codes.contains(&code) {
        return false;
    }
    codes.push(code);
    true
}

pub struct GilrsDevice {
    gilrs: Gilrs,
    id: GamepadId,
    instance_id: String,
    layout: Layout,
    buffer: EventBuffer,
    acquired: bool,
}

impl InputDevice for GilrsDevice {
    fn set_buffer_capacity(&mut self, capacity: usize) {
        self.buffer.set_capacity(capacity);
    }

    fn acquire(&mut self) -> Result<(), DeviceError> {
        if self.gilrs.connected_gamepad(self.id).is_none() {
            return Err(DeviceError::NotConnected(self.instance_id.clone()));
        }
        self.acquired = true;
        Ok(())
    }

    fn poll(&mut self) -> Result<(), DeviceError> {
        if !self.acquired {
            return Err(DeviceError::NotAcquired(self.instance_id.clone()));
        }

        while let Some(Event { id, event, time, .. }) = self.gilrs.next_event() {
            if id != self.id {
                trace!("Skipping event from non-selected gamepad: {}", id);
                continue;
            }

            if let EventType::Disconnected = event {
                return Err(DeviceError::Disconnected(self.instance_id.clone()));
            }

            let Some((code, reading)) = reading_of(event) else {
                continue;
            };
            let discovered = match reading {
                Reading::Axis(_) => self.layout.observe_axis(code),
                Reading::Button(_) => self.layout.observe_button(code),
            };
            if discovered {
                debug!("Added {:?} code {} to the snapshot layout", reading, code.into_u32());
            }

            self.buffer.push(BufferedEvent {
                offset: Offset(code.into_u32()),
                value: reading.value(),
                timestamp: DateTime::<Local>::from(time),
            });
        }
        self.gilrs.inc();

        if self.gilrs.connected_gamepad(self.id).is_none() {
            return Err(DeviceError::Disconnected(self.instance_id.clone()));
        }
        Ok(())
    }

    fn drain_events(&mut self) -> Vec<BufferedEvent> {
        self.buffer.drain()
    }

    fn take_dropped_count(&mut self) -> usize {
        self.buffer.take_dropped()
    }

    fn snapshot(&self) -> DeviceStateSnapshot {
        let Some(gamepad) = self.gilrs.connected_gamepad(self.id) else {
            return DeviceStateSnapshot::default();
        };
        let state = gamepad.state();

        let axes = self
            .layout
            .primary
            .map(|code| code.map_or(0, |code| scale_axis(state.value(code))));
        let sliders = self
            .layout
            .sliders
            .iter()
            .map(|code| scale_axis(state.value(*code)))
            .collect();
        let buttons = self
            .layout
            .buttons
            .iter()
            .map(|code| state.is_pressed(*code))
            .collect();

        let povs = if self.layout.has_dpad() {
            vec![dpad_pov(&gamepad)]
        } else {
            Vec::new()
        };

        DeviceStateSnapshot {
            axes,
            sliders,
            buttons,
            povs,
        }
    }

    fn release(&mut self) {
        self.acquired = false;
        debug!("Released gamepad {}", self.id);
    }
}

fn class_of(gamepad: &Gamepad<'_>) -> DeviceClass {
    classify(
        gamepad.mapping_source(),
        gamepad.map_name().is_some(),
        gamepad.button_code(Button::South).is_some(),
    )
}

/// gilrs falls back to a driver mapping for every device, so a bare driver mapping
/// only counts as a gamepad when it exposes a face button.
fn classify(source: MappingSource, has_map_name: bool, has_face_button: bool) -> DeviceClass {
    match source {
        MappingSource::SdlMappings => DeviceClass::Gamepad,
        MappingSource::Driver if has_map_name || has_face_button => DeviceClass::Gamepad,
        _ => DeviceClass::Joystick,
    }
}

fn describe(id: GamepadId, gamepad: &Gamepad<'_>, class: DeviceClass) -> DeviceDescriptor {
    DeviceDescriptor {
        instance: usize::from(id),
        instance_id: Uuid::from_bytes(gamepad.uuid()).to_string(),
        product_name: gamepad.name().to_string(),
        class,
        objects: describe_objects(gamepad),
    }
}

fn describe_objects(gamepad: &Gamepad<'_>) -> Vec<ObjectDescriptor> {
    let axes: Vec<(Axis, Offset)> = PRIMARY_AXES
        .iter()
        .chain(DPAD_AXES.iter())
        .filter_map(|a| gamepad.axis_code(*a).map(|c| (*a, Offset(c.into_u32()))))
        .collect();
    let buttons: Vec<(Button, Offset)> = BUTTONS
        .iter()
        .chain(DPAD_BUTTONS.iter())
        .filter_map(|b| gamepad.button_code(*b).map(|c| (*b, Offset(c.into_u32()))))
        .collect();

    let state = gamepad.state();
    let unmapped: Vec<(Offset, ObjectType, Option<String>)> = state
        .axes()
        .map(|(code, _)| (code, ObjectType::Slider))
        .chain(state.buttons().map(|(code, _)| (code, ObjectType::Button)))
        .map(|(code, kind)| (Offset(code.into_u32()), kind, mapped_name(gamepad, code)))
        .collect();

    capability_objects(&axes, &buttons, &unmapped, gamepad.is_ff_supported())
}

/// Capability list in mapping order, followed by unmapped codes and the actuator
///
/// Each offset is listed once. D-pad axes and buttons carry the POV flag as well.
fn capability_objects(
    axes: &[(Axis, Offset)],
    buttons: &[(Button, Offset)],
    unmapped: &[(Offset, ObjectType, Option<String>)],
    force_feedback: bool,
) -> Vec<ObjectDescriptor> {
    let mut objects: Vec<ObjectDescriptor> = Vec::new();
    let mut add = |object: ObjectDescriptor| {
        if !objects.iter().any(|o| o.offset == object.offset) {
            objects.push(object);
        }
    };

    for &(axis, offset) in axes {
        let (flags, object_type) = if DPAD_AXES.contains(&axis) {
            (ObjectFlags::AXIS | ObjectFlags::POV, ObjectType::PointOfView)
        } else {
            (ObjectFlags::AXIS, ObjectType::Axis)
        };
        add(ObjectDescriptor {
            offset,
            flags,
            object_type,
            name: Some(format!("{axis:?}")),
        });
    }

    for &(button, offset) in buttons {
        let flags = if DPAD_BUTTONS.contains(&button) {
            ObjectFlags::BUTTON | ObjectFlags::POV
        } else {
            ObjectFlags::BUTTON
        };
        add(ObjectDescriptor {
            offset,
            flags,
            object_type: ObjectType::Button,
            name: Some(format!("{button:?}")),
        });
    }

    for (offset, object_type, name) in unmapped {
        let flags = match object_type {
            ObjectType::Button => ObjectFlags::BUTTON,
            _ => ObjectFlags::AXIS,
        };
        add(ObjectDescriptor {
            offset: *offset,
            flags,
            object_type: *object_type,
            name: name.clone(),
        });
    }

    if force_feedback {
        add(ObjectDescriptor {
            offset: ACTUATOR_OFFSET,
            flags: ObjectFlags::FORCE_FEEDBACK,
            object_type: ObjectType::Actuator,
            name: Some("Force Feedback".to_string()),
        });
    }

    objects
}

fn mapped_name(gamepad: &Gamepad<'_>, code: Code) -> Option<String> {
    match gamepad.axis_or_btn_name(code)? {
        AxisOrBtn::Axis(Axis::Unknown) | AxisOrBtn::Btn(Button::Unknown) => None,
        AxisOrBtn::Axis(axis) => Some(format!("{axis:?}")),
        AxisOrBtn::Btn(button) => Some(format!("{button:?}")),
    }
}

/// Value carried by an input event
#[derive(Debug, Clone, Copy, PartialEq)]
enum Reading {
    Axis(f32),
    Button(bool),
}

impl Reading {
    fn value(self) -> i32 {
        match self {
            Reading::Axis(value) => scale_axis(value),
            Reading::Button(pressed) => i32::from(pressed),
        }
    }
}

fn reading_of(event: EventType) -> Option<(Code, Reading)> {
    match event {
        EventType::AxisChanged(_, value, code) => Some((code, Reading::Axis(value))),
        EventType::ButtonPressed(_, code) => Some((code, Reading::Button(true))),
        EventType::ButtonReleased(_, code) => Some((code, Reading::Button(false))),
        _ => None,
    }
}

fn scale_axis(value: f32) -> i32 {
    (value.clamp(-1.0, 1.0) * AXIS_SCALE).round() as i32
}

fn dpad_pov(gamepad: &Gamepad<'_>) -> PovReading {
    let x = dpad_component(
        gamepad.is_pressed(Button::DPadRight),
        gamepad.is_pressed(Button::DPadLeft),
        gamepad.value(Axis::DPadX),
    );
    let y = dpad_component(
        gamepad.is_pressed(Button::DPadUp),
        gamepad.is_pressed(Button::DPadDown),
        gamepad.value(Axis::DPadY),
    );
    pov_from_direction(x, y)
}

/// Direction along one D-pad axis; buttons win over the axis unless they cancel out
fn dpad_component(positive: bool, negative: bool, axis_value: f32) -> i8 {
    match i8::from(positive) - i8::from(negative) {
        0 if axis_value >= DPAD_AXIS_THRESHOLD => 1,
        0 if axis_value <= -DPAD_AXIS_THRESHOLD => -1,
        direction => direction,
    }
}

/// Hat angle for a direction where x grows to the right and y grows upwards
fn pov_from_direction(x: i8, y: i8) -> PovReading {
    match (x.signum(), y.signum()) {
        (0, 1) => PovReading(0),
        (1, 1) => PovReading(4500),
        (1, 0) => PovReading(9000),
        (1, -1) => PovReading(13500),
        (0, -1) => PovReading(18000),
        (-1, -1) => PovReading(22500),
        (-1, 0) => PovReading(27000),
        (-1, 1) => PovReading(31500),
        _ => PovReading::NEUTRAL,
    }
}
