//! Textual rendering of full device snapshots
//!
//! Idle axes (value exactly 0) are left out so a resting controller produces a short,
//! stable report. Buttons are listed only while pressed.

use super::device::DeviceStateSnapshot;

const PRIMARY_AXES: [&str; 6] = ["X", "Y", "Z", "RotationX", "RotationY", "RotationZ"];

pub const NO_MOVEMENT: &str = "(no movement)";
pub const NONE_PRESSED: &str = "(none pressed)";

/// Rendered bodies of one snapshot report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotReport {
    pub axes: String,
    pub buttons: String,
    /// `None` for devices without POV controllers
    pub povs: Option<String>,
}

impl SnapshotReport {
    pub fn axes_line(&self) -> String {
        format!("Axes: {}", self.axes)
    }

    pub fn buttons_line(&self) -> String {
        format!("Buttons: {}", self.buttons)
    }

    pub fn povs_line(&self) -> Option<String> {
        self.povs.as_ref().map(|povs| format!("POVs: {povs}"))
    }
}

pub fn render(snapshot: &DeviceStateSnapshot) -> SnapshotReport {
    SnapshotReport {
        axes: render_axes(snapshot),
        buttons: render_buttons(&snapshot.buttons),
        povs: render_povs(snapshot),
    }
}

fn render_axes(snapshot: &DeviceStateSnapshot) -> String {
    let primary = PRIMARY_AXES
        .iter()
        .zip(snapshot.axes)
        .map(|(name, value)| (name.to_string(), value));
    let sliders = snapshot
        .sliders
        .iter()
        .enumerate()
        .map(|(i, value)| (format!("Slider {i}"), *value));

    let moved: Vec<String> = primary
        .chain(sliders)
        .filter(|(_, value)| *value != 0)
        .map(|(name, value)| format!("{name}: {value}"))
        .collect();

    if moved.is_empty() {
        NO_MOVEMENT.to_string()
    } else {
        moved.join(", ")
    }
}

fn render_buttons(buttons: &[bool]) -> String {
    let pressed: Vec<String> = buttons
        .iter()
        .enumerate()
        .filter(|(_, pressed)| **pressed)
        .map(|(index, _)| format!("Button {index}"))
        .collect();

    if pressed.is_empty() {
        NONE_PRESSED.to_string()
    } else {
        pressed.join(", ")
    }
}

fn render_povs(snapshot: &DeviceStateSnapshot) -> Option<String> {
    if snapshot.povs.is_empty() {
        return None;
    }

    let povs: Vec<String> = snapshot
        .povs
        .iter()
        .enumerate()
        .map(|(i, pov)| {
            if pov.is_neutral() {
                format!("POV {i}: Neutral")
            } else {
                format!("POV {i}: {}", pov.0)
            }
        })
        .collect();

    Some(povs.join(", "))
}
