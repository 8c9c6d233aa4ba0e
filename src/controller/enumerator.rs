use tracing::{debug, info};

use super::device::{DeviceClass, DeviceDescriptor, InputBackend};

/// Picks the device to monitor
///
/// The first gamepad wins. Without gamepads the first generic joystick is used.
/// Order is whatever the backend reports; no further ranking happens.
pub fn select_device<B: InputBackend>(backend: &mut B) -> Option<DeviceDescriptor> {
    for class in [DeviceClass::Gamepad, DeviceClass::Joystick] {
        let devices = backend.enumerate(class);
        debug!("Enumerated {} device(s) of class {:?}", devices.len(), class);

        if let Some(descriptor) = devices.into_iter().next() {
            info!(
                "Selected {:?} '{}' ({})",
                class, descriptor.product_name, descriptor.instance_id
            );
            return Some(descriptor);
        }
    }

    None
}
