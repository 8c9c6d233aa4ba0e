//! Display labels for device objects
//!
//! The map is built once from the capability list of the selected device and consulted
//! for every buffered event afterwards.

use std::collections::HashMap;
use tracing::debug;

use super::device::{DeviceDescriptor, ObjectDescriptor, ObjectFlags, Offset};

/// Offset → label lookup for axis, button and POV objects
#[derive(Debug, Clone, Default)]
pub struct ObjectNameMap {
    labels: HashMap<Offset, String>,
}

impl ObjectNameMap {
    /// Builds the map from the device's capability list
    ///
    /// Objects without an axis, button or POV flag are skipped. When several objects
    /// share an offset, the first one decides the label.
    pub fn build(descriptor: &DeviceDescriptor) -> Self {
        Self::from_objects(&descriptor.objects)
    }

    pub fn from_objects(objects: &[ObjectDescriptor]) -> Self {
        let mut labels = HashMap::new();

        for object in objects
            .iter()
            .filter(|o| o.flags.intersects(ObjectFlags::REPORTABLE))
        {
            labels
                .entry(object.offset)
                .or_insert_with(|| label_for(object));
        }

        debug!("Resolved {} object label(s)", labels.len());
        Self { labels }
    }

    pub fn get(&self, offset: Offset) -> Option<&str> {
        self.labels.get(&offset).map(String::as_str)
    }

    /// Label for `offset`, or the offset's own textual form when unknown
    pub fn resolve(&self, offset: Offset) -> String {
        match self.get(offset) {
            Some(label) => label.to_string(),
            None => offset.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

fn label_for(object: &ObjectDescriptor) -> String {
    match object.name.as_deref() {
        Some(name) if !name.trim().is_empty() => name.to_string(),
        _ => object.object_type.to_string(),
    }
}
