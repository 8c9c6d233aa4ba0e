use std::time::Duration;

/// Fixed operating parameters of the reader
///
/// The program takes no configuration; these are the values it runs with. Tests build
/// their own instances to shrink the buffer or the tick interval.
#[derive(Clone, Debug)]
pub struct ReaderSettings {
    /// Pause between two polling ticks
    pub tick_interval: Duration,

    /// Capacity of the device event buffer; older events are dropped beyond it
    pub buffer_capacity: usize,

    /// Column width of the label in buffered event lines
    pub label_width: usize,

    /// Length of the separator printed after each snapshot report
    pub separator_width: usize,

    /// Title applied to the console window at startup
    pub console_title: String,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(20),
            buffer_capacity: 128,
            label_width: 25,
            separator_width: 60,
            console_title: "Controller Input Reader".to_string(),
        }
    }
}

impl ReaderSettings {
    pub fn separator(&self) -> String {
        "-".repeat(self.separator_width)
    }
}
