//! Controller subsystem: device acquisition and change reporting
//!
//! One-time setup followed by a single polling loop:
//!
//! 1. [`enumerator`] - picks the first gamepad, else the first joystick
//! 2. [`session`] - opens and acquires it with a bounded event buffer
//! 3. [`names`] - resolves object offsets to display labels
//! 4. [`poller`] - reports buffered events, or a [`formatter`] snapshot when idle
//!
//! # Architecture
//!
//! ```text
//! Backend ──► Enumerator ──► Session ──► Poller ──► Console
//!                              │           │
//!                           NameMap ───────┘
//! ```
//!
//! [`controller_handle`] ties the stages together and guarantees the session is released
//! on every exit path. All device access goes through the traits in [`device`].

pub mod controller_handle;
pub mod device;
pub mod enumerator;
pub mod error;
pub mod formatter;
pub mod gilrs_backend;
pub mod names;
pub mod poller;
pub mod session;

#[cfg(test)]
pub mod virtual_device;

pub use controller_handle::{ControllerHandle, Shutdown};
pub use error::ReaderError;
