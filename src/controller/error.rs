//! Error taxonomy of the reader

use thiserror::Error;

/// Terminal conditions of the reader
///
/// Every variant ends the process with a user-facing message. None of them is retried.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// Neither a gamepad nor a generic joystick is connected
    #[error(
        "No gamepad or joystick was detected. Connect a controller and restart the application."
    )]
    NoDeviceFound,

    /// The device exists but could not be opened or acquired
    #[error("Failed to acquire controller: {0}")]
    AcquisitionError(String),

    /// The device became unreadable while polling
    #[error("Input read error: {0}")]
    ReadError(String),

    /// Writing the report failed
    #[error("Console output failed: {0}")]
    Output(#[from] std::io::Error),
}
