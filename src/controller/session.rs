//! Device session lifecycle
//!
//! A session moves through three typed states:
//!
//! ```text
//! Opened ──acquire()──► Acquired ──release()──► Released
//! ```
//!
//! Polling, draining and snapshots are only reachable on `Acquired`. The device handle
//! is held by a [`DeviceLease`] which releases an acquired device when dropped, so the
//! release happens exactly once on every exit path.

use statum::{machine, state};
use tracing::{debug, info, warn};

use super::device::{
    BufferedEvent, DeviceDescriptor, DeviceStateSnapshot, InputBackend, InputDevice,
};
use super::error::ReaderError;

/// Owned device handle with an idempotent release
struct DeviceLease {
    device: Box<dyn InputDevice>,
    acquired: bool,
    released: bool,
}

impl DeviceLease {
    fn new(device: Box<dyn InputDevice>) -> Self {
        Self {
            device,
            acquired: false,
            released: false,
        }
    }

    /// Releases the device if it was acquired and not released yet
    fn release(&mut self) -> bool {
        if !self.acquired || self.released {
            return false;
        }
        self.device.release();
        self.released = true;
        true
    }
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        if self.release() {
            warn!("Device session dropped without explicit release, released implicitly");
        }
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum SessionState {
    Opened,
    Acquired,
    Released,
}

#[machine]
pub struct DeviceSession<S: SessionState> {
    lease: DeviceLease,
    product_name: String,
}

impl DeviceSession<Opened> {
    /// Opens the device described by `descriptor` without acquiring it
    pub fn open<B: InputBackend>(
        backend: B,
        descriptor: &DeviceDescriptor,
    ) -> Result<Self, ReaderError> {
        debug!(
            "Opening device '{}' ({})",
            descriptor.product_name, descriptor.instance_id
        );
        let device = backend
            .open(descriptor)
            .map_err(|e| ReaderError::AcquisitionError(e.to_string()))?;

        Ok(Self::new(DeviceLease::new(device), descriptor.product_name.clone()))
    }

    /// Bounds the event buffer and acquires the device
    pub fn acquire(
        mut self,
        buffer_capacity: usize,
    ) -> Result<DeviceSession<Acquired>, ReaderError> {
        self.lease.device.set_buffer_capacity(buffer_capacity);
        self.lease
            .device
            .acquire()
            .map_err(|e| ReaderError::AcquisitionError(e.to_string()))?;
        self.lease.acquired = true;

        info!(
            "Acquired '{}' with an event buffer of {} entries",
            self.product_name, buffer_capacity
        );
        Ok(self.transition())
    }
}

impl DeviceSession<Acquired> {
    /// Refreshes the device. Any failure is fatal for the session.
    pub fn poll(&mut self) -> Result<(), ReaderError> {
        self.lease
            .device
            .poll()
            .map_err(|e| ReaderError::ReadError(e.to_string()))
    }

    /// Returns the events accumulated since the last call, oldest first
    pub fn drain_events(&mut self) -> Vec<BufferedEvent> {
        let dropped = self.lease.device.take_dropped_count();
        if dropped > 0 {
            warn!("Event buffer overflowed, {} oldest event(s) were dropped", dropped);
        }
        self.lease.device.drain_events()
    }

    pub fn snapshot(&self) -> DeviceStateSnapshot {
        self.lease.device.snapshot()
    }

    pub fn release(mut self) -> DeviceSession<Released> {
        if self.lease.release() {
            info!("Released '{}'", self.product_name);
        }
        self.transition()
    }
}

/// Opens and acquires the device in one step
pub fn open<B: InputBackend>(
    backend: B,
    descriptor: &DeviceDescriptor,
    buffer_capacity: usize,
) -> Result<DeviceSession<Acquired>, ReaderError> {
    DeviceSession::<Opened>::open(backend, descriptor)?.acquire(buffer_capacity)
}
