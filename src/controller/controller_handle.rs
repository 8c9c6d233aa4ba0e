//! Controller Handle - startup and shutdown of the reader
//!
//! Wires the one-time setup (selection, session, name map) to the polling loop and owns
//! the teardown: however the loop ends, the device session is released exactly once
//! before the handle reports why it stopped.

use std::future::Future;
use std::io::Write;
use tracing::{debug, info, warn};

use super::device::InputBackend;
use super::enumerator::select_device;
use super::error::ReaderError;
use super::names::ObjectNameMap;
use super::poller::Poller;
use super::session;
use crate::config::ReaderSettings;
use crate::console::Console;

/// Why the reader stopped
#[derive(Debug)]
pub enum Shutdown {
    /// The cancellation signal fired
    Cancelled,
    /// The polling loop hit a fatal error
    Failed(ReaderError),
}

/// Handle over an acquired device and its polling loop
pub struct ControllerHandle<W: Write> {
    poller: Poller<W>,
}

impl<W: Write> ControllerHandle<W> {
    /// Selects a device, acquires it and prepares the polling loop
    ///
    /// # Errors
    ///
    /// * [`ReaderError::NoDeviceFound`] - no gamepad or joystick; nothing is opened
    /// * [`ReaderError::AcquisitionError`] - the selected device could not be acquired
    /// * [`ReaderError::Output`] - the startup banner could not be written
    pub fn start<B: InputBackend>(
        mut backend: B,
        mut console: Console<W>,
        settings: ReaderSettings,
    ) -> Result<Self, ReaderError> {
        info!("Initializing reader with settings: {:?}", settings);

        let descriptor = select_device(&mut backend).ok_or(ReaderError::NoDeviceFound)?;
        console.line(&format!(
            "Detected controller: {} ({})",
            descriptor.product_name, descriptor.instance_id
        ))?;

        let session = session::open(backend, &descriptor, settings.buffer_capacity)?;
        let names = ObjectNameMap::build(&descriptor);
        if names.is_empty() {
            warn!("Device reports no reportable objects, events are labeled by offset");
        }
        debug!(
            "Built name map with {} label(s) for {} object(s)",
            names.len(),
            descriptor.objects.len()
        );

        console.line("Listening for controller input. Press Ctrl+C to exit.\n")?;
        console.flush()?;

        Ok(Self {
            poller: Poller::new(session, names, console, settings),
        })
    }

    /// Polls until the loop fails or `cancel` completes, then releases the device
    pub async fn run_until<F>(mut self, cancel: F) -> (Shutdown, Console<W>)
    where
        F: Future<Output = ()>,
    {
        let shutdown = tokio::select! {
            error = self.poller.run() => Shutdown::Failed(error),
            _ = cancel => Shutdown::Cancelled,
        };

        match &shutdown {
            Shutdown::Cancelled => info!("Cancellation received, shutting down"),
            Shutdown::Failed(_) => debug!("Polling loop failed, releasing device"),
        }

        let (session, console) = self.poller.into_parts();
        session.release();
        (shutdown, console)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::device::{DeviceClass, DeviceStateSnapshot};
    use crate::controller::virtual_device::{descriptor, Tick, VirtualBackend, VirtualDevice};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tracing_subscriber::fmt::MakeWriter;

    /// Log sink shared with a test-local subscriber
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().expect("lock").clone()).expect("utf8")
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn fast_settings() -> ReaderSettings {
        ReaderSettings {
            tick_interval: Duration::from_millis(1),
            ..ReaderSettings::default()
        }
    }

    fn text(console: Console<Vec<u8>>) -> String {
        String::from_utf8(console.into_inner()).expect("utf8")
    }

    #[test]
    fn no_device_found_never_opens_anything() {
        let backend = VirtualBackend::new(Vec::new(), Vec::new());
        let probe = backend.probe();

        let result = ControllerHandle::start(backend, Console::new(Vec::new()), fast_settings());

        assert!(matches!(result, Err(ReaderError::NoDeviceFound)));
        assert_eq!(probe.opens.get(), 0);
        assert_eq!(probe.acquires.get(), 0);
    }

    #[test]
    fn acquisition_failure_is_reported() {
        let device = VirtualDevice::new(Vec::new(), DeviceStateSnapshot::default())
            .refuse_acquire("device busy");
        let probe = device.probe();
        let stick = descriptor(5, "Flight Stick", DeviceClass::Joystick);
        let backend = VirtualBackend::new(Vec::new(), vec![stick]).with_device(device);

        let result = ControllerHandle::start(backend, Console::new(Vec::new()), fast_settings());

        assert!(matches!(
            result,
            Err(ReaderError::AcquisitionError(m)) if m.contains("device busy")
        ));
        assert_eq!(probe.releases.get(), 0);
    }

    #[tokio::test]
    async fn fatal_read_error_releases_session_once() {
        let pad = descriptor(0, "Virtual Pad", DeviceClass::Gamepad);
        let device = VirtualDevice::new(
            vec![Tick::Quiet, Tick::Events(vec![(48, 1)]), Tick::Fail("unplugged".into())],
            DeviceStateSnapshot::default(),
        );
        let probe = device.probe();
        let backend = VirtualBackend::new(vec![pad], Vec::new()).with_device(device);

        let handle = ControllerHandle::start(backend, Console::new(Vec::new()), fast_settings())
            .expect("start");
        let (shutdown, console) = handle.run_until(std::future::pending()).await;

        assert!(matches!(
            shutdown,
            Shutdown::Failed(ReaderError::ReadError(m)) if m.contains("unplugged")
        ));
        assert_eq!(probe.releases.get(), 1);

        let output = text(console);
        assert!(output.starts_with("Detected controller: Virtual Pad (virtual:0)\n"));
        assert!(output.contains("Listening for controller input. Press Ctrl+C to exit.\n\n"));
        assert!(output.contains("Trigger"));
    }

    #[tokio::test]
    async fn cancellation_releases_session_once() {
        let pad = descriptor(0, "Virtual Pad", DeviceClass::Gamepad);
        let device = VirtualDevice::new(vec![Tick::Quiet; 10_000], DeviceStateSnapshot::default());
        let probe = device.probe();
        let backend = VirtualBackend::new(vec![pad], Vec::new()).with_device(device);

        let handle = ControllerHandle::start(backend, Console::new(Vec::new()), fast_settings())
            .expect("start");
        let (shutdown, console) = handle
            .run_until(tokio::time::sleep(Duration::from_millis(30)))
            .await;

        assert!(matches!(shutdown, Shutdown::Cancelled));
        assert_eq!(probe.releases.get(), 1);
        assert!(probe.polls.get() >= 1);
        assert!(text(console).contains("Axes: (no movement)"));
    }

    #[tokio::test]
    async fn read_error_is_left_to_the_caller_to_log() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(logs.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let pad = descriptor(0, "Virtual Pad", DeviceClass::Gamepad);
        let device = VirtualDevice::new(
            vec![Tick::Fail("cable pulled".into())],
            DeviceStateSnapshot::default(),
        );
        let backend = VirtualBackend::new(vec![pad], Vec::new()).with_device(device);

        let handle = ControllerHandle::start(backend, Console::new(Vec::new()), fast_settings())
            .expect("start");
        let (shutdown, _) = handle.run_until(std::future::pending()).await;

        assert!(matches!(shutdown, Shutdown::Failed(ReaderError::ReadError(_))));
        let output = logs.text();
        assert!(output.contains("Polling loop stopped"));
        assert!(!output.contains("cable pulled"));
    }

    #[tokio::test]
    async fn device_without_reportable_objects_still_reports_by_offset() {
        let mut bare = descriptor(2, "Bare Device", DeviceClass::Joystick);
        bare.objects.clear();
        let device = VirtualDevice::new(
            vec![Tick::Events(vec![(48, 1)])],
            DeviceStateSnapshot::default(),
        );
        let backend = VirtualBackend::new(Vec::new(), vec![bare]).with_device(device);

        let handle = ControllerHandle::start(backend, Console::new(Vec::new()), fast_settings())
            .expect("start");
        let (shutdown, console) = handle.run_until(std::future::pending()).await;

        assert!(matches!(shutdown, Shutdown::Failed(ReaderError::ReadError(_))));
        assert!(text(console).contains("Offset 48"));
    }
}
