//! Steady-state polling loop
//!
//! Every tick refreshes the device and then reports exactly one of two things:
//!
//! * **Buffered** - the drained events, one line each, in arrival order
//! * **Snapshot** - a full state report, when no event arrived since the last tick
//!
//! A failing refresh ends the loop. Nothing is retried.

use std::io::Write;
use tracing::{debug, trace};

use super::device::BufferedEvent;
use super::error::ReaderError;
use super::formatter;
use super::names::ObjectNameMap;
use super::session::{Acquired, DeviceSession};
use crate::config::ReaderSettings;
use crate::console::Console;

/// What a single tick reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Number of buffered events written
    Buffered(usize),
    Snapshot,
}

pub struct Poller<W: Write> {
    session: DeviceSession<Acquired>,
    names: ObjectNameMap,
    console: Console<W>,
    settings: ReaderSettings,
    ticks: u64,
}

impl<W: Write> Poller<W> {
    pub fn new(
        session: DeviceSession<Acquired>,
        names: ObjectNameMap,
        console: Console<W>,
        settings: ReaderSettings,
    ) -> Self {
        Self {
            session,
            names,
            console,
            settings,
            ticks: 0,
        }
    }

    /// Runs one poll/report cycle without sleeping
    pub fn tick(&mut self) -> Result<TickOutcome, ReaderError> {
        self.ticks += 1;
        self.session.poll()?;

        let events = self.session.drain_events();
        let outcome = if events.is_empty() {
            self.report_snapshot()?;
            TickOutcome::Snapshot
        } else {
            self.report_events(&events)?;
            TickOutcome::Buffered(events.len())
        };

        self.console.flush()?;
        trace!("Tick {} reported {:?}", self.ticks, outcome);
        Ok(outcome)
    }

    /// Ticks until the device fails, sleeping the tick interval in between
    ///
    /// Only returns on a fatal error. Cancellation happens by dropping the future.
    pub async fn run(&mut self) -> ReaderError {
        debug!("Starting polling loop with interval {:?}", self.settings.tick_interval);

        loop {
            if let Err(e) = self.tick() {
                debug!("Polling loop stopped after {} tick(s)", self.ticks);
                return e;
            }
            tokio::time::sleep(self.settings.tick_interval).await;
        }
    }

    fn report_events(&mut self, events: &[BufferedEvent]) -> Result<(), ReaderError> {
        let width = self.settings.label_width;
        for event in events {
            let label = self.names.resolve(event.offset);
            self.console
                .stamped_at(&event.timestamp, &format!("{label:<width$} : {}", event.value))?;
        }
        Ok(())
    }

    fn report_snapshot(&mut self) -> Result<(), ReaderError> {
        let report = formatter::render(&self.session.snapshot());

        self.console.stamped(&report.axes_line())?;
        self.console.line(&report.buttons_line())?;
        if let Some(povs) = report.povs_line() {
            self.console.line(&povs)?;
        }
        self.console.line(&self.settings.separator())?;
        Ok(())
    }

    pub fn console(&self) -> &Console<W> {
        &self.console
    }

    /// Hands back the session and console once the loop is over
    pub fn into_parts(self) -> (DeviceSession<Acquired>, Console<W>) {
        (self.session, self.console)
    }
}
