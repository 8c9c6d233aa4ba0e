//! Line-oriented console output
//!
//! The report is written to any [`Write`] sink, stdout in production and a byte
//! buffer in tests. Timestamped lines use the local wall clock as `HH:MM:SS.mmm`.

use chrono::{DateTime, Local};
use crossterm::{terminal::SetTitle, QueueableCommand};
use std::io::{self, Write};

pub const TIMESTAMP_FORMAT: &str = "%H:%M:%S%.3f";

pub fn format_timestamp(at: &DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub struct Console<W: Write> {
    out: W,
}

impl<W: Write> Console<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Sets the title of the hosting console window
    pub fn set_title(&mut self, title: &str) -> io::Result<()> {
        self.out.queue(SetTitle(title))?;
        self.out.flush()
    }

    pub fn line(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.out, "{message}")
    }

    /// Writes `message` prefixed with the current time
    pub fn stamped(&mut self, message: &str) -> io::Result<()> {
        self.stamped_at(&Local::now(), message)
    }

    pub fn stamped_at(&mut self, at: &DateTime<Local>, message: &str) -> io::Result<()> {
        writeln!(self.out, "{} | {message}", format_timestamp(at))
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
