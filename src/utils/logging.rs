//! Plain-text conversation transcripts
//!
//! Appends each message to a file as it joins the history. Diagnostics go
//! through `tracing`; this is only the user-requested transcript.

use crate::core::message::{Message, Role};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

pub struct LoggingState {
    file_path: Option<PathBuf>,
    is_active: bool,
}

impl LoggingState {
    /// A transcript that starts active when a path is given.
    pub fn new(log_file: Option<PathBuf>) -> Result<Self, std::io::Error> {
        let mut logging = LoggingState {
            file_path: None,
            is_active: false,
        };
        if let Some(path) = log_file {
            logging.set_log_file(path)?;
        }
        Ok(logging)
    }

    pub fn set_log_file(&mut self, path: PathBuf) -> Result<String, std::io::Error> {
        // Fail early if the file cannot be created.
        OpenOptions::new().create(true).append(true).open(&path)?;

        let status = format!("Logging enabled to: {}", path.display());
        self.file_path = Some(path);
        self.is_active = true;
        Ok(status)
    }

    pub fn toggle_logging(&mut self) -> Result<String, String> {
        let Some(path) = &self.file_path else {
            return Err("No log file specified. Use /log <filename> to enable logging first.".to_string());
        };
        self.is_active = !self.is_active;
        if self.is_active {
            Ok(format!("Logging resumed to: {}", path.display()))
        } else {
            Ok(format!("Logging paused (file: {})", path.display()))
        }
    }

    pub fn log_message(&self, message: &Message) -> Result<(), std::io::Error> {
        let Some(path) = self.file_path.as_ref().filter(|_| self.is_active) else {
            return Ok(());
        };

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = BufWriter::new(file);

        let speaker = match message.role() {
            Role::User => "You",
            Role::Assistant => "Assistant",
        };
        writeln!(
            writer,
            "[{}] {speaker}:",
            message.timestamp().format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        for line in message.content().lines() {
            writeln!(writer, "{line}")?;
        }
        // Blank line between messages, matching the screen.
        writeln!(writer)?;

        writer.flush()
    }
}
