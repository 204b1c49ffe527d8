//! Append-only run log.
//!
//! A [`LogSink`] is handed to the executor by its owner; nothing here is
//! process-global. Each record is written as `LEVEL\tTIMESTAMP\tmessage` and is
//! also forwarded to `tracing`, so a subscriber installed by the binary sees the
//! same events.

use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::Level;

const TIMESTAMP_FORMAT: &str = "%m/%d/%Y %I:%M:%S %p";

#[derive(Clone)]
pub struct LogSink {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl LogSink {
    /// Open `path` for appending, creating parent directories as needed.
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::from_writer(file))
    }

    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// A sink that only forwards to `tracing`.
    pub fn discard() -> Self {
        Self::from_writer(io::sink())
    }

    /// A sink writing into memory, plus a handle to read it back.
    pub fn memory() -> (Self, MemoryLog) {
        let buffer = MemoryLog::default();
        (Self::from_writer(buffer.clone()), buffer)
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.record(Level::INFO, message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.record(Level::WARN, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.record(Level::ERROR, message.as_ref());
    }

    fn record(&self, level: Level, message: &str) {
        if level == Level::ERROR {
            tracing::error!("{}", message);
        } else if level == Level::WARN {
            tracing::warn!("{}", message);
        } else {
            tracing::info!("{}", message);
        }

        let line = format!(
            "{}\t{}\t{}\n",
            level,
            Local::now().format(TIMESTAMP_FORMAT),
            message
        );
        let mut writer = self.writer.lock().unwrap_or_else(|p| p.into_inner());
        // write failures never abort a running backup
        if let Err(e) = writer.write_all(line.as_bytes()).and_then(|_| writer.flush()) {
            tracing::warn!("Failed to write run log: {}", e);
        }
    }
}

/// In-memory log buffer shared with a [`LogSink`].
#[derive(Clone, Default)]
pub struct MemoryLog(Arc<Mutex<Vec<u8>>>);

impl MemoryLog {
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().unwrap_or_else(|p| p.into_inner());
        String::from_utf8_lossy(&bytes).to_string()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for MemoryLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap_or_else(|p| p.into_inner()).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
