//! Log output.
//!
//! Every line goes to the console and is appended to a shared log file.
//! Appends are serialised by a lock so lines from concurrent instances
//! never interleave; a file that cannot be written falls back to stderr.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;

/// Directives used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "chatmesh_server=info,chatmesh_core=info";

/// Appends formatted lines to a log file.
#[derive(Debug, Clone)]
pub struct SharedLog {
    path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl SharedLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one formatted line.
    pub fn append(&self, line: &[u8]) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path.as_path())
            .and_then(|mut file| file.write_all(line));
        if let Err(e) = written {
            let mut stderr = io::stderr().lock();
            let _ = writeln!(stderr, "could not write to log file {}: {e}", self.path.display());
            let _ = stderr.write_all(line);
        }
    }
}

impl<'a> MakeWriter<'a> for SharedLog {
    type Writer = LogLine;

    fn make_writer(&'a self) -> Self::Writer {
        LogLine {
            log: self.clone(),
            buf: Vec::new(),
        }
    }
}

/// One event's worth of output, appended when dropped.
pub struct LogLine {
    log: SharedLog,
    buf: Vec<u8>,
}

impl Write for LogLine {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for LogLine {
    fn drop(&mut self) {
        if !self.buf.is_empty() {
            self.log.append(&self.buf);
        }
    }
}

/// Install the global subscriber: console plus `log_file`. `RUST_LOG`
/// overrides the default filter, `info` for both chatmesh crates.
pub fn init(log_file: &Path) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(SharedLog::new(log_file)),
        )
        .try_init()?;
    Ok(())
}
