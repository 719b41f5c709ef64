// crates/transfer-mesh-agent/src/logging.rs
// ============================================================================
// Module: Logging Bootstrap
// Description: tracing-subscriber initialization from the logging config.
// Purpose: Install one global subscriber with a filter, format, and writer.
// Dependencies: transfer-mesh-config, tracing-subscriber
// ============================================================================

//! ## Overview
//! [`init_logging`] installs the process-wide subscriber once. The filter
//! directive comes from `[logging].level`; `RUST_LOG` is not consulted so the
//! config file stays authoritative. Output goes to stderr unless a file is
//! configured, in which case lines are appended.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use transfer_mesh_config::LogFormat;
use transfer_mesh_config::LoggingConfig;

use crate::runtime::AgentError;

// ============================================================================
// SECTION: Init
// ============================================================================

/// Installs the global subscriber described by `config`.
///
/// # Errors
///
/// Returns [`AgentError::Logging`] when the directive is invalid, the log
/// file cannot be opened, or a subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), AgentError> {
    let filter = build_env_filter(config)?;
    let writer = make_writer(config)?;
    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.format {
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(config.file.is_none())
                    .with_writer(writer),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false)
                    .with_span_list(false)
                    .with_target(true)
                    .with_level(true)
                    .with_writer(writer),
            )
            .try_init(),
    };
    installed.map_err(|err| AgentError::Logging(err.to_string()))
}

/// Parses the filter directive.
fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter, AgentError> {
    let directive = config.level.trim();
    EnvFilter::try_new(directive)
        .map_err(|err| AgentError::Logging(format!("invalid log level '{directive}': {err}")))
}

/// Builds the writer: an append-mode file when configured, stderr otherwise.
fn make_writer(config: &LoggingConfig) -> Result<BoxMakeWriter, AgentError> {
    let Some(path) = &config.file else {
        return Ok(BoxMakeWriter::new(io::stderr));
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .map_err(|err| AgentError::Logging(format!("{}: {err}", parent.display())))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| AgentError::Logging(format!("{}: {err}", path.display())))?;
    let shared = SharedFileWriter::new(file);
    Ok(BoxMakeWriter::new(move || shared.clone()))
}

// ============================================================================
// SECTION: File Writer
// ============================================================================

/// Cloneable handle to one append-mode log file.
#[derive(Clone)]
struct SharedFileWriter {
    /// Shared file handle.
    inner: Arc<Mutex<File>>,
}

impl SharedFileWriter {
    /// Wraps an open file.
    fn new(file: File) -> Self {
        Self {
            inner: Arc::new(Mutex::new(file)),
        }
    }
}

impl Write for SharedFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard =
            self.inner.lock().map_err(|_| io::Error::other("log file lock poisoned"))?;
        guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard =
            self.inner.lock().map_err(|_| io::Error::other("log file lock poisoned"))?;
        guard.flush()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
