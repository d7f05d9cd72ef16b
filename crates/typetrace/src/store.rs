//! Trace persistence: the store contract, the store-backed logger, and the
//! default JSON-lines store.
//!
//! The store is a swappable collaborator. A deployment satisfies the
//! [`CallTraceStore`] contract however it likes; [`JsonlStore`] is the
//! zero-configuration default that keeps one JSON object per line in a
//! single append-only file.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::mem;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::trace::{CallTrace, CallTraceLogger};

/// Error type for store and logger operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Persistence for call traces: accept written records, support read-back.
pub trait CallTraceStore {
    /// Append a batch of traces.
    fn add(&mut self, traces: Vec<CallTrace>) -> Result<(), StoreError>;

    /// Read back traces for a module, optionally narrowed to qualnames with
    /// the given prefix, returning at most `limit` of the most recent
    /// matches in write order.
    fn filter(
        &self,
        module: &str,
        qualname_prefix: Option<&str>,
        limit: usize,
    ) -> Result<Vec<CallTrace>, StoreError>;

    /// Filesystem location backing this store, if any.
    fn path(&self) -> Option<&Path> {
        None
    }
}

/// The default [`CallTraceLogger`]: buffers logged traces in memory and
/// drains them into the wrapped store on [`flush`](CallTraceLogger::flush).
pub struct StoreLogger {
    store: Box<dyn CallTraceStore>,
    buffer: Vec<CallTrace>,
}

impl StoreLogger {
    /// Create a logger that flushes into `store`.
    pub fn new(store: Box<dyn CallTraceStore>) -> Self {
        Self {
            store,
            buffer: Vec::new(),
        }
    }

    /// The wrapped store.
    pub fn store(&self) -> &dyn CallTraceStore {
        self.store.as_ref()
    }

    /// Number of traces logged but not yet flushed.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

impl CallTraceLogger for StoreLogger {
    fn log(&mut self, trace: CallTrace) {
        self.buffer.push(trace);
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let drained = mem::take(&mut self.buffer);
        self.store.add(drained)
    }
}

/// Append-only JSON-lines store: one `CallTrace` object per line.
pub struct JsonlStore {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonlStore {
    /// Open or create a store at the given path.
    ///
    /// Missing parent directories are created.
    pub fn make_store(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!("opened trace store at {}", path.display());
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }
}

impl CallTraceStore for JsonlStore {
    fn add(&mut self, traces: Vec<CallTrace>) -> Result<(), StoreError> {
        for trace in &traces {
            let line = serde_json::to_string(trace)?;
            writeln!(self.writer, "{}", line)?;
        }
        self.writer.flush()?;
        Ok(())
    }

    fn filter(
        &self,
        module: &str,
        qualname_prefix: Option<&str>,
        limit: usize,
    ) -> Result<Vec<CallTrace>, StoreError> {
        let content = fs::read_to_string(&self.path)?;
        let mut matches: Vec<CallTrace> = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let trace: CallTrace = serde_json::from_str(line)?;
            if trace.module != module {
                continue;
            }
            if let Some(prefix) = qualname_prefix {
                if !trace.qualname.starts_with(prefix) {
                    continue;
                }
            }
            matches.push(trace);
        }
        // Keep the most recent entries when over the limit.
        if matches.len() > limit {
            matches.drain(..matches.len() - limit);
        }
        Ok(matches)
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}
