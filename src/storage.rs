//! Append-only CSV files, one per flow.

use crate::metrics::flatten;
use crate::probe::FlowResult;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Writes flattened flow results under one output directory.
///
/// Appends are serialized so a file's header is always its first line, even
/// when runs of the same flow overlap.
#[derive(Debug)]
pub struct MetricsSink {
    output_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl MetricsSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Creates the output directory if it does not exist yet.
    pub fn ensure_output_dir(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.output_dir).map_err(|source| StorageError::Io {
            path: self.output_dir.clone(),
            source,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn path_for(&self, output_name: &str) -> PathBuf {
        self.output_dir.join(output_name)
    }

    /// Appends one row for `flow` to `output_name`. The header is written
    /// only by the call that creates the file.
    pub fn record(&self, output_name: &str, flow: &FlowResult) -> Result<(), StorageError> {
        let path = self.path_for(output_name);
        let row = flatten(flow);
        if row.is_empty() {
            debug!(file = %path.display(), "flow produced no steps, nothing written");
            return Ok(());
        }

        let io_err = |source| StorageError::Io {
            path: path.clone(),
            source,
        };
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (mut file, created) = open_for_append(&path).map_err(io_err)?;

        let mut buffer = String::new();
        if created {
            push_record(&mut buffer, row.keys().map(String::as_str));
        }
        push_record(&mut buffer, row.values().map(String::as_str));
        file.write_all(buffer.as_bytes()).map_err(io_err)?;
        Ok(())
    }
}

fn open_for_append(path: &Path) -> io::Result<(File, bool)> {
    match OpenOptions::new().append(true).create_new(true).open(path) {
        Ok(file) => Ok((file, true)),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            let file = OpenOptions::new().append(true).open(path)?;
            Ok((file, false))
        }
        Err(err) => Err(err),
    }
}

fn push_record<'a>(buffer: &mut String, fields: impl Iterator<Item = &'a str>) {
    for (index, field) in fields.enumerate() {
        if index > 0 {
            buffer.push(',');
        }
        push_field(buffer, field);
    }
    buffer.push_str("\r\n");
}

fn push_field(buffer: &mut String, field: &str) {
    if field.contains([',', '"', '\r', '\n']) {
        buffer.push('"');
        buffer.push_str(&field.replace('"', "\"\""));
        buffer.push('"');
    } else {
        buffer.push_str(field);
    }
}
