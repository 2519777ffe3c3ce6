use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine_logging::{engine_debug, engine_info};
use harvester_core::{CommentRecord, Fingerprint, Thread};
use serde_json::Value;

use crate::persist::{ensure_output_dir, AtomicFileWriter, PersistError};

/// Where one flushed batch ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchWrite {
    pub batch_path: PathBuf,
    pub cumulative_path: PathBuf,
    /// Threads in the cumulative artifact after the merge.
    pub cumulative_total: usize,
}

/// Durable destination for harvested threads.
///
/// One session writes at a time; concurrent writers to the same artifacts
/// are not detected.
pub trait ThreadSink {
    /// Prepares the destination and creates an empty cumulative artifact if
    /// none exists yet.
    fn open(&mut self) -> Result<(), PersistError>;

    /// Fingerprints of every thread already in the cumulative artifact.
    fn known_fingerprints(&self) -> Result<Vec<Fingerprint>, PersistError>;

    /// Writes `threads` to a fresh batch artifact, then appends them to the
    /// cumulative one. `processed` is the session's count after this batch.
    fn append_batch(
        &mut self,
        threads: &[Thread],
        processed: usize,
    ) -> Result<BatchWrite, PersistError>;
}

/// JSON artifacts `{prefix}_all.json` and `{prefix}_batch_{n}.json` in one
/// directory.
pub struct JsonFileSink {
    writer: AtomicFileWriter,
    prefix: String,
}

impl JsonFileSink {
    pub fn new(dir: PathBuf, prefix: impl Into<String>) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir),
            prefix: prefix.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        self.writer.dir()
    }

    pub fn cumulative_path(&self) -> PathBuf {
        self.writer.dir().join(self.cumulative_name())
    }

    fn cumulative_name(&self) -> String {
        format!("{}_all.json", self.prefix)
    }

    fn read_cumulative(&self) -> Result<Vec<Value>, PersistError> {
        let path = self.cumulative_path();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(items)) => Ok(items),
            Ok(_) => Err(PersistError::Corrupt {
                path,
                reason: "top-level value is not an array".to_string(),
            }),
            Err(err) => Err(PersistError::Corrupt {
                path,
                reason: err.to_string(),
            }),
        }
    }
}

impl ThreadSink for JsonFileSink {
    fn open(&mut self) -> Result<(), PersistError> {
        ensure_output_dir(self.writer.dir())?;
        let path = self.cumulative_path();
        if path.exists() {
            let existing = self.read_cumulative()?;
            engine_info!(
                "appending to {} ({} threads already stored)",
                path.display(),
                existing.len()
            );
        } else {
            self.writer.write(&self.cumulative_name(), "[]")?;
            engine_info!("created {}", path.display());
        }
        Ok(())
    }

    fn known_fingerprints(&self) -> Result<Vec<Fingerprint>, PersistError> {
        let stored = self.read_cumulative()?;
        // Entries written by older tools may lack an id; recompute it then.
        let fingerprints = stored
            .into_iter()
            .filter_map(|value| match value.get("comment_id").and_then(Value::as_str) {
                Some(id) => Some(Fingerprint::from(id.to_string())),
                None => serde_json::from_value::<CommentRecord>(value)
                    .ok()
                    .map(|main| main.fingerprint()),
            })
            .collect();
        Ok(fingerprints)
    }

    fn append_batch(
        &mut self,
        threads: &[Thread],
        processed: usize,
    ) -> Result<BatchWrite, PersistError> {
        let batch_json = serde_json::to_string_pretty(threads)?;
        let batch_path = self
            .writer
            .write_new(&format!("{}_batch_{processed}.json", self.prefix), &batch_json)?;
        engine_debug!("batch of {} written to {}", threads.len(), batch_path.display());

        let mut merged = self.read_cumulative()?;
        for thread in threads {
            merged.push(serde_json::to_value(thread)?);
        }
        let cumulative_total = merged.len();
        let cumulative_path = self
            .writer
            .write(&self.cumulative_name(), &serde_json::to_string_pretty(&merged)?)?;

        Ok(BatchWrite {
            batch_path,
            cumulative_path,
            cumulative_total,
        })
    }
}
