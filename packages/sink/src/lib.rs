#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Append-only CSV output for record streams.
//!
//! A [`CsvSink`] owns one directory. Each output id maps to
//! `<dir>/<output_id>.csv`. The first append to an output writes a header
//! row taken from the record's field names; later appends only add rows.
//! Existing rows are never rewritten.
//!
//! Appends to the same output are serialized by a per-output lock, so
//! concurrent fetch tasks can share one sink without interleaving rows.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// File extension of every output.
pub const EXTENSION: &str = "csv";

/// Errors that can occur while writing or reading an output.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// `append` was called with no records.
    #[error("No records to write to '{output}'")]
    EmptyBatch {
        /// Output id the empty batch was aimed at.
        output: String,
    },

    /// The output id is not a single plain file name.
    #[error("Invalid output id '{output}'")]
    InvalidOutput {
        /// The rejected output id.
        output: String,
    },

    /// The underlying file or CSV encoding failed while writing.
    #[error("Failed to write {}: {source}", path.display())]
    WriteFailure {
        /// File being written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: csv::Error,
    },

    /// The underlying file or CSV decoding failed while reading back.
    #[error("Failed to read {}: {source}", path.display())]
    ReadFailure {
        /// File being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: csv::Error,
    },
}

/// A directory of append-only CSV outputs.
#[derive(Debug)]
pub struct CsvSink {
    dir: PathBuf,
    locks: Mutex<BTreeMap<String, Arc<Mutex<()>>>>,
}

impl CsvSink {
    /// Creates a sink rooted at `dir`. The directory is created on first
    /// write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: Mutex::new(BTreeMap::new()),
        }
    }

    /// Directory holding this sink's outputs.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `output_id`.
    #[must_use]
    pub fn path_for(&self, output_id: &str) -> PathBuf {
        self.dir.join(format!("{output_id}.{EXTENSION}"))
    }

    /// File backing `output_id`, if the id names a file directly inside the
    /// sink directory.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::InvalidOutput`] if the id is empty, contains a
    /// path separator, or is `.` / `..`.
    pub fn checked_path(&self, output_id: &str) -> Result<PathBuf, WriteError> {
        let mut components = Path::new(output_id).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) if name == output_id => {
                Ok(self.path_for(output_id))
            }
            _ => Err(WriteError::InvalidOutput {
                output: output_id.to_owned(),
            }),
        }
    }

    /// Appends `records` to `output_id`, creating it with a header row if it
    /// does not exist yet. Returns the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::EmptyBatch`] if `records` is empty and
    /// [`WriteError::WriteFailure`] if the file cannot be written. Ids that
    /// would escape the sink directory fail with
    /// [`WriteError::InvalidOutput`].
    pub fn append<R: Serialize>(&self, output_id: &str, records: &[R]) -> Result<usize, WriteError> {
        if records.is_empty() {
            return Err(WriteError::EmptyBatch {
                output: output_id.to_owned(),
            });
        }

        let path = self.checked_path(output_id)?;
        let lock = self.lock_for(output_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let failure = |source: csv::Error| WriteError::WriteFailure {
            path: path.clone(),
            source,
        };

        std::fs::create_dir_all(&self.dir).map_err(|e| failure(e.into()))?;

        let needs_header = !matches!(std::fs::metadata(&path), Ok(meta) if meta.len() > 0);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| failure(e.into()))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        for record in records {
            writer.serialize(record).map_err(failure)?;
        }
        writer.flush().map_err(|e| failure(e.into()))?;

        log::debug!(
            "Appended {} row(s) to {}{}",
            records.len(),
            path.display(),
            if needs_header { " (new file)" } else { "" }
        );

        Ok(records.len())
    }

    /// Reads every row of `output_id` back.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::ReadFailure`] if the file is missing or a row
    /// does not decode as `R`, and [`WriteError::InvalidOutput`] for ids
    /// outside the sink directory.
    pub fn read_all<R: DeserializeOwned>(&self, output_id: &str) -> Result<Vec<R>, WriteError> {
        let path = self.checked_path(output_id)?;
        let lock = self.lock_for(output_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let failure = |source: csv::Error| WriteError::ReadFailure {
            path: path.clone(),
            source,
        };

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&path)
            .map_err(failure)?;
        reader
            .deserialize()
            .collect::<Result<Vec<R>, _>>()
            .map_err(failure)
    }

    fn lock_for(&self, output_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(output_id.to_owned()).or_default())
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
    struct Row {
        a: u32,
    }

    fn fresh_dir(name: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&tmp);
        tmp
    }

    #[test]
    fn appends_rows_under_a_single_header() {
        let tmp = fresh_dir("listing_crawl_sink_append");
        let sink = CsvSink::new(&tmp);

        sink.append("out", &[Row { a: 1 }]).unwrap();
        sink.append("out", &[Row { a: 2 }]).unwrap();

        let contents = std::fs::read_to_string(tmp.join("out.csv")).unwrap();
        assert_eq!(contents, "a\n1\n2\n");
        assert_eq!(
            sink.read_all::<Row>("out").unwrap(),
            vec![Row { a: 1 }, Row { a: 2 }]
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn empty_batch_is_rejected() {
        let tmp = fresh_dir("listing_crawl_sink_empty");
        let sink = CsvSink::new(&tmp);

        assert!(matches!(
            sink.append::<Row>("out", &[]),
            Err(WriteError::EmptyBatch { .. })
        ));
        assert!(!tmp.join("out.csv").exists());
    }

    #[test]
    fn existing_rows_are_preserved() {
        let tmp = fresh_dir("listing_crawl_sink_existing");
        std::fs::create_dir_all(&tmp).unwrap();
        std::fs::write(tmp.join("out.csv"), "a\n7\n").unwrap();

        let sink = CsvSink::new(&tmp);
        sink.append("out", &[Row { a: 8 }]).unwrap();

        let contents = std::fs::read_to_string(tmp.join("out.csv")).unwrap();
        assert_eq!(contents, "a\n7\n8\n");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn concurrent_appends_do_not_interleave() {
        let tmp = fresh_dir("listing_crawl_sink_concurrent");
        let sink = CsvSink::new(&tmp);

        std::thread::scope(|scope| {
            for worker in 0..8_u32 {
                let sink = &sink;
                scope.spawn(move || {
                    let rows: Vec<Row> = (0..50).map(|i| Row { a: worker * 100 + i }).collect();
                    sink.append("shared", &rows).unwrap();
                });
            }
        });

        let rows = sink.read_all::<Row>("shared").unwrap();
        assert_eq!(rows.len(), 400);
        let contents = std::fs::read_to_string(tmp.join("shared.csv")).unwrap();
        assert_eq!(contents.matches("a\n").count(), 1);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn reading_a_missing_output_fails() {
        let tmp = fresh_dir("listing_crawl_sink_missing");
        let sink = CsvSink::new(&tmp);
        assert!(matches!(
            sink.read_all::<Row>("nope"),
            Err(WriteError::ReadFailure { .. })
        ));
    }

    #[test]
    fn write_failure_is_reported() {
        let tmp = fresh_dir("listing_crawl_sink_failure");
        std::fs::create_dir_all(tmp.join("out.csv")).unwrap();

        let sink = CsvSink::new(&tmp);
        assert!(matches!(
            sink.append("out", &[Row { a: 1 }]),
            Err(WriteError::WriteFailure { .. })
        ));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ids_outside_the_directory_are_rejected() {
        let tmp = fresh_dir("listing_crawl_sink_traversal");
        let sink = CsvSink::new(tmp.join("out"));

        for id in ["../escaped", "acme-/-bank", "/etc/passwd", "..", ".", ""] {
            assert!(
                matches!(
                    sink.append(id, &[Row { a: 1 }]),
                    Err(WriteError::InvalidOutput { .. })
                ),
                "{id:?} was accepted"
            );
            assert!(matches!(
                sink.read_all::<Row>(id),
                Err(WriteError::InvalidOutput { .. })
            ));
        }
        assert!(!tmp.join("escaped.csv").exists());
        assert!(!tmp.join("out").exists());
        assert_eq!(sink.checked_path("acme-bank").unwrap(), tmp.join("out").join("acme-bank.csv"));
    }
}
