//! Writer factory: wraps the low-level columnar writer, assigns unique
//! file names, and schedules the rotation timer for each file.
//!
//! A [`Writer`]'s lifetime ends at rotation: it is single-use, not a
//! long-lived handle rotated in place behind a swap cell. The registry
//! removes and disposes one on rotation, and the next write to that
//! partition asks the factory for a brand new instance. Each file is
//! backed by a `tempfile::NamedTempFile` that is only linked into its final
//! location once it holds at least one row, and is named with a UUIDv7.

use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::trace;
use parquet::basic::Compression;
use parquet::file::properties::{WriterProperties, WriterVersion};
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::types::TypePtr;
use tempfile::NamedTempFile;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Duration;

use rotor_model::{Record, SchemaDef};

use crate::error::WriterError;
use crate::leaf::{self, LeafColumn};

/// Options passed through to the encoder and, for `compression`, to the
/// low-level writer.
#[derive(Debug, Clone)]
pub struct WriterOptions {
    pub compression: Compression,
}

impl Default for WriterOptions {
    fn default() -> Self {
        WriterOptions {
            compression: Compression::SNAPPY,
        }
    }
}

/// `parquet::basic::Compression` has no `getExtension()` of its own; this
/// is that lookup table.
fn compression_extension(compression: Compression) -> &'static str {
    match compression {
        Compression::SNAPPY => ".snappy",
        Compression::GZIP(_) => ".gz",
        Compression::ZSTD(_) => ".zstd",
        Compression::LZ4 | Compression::LZ4_RAW | Compression::LZO => ".lz4",
        Compression::BROTLI(_) => ".br",
        Compression::UNCOMPRESSED => "",
    }
}

struct WriterState {
    tempfile: NamedTempFile,
    file_writer: SerializedFileWriter<File>,
    rows_written: usize,
}

/// A single output file for one partition, created on first write and
/// disposed exactly once — by rotation or by pipeline shutdown.
pub struct Writer {
    dir: PathBuf,
    ext: &'static str,
    leaves: Arc<Vec<LeafColumn>>,
    count: AtomicUsize,
    state: Mutex<Option<WriterState>>,
    rotation_timer: tokio::task::JoinHandle<()>,
}

impl Writer {
    pub fn partition_dir(&self) -> &PathBuf {
        &self.dir
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    /// Writes one row group containing `records`, in order, and returns the
    /// writer's new total record count.
    pub async fn write_batch(&self, records: &[Record]) -> Result<usize, WriterError> {
        if records.is_empty() {
            return Ok(self.count());
        }
        let mut guard = self.state.lock().await;
        let state = guard
            .as_mut()
            .ok_or_else(|| WriterError::Io(std::io::Error::other("writer already disposed")))?;
        leaf::write_row_group(&mut state.file_writer, &self.leaves, records)?;
        state.rows_written += records.len();
        trace!("{} wrote {} record(s)", self.dir.display(), records.len());
        Ok(self.count.fetch_add(records.len(), Ordering::Relaxed) + records.len())
    }

    /// Finalizes the underlying file: cancels the rotation timer, closes
    /// the Parquet footer, and — only if at least one row was written —
    /// links the temp file into its final, UUIDv7-named location. Returns
    /// the final path, or `None` if the file was discarded as empty.
    pub async fn close(&self) -> Result<Option<PathBuf>, WriterError> {
        self.rotation_timer.abort();
        let Some(mut state) = self.state.lock().await.take() else {
            return Ok(None);
        };
        state.file_writer.close()?;

        if state.rows_written == 0 {
            return Ok(None);
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let final_path = self
            .dir
            .join(format!("{}{}.parquet", uuid::Uuid::now_v7(), self.ext));
        let (_, tmp_path) = state.tempfile.keep().map_err(|e| WriterError::Io(e.error))?;
        tokio::fs::copy(&tmp_path, &final_path).await?;
        tokio::fs::remove_file(&tmp_path).await?;
        trace!("{} finalized {}", self.dir.display(), final_path.display());
        Ok(Some(final_path))
    }
}

/// Produces writers rooted at a given partition directory, spawning the
/// rotation timer that, after `max_duration`, sends this writer's own
/// partition directory on `rotate_tx` — the full path, never the
/// pipeline's root `basePath` (see DESIGN.md's "RotateEvent path"
/// decision).
pub struct WriterFactory {
    pub max_duration: Duration,
    pub options: Arc<WriterOptions>,
}

impl WriterFactory {
    pub fn new(max_duration: Duration, options: WriterOptions) -> Self {
        WriterFactory {
            max_duration,
            options: Arc::new(options),
        }
    }

    /// Creates a writer bound to `dir / <uuid><ext>.parquet` for `schema`.
    /// Creation is uncancellable: the temp file and the rotation timer are
    /// both established before this returns, or neither is.
    pub fn create(
        &self,
        dir: PathBuf,
        schema: &Arc<SchemaDef>,
        rotate_tx: mpsc::UnboundedSender<PathBuf>,
    ) -> Result<Writer, WriterError> {
        let message_type: TypePtr = schema.to_message_type("schema")?;
        let leaves = Arc::new(leaf::flatten(schema));

        let tempfile = NamedTempFile::new()?;
        trace!(
            "{} created temporary file: {}",
            dir.display(),
            tempfile.path().display()
        );

        let props = Arc::new(
            WriterProperties::builder()
                .set_writer_version(WriterVersion::PARQUET_2_0)
                .set_compression(self.options.compression)
                .build(),
        );

        let file_writer = SerializedFileWriter::new(tempfile.reopen()?, message_type, props)?;
        let state = WriterState {
            tempfile,
            file_writer,
            rows_written: 0,
        };

        let timer_dir = dir.clone();
        let max_duration = self.max_duration;
        let rotation_timer = tokio::spawn(async move {
            tokio::time::sleep(max_duration).await;
            let _ = rotate_tx.send(timer_dir);
        });

        Ok(Writer {
            dir,
            ext: compression_extension(self.options.compression),
            leaves,
            count: AtomicUsize::new(0),
            state: Mutex::new(Some(state)),
            rotation_timer,
        })
    }
}
