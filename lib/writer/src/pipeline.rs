//! The event loop: the core state machine merging inbound data with
//! rotation timers, applying per-chunk batching, and invoking the
//! post-write handler.
//!
//! Built on `tokio::select!` over one upstream data stream plus one channel
//! carrying rotation requests, with "stream exhausted" standing in directly
//! for a separate `Stop` event — there is no observable difference between
//! "received Stop" and "the stream ended", so this does not carry a third,
//! redundant channel for it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use futures::{Stream, StreamExt};
use log::{error, info, trace};
use tokio::sync::mpsc;

use rotor_model::{Record, SchemaDef};

use crate::error::WriterError;
use crate::factory::{WriterFactory, WriterOptions};
use crate::partition::Partitioner;
use crate::registry::WriterRegistry;

/// Threshold and shape configuration for one pipeline run.
pub struct PipelineConfig {
    pub base_path: PathBuf,
    pub max_count: usize,
    pub max_duration: Duration,
    pub chunk_size: usize,
    pub options: WriterOptions,
}

/// The immutable snapshot a post-write handler observes after one chunk.
pub struct Snapshot<'a, Item> {
    pub processed: &'a [Item],
    pub modified_partitions: &'a HashMap<PathBuf, usize>,
}

/// Partitions the post-write handler wants rotated once it returns. Safe to
/// call any number of times; duplicate paths are rotated once.
#[derive(Default)]
pub struct FlushRequests {
    paths: StdMutex<Vec<PathBuf>>,
}

impl FlushRequests {
    pub fn flush(&self, path: PathBuf) {
        self.paths.lock().expect("flush request lock poisoned").push(path);
    }

    fn drain(&self) -> Vec<PathBuf> {
        std::mem::take(&mut *self.paths.lock().expect("flush request lock poisoned"))
    }
}

pub type PostWriteHandler<Item> =
    Arc<dyn Fn(&Snapshot<'_, Item>, &FlushRequests) -> Result<(), WriterError> + Send + Sync>;

/// Drives `upstream` to completion: applies `transform` to each item to
/// produce write items, partitions and routes them, batches per chunk, and
/// forwards each processed item on `out_tx` once its chunk's writes land.
///
/// The finalizer (`dispose_all`) always runs, whether this returns `Ok` or
/// propagates an error partway through — no file handle is left open on a
/// mid-stream failure.
pub async fn run<Item, S, F>(
    mut upstream: S,
    raw_schema: Arc<SchemaDef>,
    partitioner: Partitioner,
    mut transform: F,
    config: PipelineConfig,
    out_tx: mpsc::UnboundedSender<Item>,
    post_write_handler: Option<PostWriteHandler<Item>>,
) -> Result<(), WriterError>
where
    Item: Clone + Send + 'static,
    S: Stream<Item = Item> + Unpin,
    F: FnMut(&Item) -> Result<Vec<Record>, WriterError>,
{
    // §3 invariant: after partition removal the schema must still describe at
    // least one column. Caught here, once, before any writer is created —
    // not lazily the first time a record happens to reach the partitioner.
    let schema = Arc::new(partitioner.strip_schema(&raw_schema)?);
    info!("{} starting rotating writer pipeline", config.base_path.display());

    let registry = WriterRegistry::new();
    let factory = WriterFactory::new(config.max_duration, config.options.clone());
    let (rotate_tx, mut rotate_rx) = mpsc::unbounded_channel::<PathBuf>();

    let outcome: Result<(), WriterError> = async {
        'outer: loop {
            let mut pending: HashMap<PathBuf, Vec<Record>> = HashMap::new();
            let mut out_chunk: Vec<Item> = Vec::new();
            let mut taken = 0usize;
            let mut exhausted = false;

            while taken < config.chunk_size.max(1) {
                tokio::select! {
                    biased;
                    Some(path) = rotate_rx.recv() => {
                        flush_partition(&registry, &factory, &schema, &rotate_tx, &mut pending, &path, config.max_count).await?;
                        taken += 1;
                    }
                    next = upstream.next() => {
                        match next {
                            Some(item) => {
                                for record in transform(&item)? {
                                    let (dir, record) = partitioner.partition(&config.base_path, record)?;
                                    pending.entry(dir).or_default().push(record);
                                }
                                out_chunk.push(item);
                                taken += 1;
                            }
                            None => {
                                exhausted = true;
                                break;
                            }
                        }
                    }
                }
            }

            let mut modified = HashMap::new();
            for (dir, records) in pending.drain() {
                write_with_rotation(&registry, &factory, &schema, &rotate_tx, dir, &records, config.max_count, &mut modified).await?;
            }

            for item in &out_chunk {
                if out_tx.send(item.clone()).is_err() {
                    exhausted = true;
                }
            }

            if let Some(handler) = &post_write_handler {
                let snapshot = Snapshot {
                    processed: &out_chunk,
                    modified_partitions: &modified,
                };
                let flush_requests = FlushRequests::default();
                handler(&snapshot, &flush_requests)?;
                for path in flush_requests.drain() {
                    if let Some(writer) = registry.remove(&path) {
                        writer.close().await?;
                    }
                }
            }

            if exhausted {
                break 'outer;
            }
        }
        Ok(())
    }
    .await;

    if let Err(e) = &outcome {
        error!("{} pipeline terminating after error: {}", config.base_path.display(), e);
    }
    registry.dispose_all().await;
    info!("{} pipeline stopped", config.base_path.display());
    outcome
}

/// Writes `pending[path]` (if any) to its current writer, then disposes
/// that writer. Used for a rotation requested mid-chunk, so that write
/// items accumulated before the request land in the file being rotated,
/// not the one created after it.
async fn flush_partition(
    registry: &WriterRegistry,
    factory: &WriterFactory,
    schema: &Arc<SchemaDef>,
    rotate_tx: &mpsc::UnboundedSender<PathBuf>,
    pending: &mut HashMap<PathBuf, Vec<Record>>,
    path: &PathBuf,
    max_count: usize,
) -> Result<(), WriterError> {
    if let Some(records) = pending.remove(path) {
        let mut remaining: &[Record] = &records;
        while !remaining.is_empty() {
            let writer = registry
                .get_or_create(path.clone(), || factory.create(path.clone(), schema, rotate_tx.clone()))
                .await?;
            let capacity = max_count.saturating_sub(writer.count()).max(1);
            let take = capacity.min(remaining.len());
            let (head, tail) = remaining.split_at(take);

            let count = writer.write_batch(head).await?;
            if count >= max_count {
                if let Some(writer) = registry.remove(path) {
                    writer.close().await?;
                }
            }
            remaining = tail;
        }
    }
    // Forced rotation: dispose whatever writer remains even if the last
    // slice above did not itself cross `max_count`.
    if let Some(writer) = registry.remove(path) {
        writer.close().await?;
        trace!("{} rotated", path.display());
    }
    Ok(())
}

/// Writes `records` to `dir`'s writer, slicing into at-most-`max_count`
/// pieces and rotating between slices, so a writer's count never exceeds
/// `max_count` by more than the record that crossed it.
async fn write_with_rotation(
    registry: &WriterRegistry,
    factory: &WriterFactory,
    schema: &Arc<SchemaDef>,
    rotate_tx: &mpsc::UnboundedSender<PathBuf>,
    dir: PathBuf,
    records: &[Record],
    max_count: usize,
    modified: &mut HashMap<PathBuf, usize>,
) -> Result<(), WriterError> {
    let mut remaining = records;
    while !remaining.is_empty() {
        let writer = registry
            .get_or_create(dir.clone(), || factory.create(dir.clone(), schema, rotate_tx.clone()))
            .await?;
        let capacity = max_count.saturating_sub(writer.count()).max(1);
        let take = capacity.min(remaining.len());
        let (head, tail) = remaining.split_at(take);

        let count = writer.write_batch(head).await?;
        modified.insert(dir.clone(), count);

        if count >= max_count {
            if let Some(writer) = registry.remove(&dir) {
                if let Err(e) = writer.close().await {
                    error!("{} failed to close writer at max_count: {}", dir.display(), e);
                    return Err(e);
                }
            }
        }
        remaining = tail;
    }
    Ok(())
}
