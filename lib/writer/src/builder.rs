//! Fluent public entry points: a typed builder (caller's own record type,
//! encoded via [`Encoder`]/[`SchemaResolver`]) and a generic builder
//! (caller already works in [`Record`]).
//!
//! Grounded on the `#[must_use]`-returning-`Self` setter style in
//! `other_examples/0a60c09e_fjall-rs-lsm-tree__src-table-multi_writer.rs.rs`
//! (`use_partitioned_index`, `kv_separation`, …), adapted to a type that
//! terminates in an async `build`.

use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;

use rotor_model::{ColumnPath, Record, SchemaDef};

use crate::error::WriterError;
use crate::factory::WriterOptions;
use crate::partition::Partitioner;
use crate::pipeline::{self, PipelineConfig, PostWriteHandler};

/// Encodes one typed item into a generic [`Record`], given the builder's
/// configured `options`.
pub trait Encoder<T>: Send + Sync {
    fn encode(&self, item: &T, options: &WriterOptions) -> Result<Record, WriterError>;
}

/// Produces the schema for `T`, partition fields still present — the
/// builder strips them once, at pipeline start.
pub trait SchemaResolver<T>: Send + Sync {
    fn resolve(&self) -> Result<Arc<SchemaDef>, WriterError>;
}

const DEFAULT_CHUNK_SIZE: usize = 256;
const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(3600);

/// The stream of processed items produced by a built pipeline, paired with
/// the background task driving it. Poll the stream to consume output;
/// `join` after the stream ends to observe the pipeline's terminal result
/// (an error raised mid-stream, or `Ok(())` on clean termination).
pub struct Pipe<Item> {
    stream: UnboundedReceiverStream<Item>,
    task: JoinHandle<Result<(), WriterError>>,
}

impl<Item> Pipe<Item> {
    pub async fn join(self) -> Result<(), WriterError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(WriterError::Io(std::io::Error::other(e.to_string()))),
        }
    }
}

impl<Item: Unpin> Stream for Pipe<Item> {
    type Item = Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Item>> {
        Pin::new(&mut self.stream).poll_next(cx)
    }
}

/// Builds a pipeline over a caller-supplied source record type `T`, whose
/// `preWriteTransformation` produces a (possibly distinct) write-item type
/// `W` that the `encoder`/`schema_resolver` pair know how to turn into
/// [`Record`]s (§4.8). `W` defaults to `T` itself via the identity
/// `Into<W>` impl when no transformation is configured.
pub struct TypedBuilder<T, W> {
    base_path: PathBuf,
    max_count: usize,
    max_duration: Duration,
    chunk_size: usize,
    partition_by: Vec<ColumnPath>,
    options: WriterOptions,
    pre_write_transformation: Option<Arc<dyn Fn(&T) -> Vec<W> + Send + Sync>>,
    post_write_handler: Option<PostWriteHandler<T>>,
    encoder: Arc<dyn Encoder<W>>,
    schema_resolver: Arc<dyn SchemaResolver<W>>,
}

impl<T, W> TypedBuilder<T, W>
where
    T: Clone + Into<W> + Send + 'static,
    W: Send + 'static,
{
    pub fn new(
        base_path: impl Into<PathBuf>,
        encoder: impl Encoder<W> + 'static,
        schema_resolver: impl SchemaResolver<W> + 'static,
    ) -> Self {
        TypedBuilder {
            base_path: base_path.into(),
            max_count: usize::MAX,
            max_duration: DEFAULT_MAX_DURATION,
            chunk_size: DEFAULT_CHUNK_SIZE,
            partition_by: Vec::new(),
            options: WriterOptions::default(),
            pre_write_transformation: None,
            post_write_handler: None,
            encoder: Arc::new(encoder),
            schema_resolver: Arc::new(schema_resolver),
        }
    }

    #[must_use]
    pub fn max_count(mut self, max_count: usize) -> Self {
        self.max_count = max_count;
        self
    }

    #[must_use]
    pub fn max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = max_duration;
        self
    }

    #[must_use]
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    #[must_use]
    pub fn partition_by(mut self, columns: Vec<ColumnPath>) -> Self {
        self.partition_by = columns;
        self
    }

    #[must_use]
    pub fn options(mut self, options: WriterOptions) -> Self {
        self.options = options;
        self
    }

    /// Maps each source item to zero or more write items. Leave unset when
    /// `T` and `W` are the same type to pass every source record through
    /// unchanged.
    #[must_use]
    pub fn pre_write_transformation(mut self, f: impl Fn(&T) -> Vec<W> + Send + Sync + 'static) -> Self {
        self.pre_write_transformation = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn post_write_handler(mut self, handler: PostWriteHandler<T>) -> Self {
        self.post_write_handler = Some(handler);
        self
    }

    /// Resolves the schema (failing eagerly on error, before any file is
    /// touched) and spawns the pipeline against `upstream`.
    pub fn build<S>(self, upstream: S) -> Result<Pipe<T>, WriterError>
    where
        S: Stream<Item = T> + Unpin + Send + 'static,
    {
        let schema = self.schema_resolver.resolve()?;
        let partitioner = Partitioner::new(self.partition_by);

        let encoder = self.encoder;
        let options = self.options.clone();
        let pre = self.pre_write_transformation;
        let transform = move |item: &T| -> Result<Vec<Record>, WriterError> {
            let expanded: Vec<W> = match &pre {
                Some(f) => f(item),
                None => vec![item.clone().into()],
            };
            expanded.iter().map(|w| encoder.encode(w, &options)).collect()
        };

        let config = PipelineConfig {
            base_path: self.base_path,
            max_count: self.max_count,
            max_duration: self.max_duration,
            chunk_size: self.chunk_size,
            options: self.options,
        };

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(pipeline::run(
            upstream,
            schema,
            partitioner,
            transform,
            config,
            out_tx,
            self.post_write_handler,
        ));

        Ok(Pipe {
            stream: UnboundedReceiverStream::new(out_rx),
            task,
        })
    }
}

/// Builds a pipeline directly over [`Record`], with a schema resolved up
/// front by the caller.
pub struct GenericBuilder {
    base_path: PathBuf,
    schema: Arc<SchemaDef>,
    max_count: usize,
    max_duration: Duration,
    chunk_size: usize,
    partition_by: Vec<ColumnPath>,
    options: WriterOptions,
    pre_write_transformation: Option<Arc<dyn Fn(&Record) -> Vec<Record> + Send + Sync>>,
    post_write_handler: Option<PostWriteHandler<Record>>,
}

impl GenericBuilder {
    pub fn new(base_path: impl Into<PathBuf>, schema: Arc<SchemaDef>) -> Self {
        GenericBuilder {
            base_path: base_path.into(),
            schema,
            max_count: usize::MAX,
            max_duration: DEFAULT_MAX_DURATION,
            chunk_size: DEFAULT_CHUNK_SIZE,
            partition_by: Vec::new(),
            options: WriterOptions::default(),
            pre_write_transformation: None,
            post_write_handler: None,
        }
    }

    #[must_use]
    pub fn max_count(mut self, max_count: usize) -> Self {
        self.max_count = max_count;
        self
    }

    #[must_use]
    pub fn max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = max_duration;
        self
    }

    #[must_use]
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    #[must_use]
    pub fn partition_by(mut self, columns: Vec<ColumnPath>) -> Self {
        self.partition_by = columns;
        self
    }

    #[must_use]
    pub fn options(mut self, options: WriterOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn pre_write_transformation(mut self, f: impl Fn(&Record) -> Vec<Record> + Send + Sync + 'static) -> Self {
        self.pre_write_transformation = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn post_write_handler(mut self, handler: PostWriteHandler<Record>) -> Self {
        self.post_write_handler = Some(handler);
        self
    }

    /// Validates the "non-empty after partition removal" invariant
    /// synchronously, before spawning anything — the schema and partition
    /// columns are both already in hand for this entry point, so there is
    /// no reason to wait for the pipeline task to discover the same error.
    pub fn build<S>(self, upstream: S) -> Result<Pipe<Record>, WriterError>
    where
        S: Stream<Item = Record> + Unpin + Send + 'static,
    {
        let partitioner = Partitioner::new(self.partition_by);
        partitioner.strip_schema(&self.schema)?;

        let pre = self.pre_write_transformation;
        let transform = move |item: &Record| -> Result<Vec<Record>, WriterError> {
            match &pre {
                Some(f) => Ok(f(item)),
                None => Ok(vec![item.clone()]),
            }
        };

        let config = PipelineConfig {
            base_path: self.base_path,
            max_count: self.max_count,
            max_duration: self.max_duration,
            chunk_size: self.chunk_size,
            options: self.options,
        };

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(pipeline::run(
            upstream,
            self.schema,
            partitioner,
            transform,
            config,
            out_tx,
            self.post_write_handler,
        ));

        Ok(Pipe {
            stream: UnboundedReceiverStream::new(out_rx),
            task,
        })
    }
}
