//! The rotating partitioned columnar writer: a streaming sink that consumes
//! a lazy sequence of records and persists them as Parquet files beneath a
//! base directory, rotating the output file per partition on a record-count
//! or wall-clock threshold.
//!
//! [`builder::TypedBuilder`] and [`builder::GenericBuilder`] are the two
//! public entry points; everything else in this crate is a collaborator of
//! the event loop in [`pipeline`].

mod builder;
mod error;
mod factory;
mod leaf;
mod partition;
mod pipeline;
mod registry;

pub use builder::{Encoder, GenericBuilder, Pipe, SchemaResolver, TypedBuilder};
pub use error::WriterError;
pub use factory::WriterOptions;
pub use pipeline::{FlushRequests, PostWriteHandler, Snapshot};

#[cfg(test)]
mod tests;
