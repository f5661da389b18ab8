//! The writer's public, matchable error type.

use rotor_model::{PathError, SchemaError};

#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    #[error("bad partition: {0}")]
    BadPartition(String),

    #[error("schema resolution failed: {0}")]
    SchemaResolution(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("encode failed: {0}")]
    Encode(String),

    #[error("post-write handler failed: {0}")]
    UserHandler(String),
}

impl From<SchemaError> for WriterError {
    fn from(e: SchemaError) -> Self {
        WriterError::SchemaResolution(e.to_string())
    }
}

impl From<PathError> for WriterError {
    fn from(e: PathError) -> Self {
        WriterError::BadPartition(e.to_string())
    }
}

impl From<parquet::errors::ParquetError> for WriterError {
    fn from(e: parquet::errors::ParquetError) -> Self {
        WriterError::Encode(e.to_string())
    }
}
