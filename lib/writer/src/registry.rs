//! Writer registry: a concurrency-safe mapping from partition directory to
//! its single active writer.
//!
//! Entries are created and removed from concurrently as partitions rotate,
//! so this is backed by `dashmap::DashMap` rather than a plain `HashMap`
//! behind a single lock.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use log::{debug, error};

use crate::error::WriterError;
use crate::factory::Writer;

/// Maps partition directory to its one active writer.
#[derive(Default)]
pub struct WriterRegistry {
    writers: DashMap<PathBuf, Arc<Writer>>,
}

impl WriterRegistry {
    pub fn new() -> Self {
        WriterRegistry::default()
    }

    pub fn get(&self, path: &PathBuf) -> Option<Arc<Writer>> {
        self.writers.get(path).map(|w| w.clone())
    }

    /// Returns the writer for `path`, creating one with `create` if absent.
    ///
    /// `create` may run even when another caller concurrently wins the race
    /// for the same path; the loser's freshly-built writer is disposed
    /// (never inserted or returned to any caller) and the winner's is
    /// returned to everyone.
    pub async fn get_or_create<F>(&self, path: PathBuf, create: F) -> Result<Arc<Writer>, WriterError>
    where
        F: FnOnce() -> Result<Writer, WriterError>,
    {
        if let Some(existing) = self.writers.get(&path) {
            return Ok(existing.clone());
        }

        let candidate = Arc::new(create()?);

        let winner = match self.writers.entry(path.clone()) {
            Entry::Occupied(occupied) => Some(occupied.get().clone()),
            Entry::Vacant(vacant) => {
                vacant.insert(candidate.clone());
                None
            }
        };

        match winner {
            Some(winner) => {
                debug!("{} lost writer-creation race, disposing", path.display());
                if let Ok(candidate) = Arc::try_unwrap(candidate) {
                    candidate.close().await.ok();
                }
                Ok(winner)
            }
            None => Ok(candidate),
        }
    }

    /// Atomically removes and returns the writer for `path`, for the
    /// caller to dispose.
    pub fn remove(&self, path: &PathBuf) -> Option<Arc<Writer>> {
        self.writers.remove(path).map(|(_, w)| w)
    }

    /// Drains and disposes every writer, clearing the map. Idempotent: a
    /// second call simply finds nothing left to drain. Returns the final
    /// paths of every non-empty file produced.
    pub async fn dispose_all(&self) -> Vec<PathBuf> {
        let entries: Vec<(PathBuf, Arc<Writer>)> =
            self.writers.iter().map(|e| (e.key().clone(), e.value().clone())).collect();
        self.writers.clear();

        let mut produced = Vec::new();
        for (path, writer) in entries {
            match writer.close().await {
                Ok(Some(file)) => produced.push(file),
                Ok(None) => {}
                Err(e) => error!("{} failed to close writer: {}", path.display(), e),
            }
        }
        produced
    }

    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }
}
