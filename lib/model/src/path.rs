//! Dotted field paths and directory paths.

use std::path::{Path, PathBuf};

/// A non-empty, dot-separated sequence of field names, used to address a
/// (possibly nested) leaf field in a [`crate::record::Record`].
///
/// `tail()` may produce an empty path once the last segment has been
/// consumed; callers check `is_empty()` as the recursion base case rather
/// than relying on the type itself staying non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPath(Vec<String>);

impl ColumnPath {
    /// Builds a path from already-split segments. Returns `None` for an empty slice.
    pub fn new(segments: Vec<String>) -> Option<Self> {
        if segments.is_empty() {
            None
        } else {
            Some(ColumnPath(segments))
        }
    }

    /// Splits a dotted string such as `"user.address.postcode"`.
    pub fn parse(dotted: &str) -> Option<Self> {
        Self::new(dotted.split('.').map(str::to_owned).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn head(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or_default()
    }

    pub fn tail(&self) -> ColumnPath {
        ColumnPath(self.0.iter().skip(1).cloned().collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl std::fmt::Display for ColumnPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// A base directory that partition segments are appended to, one
/// `field=value` component at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirPath(PathBuf);

impl DirPath {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        DirPath(base.into())
    }

    #[must_use]
    pub fn append(&self, segment: impl AsRef<Path>) -> DirPath {
        DirPath(self.0.join(segment))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl From<PathBuf> for DirPath {
    fn from(p: PathBuf) -> Self {
        DirPath(p)
    }
}

impl AsRef<Path> for DirPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}
