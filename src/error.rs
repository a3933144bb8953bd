//
// error.rs
// Dicom-Albums-rs
//
// Error taxonomy shared by the extractor, the hierarchy store, and the album manager.
//
// Thales Matheus Mendonça Santos - October 2026

use std::fmt;
use std::path::{Path, PathBuf};

/// Which kind of record a `NotFound` error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Patient,
    Study,
    Series,
    Image,
    Album,
    Path,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityKind::Patient => "patient",
            EntityKind::Study => "study",
            EntityKind::Series => "series",
            EntityKind::Image => "image",
            EntityKind::Album => "album",
            EntityKind::Path => "path",
        };
        f.write_str(label)
    }
}

/// Underlying cause of a persistence failure.
#[derive(Debug, thiserror::Error)]
pub enum StorageFault {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The file could not be read as DICOM, or lacks a tag needed to place it in the hierarchy.
    #[error("cannot parse {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// Reading or writing a persisted document failed. In-memory state may no longer match disk.
    #[error("storage failure on {}: {source}", .path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: StorageFault,
    },
}

impl Error {
    pub(crate) fn parse(path: &Path, reason: impl Into<String>) -> Self {
        Error::Parse {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub(crate) fn storage(path: &Path, source: impl Into<StorageFault>) -> Self {
        Error::Storage {
            path: path.to_path_buf(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
