//
// storage.rs
// Dicom-Albums-rs
//
// Load/save contract for persisted documents, its JSON-file implementation, and the data directory layout.
//
// Thales Matheus Mendonça Santos - October 2026

use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::album::AlbumBook;
use crate::error::{Error, Result};
use crate::hierarchy::Hierarchy;

pub const HIERARCHY_FILE: &str = "hierarchy.json";
pub const ALBUMS_FILE: &str = "albums.json";

/// Whole-document persistence. Swapping the backend must not touch query or album logic.
pub trait Repository<T> {
    /// Returns the stored document, or an empty one if nothing was stored yet.
    fn load(&self) -> Result<T>;
    /// Replaces the stored document.
    fn save(&self, value: &T) -> Result<()>;
}

/// One pretty-printed JSON file per document, rewritten in full on every save.
pub struct JsonFileRepository<T> {
    path: PathBuf,
    _document: PhantomData<fn() -> T>,
}

impl<T> JsonFileRepository<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _document: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T> Clone for JsonFileRepository<T> {
    fn clone(&self) -> Self {
        Self::new(self.path.clone())
    }
}

impl<T> Repository<T> for JsonFileRepository<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    fn load(&self) -> Result<T> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no document yet, starting empty");
            return Ok(T::default());
        }
        let text = fs::read_to_string(&self.path).map_err(|e| Error::storage(&self.path, e))?;
        serde_json::from_str(&text).map_err(|e| Error::storage(&self.path, e))
    }

    fn save(&self, value: &T) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::storage(parent, e))?;
        }
        let text = serde_json::to_string_pretty(value).map_err(|e| Error::storage(&self.path, e))?;
        fs::write(&self.path, text).map_err(|e| Error::storage(&self.path, e))?;
        debug!(path = %self.path.display(), "document saved");
        Ok(())
    }
}

/// Directory holding the persisted hierarchy and album documents.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        // Create the data directory eagerly so later saves only fail on real I/O problems.
        fs::create_dir_all(&root).map_err(|e| Error::storage(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn hierarchy_repository(&self) -> JsonFileRepository<Hierarchy> {
        JsonFileRepository::new(self.root.join(HIERARCHY_FILE))
    }

    pub fn album_repository(&self) -> JsonFileRepository<AlbumBook> {
        JsonFileRepository::new(self.root.join(ALBUMS_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageFault;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    #[test]
    fn missing_document_loads_as_default() {
        let root = tempdir().expect("tmpdir");
        let repo: JsonFileRepository<BTreeMap<String, u32>> =
            JsonFileRepository::new(root.path().join("absent.json"));

        assert!(repo.load().expect("load").is_empty());
    }

    #[test]
    fn save_creates_parent_and_replaces_contents() {
        let root = tempdir().expect("tmpdir");
        let repo: JsonFileRepository<BTreeMap<String, u32>> =
            JsonFileRepository::new(root.path().join("nested/doc.json"));

        let mut doc = BTreeMap::new();
        doc.insert("a".to_string(), 1_u32);
        repo.save(&doc).expect("first save");
        doc.remove("a");
        doc.insert("b".to_string(), 2);
        repo.save(&doc).expect("second save");

        let restored: BTreeMap<String, u32> = repo.load().expect("load");
        assert_eq!(restored, doc);
    }

    #[test]
    fn corrupt_document_is_a_storage_error() {
        let root = tempdir().expect("tmpdir");
        let path = root.path().join("broken.json");
        fs::write(&path, "{ not json").expect("write");
        let repo: JsonFileRepository<BTreeMap<String, u32>> = JsonFileRepository::new(&path);

        match repo.load() {
            Err(Error::Storage {
                path: failed,
                source: StorageFault::Json(_),
            }) => assert_eq!(failed, path),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn data_dir_lays_out_both_documents() {
        let root = tempdir().expect("tmpdir");
        let data = DataDir::new(root.path().join("state")).expect("data dir");

        assert!(data.root().is_dir());
        assert_eq!(
            data.hierarchy_repository().path(),
            root.path().join("state").join(HIERARCHY_FILE)
        );
        assert_eq!(
            data.album_repository().path(),
            root.path().join("state").join(ALBUMS_FILE)
        );
    }
}
