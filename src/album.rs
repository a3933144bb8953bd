//
// album.rs
// Dicom-Albums-rs
//
// Album CRUD over a single persisted document; every mutation rewrites the whole document.
//
// Thales Matheus Mendonça Santos - October 2026

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{EntityKind, Error, Result};
use crate::hierarchy::HierarchyStore;
use crate::models::{Album, DEFAULT_CREATOR};
use crate::query::Query;
use crate::storage::Repository;

/// Persisted form of all albums, keyed by album id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlbumBook {
    #[serde(default)]
    pub albums: BTreeMap<String, Album>,
}

pub struct AlbumManager<R> {
    repo: R,
    book: AlbumBook,
}

impl<R: Repository<AlbumBook>> AlbumManager<R> {
    pub fn open(repo: R) -> Result<Self> {
        let book = repo.load()?;
        debug!(albums = book.albums.len(), "albums loaded");
        Ok(Self { repo, book })
    }

    /// Albums in creation order.
    pub fn albums(&self) -> Vec<&Album> {
        let mut albums: Vec<&Album> = self.book.albums.values().collect();
        albums.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.album_id.cmp(&b.album_id))
        });
        albums
    }

    pub fn album(&self, album_id: &str) -> Option<&Album> {
        self.book.albums.get(album_id)
    }

    pub fn create_album(&mut self, name: &str, description: &str) -> Result<Album> {
        self.create_album_by(name, description, DEFAULT_CREATOR)
    }

    pub fn create_album_by(&mut self, name: &str, description: &str, creator: &str) -> Result<Album> {
        self.insert_new(name, description, creator, Vec::new())
    }

    /// Creates an album holding every image the query yields, in sequence order.
    pub fn create_from_query(
        &mut self,
        name: &str,
        description: &str,
        query: &Query,
        store: &HierarchyStore,
    ) -> Result<Album> {
        let images: Vec<PathBuf> = query
            .images(store)
            .map(|found| found.image.file_path.clone())
            .collect();
        debug!(matches = images.len(), "query resolved for new album");
        self.insert_new(name, description, DEFAULT_CREATOR, dedup_paths(images))
    }

    /// Appends the paths not already in the album. Returns how many were added.
    pub fn add_images<P: AsRef<Path>>(&mut self, album_id: &str, paths: &[P]) -> Result<usize> {
        let album = self.album_mut(album_id)?;
        let mut present: HashSet<PathBuf> = album.images.iter().cloned().collect();
        let before = album.images.len();
        for path in paths {
            let path = path.as_ref();
            if present.insert(path.to_path_buf()) {
                album.images.push(path.to_path_buf());
            }
        }
        let added = album.images.len() - before;
        album.modified_at = Utc::now();
        self.persist()?;
        info!(album_id, added, "images added to album");
        Ok(added)
    }

    /// Removes the given paths. Returns how many were present.
    pub fn remove_images<P: AsRef<Path>>(&mut self, album_id: &str, paths: &[P]) -> Result<usize> {
        let album = self.album_mut(album_id)?;
        let doomed: HashSet<&Path> = paths.iter().map(|p| p.as_ref()).collect();
        let before = album.images.len();
        album.images.retain(|image| !doomed.contains(image.as_path()));
        let removed = before - album.images.len();
        album.modified_at = Utc::now();
        self.persist()?;
        info!(album_id, removed, "images removed from album");
        Ok(removed)
    }

    pub fn rename_album(&mut self, album_id: &str, name: &str) -> Result<()> {
        let album = self.album_mut(album_id)?;
        album.name = name.to_string();
        album.modified_at = Utc::now();
        self.persist()?;
        info!(album_id, name, "album renamed");
        Ok(())
    }

    /// Sets one free-form metadata entry, replacing any previous value under `key`.
    pub fn annotate(&mut self, album_id: &str, key: &str, value: serde_json::Value) -> Result<()> {
        let album = self.album_mut(album_id)?;
        album.metadata.insert(key.to_string(), value);
        album.modified_at = Utc::now();
        self.persist()?;
        info!(album_id, key, "album annotated");
        Ok(())
    }

    pub fn delete_album(&mut self, album_id: &str) -> Result<Album> {
        let album = self
            .book
            .albums
            .remove(album_id)
            .ok_or_else(|| Error::not_found(EntityKind::Album, album_id))?;
        self.persist()?;
        info!(album_id, "album deleted");
        Ok(album)
    }

    fn album_mut(&mut self, album_id: &str) -> Result<&mut Album> {
        self.book
            .albums
            .get_mut(album_id)
            .ok_or_else(|| Error::not_found(EntityKind::Album, album_id))
    }

    fn insert_new(
        &mut self,
        name: &str,
        description: &str,
        creator: &str,
        images: Vec<PathBuf>,
    ) -> Result<Album> {
        let now = Utc::now();
        let album_id = self.allocate_id(name, &now.to_rfc3339());
        let album = Album {
            album_id: album_id.clone(),
            name: name.to_string(),
            description: description.to_string(),
            creator: creator.to_string(),
            created_at: now,
            modified_at: now,
            images,
            metadata: BTreeMap::new(),
        };
        self.book.albums.insert(album_id.clone(), album.clone());
        self.persist()?;
        info!(album_id = %album_id, name, images = album.images.len(), "album created");
        Ok(album)
    }

    // Digest of name and creation time; the nonce only moves on a collision.
    fn allocate_id(&self, name: &str, stamp: &str) -> String {
        let mut nonce: u64 = 0;
        loop {
            let mut hasher = Sha256::new();
            hasher.update(name.as_bytes());
            hasher.update(stamp.as_bytes());
            hasher.update(nonce.to_le_bytes());
            let id = hex::encode(hasher.finalize())[..16].to_string();
            if !self.book.albums.contains_key(&id) {
                return id;
            }
            nonce += 1;
        }
    }

    fn persist(&self) -> Result<()> {
        self.repo.save(&self.book)
    }
}

fn dedup_paths(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    paths
        .into_iter()
        .filter(|path| seen.insert(path.clone()))
        .collect()
}
