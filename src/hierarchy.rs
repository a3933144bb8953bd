//
// hierarchy.rs
// Dicom-Albums-rs
//
// Patient → Study → Series → Image store built by scanning directories, merged by DICOM identifiers.
//
// Thales Matheus Mendonça Santos - October 2026

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{EntityKind, Error, Result};
use crate::metadata;
use crate::models::{HierarchySummary, Image, ImageRecord, Patient, Series, Study};
use crate::query::ImageMatch;
use crate::storage::Repository;

/// Persisted form of the hierarchy: nested maps keyed by the natural DICOM identifiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hierarchy {
    #[serde(default)]
    pub patients: BTreeMap<String, Patient>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ImageLocation {
    patient_id: String,
    study_instance_uid: String,
    series_instance_uid: String,
}

impl ImageLocation {
    fn of(record: &ImageRecord) -> Self {
        Self {
            patient_id: record.patient_id.clone(),
            study_instance_uid: record.study_instance_uid.clone(),
            series_instance_uid: record.series_instance_uid.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The path was not in the store before.
    Added,
    /// The path was already known; its record was overwritten (and moved if its ids changed).
    Refreshed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFailure {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub root: PathBuf,
    /// Regular files visited.
    pub scanned: usize,
    pub added: usize,
    pub refreshed: usize,
    /// Images under the root that vanished or stopped parsing since the last scan.
    pub removed: usize,
    pub failures: Vec<ScanFailure>,
}

#[derive(Debug, Default)]
pub struct HierarchyStore {
    data: Hierarchy,
    // Rebuilt from `data`; never persisted.
    index: HashMap<PathBuf, ImageLocation>,
}

impl HierarchyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_hierarchy(data: Hierarchy) -> Self {
        let mut index = HashMap::new();
        for patient in data.patients.values() {
            for study in patient.studies.values() {
                for series in study.series.values() {
                    for image in &series.images {
                        index.insert(
                            image.file_path.clone(),
                            ImageLocation {
                                patient_id: patient.patient_id.clone(),
                                study_instance_uid: study.study_instance_uid.clone(),
                                series_instance_uid: series.series_instance_uid.clone(),
                            },
                        );
                    }
                }
            }
        }
        Self { data, index }
    }

    pub fn load<R: Repository<Hierarchy>>(repo: &R) -> Result<Self> {
        let store = Self::from_hierarchy(repo.load()?);
        debug!(images = store.index.len(), "hierarchy loaded");
        Ok(store)
    }

    pub fn save<R: Repository<Hierarchy>>(&self, repo: &R) -> Result<()> {
        repo.save(&self.data)
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.data
    }

    pub fn reset(&mut self) {
        self.data.patients.clear();
        self.index.clear();
    }

    /// Merges one extracted record, keyed by file path and DICOM identifiers.
    pub fn insert(&mut self, record: ImageRecord) -> InsertOutcome {
        let location = ImageLocation::of(&record);
        let previous = self.index.get(&record.file_path).cloned();
        if let Some(previous) = previous.as_ref().filter(|p| **p != location) {
            debug!(path = %record.file_path.display(), "identifiers changed, relocating image");
            self.detach(&record.file_path, previous);
        }

        let patient = self
            .data
            .patients
            .entry(record.patient_id.clone())
            .or_insert_with(|| Patient::new(&record.patient_id));
        patient.absorb(&record);

        let study = patient
            .studies
            .entry(record.study_instance_uid.clone())
            .or_insert_with(|| Study::new(&record.study_instance_uid));
        study.absorb(&record);

        let series = study
            .series
            .entry(record.series_instance_uid.clone())
            .or_insert_with(|| Series::new(&record.series_instance_uid));
        series.absorb(&record);

        let image = Image::from(&record);
        match series
            .images
            .iter_mut()
            .find(|existing| existing.file_path == image.file_path)
        {
            Some(existing) => *existing = image,
            None => series.images.push(image),
        }

        self.index.insert(record.file_path, location);
        if previous.is_some() {
            InsertOutcome::Refreshed
        } else {
            InsertOutcome::Added
        }
    }

    /// Drops the image recorded at `path`, pruning containers left empty.
    pub fn remove_image(&mut self, path: &Path) -> bool {
        match self.index.remove(path) {
            Some(location) => {
                self.detach(path, &location);
                true
            }
            None => false,
        }
    }

    fn detach(&mut self, path: &Path, location: &ImageLocation) {
        let Some(patient) = self.data.patients.get_mut(&location.patient_id) else {
            return;
        };
        if let Some(study) = patient.studies.get_mut(&location.study_instance_uid) {
            if let Some(series) = study.series.get_mut(&location.series_instance_uid) {
                series.images.retain(|image| image.file_path != path);
                if series.images.is_empty() {
                    study.series.remove(&location.series_instance_uid);
                }
            }
            if study.series.is_empty() {
                patient.studies.remove(&location.study_instance_uid);
            }
        }
        if patient.studies.is_empty() {
            self.data.patients.remove(&location.patient_id);
        }
    }

    /// Walks `root` in file-name order, following symlinks, and merges every file that parses
    /// as DICOM. Images are stored under their canonical path.
    ///
    /// Unreadable files are reported and skipped. Images previously recorded under `root`
    /// that were not extracted this time are removed, and each series is put back in the
    /// order this walk visited its images, so repeated scans converge on a fresh scan.
    pub fn scan(&mut self, root: &Path) -> Result<ScanReport> {
        let root = root
            .canonicalize()
            .map_err(|_| Error::not_found(EntityKind::Path, root.display().to_string()))?;
        info!(root = %root.display(), "scanning directory");

        let mut report = ScanReport {
            root: root.clone(),
            ..ScanReport::default()
        };
        // Canonical path -> position in this walk.
        let mut visited: HashMap<PathBuf, usize> = HashMap::new();

        for entry in WalkDir::new(&root).follow_links(true).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
                    warn!(path = %path.display(), "cannot walk entry: {}", e);
                    report.failures.push(ScanFailure {
                        path,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            report.scanned += 1;
            let canonical = entry
                .path()
                .canonicalize()
                .unwrap_or_else(|_| entry.path().to_path_buf());
            let path = canonical.as_path();
            match metadata::read_record(path) {
                Ok(record) => {
                    let position = visited.len();
                    visited.entry(path.to_path_buf()).or_insert(position);
                    match self.insert(record) {
                        InsertOutcome::Added => report.added += 1,
                        InsertOutcome::Refreshed => report.refreshed += 1,
                    }
                }
                Err(err) => {
                    warn!(path = %path.display(), "skipping file: {}", err);
                    let reason = match err {
                        Error::Parse { reason, .. } => reason,
                        other => other.to_string(),
                    };
                    report.failures.push(ScanFailure {
                        path: path.to_path_buf(),
                        reason,
                    });
                }
            }
        }

        let stale: Vec<PathBuf> = self
            .index
            .keys()
            .filter(|path| path.starts_with(&root) && !visited.contains_key(*path))
            .cloned()
            .collect();
        for path in stale {
            debug!(path = %path.display(), "dropping image no longer present");
            self.remove_image(&path);
            report.removed += 1;
        }
        self.apply_walk_order(&visited);

        info!(
            scanned = report.scanned,
            added = report.added,
            refreshed = report.refreshed,
            removed = report.removed,
            failed = report.failures.len(),
            "scan complete"
        );
        Ok(report)
    }

    // Stable: images this walk did not visit stay ahead, in their previous relative order.
    fn apply_walk_order(&mut self, visited: &HashMap<PathBuf, usize>) {
        for patient in self.data.patients.values_mut() {
            for study in patient.studies.values_mut() {
                for series in study.series.values_mut() {
                    series
                        .images
                        .sort_by_key(|image| visited.get(&image.file_path).copied());
                }
            }
        }
    }

    pub fn patients(&self) -> impl Iterator<Item = &Patient> + Clone + '_ {
        self.data.patients.values()
    }

    pub fn patient(&self, patient_id: &str) -> Option<&Patient> {
        self.data.patients.get(patient_id)
    }

    pub fn study(&self, patient_id: &str, study_instance_uid: &str) -> Option<&Study> {
        self.patient(patient_id)?.studies.get(study_instance_uid)
    }

    pub fn series(
        &self,
        patient_id: &str,
        study_instance_uid: &str,
        series_instance_uid: &str,
    ) -> Option<&Series> {
        self.study(patient_id, study_instance_uid)?
            .series
            .get(series_instance_uid)
    }

    /// Looks an image up by its file path, together with its ancestors.
    pub fn image(&self, path: &Path) -> Option<ImageMatch<'_>> {
        let location = self.index.get(path)?;
        let patient = self.patient(&location.patient_id)?;
        let study = patient.studies.get(&location.study_instance_uid)?;
        let series = study.series.get(&location.series_instance_uid)?;
        let image = series.images.iter().find(|image| image.file_path == path)?;
        Some(ImageMatch {
            patient,
            study,
            series,
            image,
        })
    }

    pub fn contains_image(&self, path: &Path) -> bool {
        self.index.contains_key(path)
    }

    pub fn summary(&self) -> HierarchySummary {
        let mut summary = HierarchySummary {
            patients: self.data.patients.len(),
            ..HierarchySummary::default()
        };
        for patient in self.data.patients.values() {
            summary.studies += patient.studies.len();
            for study in patient.studies.values() {
                summary.series += study.series.len();
                summary.images += study.series.values().map(|s| s.images.len()).sum::<usize>();
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str, patient: &str, study: &str, series: &str) -> ImageRecord {
        ImageRecord {
            file_path: PathBuf::from(path),
            patient_id: patient.to_string(),
            patient_name: Some("Doe^John".to_string()),
            study_instance_uid: study.to_string(),
            study_date: None,
            study_description: Some("Head".to_string()),
            series_instance_uid: series.to_string(),
            modality: Some("CT".to_string()),
            series_number: Some(1),
            series_description: None,
            sop_instance_uid: format!("{}.sop", path),
            sop_class_uid: None,
            instance_number: None,
            rows: Some(512),
            columns: Some(512),
            transfer_syntax: None,
        }
    }

    #[test]
    fn inserting_the_same_record_twice_does_not_duplicate() {
        let mut store = HierarchyStore::new();
        assert_eq!(
            store.insert(record("/d/1", "P", "ST", "SE")),
            InsertOutcome::Added
        );
        let snapshot = store.hierarchy().clone();
        assert_eq!(
            store.insert(record("/d/1", "P", "ST", "SE")),
            InsertOutcome::Refreshed
        );

        assert_eq!(store.hierarchy(), &snapshot);
        assert_eq!(store.summary().images, 1);
    }

    #[test]
    fn images_keep_insertion_order_within_a_series() {
        let mut store = HierarchyStore::new();
        store.insert(record("/d/b", "P", "ST", "SE"));
        store.insert(record("/d/a", "P", "ST", "SE"));
        store.insert(record("/d/b", "P", "ST", "SE"));

        let series = store.series("P", "ST", "SE").expect("series");
        let order: Vec<_> = series.images.iter().map(|i| i.file_path.clone()).collect();
        assert_eq!(order, vec![PathBuf::from("/d/b"), PathBuf::from("/d/a")]);
    }

    #[test]
    fn changed_identifiers_move_the_image_and_prune_empty_parents() {
        let mut store = HierarchyStore::new();
        store.insert(record("/d/1", "P1", "ST1", "SE1"));
        store.insert(record("/d/1", "P2", "ST2", "SE2"));

        assert!(store.patient("P1").is_none());
        let found = store.image(Path::new("/d/1")).expect("image");
        assert_eq!(found.patient.patient_id, "P2");
        assert_eq!(found.series.series_instance_uid, "SE2");
        assert_eq!(
            store.summary(),
            HierarchySummary {
                patients: 1,
                studies: 1,
                series: 1,
                images: 1
            }
        );
    }

    #[test]
    fn later_records_overwrite_parent_attributes() {
        let mut store = HierarchyStore::new();
        store.insert(record("/d/1", "P", "ST", "SE"));
        let mut renamed = record("/d/2", "P", "ST", "SE");
        renamed.patient_name = Some("Doe^Johnny".to_string());
        store.insert(renamed);

        assert_eq!(
            store.patient("P").and_then(|p| p.patient_name.as_deref()),
            Some("Doe^Johnny")
        );
    }

    #[test]
    fn lookups_return_none_for_unknown_ids() {
        let mut store = HierarchyStore::new();
        store.insert(record("/d/1", "P", "ST", "SE"));

        assert!(store.patient("nobody").is_none());
        assert!(store.study("P", "nothing").is_none());
        assert!(store.series("P", "ST", "nothing").is_none());
        assert!(store.image(Path::new("/d/404")).is_none());
        assert!(!store.remove_image(Path::new("/d/404")));
    }

    #[test]
    fn rebuilt_store_resolves_images_by_path() {
        let mut store = HierarchyStore::new();
        store.insert(record("/d/1", "P", "ST", "SE1"));
        store.insert(record("/d/2", "P", "ST", "SE2"));

        let rebuilt = HierarchyStore::from_hierarchy(store.hierarchy().clone());
        let found = rebuilt.image(Path::new("/d/2")).expect("image");
        assert_eq!(found.study.study_instance_uid, "ST");
        assert_eq!(found.series.series_instance_uid, "SE2");
        assert_eq!(rebuilt.summary(), store.summary());
    }

    #[test]
    fn scanning_a_missing_directory_is_not_found() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let mut store = HierarchyStore::new();

        let err = store.scan(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(
            err,
            Error::NotFound {
                kind: EntityKind::Path,
                ..
            }
        ));
    }

    #[test]
    fn non_dicom_files_are_reported_not_fatal() {
        let dir = tempfile::tempdir().expect("tmpdir");
        std::fs::write(dir.path().join("README.txt"), "hello").expect("write");
        std::fs::create_dir(dir.path().join("nested")).expect("mkdir");
        std::fs::write(dir.path().join("nested/I0001"), [0_u8; 16]).expect("write");

        let mut store = HierarchyStore::new();
        let report = store.scan(dir.path()).expect("scan");

        assert_eq!(report.scanned, 2);
        assert_eq!(report.added, 0);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(store.summary(), HierarchySummary::default());
    }
}
