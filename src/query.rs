//
// query.rs
// Dicom-Albums-rs
//
// Attribute filters over the hierarchy, composed along the Patient → Study → Series → Image path.
//
// Thales Matheus Mendonça Santos - October 2026

use chrono::NaiveDate;

use crate::hierarchy::HierarchyStore;
use crate::models::{Image, Patient, Series, Study};

fn contains_ignore_case(haystack: Option<&str>, needle: &str) -> bool {
    haystack
        .unwrap_or_default()
        .to_lowercase()
        .contains(&needle.to_lowercase())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientFilter {
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
}

impl PatientFilter {
    pub fn is_empty(&self) -> bool {
        self.patient_id.is_none() && self.patient_name.is_none()
    }

    pub fn matches(&self, patient: &Patient) -> bool {
        if let Some(id) = &self.patient_id {
            if patient.patient_id != *id {
                return false;
            }
        }
        if let Some(name) = &self.patient_name {
            if patient.patient_name.as_deref() != Some(name.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Date bounds are inclusive. Description is a case-insensitive substring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudyFilter {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub description: Option<String>,
}

impl StudyFilter {
    pub fn is_empty(&self) -> bool {
        self.date_from.is_none() && self.date_to.is_none() && self.description.is_none()
    }

    pub fn matches(&self, study: &Study) -> bool {
        if self.date_from.is_some() || self.date_to.is_some() {
            // An undated study cannot satisfy a date bound.
            let Some(date) = study.study_date else {
                return false;
            };
            if self.date_from.is_some_and(|from| date < from) {
                return false;
            }
            if self.date_to.is_some_and(|to| date > to) {
                return false;
            }
        }
        if let Some(needle) = &self.description {
            if !contains_ignore_case(study.study_description.as_deref(), needle) {
                return false;
            }
        }
        true
    }
}

/// Modality is matched exactly, case included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeriesFilter {
    pub modality: Option<String>,
    pub series_number: Option<i32>,
    pub description: Option<String>,
}

impl SeriesFilter {
    pub fn is_empty(&self) -> bool {
        self.modality.is_none() && self.series_number.is_none() && self.description.is_none()
    }

    pub fn matches(&self, series: &Series) -> bool {
        if let Some(modality) = &self.modality {
            if series.modality.as_deref() != Some(modality.as_str()) {
                return false;
            }
        }
        if let Some(number) = self.series_number {
            if series.series_number != Some(number) {
                return false;
            }
        }
        if let Some(needle) = &self.description {
            if !contains_ignore_case(series.series_description.as_deref(), needle) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StudyMatch<'a> {
    pub patient: &'a Patient,
    pub study: &'a Study,
}

#[derive(Debug, Clone, Copy)]
pub struct SeriesMatch<'a> {
    pub patient: &'a Patient,
    pub study: &'a Study,
    pub series: &'a Series,
}

#[derive(Debug, Clone, Copy)]
pub struct ImageMatch<'a> {
    pub patient: &'a Patient,
    pub study: &'a Study,
    pub series: &'a Series,
    pub image: &'a Image,
}

/// Filters for every level of the hierarchy. A level only considers children of matching
/// parents; an empty filter lets its whole level through.
///
/// Result iterators are lazy and `Clone`, so a clone taken before consumption replays the
/// same sequence. None of them touch the store mutably.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub patient: PatientFilter,
    pub study: StudyFilter,
    pub series: SeriesFilter,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn patient_id(mut self, id: impl Into<String>) -> Self {
        self.patient.patient_id = Some(id.into());
        self
    }

    pub fn patient_name(mut self, name: impl Into<String>) -> Self {
        self.patient.patient_name = Some(name.into());
        self
    }

    pub fn study_dates(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.study.date_from = from;
        self.study.date_to = to;
        self
    }

    pub fn study_description(mut self, needle: impl Into<String>) -> Self {
        self.study.description = Some(needle.into());
        self
    }

    pub fn modality(mut self, modality: impl Into<String>) -> Self {
        self.series.modality = Some(modality.into());
        self
    }

    pub fn series_number(mut self, number: i32) -> Self {
        self.series.series_number = Some(number);
        self
    }

    pub fn series_description(mut self, needle: impl Into<String>) -> Self {
        self.series.description = Some(needle.into());
        self
    }

    pub fn patients<'a>(
        &'a self,
        store: &'a HierarchyStore,
    ) -> impl Iterator<Item = &'a Patient> + Clone + 'a {
        store
            .patients()
            .filter(move |patient| self.patient.matches(patient))
    }

    pub fn studies<'a>(
        &'a self,
        store: &'a HierarchyStore,
    ) -> impl Iterator<Item = StudyMatch<'a>> + Clone + 'a {
        self.patients(store).flat_map(move |patient| {
            patient
                .studies
                .values()
                .filter(move |study| self.study.matches(study))
                .map(move |study| StudyMatch { patient, study })
        })
    }

    pub fn series<'a>(
        &'a self,
        store: &'a HierarchyStore,
    ) -> impl Iterator<Item = SeriesMatch<'a>> + Clone + 'a {
        self.studies(store).flat_map(move |StudyMatch { patient, study }| {
            study
                .series
                .values()
                .filter(move |series| self.series.matches(series))
                .map(move |series| SeriesMatch {
                    patient,
                    study,
                    series,
                })
        })
    }

    /// Every image under a matching series, in hierarchy order then scan order.
    pub fn images<'a>(
        &'a self,
        store: &'a HierarchyStore,
    ) -> impl Iterator<Item = ImageMatch<'a>> + Clone + 'a {
        self.series(store).flat_map(
            |SeriesMatch {
                 patient,
                 study,
                 series,
             }| {
                series.images.iter().map(move |image| ImageMatch {
                    patient,
                    study,
                    series,
                    image,
                })
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ImageRecord;
    use std::path::PathBuf;

    fn record(
        path: &str,
        patient: &str,
        study: &str,
        date: Option<(i32, u32, u32)>,
        series: &str,
        modality: &str,
        number: i32,
    ) -> ImageRecord {
        ImageRecord {
            file_path: PathBuf::from(path),
            patient_id: patient.to_string(),
            patient_name: Some(format!("{}^Name", patient)),
            study_instance_uid: study.to_string(),
            study_date: date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            study_description: Some(format!("Chest {}", study)),
            series_instance_uid: series.to_string(),
            modality: Some(modality.to_string()),
            series_number: Some(number),
            series_description: Some(format!("Axial {}", number)),
            sop_instance_uid: format!("{}.1", path),
            sop_class_uid: None,
            instance_number: None,
            rows: None,
            columns: None,
            transfer_syntax: None,
        }
    }

    fn sample_store() -> HierarchyStore {
        let mut store = HierarchyStore::new();
        store.insert(record("/d/a1", "P1", "S1", Some((2024, 1, 10)), "S1.1", "CT", 1));
        store.insert(record("/d/a2", "P1", "S1", Some((2024, 1, 10)), "S1.2", "MR", 2));
        store.insert(record("/d/b1", "P2", "S2", Some((2024, 3, 5)), "S2.1", "CT", 1));
        store.insert(record("/d/b2", "P2", "S2", Some((2024, 3, 5)), "S2.1", "CT", 1));
        store.insert(record("/d/c1", "P3", "S3", None, "S3.1", "ct", 7));
        store
    }

    fn paths<'a>(images: impl Iterator<Item = ImageMatch<'a>>) -> Vec<String> {
        images
            .map(|m| m.image.file_path.display().to_string())
            .collect()
    }

    #[test]
    fn modality_is_exact_and_case_sensitive() {
        let store = sample_store();
        let query = Query::new().modality("CT");

        assert_eq!(paths(query.images(&store)), vec!["/d/a1", "/d/b1", "/d/b2"]);
    }

    #[test]
    fn empty_query_returns_everything() {
        let store = sample_store();
        let query = Query::new();

        assert_eq!(query.patients(&store).count(), 3);
        assert_eq!(query.studies(&store).count(), 3);
        assert_eq!(query.series(&store).count(), 4);
        assert_eq!(query.images(&store).count(), 5);
    }

    #[test]
    fn date_range_is_inclusive_and_skips_undated_studies() {
        let store = sample_store();
        let query = Query::new().study_dates(
            NaiveDate::from_ymd_opt(2024, 1, 10),
            NaiveDate::from_ymd_opt(2024, 3, 5),
        );

        let studies: Vec<_> = query
            .studies(&store)
            .map(|m| m.study.study_instance_uid.as_str())
            .collect();
        assert_eq!(studies, vec!["S1", "S2"]);

        let only_from = Query::new().study_dates(NaiveDate::from_ymd_opt(2024, 2, 1), None);
        let studies: Vec<_> = only_from
            .studies(&store)
            .map(|m| m.study.study_instance_uid.as_str())
            .collect();
        assert_eq!(studies, vec!["S2"]);
    }

    #[test]
    fn descriptions_match_case_insensitive_substrings() {
        let store = sample_store();

        let studies = Query::new().study_description("chest s3");
        assert_eq!(studies.studies(&store).count(), 1);

        let series = Query::new().series_description("AXIAL 2");
        let found: Vec<_> = series
            .series(&store)
            .map(|m| m.series.series_instance_uid.as_str())
            .collect();
        assert_eq!(found, vec!["S1.2"]);
    }

    #[test]
    fn lower_levels_respect_higher_level_filters() {
        let store = sample_store();
        let query = Query::new().patient_id("P1").modality("CT");

        assert_eq!(paths(query.images(&store)), vec!["/d/a1"]);

        let query = Query::new().patient_id("P1").series_number(1);
        let found: Vec<_> = query.series(&store).map(|m| m.patient.patient_id.as_str()).collect();
        assert_eq!(found, vec!["P1"]);
    }

    #[test]
    fn patient_filter_matches_id_and_name_exactly() {
        let store = sample_store();

        assert_eq!(Query::new().patient_name("P2^Name").patients(&store).count(), 1);
        assert_eq!(Query::new().patient_name("p2^name").patients(&store).count(), 0);
        assert_eq!(Query::new().patient_id("P9").patients(&store).count(), 0);
    }

    #[test]
    fn no_match_is_an_empty_sequence() {
        let store = sample_store();
        let query = Query::new().modality("PT");

        assert!(query.images(&store).next().is_none());
        assert_eq!(HierarchyStore::new().patients().count(), 0);
    }

    #[test]
    fn result_sequences_can_be_replayed() {
        let store = sample_store();
        let query = Query::new().modality("CT");
        let images = query.images(&store);

        let first = paths(images.clone());
        let second = paths(images);
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }
}
