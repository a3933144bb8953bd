//
// models.rs
// Dicom-Albums-rs
//
// Defines the serializable records of the Patient → Study → Series → Image hierarchy and of albums.
//
// Thales Matheus Mendonça Santos - October 2026

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Flat result of extracting one DICOM file: everything needed to place it in the hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub file_path: PathBuf,
    pub patient_id: String,
    pub patient_name: Option<String>,
    pub study_instance_uid: String,
    pub study_date: Option<NaiveDate>,
    pub study_description: Option<String>,
    pub series_instance_uid: String,
    pub modality: Option<String>,
    pub series_number: Option<i32>,
    pub series_description: Option<String>,
    pub sop_instance_uid: String,
    pub sop_class_uid: Option<String>,
    pub instance_number: Option<i32>,
    pub rows: Option<u32>,
    pub columns: Option<u32>,
    pub transfer_syntax: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub file_path: PathBuf,
    pub sop_instance_uid: String,
    #[serde(default)]
    pub sop_class_uid: Option<String>,
    #[serde(default)]
    pub instance_number: Option<i32>,
    #[serde(default)]
    pub rows: Option<u32>,
    #[serde(default)]
    pub columns: Option<u32>,
    #[serde(default)]
    pub transfer_syntax: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub series_instance_uid: String,
    #[serde(default)]
    pub modality: Option<String>,
    #[serde(default)]
    pub series_number: Option<i32>,
    #[serde(default)]
    pub series_description: Option<String>,
    /// Scan order.
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Study {
    pub study_instance_uid: String,
    #[serde(default)]
    pub study_date: Option<NaiveDate>,
    #[serde(default)]
    pub study_description: Option<String>,
    #[serde(default)]
    pub series: BTreeMap<String, Series>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub patient_id: String,
    #[serde(default)]
    pub patient_name: Option<String>,
    #[serde(default)]
    pub studies: BTreeMap<String, Study>,
}

impl From<&ImageRecord> for Image {
    fn from(record: &ImageRecord) -> Self {
        Image {
            file_path: record.file_path.clone(),
            sop_instance_uid: record.sop_instance_uid.clone(),
            sop_class_uid: record.sop_class_uid.clone(),
            instance_number: record.instance_number,
            rows: record.rows,
            columns: record.columns,
            transfer_syntax: record.transfer_syntax.clone(),
        }
    }
}

impl Series {
    pub(crate) fn new(series_instance_uid: &str) -> Self {
        Series {
            series_instance_uid: series_instance_uid.to_string(),
            modality: None,
            series_number: None,
            series_description: None,
            images: Vec::new(),
        }
    }

    /// Last write wins, so a re-scan converges to what a fresh scan would record.
    pub(crate) fn absorb(&mut self, record: &ImageRecord) {
        self.modality = record.modality.clone();
        self.series_number = record.series_number;
        self.series_description = record.series_description.clone();
    }
}

impl Study {
    pub(crate) fn new(study_instance_uid: &str) -> Self {
        Study {
            study_instance_uid: study_instance_uid.to_string(),
            study_date: None,
            study_description: None,
            series: BTreeMap::new(),
        }
    }

    pub(crate) fn absorb(&mut self, record: &ImageRecord) {
        self.study_date = record.study_date;
        self.study_description = record.study_description.clone();
    }
}

impl Patient {
    pub(crate) fn new(patient_id: &str) -> Self {
        Patient {
            patient_id: patient_id.to_string(),
            patient_name: None,
            studies: BTreeMap::new(),
        }
    }

    pub(crate) fn absorb(&mut self, record: &ImageRecord) {
        self.patient_name = record.patient_name.clone();
    }
}

/// Named, ordered collection of image paths. Paths are soft references into the hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Album {
    pub album_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_creator")]
    pub creator: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    #[serde(default)]
    pub images: Vec<PathBuf>,
    /// Free-form annotations; stored and returned untouched.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

pub const DEFAULT_CREATOR: &str = "system";

fn default_creator() -> String {
    DEFAULT_CREATOR.to_string()
}

/// Per-level record counts, shown by the `status` command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchySummary {
    pub patients: usize,
    pub studies: usize,
    pub series: usize,
    pub images: usize,
}
