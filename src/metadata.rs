use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use dicom::core::Tag;
use dicom::object::{open_file, DefaultDicomObject};
use tracing::{debug, warn};

use crate::dicom_access::ElementAccess;
use crate::error::{Error, Result};
use crate::models::ImageRecord;

pub const PATIENT_NAME: Tag = Tag(0x0010, 0x0010);
pub const PATIENT_ID: Tag = Tag(0x0010, 0x0020);
pub const STUDY_DATE: Tag = Tag(0x0008, 0x0020);
pub const STUDY_DESCRIPTION: Tag = Tag(0x0008, 0x1030);
pub const STUDY_INSTANCE_UID: Tag = Tag(0x0020, 0x000D);
pub const SERIES_INSTANCE_UID: Tag = Tag(0x0020, 0x000E);
pub const MODALITY: Tag = Tag(0x0008, 0x0060);
pub const SERIES_NUMBER: Tag = Tag(0x0020, 0x0011);
pub const SERIES_DESCRIPTION: Tag = Tag(0x0008, 0x103E);
pub const SOP_CLASS_UID: Tag = Tag(0x0008, 0x0016);
pub const SOP_INSTANCE_UID: Tag = Tag(0x0008, 0x0018);
pub const INSTANCE_NUMBER: Tag = Tag(0x0020, 0x0013);
pub const ROWS: Tag = Tag(0x0028, 0x0010);
pub const COLUMNS: Tag = Tag(0x0028, 0x0011);

fn required<T: ElementAccess>(obj: &T, tag: Tag, keyword: &str, path: &Path) -> Result<String> {
    obj.element_text(tag)
        .ok_or_else(|| Error::parse(path, format!("missing required tag {} {}", keyword, tag)))
}

fn optional_number<T: ElementAccess, V: FromStr>(
    obj: &T,
    tag: Tag,
    keyword: &str,
    path: &Path,
) -> Option<V> {
    match obj.element_parsed::<V>(tag)? {
        Ok(value) => Some(value),
        Err(raw) => {
            warn!(path = %path.display(), "ignoring non-numeric {}: {:?}", keyword, raw);
            None
        }
    }
}

/// DA values are `YYYYMMDD`; the dotted form predates DICOM 3.0 but still shows up.
fn parse_study_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y.%m.%d"))
        .ok()
}

/// Builds the flat record for one object. Fails when any identifier needed for placement is absent.
pub fn extract_record<T: ElementAccess>(obj: &T, path: &Path) -> Result<ImageRecord> {
    let patient_id = required(obj, PATIENT_ID, "PatientID", path)?;
    let study_instance_uid = required(obj, STUDY_INSTANCE_UID, "StudyInstanceUID", path)?;
    let series_instance_uid = required(obj, SERIES_INSTANCE_UID, "SeriesInstanceUID", path)?;
    let sop_instance_uid = obj
        .element_text(SOP_INSTANCE_UID)
        .or_else(|| obj.media_sop_instance_uid())
        .ok_or_else(|| Error::parse(path, "missing required tag SOPInstanceUID (0008,0018)"))?;

    let study_date = obj.element_text(STUDY_DATE).and_then(|raw| {
        let parsed = parse_study_date(&raw);
        if parsed.is_none() {
            warn!(path = %path.display(), "ignoring invalid StudyDate {:?}", raw);
        }
        parsed
    });

    Ok(ImageRecord {
        file_path: path.to_path_buf(),
        patient_id,
        patient_name: obj.element_text(PATIENT_NAME),
        study_instance_uid,
        study_date,
        study_description: obj.element_text(STUDY_DESCRIPTION),
        series_instance_uid,
        modality: obj.element_text(MODALITY),
        series_number: optional_number(obj, SERIES_NUMBER, "SeriesNumber", path),
        series_description: obj.element_text(SERIES_DESCRIPTION),
        sop_instance_uid,
        sop_class_uid: obj.element_text(SOP_CLASS_UID),
        instance_number: optional_number(obj, INSTANCE_NUMBER, "InstanceNumber", path),
        rows: optional_number(obj, ROWS, "Rows", path),
        columns: optional_number(obj, COLUMNS, "Columns", path),
        transfer_syntax: obj.transfer_syntax(),
    })
}

pub fn read_record(path: &Path) -> Result<ImageRecord> {
    debug!(path = %path.display(), "reading DICOM file");
    let obj: DefaultDicomObject = open_file(path).map_err(|e| Error::parse(path, e.to_string()))?;
    extract_record(&obj, path)
}

fn or_na<T: Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

pub fn print_info(path: &Path) -> Result<()> {
    let record = read_record(path)?;

    println!("{}", "=".repeat(80));
    println!("DICOM File Information: {}", path.display());
    println!("{}", "=".repeat(80));

    println!("PATIENT");
    println!("  ID:   {}", record.patient_id);
    println!("  Name: {}", or_na(&record.patient_name));

    println!("\nSTUDY");
    println!("  UID:         {}", record.study_instance_uid);
    println!("  Date:        {}", or_na(&record.study_date));
    println!("  Description: {}", or_na(&record.study_description));

    println!("\nSERIES");
    println!("  UID:         {}", record.series_instance_uid);
    println!("  Modality:    {}", or_na(&record.modality));
    println!("  Number:      {}", or_na(&record.series_number));
    println!("  Description: {}", or_na(&record.series_description));

    println!("\nIMAGE");
    println!("  SOP Instance:    {}", record.sop_instance_uid);
    println!("  SOP Class:       {}", or_na(&record.sop_class_uid));
    println!("  Instance Number: {}", or_na(&record.instance_number));
    println!(
        "  Size:            {} x {}",
        or_na(&record.columns),
        or_na(&record.rows)
    );
    println!("  Transfer Syntax: {}", or_na(&record.transfer_syntax));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom::core::{DataElement, PrimitiveValue, VR};
    use dicom::object::InMemDicomObject;

    fn sample_object() -> InMemDicomObject {
        let mut obj = InMemDicomObject::new_empty();
        obj.put(DataElement::new(PATIENT_ID, VR::LO, PrimitiveValue::from("PAT001")));
        obj.put(DataElement::new(
            PATIENT_NAME,
            VR::PN,
            PrimitiveValue::from("Doe^Jane"),
        ));
        obj.put(DataElement::new(
            STUDY_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from("1.2.3.4"),
        ));
        obj.put(DataElement::new(STUDY_DATE, VR::DA, PrimitiveValue::from("20240131")));
        obj.put(DataElement::new(
            SERIES_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from("1.2.3.4.5"),
        ));
        obj.put(DataElement::new(MODALITY, VR::CS, PrimitiveValue::from("MR")));
        obj.put(DataElement::new(SERIES_NUMBER, VR::IS, PrimitiveValue::from("4")));
        obj.put(DataElement::new(
            SOP_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from("1.2.3.4.5.6"),
        ));
        obj.put(DataElement::new(ROWS, VR::US, PrimitiveValue::from(256_u16)));
        obj.put(DataElement::new(COLUMNS, VR::US, PrimitiveValue::from(128_u16)));
        obj
    }

    #[test]
    fn record_carries_identifiers_and_attributes() {
        let record = extract_record(&sample_object(), Path::new("/scan/I0001")).expect("record");

        assert_eq!(record.patient_id, "PAT001");
        assert_eq!(record.patient_name.as_deref(), Some("Doe^Jane"));
        assert_eq!(record.study_instance_uid, "1.2.3.4");
        assert_eq!(record.study_date, NaiveDate::from_ymd_opt(2024, 1, 31));
        assert_eq!(record.series_instance_uid, "1.2.3.4.5");
        assert_eq!(record.modality.as_deref(), Some("MR"));
        assert_eq!(record.series_number, Some(4));
        assert_eq!(record.sop_instance_uid, "1.2.3.4.5.6");
        assert_eq!(record.rows, Some(256));
        assert_eq!(record.columns, Some(128));
        assert_eq!(record.instance_number, None);
        assert_eq!(record.transfer_syntax, None);
    }

    #[test]
    fn missing_series_uid_is_a_parse_error() {
        let mut obj = sample_object();
        obj.remove_element(SERIES_INSTANCE_UID);

        let err = extract_record(&obj, Path::new("/scan/I0002")).unwrap_err();
        match err {
            Error::Parse { path, reason } => {
                assert_eq!(path, Path::new("/scan/I0002"));
                assert!(reason.contains("SeriesInstanceUID"), "{}", reason);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_optional_values_are_dropped() {
        let mut obj = sample_object();
        obj.put(DataElement::new(STUDY_DATE, VR::DA, PrimitiveValue::from("2024-13")));
        obj.put(DataElement::new(SERIES_NUMBER, VR::IS, PrimitiveValue::from("abc")));

        let record = extract_record(&obj, Path::new("/scan/I0003")).expect("record");
        assert_eq!(record.study_date, None);
        assert_eq!(record.series_number, None);
    }

    #[test]
    fn unreadable_file_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"not a dicom file").expect("write");

        assert!(matches!(read_record(&path), Err(Error::Parse { .. })));
    }
}
