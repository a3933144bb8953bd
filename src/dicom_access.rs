use std::str::FromStr;

use dicom::core::Tag;
use dicom::dictionary_std::StandardDataDictionary;
use dicom::object::{DefaultDicomObject, InMemDicomObject};

/// Small helper trait to pull string values from different DICOM object shapes.
pub trait ElementAccess {
    fn element_str(&self, tag: Tag) -> Option<String>;
    fn transfer_syntax(&self) -> Option<String>;
    /// SOP Instance UID recorded in the file meta group, when the object came from a file.
    fn media_sop_instance_uid(&self) -> Option<String>;

    /// Trimmed value of `tag`, with blank values treated as absent.
    fn element_text(&self, tag: Tag) -> Option<String> {
        self.element_str(tag)
            .map(|s| clean(&s))
            .filter(|s| !s.is_empty())
    }

    /// Parses the textual value of `tag`. `Some(Err(..))` carries the raw text that failed.
    fn element_parsed<V: FromStr>(&self, tag: Tag) -> Option<Result<V, String>> {
        self.element_text(tag)
            .map(|text| text.parse::<V>().map_err(|_| text))
    }
}

// DICOM pads odd-length values with a space (text) or NUL (UIDs).
fn clean(value: &str) -> String {
    value
        .trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string()
}

impl ElementAccess for DefaultDicomObject {
    fn element_str(&self, tag: Tag) -> Option<String> {
        self.element(tag)
            .ok()
            .and_then(|e| e.to_str().ok())
            .map(|s| s.into_owned())
    }

    fn transfer_syntax(&self) -> Option<String> {
        Some(clean(self.meta().transfer_syntax())).filter(|s| !s.is_empty())
    }

    fn media_sop_instance_uid(&self) -> Option<String> {
        Some(clean(&self.meta().media_storage_sop_instance_uid)).filter(|s| !s.is_empty())
    }
}

impl ElementAccess for InMemDicomObject<StandardDataDictionary> {
    fn element_str(&self, tag: Tag) -> Option<String> {
        self.element(tag)
            .ok()
            .and_then(|e| e.to_str().ok())
            .map(|s| s.into_owned())
    }

    fn transfer_syntax(&self) -> Option<String> {
        None
    }

    fn media_sop_instance_uid(&self) -> Option<String> {
        None
    }
}
