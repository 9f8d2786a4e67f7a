use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::batch::AnnotationRectangle;
use crate::error::ExtractError;
use crate::naming;
use crate::scale::{ScaleFactors, ScaledRegion};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OriginalImage {
    pub width: u32,
    pub height: u32,
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedLetterRecord {
    pub id: Value,
    pub name: String,
    pub unicode: Value,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brush_filename: Option<String>,
    pub original_coordinates: Value,
    pub scaled_coordinates: ScaledRegion,
}

impl ExtractedLetterRecord {
    pub fn new(
        rect: &AnnotationRectangle,
        index: usize,
        filename: String,
        brush_filename: Option<String>,
        region: ScaledRegion,
    ) -> Self {
        Self {
            id: rect
                .id
                .clone()
                .unwrap_or_else(|| Value::String(naming::fallback_name(index))),
            name: rect
                .name
                .clone()
                .unwrap_or_else(|| naming::fallback_name(index)),
            unicode: rect
                .unicode
                .clone()
                .unwrap_or_else(|| Value::String(String::new())),
            filename,
            brush_filename,
            original_coordinates: rect.raw_coordinates.clone(),
            scaled_coordinates: region,
        }
    }
}

/// Everything about a batch except its letters.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestHeader {
    pub timestamp: String,
    pub project_type: String,
    pub alphabet_type: String,
    pub name_prefix: String,
    pub original_image: OriginalImage,
    pub canvas_info: Value,
    pub scale_factors: ScaleFactors,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Manifest {
    pub timestamp: String,
    pub project_type: String,
    pub alphabet_type: String,
    pub name_prefix: String,
    pub original_image: OriginalImage,
    pub canvas_info: Value,
    pub scale_factors: ScaleFactors,
    pub extracted_letters: Vec<ExtractedLetterRecord>,
}

impl Manifest {
    /// Two-space indented JSON with non-ASCII kept literal.
    pub fn to_json(&self) -> Result<String, ExtractError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Collects letter records in rectangle order and freezes them into a
/// [`Manifest`].
#[derive(Debug)]
pub struct ManifestBuilder {
    header: ManifestHeader,
    letters: Vec<ExtractedLetterRecord>,
}

impl ManifestBuilder {
    pub fn new(header: ManifestHeader) -> Self {
        Self {
            header,
            letters: Vec::new(),
        }
    }

    pub fn push(&mut self, record: ExtractedLetterRecord) {
        self.letters.push(record);
    }

    pub fn len(&self) -> usize {
        self.letters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.letters.is_empty()
    }

    pub fn finish(self) -> Manifest {
        let ManifestHeader {
            timestamp,
            project_type,
            alphabet_type,
            name_prefix,
            original_image,
            canvas_info,
            scale_factors,
        } = self.header;
        Manifest {
            timestamp,
            project_type,
            alphabet_type,
            name_prefix,
            original_image,
            canvas_info,
            scale_factors,
            extracted_letters: self.letters,
        }
    }
}

pub fn format_timestamp(at: OffsetDateTime) -> Result<String, ExtractError> {
    Ok(at.format(&Rfc3339)?)
}
