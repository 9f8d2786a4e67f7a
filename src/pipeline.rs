//! One linear pass over a batch: scale, crop, name, record, archive.

use image::{DynamicImage, GenericImageView};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::archive::ArchiveAssembler;
use crate::batch::{AnnotationRectangle, BatchDescriptor};
use crate::brush::BrushOptimizer;
use crate::error::{ExtractError, RectangleError};
use crate::manifest::{
    ExtractedLetterRecord, Manifest, ManifestBuilder, ManifestHeader, OriginalImage,
    format_timestamp,
};
use crate::naming::{self, BatchNames};
use crate::region;
use crate::scale::{self, ScaleFactors, ScaledRegion};

/// Host-provided defaults for fields a descriptor may leave out.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractOptions {
    pub project_type: String,
    pub alphabet_type: String,
    pub default_image_name: String,
    pub optimize_for_brushes: bool,
    pub brush: BrushOptimizer,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            project_type: "letter_extraction".to_string(),
            alphabet_type: "custom".to_string(),
            default_image_name: "image".to_string(),
            optimize_for_brushes: false,
            brush: BrushOptimizer::default(),
        }
    }
}

#[derive(Debug)]
pub struct ExtractionOutput {
    pub archive: Vec<u8>,
    pub archive_name: String,
    pub manifest_name: String,
    pub manifest: Manifest,
    pub skipped: Vec<SkippedLetter>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedLetter {
    /// Zero-based position in the descriptor.
    pub index: usize,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SkipReason {
    #[error("region has no area after scaling and clamping")]
    Degenerate,
    #[error(transparent)]
    Invalid(#[from] RectangleError),
    #[error("failed to encode png: {0}")]
    Encode(String),
}

struct ExtractedLetter {
    record: ExtractedLetterRecord,
    png: Vec<u8>,
    brush_png: Option<Vec<u8>>,
}

/// Decodes the upload and runs the batch against it.
pub fn extract_letters(
    image_bytes: &[u8],
    image_filename: Option<&str>,
    batch: &BatchDescriptor,
    options: &ExtractOptions,
) -> Result<ExtractionOutput, ExtractError> {
    batch.ensure_not_empty()?;
    let image = region::decode_image(image_bytes)?;
    extract_from_image(
        &image,
        image_filename,
        batch,
        options,
        OffsetDateTime::now_utc(),
    )
}

pub fn extract_from_image(
    image: &DynamicImage,
    image_filename: Option<&str>,
    batch: &BatchDescriptor,
    options: &ExtractOptions,
    at: OffsetDateTime,
) -> Result<ExtractionOutput, ExtractError> {
    batch.ensure_not_empty()?;
    let (width, height) = image.dimensions();
    let scale = ScaleFactors::for_canvas(width, height, &batch.image_info)?;

    let project_type = batch
        .project_type
        .clone()
        .unwrap_or_else(|| options.project_type.clone());
    let alphabet_type = batch
        .alphabet_type
        .clone()
        .unwrap_or_else(|| options.alphabet_type.clone());
    let name_prefix = batch.name_prefix.clone().unwrap_or_default();
    let brush = batch
        .optimize_for_brushes
        .unwrap_or(options.optimize_for_brushes)
        .then_some(&options.brush);

    let names = BatchNames::new(
        &name_prefix,
        &naming::image_base_name(image_filename, &options.default_image_name),
        &alphabet_type,
    );

    let mut builder = ManifestBuilder::new(ManifestHeader {
        timestamp: format_timestamp(at)?,
        project_type,
        alphabet_type,
        name_prefix,
        original_image: OriginalImage {
            width,
            height,
            filename: image_filename.map(str::to_string),
        },
        canvas_info: batch.raw_image_info.clone(),
        scale_factors: scale,
    });
    let mut assembler = ArchiveAssembler::new();
    let mut skipped = Vec::new();

    for (index, entry) in batch.letters.iter().enumerate() {
        let outcome = AnnotationRectangle::from_value(entry)
            .map_err(SkipReason::from)
            .and_then(|rect| extract_one(image, &rect, index, scale, brush));
        match outcome {
            Ok(letter) => {
                if assembler.add(letter.record.filename.clone(), letter.png) {
                    warn!(
                        letter = index + 1,
                        filename = %letter.record.filename,
                        "letter filename already used, replacing earlier entry"
                    );
                }
                if let (Some(path), Some(bytes)) =
                    (letter.record.brush_filename.clone(), letter.brush_png)
                {
                    assembler.add(path, bytes);
                }
                debug!(letter = index + 1, filename = %letter.record.filename, "extracted");
                builder.push(letter.record);
            }
            Err(reason) => {
                warn!(letter = index + 1, %reason, "skipping letter");
                skipped.push(SkippedLetter { index, reason });
            }
        }
    }

    let extracted = builder.len();
    let manifest = builder.finish();
    let manifest_name = names.manifest();
    let archive = assembler.assemble(&manifest_name, &manifest)?;
    info!(
        extracted,
        skipped = skipped.len(),
        archive = %names.archive(),
        "letter extraction finished"
    );

    Ok(ExtractionOutput {
        archive,
        archive_name: names.archive(),
        manifest_name,
        manifest,
        skipped,
    })
}

fn extract_one(
    image: &DynamicImage,
    rect: &AnnotationRectangle,
    index: usize,
    scale: ScaleFactors,
    brush: Option<&BrushOptimizer>,
) -> Result<ExtractedLetter, SkipReason> {
    let (width, height) = image.dimensions();
    let scaled: ScaledRegion =
        scale::map_rectangle(&rect.rect, scale, width, height).ok_or(SkipReason::Degenerate)?;

    let letter = region::crop(image, &scaled);
    let png = region::encode_png(&letter).map_err(|err| SkipReason::Encode(err.to_string()))?;

    let raw_name = rect
        .name
        .clone()
        .unwrap_or_else(|| naming::fallback_name(index));
    let filename = naming::letter_filename(&raw_name, index);

    let (brush_filename, brush_png) = match brush {
        Some(optimizer) => {
            let optimized = optimizer.apply(&letter);
            let bytes = region::encode_png(&optimized)
                .map_err(|err| SkipReason::Encode(err.to_string()))?;
            let stem = naming::letter_stem(&raw_name, index);
            (Some(naming::brush_filename(&stem)), Some(bytes))
        }
        None => (None, None),
    };

    Ok(ExtractedLetter {
        record: ExtractedLetterRecord::new(rect, index, filename, brush_filename, scaled),
        png,
        brush_png,
    })
}
