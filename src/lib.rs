use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub mod archive;
pub mod batch;
pub mod brush;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod naming;
pub mod pipeline;
pub mod region;
pub mod scale;
pub mod server;
pub mod settings;

pub use batch::{AnnotationRectangle, BatchDescriptor, ImageInfo};
pub use error::{ExtractError, RectangleError};
pub use manifest::{ExtractedLetterRecord, Manifest};
pub use pipeline::{ExtractOptions, ExtractionOutput, extract_letters};
pub use scale::{ScaleFactors, ScaledRegion};

/// Local extraction from files, the offline twin of `POST /process`.
#[derive(Debug, Clone)]
pub struct Config {
    pub image: PathBuf,
    pub regions: PathBuf,
    pub out: Option<PathBuf>,
}

pub fn run(config: &Config, settings: &settings::Settings) -> Result<PathBuf> {
    let image_bytes = fs::read(&config.image)
        .with_context(|| format!("failed to read image: {}", config.image.display()))?;
    let regions = fs::read_to_string(&config.regions)
        .with_context(|| format!("failed to read regions: {}", config.regions.display()))?;

    let batch = BatchDescriptor::from_json(&regions)?;
    let filename = config
        .image
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string);
    let output = extract_letters(
        &image_bytes,
        filename.as_deref(),
        &batch,
        &settings.extraction,
    )?;

    let out_path = resolve_out_path(config.out.as_deref(), &output.archive_name);
    fs::write(&out_path, &output.archive)
        .with_context(|| format!("failed to write archive: {}", out_path.display()))?;
    Ok(out_path)
}

fn resolve_out_path(out: Option<&Path>, archive_name: &str) -> PathBuf {
    match out {
        Some(path) if path.is_dir() => path.join(archive_name),
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(archive_name),
    }
}
