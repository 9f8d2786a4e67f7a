use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::pipeline::ExtractOptions;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");
const BYTES_PER_MB: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub server_addr: String,
    pub max_upload_mb: usize,
    pub extraction: ExtractOptions,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_addr: "0.0.0.0:5004".to_string(),
            max_upload_mb: 50,
            extraction: ExtractOptions::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    server: Option<ServerSettings>,
    extraction: Option<ExtractionSettings>,
    brush: Option<BrushSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSettings {
    addr: Option<String>,
    max_upload_mb: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ExtractionSettings {
    project_type: Option<String>,
    alphabet_type: Option<String>,
    default_image_name: Option<String>,
    optimize_for_brushes: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct BrushSettings {
    max_size: Option<u32>,
    threshold: Option<u8>,
    padding_ratio: Option<f32>,
}

/// Embedded defaults, then `settings.toml` and `settings.local.toml` in the
/// working directory, then the home settings file, then `extra_path`.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    let defaults: SettingsFile =
        toml::from_str(DEFAULT_SETTINGS_TOML).with_context(|| "failed to parse default settings")?;
    settings.merge(defaults);

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }

    Ok(settings)
}

impl Settings {
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(BYTES_PER_MB)
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(server) = incoming.server {
            if let Some(addr) = server.addr {
                if !addr.trim().is_empty() {
                    self.server_addr = addr;
                }
            }
            if let Some(limit) = server.max_upload_mb {
                if limit > 0 {
                    self.max_upload_mb = limit;
                }
            }
        }
        if let Some(extraction) = incoming.extraction {
            let options = &mut self.extraction;
            if let Some(value) = extraction.project_type {
                if !value.trim().is_empty() {
                    options.project_type = value;
                }
            }
            if let Some(value) = extraction.alphabet_type {
                if !value.trim().is_empty() {
                    options.alphabet_type = value;
                }
            }
            if let Some(value) = extraction.default_image_name {
                if !value.trim().is_empty() {
                    options.default_image_name = value;
                }
            }
            if let Some(value) = extraction.optimize_for_brushes {
                options.optimize_for_brushes = value;
            }
        }
        if let Some(brush) = incoming.brush {
            let optimizer = &mut self.extraction.brush;
            if let Some(size) = brush.max_size {
                if size > 0 {
                    optimizer.max_size = size;
                }
            }
            if let Some(threshold) = brush.threshold {
                optimizer.threshold = threshold;
            }
            if let Some(ratio) = brush.padding_ratio {
                if ratio.is_finite() && ratio >= 0.0 {
                    optimizer.padding_ratio = ratio;
                }
            }
        }
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".alphabet-extractor-rust"))
        }
    })
}
