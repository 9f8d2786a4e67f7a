//! Input types for one extraction batch.
//!
//! The descriptor arrives as loosely shaped JSON from the annotation front end.
//! It is validated here once: the top-level shape strictly, each letter entry
//! lazily so that one malformed entry only skips itself.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{ExtractError, RectangleError};

const DEFAULT_X: f64 = 0.0;
const DEFAULT_Y: f64 = 0.0;
const DEFAULT_WIDTH: f64 = 100.0;
const DEFAULT_HEIGHT: f64 = 100.0;

/// Size of the canvas the user annotated on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct ImageInfo {
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawBatchDescriptor {
    image_info: Option<Value>,
    letters: Option<Vec<Value>>,
    regions: Option<Vec<Value>>,
    project_type: Option<String>,
    alphabet_type: Option<String>,
    name_prefix: Option<String>,
    optimize_for_brushes: Option<bool>,
}

/// A parsed batch. `letters` is already resolved from either the `letters`
/// key or the legacy `regions` key.
#[derive(Debug, Clone, Default)]
pub struct BatchDescriptor {
    pub image_info: ImageInfo,
    /// The caller's `imageInfo` object, echoed into the manifest.
    pub raw_image_info: Value,
    pub letters: Vec<Value>,
    pub project_type: Option<String>,
    pub alphabet_type: Option<String>,
    pub name_prefix: Option<String>,
    pub optimize_for_brushes: Option<bool>,
}

impl BatchDescriptor {
    pub fn from_json(text: &str) -> Result<Self, ExtractError> {
        let raw: RawBatchDescriptor = serde_json::from_str(text).map_err(|err| {
            ExtractError::invalid_descriptor("invalid letter data", Some(err.to_string()))
        })?;
        let descriptor = Self::from_raw(raw)?;
        descriptor.ensure_not_empty()?;
        Ok(descriptor)
    }

    fn from_raw(raw: RawBatchDescriptor) -> Result<Self, ExtractError> {
        let raw_image_info = match raw.image_info {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(value) => value,
        };
        let image_info = ImageInfo::deserialize(&raw_image_info).map_err(|err| {
            ExtractError::invalid_descriptor("invalid letter data", Some(err.to_string()))
        })?;
        Ok(Self {
            image_info,
            raw_image_info,
            letters: raw.letters.or(raw.regions).unwrap_or_default(),
            project_type: raw.project_type,
            alphabet_type: raw.alphabet_type,
            name_prefix: raw.name_prefix,
            optimize_for_brushes: raw.optimize_for_brushes,
        })
    }

    pub fn ensure_not_empty(&self) -> Result<(), ExtractError> {
        if self.letters.is_empty() {
            return Err(ExtractError::missing(
                "no letters were specified for extraction",
            ));
        }
        Ok(())
    }
}

/// Coordinates in canvas space, with missing fields already defaulted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// One letter to extract. `id` and `unicode` are opaque to extraction and
/// kept as whatever JSON the caller sent.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationRectangle {
    pub id: Option<Value>,
    pub name: Option<String>,
    pub unicode: Option<Value>,
    pub rect: CanvasRect,
    /// The caller's coordinate object, echoed into the manifest.
    pub raw_coordinates: Value,
}

impl AnnotationRectangle {
    pub fn from_value(value: &Value) -> Result<Self, RectangleError> {
        let entry = value.as_object().ok_or(RectangleError::NotAnObject)?;
        let raw_coordinates = match entry.get("coordinates") {
            None => Value::Object(Map::new()),
            Some(value @ Value::Object(_)) => value.clone(),
            Some(_) => {
                return Err(RectangleError::InvalidField {
                    field: "coordinates",
                    expected: "an object",
                });
            }
        };
        let coords = raw_coordinates.as_object().ok_or(RectangleError::InvalidField {
            field: "coordinates",
            expected: "an object",
        })?;

        Ok(Self {
            id: optional_value(entry, "id"),
            name: optional_string(entry, "name")?,
            unicode: optional_value(entry, "unicode"),
            rect: CanvasRect {
                x: optional_number(coords, "x")?.unwrap_or(DEFAULT_X),
                y: optional_number(coords, "y")?.unwrap_or(DEFAULT_Y),
                width: optional_number(coords, "width")?.unwrap_or(DEFAULT_WIDTH),
                height: optional_number(coords, "height")?.unwrap_or(DEFAULT_HEIGHT),
            },
            raw_coordinates,
        })
    }
}

fn optional_value(map: &Map<String, Value>, field: &str) -> Option<Value> {
    map.get(field).filter(|value| !value.is_null()).cloned()
}

fn optional_string(
    map: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, RectangleError> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(RectangleError::InvalidField {
            field,
            expected: "a string",
        }),
    }
}

fn optional_number(
    map: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<f64>, RectangleError> {
    match map.get(field) {
        None => Ok(None),
        Some(value) => value.as_f64().map(Some).ok_or(RectangleError::InvalidField {
            field,
            expected: "a number",
        }),
    }
}
