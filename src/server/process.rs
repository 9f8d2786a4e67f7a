use axum::Json;
use axum::extract::Multipart;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::batch::BatchDescriptor;
use crate::error::ExtractError;
use crate::pipeline::{self, ExtractOptions, ExtractionOutput};

use super::models::ErrorResponse;

const IMAGE_FIELD: &str = "image";
const REGIONS_FIELD: &str = "regions";
const LETTERS_FIELD: &str = "letters";

#[derive(Debug)]
pub(crate) struct ServerError {
    pub(crate) status: StatusCode,
    pub(crate) message: String,
    pub(crate) details: Option<String>,
}

impl ServerError {
    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            details: None,
        }
    }

    /// The cause is logged; the caller only sees a generic message.
    pub(crate) fn internal(cause: impl std::fmt::Display) -> Self {
        tracing::error!(error = %cause, "request failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "internal server error".to_string(),
            details: None,
        }
    }
}

impl From<ExtractError> for ServerError {
    fn from(err: ExtractError) -> Self {
        if !err.is_client_error() {
            return ServerError::internal(&err);
        }
        ServerError {
            status: StatusCode::BAD_REQUEST,
            message: err.to_string(),
            details: err.details().map(str::to_string),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

#[derive(Debug)]
pub(crate) struct UploadedImage {
    pub(crate) filename: Option<String>,
    pub(crate) bytes: Vec<u8>,
}

/// The multipart fields the processing endpoint reads.
#[derive(Debug, Default)]
pub(crate) struct ProcessUpload {
    pub(crate) image: Option<UploadedImage>,
    pub(crate) regions: Option<String>,
}

pub(crate) async fn read_upload(multipart: &mut Multipart) -> Result<ProcessUpload, ServerError> {
    let mut upload = ProcessUpload::default();
    let mut letters_alias = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            IMAGE_FIELD => {
                let filename = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                upload.image = Some(UploadedImage {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
            REGIONS_FIELD => {
                upload.regions = Some(field.text().await.map_err(multipart_error)?);
            }
            LETTERS_FIELD => {
                letters_alias = Some(field.text().await.map_err(multipart_error)?);
            }
            _ => {
                tracing::debug!(field = %name, "ignoring unknown multipart field");
            }
        }
    }
    if upload.regions.is_none() {
        upload.regions = letters_alias;
    }
    Ok(upload)
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ServerError {
    ServerError {
        status: err.status(),
        message: format!("invalid multipart body: {}", err.body_text()),
        details: None,
    }
}

/// Validates the upload and runs the pipeline. Every input check happens
/// before the image is decoded.
pub(crate) fn process_upload(
    options: &ExtractOptions,
    upload: ProcessUpload,
) -> Result<ExtractionOutput, ServerError> {
    let Some(image) = upload.image else {
        return Err(ServerError::bad_request("no image was sent"));
    };
    let filename = image
        .filename
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| ServerError::bad_request("no image was selected"))?;
    let Some(regions) = upload.regions else {
        return Err(ServerError::bad_request("no letter data was sent"));
    };

    let batch = BatchDescriptor::from_json(&regions)?;
    let output = pipeline::extract_letters(&image.bytes, Some(&filename), &batch, options)?;
    Ok(output)
}

/// `attachment` disposition with an ASCII fallback name and an RFC 5987
/// encoded name for anything non-ASCII.
pub(crate) fn content_disposition(filename: &str) -> String {
    let fallback = filename
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>();
    if fallback == filename {
        return format!("attachment; filename=\"{}\"", filename);
    }
    let mut encoded = String::new();
    for byte in filename.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'-' | b'_' | b'~') {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    )
}
