use thiserror::Error;

/// Failures in shared batch setup. Any of these aborts the whole request.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("{0}")]
    MissingInput(String),

    #[error("{message}")]
    InvalidDescriptor {
        message: String,
        details: Option<String>,
    },

    #[error("failed to load image: {0}")]
    ImageDecode(#[source] image::ImageError),

    #[error("invalid canvas size {width}x{height}: canvas dimensions must be greater than zero")]
    InvalidScale { width: f64, height: f64 },

    #[error("failed to encode letter image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("failed to write archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("failed to serialize manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("failed to format timestamp: {0}")]
    Timestamp(#[from] time::error::Format),

    #[error("failed to write archive entry: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractError {
    pub fn missing(message: impl Into<String>) -> Self {
        Self::MissingInput(message.into())
    }

    pub fn invalid_descriptor(message: impl Into<String>, details: Option<String>) -> Self {
        Self::InvalidDescriptor {
            message: message.into(),
            details,
        }
    }

    /// Caller faults map to 4xx, everything else to 5xx.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingInput(_)
                | Self::InvalidDescriptor { .. }
                | Self::ImageDecode(_)
                | Self::InvalidScale { .. }
        )
    }

    pub fn details(&self) -> Option<&str> {
        match self {
            Self::InvalidDescriptor { details, .. } => details.as_deref(),
            _ => None,
        }
    }
}

/// Failure local to one rectangle. The pipeline logs it and moves on.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RectangleError {
    #[error("letter entry is not an object")]
    NotAnObject,

    #[error("field '{field}' must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
}
