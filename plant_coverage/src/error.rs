// THEORY:
// Every stage of the coverage pipeline reports failure through this one enum so
// a batch driver can match on the failure kind, log it next to the offending
// filename and keep going with the next image. The three core kinds map to the
// three ways an image can be unusable: it never decoded, no frame ring was found
// in it, or the frame left no measurable area inside. The remaining variants
// only come from the drivers that touch the filesystem.

use std::path::PathBuf;

/// Failure of a coverage pipeline stage or of one of the drivers around it.
#[derive(Debug, thiserror::Error)]
pub enum CoverageError {
    /// The input could not be turned into a usable raster.
    #[error("invalid image {source_hint}: {reason}")]
    InvalidImage { source_hint: String, reason: String },

    /// The frame mask holds no ring pixels, so no corners can be located.
    #[error("no sampling frame pixels detected")]
    DegenerateFrame,

    /// The measurement area inside the frame holds zero pixels.
    #[error("measurement area inside the frame is empty")]
    DegenerateArea,

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// A worker died before it could report on its image.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoverageError {
    pub(crate) fn invalid_image(source_hint: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidImage {
            source_hint: source_hint.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable identifier of the failure kind, used in batch failure records.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidImage { .. } => "invalid_image",
            Self::DegenerateFrame => "degenerate_frame",
            Self::DegenerateArea => "degenerate_area",
            Self::Io { .. } => "io",
            Self::Serialization(_) => "serialization",
            Self::Config(_) => "config",
            Self::Encode { .. } => "encode",
            Self::Internal(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, CoverageError>;
