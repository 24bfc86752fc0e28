//! Error type returned by the padding routine.

use image::ImageError;
use std::{io, path::PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PadError {
    #[error("failed to read source image {}", path.display())]
    SourceRead {
        path: PathBuf,
        #[source]
        source: ImageError,
    },

    #[error("source image has no pixels ({width}x{height})")]
    EmptySource { width: u32, height: u32 },

    #[error("padding ratio must be between 0 and 0.5 (exclusive), got {0}")]
    InvalidPaddingRatio(f64),

    #[error("invalid background color: {0}")]
    InvalidColor(String),

    #[error("padded canvas would be too large ({width}x{height}, limit {limit} bytes)")]
    CanvasTooLarge { width: f64, height: f64, limit: u64 },

    #[error("failed to encode {}", path.display())]
    DestinationEncode {
        path: PathBuf,
        #[source]
        source: ImageError,
    },

    #[error("failed to write {}", path.display())]
    DestinationWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PadError {
    /// True when the source file does not exist at all, as opposed to being
    /// unreadable or undecodable.
    pub fn is_missing(&self) -> bool {
        match self {
            PadError::SourceRead {
                source: ImageError::IoError(err),
                ..
            } => err.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// True for failures on the input side of the routine.
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            PadError::SourceRead { .. } | PadError::EmptySource { .. }
        )
    }

    /// True for failures while producing the output file.
    pub fn is_destination_error(&self) -> bool {
        matches!(
            self,
            PadError::DestinationEncode { .. } | PadError::DestinationWrite { .. }
        )
    }
}
