use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Error taxonomy of the detection pipeline
// ---------------------------------------------------------------------------

/// Failure to bring the classifier up. Blocks detection until retried.
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("model file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to parse model graph: {0}")]
    Parse(String),

    #[error("failed to prepare model for inference: {0}")]
    Compile(String),

    /// The classifier's output width disagrees with the disease table.
    #[error("model outputs {actual} classes, expected {expected}")]
    OutputWidth { expected: usize, actual: usize },
}

/// The acquired bytes could not be turned into pixels.
#[derive(Debug, Error)]
pub enum ImageDecodeError {
    #[error("unsupported or corrupt image: {0}")]
    Image(#[from] image::ImageError),

    #[error("malformed data URL: {0}")]
    DataUrl(String),

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("image has no pixels")]
    Empty,
}

/// Failure of an acquisition path, distinct from a user cancelling it.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Decode(#[from] ImageDecodeError),

    #[error("could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("capture device failed: {0}")]
    Device(String),

    #[error("capture device is not configured")]
    Unavailable,
}

#[derive(Debug, Error, PartialEq)]
pub enum PreprocessError {
    #[error("cannot resize an empty image ({width}x{height})")]
    Empty { width: u32, height: u32 },
}

#[derive(Debug, Error, PartialEq)]
pub enum InferenceError {
    #[error("forward pass failed: {0}")]
    Forward(String),

    #[error("classifier returned no scores")]
    EmptyOutput,

    #[error("classifier returned a non-numeric score at index {0}")]
    NotANumber(usize),
}

/// Class index with no matching disease record.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("class index {index} is outside the disease table (0..{len})")]
pub struct IndexOutOfRange {
    pub index: usize,
    pub len: usize,
}

/// Anything that can go wrong between "detect" and a result.
#[derive(Debug, Error, PartialEq)]
pub enum DetectError {
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    IndexOutOfRange(#[from] IndexOutOfRange),
}

impl DetectError {
    /// Whether the user can recover by retrying or picking another image.
    /// An out-of-range class means the model and table disagree.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, DetectError::IndexOutOfRange(_))
    }
}
