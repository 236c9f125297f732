use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoachError>;

#[derive(Error, Debug)]
pub enum CoachError {
    #[error("Model error: {0}")]
    Model(String),

    #[error("Model loading error: {0}")]
    ModelLoadError(String),

    #[error("Processing error: {0}")]
    ProcessingError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TensorFlow Lite error: {0}")]
    TfLite(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failure inside a signal-level extraction step (decode, resample, RMS, pitch).
///
/// These never reach a caller of the pipeline: each analyzer collapses them to its
/// neutral default at the call boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Resampling failed: {0}")]
    Resample(String),

    #[error("Signal is empty")]
    EmptySignal,

    #[error("Signal contains no energy above the floor")]
    NoEnergy,

    #[error("Non-finite sample at index {0}")]
    NonFinite(usize),
}

impl From<hound::Error> for ExtractionError {
    fn from(err: hound::Error) -> Self {
        ExtractionError::Decode(err.to_string())
    }
}
