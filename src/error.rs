use thiserror::Error;

/// Everything that can go wrong while servicing a request.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// The track registered neither a sample source nor an initializer.
    #[error("You must define a buildSample() or buildTrack() function.")]
    MissingEntryPoint,

    /// The sample callback returned something other than a number or a pair.
    #[error("Invalid sample shape at frame {index}: expected a number or a [left, right] pair, got {found}")]
    InvalidSampleShape { index: usize, found: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Cooperative cancellation tripped after `generated` samples.
    #[error("Generation cancelled after {generated} samples")]
    Cancelled { generated: usize },

    /// The sample callback itself failed (e.g. a JS exception).
    #[error("Sample callback failed: {0}")]
    Callback(String),

    #[cfg(feature = "wav")]
    #[error("WAV encoding failed: {0}")]
    Wav(#[from] hound::Error),

    #[cfg(feature = "runtime")]
    #[error("Worker has shut down")]
    WorkerGone,
}

impl GeneratorError {
    /// Attach the frame index to a shape error raised without one.
    pub(crate) fn at_frame(self, frame: usize) -> Self {
        match self {
            GeneratorError::InvalidSampleShape { found, .. } => {
                GeneratorError::InvalidSampleShape { index: frame, found }
            }
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, GeneratorError>;
