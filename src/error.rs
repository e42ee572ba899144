//! Error types for the worker.
//!
//! Each stage of a job produces its own error kind; [`WorkerError`] is the
//! closed set that [`crate::handler::Worker::handle`] turns into the
//! `{ "error": ... }` output shape.

use thiserror::Error;

/// Failures raised by the Basic Pitch model itself.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("ONNX Runtime error: {0}")]
    Ort(#[from] ort::Error),

    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Model output missing: {0}")]
    MissingOutput(String),
}

/// Failures while retrieving the remote audio.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("{0}")]
    Request(#[from] reqwest::Error),

    #[error("failed to read response body: {0}")]
    Body(std::io::Error),

    #[error("could not write audio to temporary storage: {0}")]
    Io(#[from] std::io::Error),

    #[error("download did not complete within {}s", .0.as_secs())]
    TimedOut(std::time::Duration),
}

/// Failures while marshaling parameters or running the inference capability.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("invalid detection parameters: {0}")]
    Parameters(#[from] serde_json::Error),

    #[error("{0}")]
    Model(#[from] ModelError),

    #[error("inference panicked: {0}")]
    Panicked(String),
}

/// Everything a job can fail with, as reported back to the platform.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("audio_url is required")]
    MissingAudioUrl,

    #[error("Failed to download audio: {0}")]
    Download(#[from] DownloadError),

    #[error("Inference failed: {0}")]
    Inference(#[from] InferenceError),
}

pub type Result<T> = std::result::Result<T, WorkerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_stage_prefix() {
        assert_eq!(WorkerError::MissingAudioUrl.to_string(), "audio_url is required");

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err = WorkerError::from(DownloadError::from(io));
        assert_eq!(
            err.to_string(),
            "Failed to download audio: could not write audio to temporary storage: disk full"
        );

        let err = WorkerError::from(DownloadError::TimedOut(std::time::Duration::from_secs(300)));
        assert_eq!(err.to_string(), "Failed to download audio: download did not complete within 300s");

        let err = WorkerError::from(InferenceError::from(ModelError::InvalidParameter(
            "onset_threshold must be within [0, 1], got 1.1".into(),
        )));
        assert_eq!(
            err.to_string(),
            "Inference failed: Invalid parameter: onset_threshold must be within [0, 1], got 1.1"
        );
    }
}
