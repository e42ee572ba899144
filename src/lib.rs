//! Serverless worker that turns an audio URL into Basic Pitch note events.
//!
//! A job's `input` goes through [`handler::Worker::handle`]: the audio is
//! streamed to a transient file by [`fetcher`], transcribed by a
//! [`model::NoteTranscriber`] through [`pipeline`], and the file is removed
//! before the output is returned.

pub mod constants;
pub mod error;
pub mod fetcher;
pub mod handler;
pub mod model;
pub mod pipeline;
pub mod types;
pub mod preprocessing {
    pub mod load_audio;
    pub mod windowed_audio;
}
pub mod postprocessing {
    pub mod helpers {
        pub mod ported {
            pub mod librosa;
            pub mod numpy;
        }
        pub mod activations;
    }
    pub mod note_event_frames;
    pub mod note_event_times;
    pub mod midi;
}

pub use error::{DownloadError, InferenceError, ModelError, WorkerError};
pub use fetcher::{AudioFetcher, TransientAudioFile};
pub use handler::Worker;
pub use model::{BasicPitch, ModelConfig, NoteTranscriber};
pub use types::{DetectionParams, InferenceRequest, Job, JobOutput, JobResult, NoteEvent, RawNoteEvent};
