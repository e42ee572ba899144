//! Request handler
//!
//! Composes validation, download, inference and cleanup for one job and maps
//! every failure to the `{ "error": ... }` output at a single point.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::error::Result;
use crate::fetcher::AudioFetcher;
use crate::model::NoteTranscriber;
use crate::pipeline;
use crate::types::{InferenceRequest, JobOutput, NoteEvent};

/// Handles jobs against a pre-loaded transcriber.
///
/// Holds no per-request state; concurrent calls only share the transcriber.
#[derive(Clone)]
pub struct Worker {
    fetcher: AudioFetcher,
    model: Arc<dyn NoteTranscriber>,
}

impl Worker {
    pub fn new(fetcher: AudioFetcher, model: Arc<dyn NoteTranscriber>) -> Self {
        Self { fetcher, model }
    }

    /// Handle one job's `input` object. Never fails: errors come back as
    /// [`JobOutput::Error`].
    pub fn handle(&self, input: &Value) -> JobOutput {
        match self.process(input) {
            Ok(notes) => {
                info!(note_count = notes.len(), "Job complete");
                JobOutput::transcription(notes)
            }
            Err(e) => {
                warn!(error = %e, "Job failed");
                JobOutput::error(e.to_string())
            }
        }
    }

    fn process(&self, input: &Value) -> Result<Vec<NoteEvent>> {
        let request = InferenceRequest::from_input(input)?;

        let audio = self.fetcher.fetch(&request.audio_url)?;

        // `audio` is removed on drop should inference unwind past this point.
        let result = pipeline::run(self.model.as_ref(), audio.path(), &request.params);
        audio.release();

        Ok(result?)
    }
}
