use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{DEFAULT_FRAME_THRESHOLD, DEFAULT_MINIMUM_NOTE_LENGTH_MS, DEFAULT_ONSET_THRESHOLD};
use crate::error::{InferenceError, Result, WorkerError};

/// Detection parameters handed to the inference capability.
///
/// Frequency bounds stay `None` unless the job supplied them; a missing bound
/// means "unconstrained", which is not the same as a bound of zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionParams {
    #[serde(default = "default_onset_threshold")]
    pub onset_threshold: f32,
    #[serde(default = "default_frame_threshold")]
    pub frame_threshold: f32,
    #[serde(rename = "minimum_note_length", default = "default_minimum_note_length_ms")]
    pub minimum_note_length_ms: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_frequency: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_frequency: Option<f32>,
}

fn default_onset_threshold() -> f32 {
    DEFAULT_ONSET_THRESHOLD
}

fn default_frame_threshold() -> f32 {
    DEFAULT_FRAME_THRESHOLD
}

fn default_minimum_note_length_ms() -> u32 {
    DEFAULT_MINIMUM_NOTE_LENGTH_MS
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            onset_threshold: DEFAULT_ONSET_THRESHOLD,
            frame_threshold: DEFAULT_FRAME_THRESHOLD,
            minimum_note_length_ms: DEFAULT_MINIMUM_NOTE_LENGTH_MS,
            minimum_frequency: None,
            maximum_frequency: None,
        }
    }
}

/// A validated job input.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    pub audio_url: String,
    pub params: DetectionParams,
}

impl InferenceRequest {
    /// Extract the request from a job's `input` object.
    ///
    /// A missing, empty or whitespace-only `audio_url` is a validation error.
    /// Parameters are not range-checked here; a parameter of the wrong JSON
    /// type is a marshaling failure and reported as an inference error.
    pub fn from_input(input: &Value) -> Result<Self> {
        let audio_url = input
            .get("audio_url")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or(WorkerError::MissingAudioUrl)?;

        let params = DetectionParams::deserialize(input).map_err(InferenceError::from)?;

        Ok(Self {
            audio_url: audio_url.to_string(),
            params,
        })
    }
}

/// One note as reported by the inference capability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawNoteEvent {
    pub start_time: f32,
    pub end_time: f32,
    pub pitch: u8,
    pub velocity: u8,
}

/// One note as reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteEvent {
    pub pitch: u8,
    pub start_time: f32,
    pub duration: f32,
    pub velocity: u8,
}

impl From<RawNoteEvent> for NoteEvent {
    fn from(raw: RawNoteEvent) -> Self {
        Self {
            pitch: raw.pitch,
            start_time: raw.start_time,
            duration: raw.end_time - raw.start_time,
            velocity: raw.velocity,
        }
    }
}

/// The value returned for a job: either the notes or an error message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobOutput {
    Transcription { notes: Vec<NoteEvent>, note_count: usize },
    Error { error: String },
}

impl JobOutput {
    pub fn transcription(notes: Vec<NoteEvent>) -> Self {
        let note_count = notes.len();
        JobOutput::Transcription { notes, note_count }
    }

    pub fn error(message: impl Into<String>) -> Self {
        JobOutput::Error { error: message.into() }
    }

    pub fn notes(&self) -> Option<&[NoteEvent]> {
        match self {
            JobOutput::Transcription { notes, .. } => Some(notes),
            JobOutput::Error { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            JobOutput::Transcription { .. } => None,
            JobOutput::Error { error } => Some(error),
        }
    }
}

/// Job envelope as delivered by the serverless platform.
#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub input: Value,
}

/// Envelope written back for each job.
#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub output: JobOutput,
}
