//! Basic Pitch inference capability
//!
//! [`NoteTranscriber`] is the seam the request pipeline calls through;
//! [`BasicPitch`] implements it with the ICASSP 2022 ONNX model. The session is
//! built once and shared by reference, `ort` sessions run on `&self`.

use std::path::Path;

use ndarray::{concatenate, s, Array2, ArrayView2, Axis, Ix2};
use ort::{GraphOptimizationLevel, Session, Tensor};
use tracing::{debug, info};

use crate::constants::{
    ANNOTATIONS_FPS, AUDIO_N_SAMPLES, AUDIO_SAMPLE_RATE, DEFAULT_INTRA_THREADS, FFT_HOP, N_OVERLAPPING_FRAMES,
    OUTPUT_FRAMES, OUTPUT_ONSETS,
};
use crate::error::ModelError;
use crate::postprocessing::{
    note_event_frames::{output_to_notes_poly, NoteDecoding},
    note_event_times::note_frames_to_time,
};
use crate::preprocessing::load_audio::get_audio_input;
use crate::types::{DetectionParams, RawNoteEvent};

/// Audio-to-notes inference, loaded once and shared across requests.
pub trait NoteTranscriber: Send + Sync {
    /// Detect notes in the audio file at `audio_path`.
    ///
    /// Events come back in the order the model produces them.
    fn predict(&self, audio_path: &Path, params: &DetectionParams) -> Result<Vec<RawNoteEvent>, ModelError>;
}

/// Reject parameters the model cannot work with.
///
/// Thresholds must lie in `[0, 1]`; frequency bounds, when given, must be
/// positive. Nothing is clamped.
pub fn validate_params(params: &DetectionParams) -> Result<(), ModelError> {
    for (name, value) in [
        ("onset_threshold", params.onset_threshold),
        ("frame_threshold", params.frame_threshold),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(ModelError::InvalidParameter(format!(
                "{} must be within [0, 1], got {}",
                name, value
            )));
        }
    }

    for (name, value) in [
        ("minimum_frequency", params.minimum_frequency),
        ("maximum_frequency", params.maximum_frequency),
    ] {
        if let Some(hz) = value {
            if !hz.is_finite() || hz <= 0.0 {
                return Err(ModelError::InvalidParameter(format!(
                    "{} must be a positive frequency in Hz, got {}",
                    name, hz
                )));
            }
        }
    }

    Ok(())
}

/// Minimum note length in model frames, rounded.
pub fn min_note_len_frames(minimum_note_length_ms: u32) -> usize {
    (minimum_note_length_ms as f32 / 1000.0 * (AUDIO_SAMPLE_RATE as f32 / FFT_HOP as f32)).round() as usize
}

/// Stitch per-window outputs back into one activation matrix.
///
/// Half the overlap is trimmed from both ends of every window, and the result
/// is cut to the number of frames the original audio spans.
fn unwrap_output(
    windows: &[Array2<f32>],
    audio_original_length: usize,
    n_overlapping_frames: usize,
) -> Result<Array2<f32>, ModelError> {
    let n_olap = n_overlapping_frames / 2;

    let trimmed = windows
        .iter()
        .map(|window| {
            let n_rows = window.nrows();
            if n_rows <= 2 * n_olap {
                return Err(ModelError::MissingOutput(format!(
                    "window output has {} frames, expected more than {}",
                    n_rows,
                    2 * n_olap
                )));
            }
            Ok(window.slice(s![n_olap..n_rows - n_olap, ..]))
        })
        .collect::<Result<Vec<ArrayView2<f32>>, _>>()?;

    let unwrapped = concatenate(Axis(0), &trimmed)?;

    let n_output_frames_original = (audio_original_length * ANNOTATIONS_FPS / AUDIO_SAMPLE_RATE).min(unwrapped.nrows());

    Ok(unwrapped.slice(s![..n_output_frames_original, ..]).to_owned())
}

fn to_rows(array: &Array2<f32>) -> Vec<Vec<f32>> {
    array.outer_iter().map(|row| row.to_vec()).collect()
}

/// Model execution settings.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Number of intra-op threads for ORT.
    pub intra_threads: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            intra_threads: DEFAULT_INTRA_THREADS,
        }
    }
}

/// Note and onset activations for a whole file, (n_frames, 88) each.
struct Activations {
    frames: Array2<f32>,
    onsets: Array2<f32>,
}

/// The Basic Pitch model behind an ONNX Runtime session.
pub struct BasicPitch {
    session: Session,
}

impl BasicPitch {
    pub fn load<P: AsRef<Path>>(model_path: P, config: &ModelConfig) -> Result<Self, ModelError> {
        let model_path = model_path.as_ref();
        info!(path = %model_path.display(), intra_threads = config.intra_threads, "Loading Basic Pitch model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(config.intra_threads)?
            .commit_from_file(model_path)?;

        info!("Basic Pitch model loaded");
        Ok(Self { session })
    }

    fn run_model(&self, audio_path: &Path) -> Result<Activations, ModelError> {
        let overlap_len = N_OVERLAPPING_FRAMES * FFT_HOP;
        let hop_size = AUDIO_N_SAMPLES - overlap_len;

        let (audio_windows, original_length) = get_audio_input(audio_path, overlap_len, hop_size)?;
        debug!(windows = audio_windows.len(), samples = original_length, "Running model");

        let mut frames = Vec::with_capacity(audio_windows.len());
        let mut onsets = Vec::with_capacity(audio_windows.len());

        for window in audio_windows {
            // (batch, samples, channel)
            let input_shape: Vec<i64> = vec![1, window.len() as i64, 1];
            let input_tensor = Tensor::from_array((input_shape, window.into_raw_vec()))?;
            let outputs = self.session.run(ort::inputs![input_tensor]?)?;

            for (&name, value) in outputs.iter() {
                let target = match name {
                    OUTPUT_FRAMES => &mut frames,
                    OUTPUT_ONSETS => &mut onsets,
                    _ => continue,
                };
                let activation = value
                    .try_extract_tensor::<f32>()?
                    .index_axis(Axis(0), 0)
                    .into_dimensionality::<Ix2>()?
                    .to_owned();
                target.push(activation);
            }
        }

        if frames.is_empty() || frames.len() != onsets.len() {
            return Err(ModelError::MissingOutput(format!(
                "expected {} and {} for every window",
                OUTPUT_FRAMES, OUTPUT_ONSETS
            )));
        }

        Ok(Activations {
            frames: unwrap_output(&frames, original_length, N_OVERLAPPING_FRAMES)?,
            onsets: unwrap_output(&onsets, original_length, N_OVERLAPPING_FRAMES)?,
        })
    }
}

impl NoteTranscriber for BasicPitch {
    fn predict(&self, audio_path: &Path, params: &DetectionParams) -> Result<Vec<RawNoteEvent>, ModelError> {
        validate_params(params)?;

        let activations = self.run_model(audio_path)?;

        let settings = NoteDecoding {
            max_freq: params.maximum_frequency,
            min_freq: params.minimum_frequency,
            ..NoteDecoding::new(
                params.onset_threshold,
                params.frame_threshold,
                min_note_len_frames(params.minimum_note_length_ms),
            )
        };
        let note_frames = output_to_notes_poly(to_rows(&activations.frames), to_rows(&activations.onsets), &settings);
        debug!(notes = note_frames.len(), "Notes decoded");

        Ok(note_frames_to_time(&note_frames))
    }
}
