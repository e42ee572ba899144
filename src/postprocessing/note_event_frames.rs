use crate::constants::{ENERGY_TOLERANCE, INFERRED_ONSET_DIFFS, MIDI_OFFSET, ONSET_PEAK_ORDER};

use super::helpers::{
    activations::{constrain_frequency, get_inferred_onsets},
    ported::numpy::{arg_max_2d, arg_rel_max, global_max, where_at_least},
};

#[derive(Debug, Clone, PartialEq)]
pub struct NoteEventFrame {
    pub start_frame: usize,
    pub end_frame: usize,
    pub pitch_midi: usize,
    pub amplitude: f32,
}

/// Settings for [`output_to_notes_poly`].
#[derive(Debug, Clone, PartialEq)]
pub struct NoteDecoding {
    /// Minimum amplitude of an onset activation to be considered an onset.
    pub onset_thresh: f32,
    /// Minimum amplitude of a frame activation for a note to remain "on".
    pub frame_thresh: f32,
    /// Minimum allowed note length in frames.
    pub min_note_len: usize,
    /// Add onsets where frame amplitudes rise sharply.
    pub infer_onsets: bool,
    pub max_freq: Option<f32>,
    pub min_freq: Option<f32>,
    /// Recover notes from energy left over after onset tracking.
    pub melodia_trick: bool,
    /// Number of frames allowed to drop below the frame threshold.
    pub energy_tolerance: usize,
}

impl NoteDecoding {
    pub fn new(onset_thresh: f32, frame_thresh: f32, min_note_len: usize) -> Self {
        Self {
            onset_thresh,
            frame_thresh,
            min_note_len,
            infer_onsets: true,
            max_freq: None,
            min_freq: None,
            melodia_trick: true,
            energy_tolerance: ENERGY_TOLERANCE,
        }
    }
}

fn clear_energy(energy: &mut [Vec<f32>], frame: usize, freq_idx: usize) {
    let row = &mut energy[frame];
    row[freq_idx] = 0.0;
    if let Some(above) = row.get_mut(freq_idx + 1) {
        *above = 0.0;
    }
    if freq_idx > 0 {
        row[freq_idx - 1] = 0.0;
    }
}

fn mean_amplitude(frames: &[Vec<f32>], start: usize, end: usize, freq_idx: usize) -> f32 {
    frames[start..end].iter().map(|row| row[freq_idx]).sum::<f32>() / (end - start) as f32
}

/// Decode raw model output to polyphonic note events.
///
/// # Arguments
///
/// * `frames` - Frame activation matrix (n_times, n_freqs).
/// * `onsets` - Onset activation matrix (n_times, n_freqs).
/// * `settings` - Thresholds and decoding switches.
///
/// # Returns
///
/// * Note events in frames, onset-tracked notes first (latest onset first),
///   followed by notes recovered by the melodia pass.
pub fn output_to_notes_poly(
    mut frames: Vec<Vec<f32>>,
    mut onsets: Vec<Vec<f32>>,
    settings: &NoteDecoding,
) -> Vec<NoteEventFrame> {
    let n_frames = frames.len();
    if n_frames < 2 {
        return vec![];
    }
    let frame_thresh = settings.frame_thresh;
    let energy_tolerance = settings.energy_tolerance;

    constrain_frequency(&mut onsets, &mut frames, settings.max_freq, settings.min_freq);

    if settings.infer_onsets {
        onsets = get_inferred_onsets(&onsets, &frames, INFERRED_ONSET_DIFFS);
    }

    let mut peak_threshold_matrix: Vec<Vec<f32>> = onsets.iter().map(|o| vec![0.0; o.len()]).collect();
    for (row, col) in arg_rel_max(&onsets, ONSET_PEAK_ORDER) {
        peak_threshold_matrix[row][col] = onsets[row][col];
    }

    let (note_starts, freq_idxs) = where_at_least(&peak_threshold_matrix, settings.onset_thresh);

    let mut remaining_energy = frames.clone();
    let mut note_events = vec![];

    for (&note_start_idx, &freq_idx) in note_starts.iter().zip(freq_idxs.iter()).rev() {
        // too close to the end of the audio
        if note_start_idx >= n_frames - 1 {
            continue;
        }

        // find where the energy at this pitch stays below threshold for `energy_tolerance` frames
        let mut i = note_start_idx + 1;
        let mut k = 0;
        while i < n_frames - 1 && k < energy_tolerance {
            if remaining_energy[i][freq_idx] < frame_thresh {
                k += 1;
            } else {
                k = 0;
            }
            i += 1;
        }

        i -= k; // back to the last frame above threshold

        if i - note_start_idx <= settings.min_note_len {
            continue;
        }

        for j in note_start_idx..i {
            clear_energy(&mut remaining_energy, j, freq_idx);
        }

        note_events.push(NoteEventFrame {
            start_frame: note_start_idx,
            end_frame: i,
            pitch_midi: freq_idx + MIDI_OFFSET,
            amplitude: mean_amplitude(&frames, note_start_idx, i, freq_idx),
        });
    }

    if !settings.melodia_trick {
        return note_events;
    }

    while global_max(&remaining_energy) > frame_thresh {
        let Some((i_mid, freq_idx)) = arg_max_2d(&remaining_energy) else {
            break;
        };
        if remaining_energy[i_mid][freq_idx] <= 0.0 {
            break;
        }
        remaining_energy[i_mid][freq_idx] = 0.0;

        // forward pass
        let mut i = i_mid + 1;
        let mut k = 0;
        while i < n_frames - 1 && k < energy_tolerance {
            if remaining_energy[i][freq_idx] < frame_thresh {
                k += 1;
            } else {
                k = 0;
            }
            clear_energy(&mut remaining_energy, i, freq_idx);
            i += 1;
        }
        let i_end = i - 1 - k;

        // backward pass
        let mut i = i_mid as isize - 1;
        let mut k = 0;
        while i > 0 && k < energy_tolerance {
            let frame = i as usize;
            if remaining_energy[frame][freq_idx] < frame_thresh {
                k += 1;
            } else {
                k = 0;
            }
            clear_energy(&mut remaining_energy, frame, freq_idx);
            i -= 1;
        }
        let i_start = (i + 1 + k as isize) as usize;

        // too short, the energy is dropped with it
        if i_end - i_start <= settings.min_note_len {
            continue;
        }

        note_events.push(NoteEventFrame {
            start_frame: i_start,
            end_frame: i_end,
            pitch_midi: freq_idx + MIDI_OFFSET,
            amplitude: mean_amplitude(&frames, i_start, i_end, freq_idx),
        });
    }

    note_events
}
