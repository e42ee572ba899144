use crate::constants::MIDI_OFFSET;

use super::ported::{librosa::hz_to_midi, numpy::global_max};

fn frequency_bin(hz: f32, n_bins: usize) -> usize {
    (hz_to_midi(hz) - MIDI_OFFSET as f32).round().clamp(0.0, n_bins as f32) as usize
}

/// Mutate onsets and frames to have 0s outside of the frequency bounds.
///
/// # Arguments
///
/// * `onsets` - Onset activations (n_times, n_freqs).
/// * `frames` - Frame activations (n_times, n_freqs).
/// * `max_freq` - Maximum non-0 frequency in Hz, `None` for no upper bound.
/// * `min_freq` - Minimum non-0 frequency in Hz, `None` for no lower bound.
pub fn constrain_frequency(
    onsets: &mut [Vec<f32>],
    frames: &mut [Vec<f32>],
    max_freq: Option<f32>,
    min_freq: Option<f32>,
) {
    for row in onsets.iter_mut().chain(frames.iter_mut()) {
        let n_bins = row.len();
        if let Some(max_freq) = max_freq {
            row[frequency_bin(max_freq, n_bins)..].fill(0.0);
        }
        if let Some(min_freq) = min_freq {
            row[..frequency_bin(min_freq, n_bins)].fill(0.0);
        }
    }
}

/// Infer onsets from large changes in frame amplitudes.
///
/// The frame difference is the smallest rise over the last `n_diff` frames,
/// rescaled so its peak matches the onset peak; the result is the element-wise
/// max of those differences and the predicted onsets.
///
/// # Arguments
///
/// * `onsets` - Onset activations (n_times, n_freqs).
/// * `frames` - Frame activations (n_times, n_freqs).
/// * `n_diff` - Number of frame differences to consider.
pub fn get_inferred_onsets(onsets: &[Vec<f32>], frames: &[Vec<f32>], n_diff: usize) -> Vec<Vec<f32>> {
    let mut frame_diff: Vec<Vec<f32>> = frames
        .iter()
        .enumerate()
        .map(|(t, row)| {
            row.iter()
                .enumerate()
                .map(|(f, &value)| {
                    let rise = (1..=n_diff)
                        .map(|n| value - if t >= n { frames[t - n][f] } else { 0.0 })
                        .fold(f32::INFINITY, f32::min);
                    // frames before the first full difference are zeroed
                    if t < n_diff { 0.0 } else { rise.max(0.0) }
                })
                .collect()
        })
        .collect();

    let onset_max = global_max(onsets);
    let frame_diff_max = global_max(&frame_diff);
    if frame_diff_max > 0.0 {
        for value in frame_diff.iter_mut().flat_map(|row| row.iter_mut()) {
            *value = onset_max * *value / frame_diff_max;
        }
    }

    onsets
        .iter()
        .zip(frame_diff)
        .map(|(onset_row, diff_row)| {
            onset_row
                .iter()
                .zip(diff_row)
                .map(|(&onset, diff)| onset.max(diff))
                .collect()
        })
        .collect()
}
