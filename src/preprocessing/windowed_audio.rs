use ndarray::{s, Array1};

use crate::constants::AUDIO_N_SAMPLES;

/// Fixed-length model windows over a signal, `hop` samples apart. The last
/// window is zero-padded on the right.
pub struct WindowedAudio<'a> {
    audio: &'a Array1<f32>,
    hop: usize,
    start: usize,
}

impl Iterator for WindowedAudio<'_> {
    type Item = Array1<f32>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.start >= self.audio.len() {
            return None;
        }

        let end = (self.start + AUDIO_N_SAMPLES).min(self.audio.len());
        let mut window = Array1::zeros(AUDIO_N_SAMPLES);
        window
            .slice_mut(s![..end - self.start])
            .assign(&self.audio.slice(s![self.start..end]));

        self.start += self.hop;
        Some(window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.audio.len().saturating_sub(self.start).div_ceil(self.hop);
        (remaining, Some(remaining))
    }
}

/// A hop of zero is treated as one sample.
pub fn window_audio_file(audio: &Array1<f32>, hop_size: usize) -> WindowedAudio<'_> {
    WindowedAudio {
        audio,
        hop: hop_size.max(1),
        start: 0,
    }
}
