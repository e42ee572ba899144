use crate::types::RawNoteEvent;

use super::{helpers::ported::librosa::model_frame_to_time, note_event_frames::NoteEventFrame};

/// Scale a 0..1 amplitude to a MIDI velocity.
pub fn amplitude_to_velocity(amplitude: f32) -> u8 {
    (amplitude * 127.0).round().clamp(0.0, 127.0) as u8
}

/// Convert frame-based notes to timed events with MIDI velocities.
pub fn note_frames_to_time(notes: &[NoteEventFrame]) -> Vec<RawNoteEvent> {
    notes
        .iter()
        .map(|note| RawNoteEvent {
            start_time: model_frame_to_time(note.start_frame),
            end_time: model_frame_to_time(note.end_frame),
            pitch: note.pitch_midi.min(u8::MAX as usize) as u8,
            velocity: amplitude_to_velocity(note.amplitude),
        })
        .collect()
}
