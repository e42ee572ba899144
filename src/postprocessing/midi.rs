use midly::num::u7;
use midly::Format;
use midly::Header;
use midly::MetaMessage;
use midly::MidiMessage;
use midly::Smf;
use midly::Timing;
use midly::Track;
use midly::TrackEvent;
use midly::TrackEventKind;

use crate::constants::TICKS_PER_BEAT;
use crate::types::NoteEvent;

#[derive(Debug, Clone)]
struct TrackEventAbsolute<'a> {
    tick: u32,
    kind: TrackEventKind<'a>,
}

fn note_message(key: u8, vel: u8, on: bool) -> TrackEventKind<'static> {
    let key = u7::new(key.min(127));
    let vel = u7::new(vel.min(127));
    TrackEventKind::Midi {
        channel: 0.into(),
        message: if on {
            MidiMessage::NoteOn { key, vel }
        } else {
            MidiMessage::NoteOff { key, vel }
        },
    }
}

/// Turn notes into delta-timed track events, ordered by tick.
pub fn generate_ordered_midi_events(notes: &[NoteEvent], ticks_per_second: f32) -> Vec<TrackEvent<'static>> {
    let mut absolute: Vec<TrackEventAbsolute> = Vec::with_capacity(notes.len() * 2);
    for note in notes {
        let start_tick = (note.start_time.max(0.0) * ticks_per_second).round() as u32;
        let end_tick = start_tick + (note.duration.max(0.0) * ticks_per_second).round() as u32;

        absolute.push(TrackEventAbsolute {
            tick: start_tick,
            kind: note_message(note.pitch, note.velocity, true),
        });
        absolute.push(TrackEventAbsolute {
            tick: end_tick,
            kind: note_message(note.pitch, note.velocity, false),
        });
    }

    absolute.sort_by_key(|event| event.tick);

    let mut previous_tick = 0;
    absolute
        .into_iter()
        .map(|event| {
            let delta = event.tick - previous_tick;
            previous_tick = event.tick;
            TrackEvent {
                delta: delta.into(),
                kind: event.kind,
            }
        })
        .collect()
}

/// Generate Standard MIDI File data from note events.
///
/// # Arguments
///
/// * `notes` - Notes in seconds.
/// * `beats_per_minute` - Tempo written to the file; note times are preserved.
///
/// # Returns
///
/// * A vector of bytes representing the MIDI file.
pub fn generate_midi_file_data(notes: &[NoteEvent], beats_per_minute: u32) -> std::io::Result<Vec<u8>> {
    let timing = Timing::Metrical(TICKS_PER_BEAT.into());
    let ticks_per_second = (TICKS_PER_BEAT as f32) * (beats_per_minute as f32) / 60.0;

    let mut smf = Smf::new(Header {
        format: Format::SingleTrack,
        timing,
    });
    let mut track = Track::new();

    track.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::Tempo((60_000_000 / beats_per_minute).into())),
    });
    track.extend(generate_ordered_midi_events(notes, ticks_per_second));
    track.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    smf.tracks.push(track);

    let mut buffer = Vec::new();
    smf.write_std(&mut buffer)?;

    Ok(buffer)
}
