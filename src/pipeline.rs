//! Inference pipeline: one call into the transcriber, raw events mapped to
//! the public [`NoteEvent`] shape.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use tracing::{debug, warn};

use crate::error::InferenceError;
use crate::model::NoteTranscriber;
use crate::types::{DetectionParams, NoteEvent};

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run the transcriber once on `audio_path` and convert its output.
///
/// Order is preserved as produced. A panic inside the transcriber is
/// reported as [`InferenceError::Panicked`].
pub fn run(
    model: &dyn NoteTranscriber,
    audio_path: &Path,
    params: &DetectionParams,
) -> Result<Vec<NoteEvent>, InferenceError> {
    debug!(path = %audio_path.display(), ?params, "Running inference");

    let raw_events = panic::catch_unwind(AssertUnwindSafe(|| model.predict(audio_path, params)))
        .map_err(|payload| {
            let message = panic_message(payload.as_ref());
            warn!(path = %audio_path.display(), panic = %message, "Transcriber panicked");
            InferenceError::Panicked(message)
        })??;

    Ok(raw_events.into_iter().map(NoteEvent::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::types::RawNoteEvent;
    use std::io;
    use std::sync::{Arc, Mutex};

    struct Fixed(Vec<RawNoteEvent>);

    impl NoteTranscriber for Fixed {
        fn predict(&self, _: &Path, _: &DetectionParams) -> Result<Vec<RawNoteEvent>, ModelError> {
            Ok(self.0.clone())
        }
    }

    struct Recording(Mutex<Vec<DetectionParams>>);

    impl NoteTranscriber for Recording {
        fn predict(&self, _: &Path, params: &DetectionParams) -> Result<Vec<RawNoteEvent>, ModelError> {
            self.0.lock().unwrap().push(params.clone());
            Ok(vec![])
        }
    }

    struct Panicking;

    impl NoteTranscriber for Panicking {
        fn predict(&self, _: &Path, _: &DetectionParams) -> Result<Vec<RawNoteEvent>, ModelError> {
            panic!("i_end is past end of times");
        }
    }

    fn raw(start_time: f32, end_time: f32, pitch: u8) -> RawNoteEvent {
        RawNoteEvent {
            start_time,
            end_time,
            pitch,
            velocity: 80,
        }
    }

    #[test]
    fn preserves_order_and_computes_duration() {
        let model = Fixed(vec![raw(2.0, 2.5, 72), raw(0.5, 1.75, 60), raw(0.5, 1.75, 60)]);
        let notes = run(&model, Path::new("a.wav"), &DetectionParams::default()).unwrap();

        assert_eq!(notes.len(), 3);
        assert_eq!(notes[0].pitch, 72);
        assert_eq!(notes[0].duration, 0.5);
        assert_eq!(notes[1].start_time, 0.5);
        assert_eq!(notes[1].duration, 1.25);
        assert_eq!(notes[1], notes[2]);
    }

    #[test]
    fn params_reach_the_model_unchanged() {
        let model = Recording(Mutex::new(vec![]));
        let params = DetectionParams {
            onset_threshold: 0.6,
            maximum_frequency: Some(1200.0),
            ..DetectionParams::default()
        };
        run(&model, Path::new("a.wav"), &params).unwrap();

        let seen = model.0.lock().unwrap();
        assert_eq!(seen.as_slice(), &[params]);
        assert_eq!(seen[0].minimum_frequency, None);
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn caught_panic_is_logged_as_warning() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let result = tracing::subscriber::with_default(subscriber, || {
            run(&Panicking, Path::new("a.wav"), &DetectionParams::default())
        });

        assert!(result.is_err());
        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("WARN"), "{output}");
        assert!(output.contains("Transcriber panicked"), "{output}");
        assert!(output.contains("i_end is past end of times"), "{output}");
    }

    #[test]
    fn panics_become_inference_errors() {
        let err = run(&Panicking, Path::new("a.wav"), &DetectionParams::default()).unwrap_err();
        assert!(matches!(err, InferenceError::Panicked(ref m) if m == "i_end is past end of times"));
    }
}
