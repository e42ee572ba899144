// Inference
pub const AUDIO_SAMPLE_RATE: usize = 22050;
pub const FFT_HOP: usize = 256;
pub const ANNOTATIONS_FPS: usize = AUDIO_SAMPLE_RATE / FFT_HOP;
pub const AUDIO_WINDOW_LENGTH: usize = 2;
pub const AUDIO_N_SAMPLES: usize = AUDIO_SAMPLE_RATE * AUDIO_WINDOW_LENGTH - FFT_HOP;
pub const ANNOT_N_FRAMES: usize = ANNOTATIONS_FPS * AUDIO_WINDOW_LENGTH;
pub const N_OVERLAPPING_FRAMES: usize = 30;
pub const MODEL_PATH: &str = "./model/icassp_2022_nmp.onnx";
pub const DEFAULT_INTRA_THREADS: usize = 4;

// Seconds between the model's frame grid and the audio timeline, per window.
pub const WINDOW_OFFSET: f32 = (FFT_HOP as f32 / AUDIO_SAMPLE_RATE as f32)
    * (ANNOT_N_FRAMES as f32 - (AUDIO_N_SAMPLES as f32 / FFT_HOP as f32))
    + 0.0018;

// Model outputs
pub const OUTPUT_FRAMES: &str = "StatefulPartitionedCall:1";
pub const OUTPUT_ONSETS: &str = "StatefulPartitionedCall:2";

// Note decoding
pub const MIDI_OFFSET: usize = 21;
pub const ENERGY_TOLERANCE: usize = 11;
pub const ONSET_PEAK_ORDER: usize = 1;
pub const INFERRED_ONSET_DIFFS: usize = 2;

// MIDI Conversion
pub const TICKS_PER_BEAT: u16 = 220;
pub const MIDI_TEMPO_BPM: u32 = 120;

// Request defaults
pub const DEFAULT_ONSET_THRESHOLD: f32 = 0.5;
pub const DEFAULT_FRAME_THRESHOLD: f32 = 0.3;
pub const DEFAULT_MINIMUM_NOTE_LENGTH_MS: u32 = 58;

// Download
pub const DOWNLOAD_TIMEOUT_SECS: u64 = 300;
pub const DOWNLOAD_CHUNK_SIZE: usize = 8192;
pub const TEMP_FILE_PREFIX: &str = "basic-pitch-";
