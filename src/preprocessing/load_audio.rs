use std::{fs::File, path::Path};

use hound::{SampleFormat, WavReader};
use ndarray::Array1;
use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::constants::AUDIO_SAMPLE_RATE;
use crate::error::ModelError;
use crate::preprocessing::windowed_audio::window_audio_file;

/// Interleaved samples straight out of a decoder.
struct DecodedAudio {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: usize,
}

fn audio_error(context: &str, e: impl std::fmt::Display) -> ModelError {
    ModelError::Audio(format!("{}: {}", context, e))
}

fn decode_wav(path: &Path) -> Result<DecodedAudio, hound::Error> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let max_sample_value = (2.0_f64.powi(spec.bits_per_sample as i32 - 1) - 1.0) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|s| s as f32 / max_sample_value))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels as usize,
    })
}

fn decode_container(path: &Path) -> Result<DecodedAudio, ModelError> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| audio_error("unsupported audio format", e))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| ModelError::Audio("no audio track found".into()))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| ModelError::Audio("sample rate not found".into()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| audio_error("failed to create decoder", e))?;

    let mut samples = Vec::new();
    let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(0);

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(audio_error("failed to read packet", e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                channels = spec.channels.count();
                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
            // Corrupt packets are skipped, the rest of the stream is still usable.
            Err(SymphoniaError::DecodeError(e)) => warn!("Skipping undecodable packet: {}", e),
            Err(e) => return Err(audio_error("decode error", e)),
        }
    }

    if channels == 0 {
        return Err(ModelError::Audio("channel count not found".into()));
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

fn decode_audio(path: &Path) -> Result<DecodedAudio, ModelError> {
    let is_wav = path
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("wav"));

    if !is_wav {
        return decode_container(path);
    }

    // `.wav` is only the default name for unrecognized URLs, so the content may be anything.
    match decode_wav(path) {
        Ok(audio) => Ok(audio),
        Err(hound::Error::IoError(e)) => Err(e.into()),
        Err(e) => {
            debug!("Not a readable WAV file ({}), probing container", e);
            decode_container(path)
        }
    }
}

fn to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

fn resample(samples: Vec<f32>, from_rate: u32, to_rate: u32) -> Result<Vec<f32>, ModelError> {
    if from_rate == to_rate {
        return Ok(samples);
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let frames = samples.len();
    let mut resampler = SincFixedIn::<f64>::new(to_rate as f64 / from_rate as f64, 2.0, params, frames, 1)
        .map_err(|e| audio_error("resampler error", e))?;

    let channel_data = vec![samples.into_iter().map(f64::from).collect::<Vec<f64>>()];
    let resampled = resampler
        .process(&channel_data, None)
        .map_err(|e| audio_error("resample error", e))?;

    Ok(resampled[0].iter().map(|&s| s as f32).collect())
}

/// Decode, downmix and resample an audio file to the model's sample rate.
///
/// Returns the samples and the length the audio has at the target rate.
pub fn load_and_convert_audio<P: AsRef<Path>>(path: P, target_sample_rate: u32) -> Result<(Array1<f32>, usize), ModelError> {
    let path = path.as_ref();
    let decoded = decode_audio(path)?;

    let mono = to_mono(&decoded.samples, decoded.channels);
    if mono.is_empty() {
        return Err(ModelError::Audio("audio contains no samples".into()));
    }

    let resample_ratio = target_sample_rate as f64 / decoded.sample_rate as f64;
    let original_length = (mono.len() as f64 * resample_ratio) as usize;
    debug!(
        path = %path.display(),
        sample_rate = decoded.sample_rate,
        channels = decoded.channels,
        frames = mono.len(),
        "Audio decoded"
    );

    let resampled = resample(mono, decoded.sample_rate, target_sample_rate)?;

    Ok((Array1::from(resampled), original_length))
}

/// Load an audio file and cut it into model-sized windows.
///
/// The audio is front-padded with half the overlap so that trimming the
/// overlap from each window output lines the frames up with the audio start.
pub fn get_audio_input<P: AsRef<Path>>(
    audio_path: P,
    overlap_len: usize,
    hop_size: usize,
) -> Result<(Vec<Array1<f32>>, usize), ModelError> {
    let (audio_original, original_length) = load_and_convert_audio(audio_path, AUDIO_SAMPLE_RATE as u32)?;

    let mut padded_audio = Array1::zeros(overlap_len / 2 + audio_original.len());
    padded_audio
        .slice_mut(ndarray::s![overlap_len / 2..])
        .assign(&audio_original);

    let audio_windows = window_audio_file(&padded_audio, hop_size).collect();

    Ok((audio_windows, original_length))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};

    fn write_wav(path: &Path, sample_rate: u32, channels: u16, frames: usize) {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            for c in 0..channels {
                let value = if c == 0 { 16383i16 } else { -16383i16 };
                writer.write_sample(if i % 2 == 0 { value } else { 0 }).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn to_mono_averages_channels() {
        assert_eq!(to_mono(&[1.0, 0.0, 0.5, 0.5], 2), vec![0.5, 0.5]);
        assert_eq!(to_mono(&[0.25, 0.5], 1), vec![0.25, 0.5]);
    }

    #[test]
    fn loads_wav_at_model_rate_without_resampling() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        write_wav(&path, AUDIO_SAMPLE_RATE as u32, 1, 1000);

        let (audio, length) = load_and_convert_audio(&path, AUDIO_SAMPLE_RATE as u32).unwrap();
        assert_eq!(length, 1000);
        assert_eq!(audio.len(), 1000);
        assert!((audio[0] - 0.5).abs() < 1e-3);
        assert_eq!(audio[1], 0.0);
    }

    #[test]
    fn stereo_wav_is_downmixed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, AUDIO_SAMPLE_RATE as u32, 2, 10);

        let (audio, _) = load_and_convert_audio(&path, AUDIO_SAMPLE_RATE as u32).unwrap();
        assert_eq!(audio.len(), 10);
        assert!(audio.iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn reports_resampled_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hi_rate.wav");
        write_wav(&path, 44100, 1, 4410);

        let (_, length) = load_and_convert_audio(&path, AUDIO_SAMPLE_RATE as u32).unwrap();
        assert_eq!(length, 2205);
    }

    #[test]
    fn garbage_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.wav");
        std::fs::write(&path, b"definitely not audio").unwrap();

        let err = load_and_convert_audio(&path, AUDIO_SAMPLE_RATE as u32).unwrap_err();
        assert!(matches!(err, ModelError::Audio(_)), "{err}");
    }

    #[test]
    fn empty_wav_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        write_wav(&path, AUDIO_SAMPLE_RATE as u32, 1, 0);

        let err = load_and_convert_audio(&path, AUDIO_SAMPLE_RATE as u32).unwrap_err();
        assert!(err.to_string().contains("no samples"));
    }
}
