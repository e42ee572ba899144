//! Basic Pitch worker - entry point
//!
//! Loads the model once, then runs jobs either from `--test-input` or as
//! newline-delimited job envelopes on stdin, writing one output envelope per
//! line to stdout. Logs go to stderr.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use basic_pitch_worker::constants::{DEFAULT_INTRA_THREADS, DOWNLOAD_TIMEOUT_SECS, MIDI_TEMPO_BPM, MODEL_PATH};
use basic_pitch_worker::postprocessing::midi::generate_midi_file_data;
use basic_pitch_worker::{AudioFetcher, BasicPitch, Job, JobOutput, JobResult, ModelConfig, Worker};

/// Command-line arguments for the worker
#[derive(Parser, Debug)]
#[command(name = "basic-pitch-worker")]
#[command(about = "Transcribes audio URLs to note events with Basic Pitch")]
#[command(version)]
struct Args {
    /// Path to the Basic Pitch ONNX model
    #[arg(long, default_value = MODEL_PATH, env = "BASIC_PITCH_MODEL_PATH")]
    model_path: PathBuf,

    /// Intra-op threads for ONNX Runtime
    #[arg(long, default_value_t = DEFAULT_INTRA_THREADS, env = "BASIC_PITCH_INTRA_THREADS")]
    intra_threads: usize,

    /// Upper bound on a whole audio download, in seconds
    #[arg(long, default_value_t = DOWNLOAD_TIMEOUT_SECS, env = "BASIC_PITCH_DOWNLOAD_TIMEOUT_SECS")]
    download_timeout_secs: u64,

    /// Directory for transient audio files (system temp dir if unset)
    #[arg(long, env = "BASIC_PITCH_TEMP_DIR")]
    temp_dir: Option<PathBuf>,

    /// Run a single job envelope, e.g. '{"input": {"audio_url": "..."}}', and exit
    #[arg(long)]
    test_input: Option<String>,

    /// With --test-input, also write the detected notes to this MIDI file
    #[arg(long, requires = "test_input")]
    midi_out: Option<PathBuf>,
}

fn run_job(worker: &Worker, line: &str) -> JobResult {
    match serde_json::from_str::<Job>(line) {
        Ok(job) => {
            info!(id = job.id.as_deref().unwrap_or("-"), "Handling job");
            JobResult {
                output: worker.handle(&job.input),
                id: job.id,
            }
        }
        Err(e) => {
            warn!(error = %e, "Rejecting malformed job");
            JobResult {
                id: None,
                output: JobOutput::error(format!("Invalid job: {}", e)),
            }
        }
    }
}

fn run_test_input(worker: &Worker, input: &str, midi_out: Option<PathBuf>) -> Result<()> {
    let result = run_job(worker, input);
    println!("{}", serde_json::to_string_pretty(&result)?);

    if let Some(path) = midi_out {
        match result.output.notes() {
            Some(notes) => {
                let data = generate_midi_file_data(notes, MIDI_TEMPO_BPM).context("Failed to encode MIDI")?;
                std::fs::write(&path, data).with_context(|| format!("Failed to write {}", path.display()))?;
                info!(path = %path.display(), "MIDI written");
            }
            None => warn!("Job failed, no MIDI written"),
        }
    }

    Ok(())
}

fn run_stdin(worker: &Worker) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();

    for line in stdin.lock().lines() {
        let line = line.context("Failed to read job from stdin")?;
        if line.trim().is_empty() {
            continue;
        }

        let result = run_job(worker, &line);
        writeln!(stdout, "{}", serde_json::to_string(&result)?)?;
        stdout.flush()?;
    }

    info!("Input closed, shutting down");
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "basic_pitch_worker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = Args::parse();

    let model = BasicPitch::load(
        &args.model_path,
        &ModelConfig {
            intra_threads: args.intra_threads,
        },
    )
    .context("Failed to load Basic Pitch model")?;

    let mut fetcher = AudioFetcher::new(Duration::from_secs(args.download_timeout_secs))
        .context("Failed to build HTTP client")?;
    if let Some(dir) = &args.temp_dir {
        fetcher = fetcher.with_temp_dir(dir);
    }

    let worker = Worker::new(fetcher, Arc::new(model));

    match args.test_input {
        Some(input) => run_test_input(&worker, &input, args.midi_out),
        None => {
            info!("Worker ready, reading jobs from stdin");
            run_stdin(&worker)
        }
    }
}
