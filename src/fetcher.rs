//! Resource fetcher
//!
//! Downloads the job's audio into a request-scoped temporary file. The body is
//! streamed to disk in fixed-size chunks so large uploads never sit in memory.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use tempfile::TempPath;
use tracing::{debug, warn};

use crate::constants::{DOWNLOAD_CHUNK_SIZE, TEMP_FILE_PREFIX};
use crate::error::DownloadError;

const USER_AGENT: &str = concat!("basic-pitch-worker/", env!("CARGO_PKG_VERSION"));

/// Recognized extensions, in match priority order. Anything else is stored as `.wav`.
const KNOWN_EXTENSIONS: [&str; 4] = [".mp3", ".flac", ".ogg", ".m4a"];
const FALLBACK_EXTENSION: &str = ".wav";

/// Pick a storage extension from the URL by case-insensitive substring match.
///
/// Only a hint for the audio loader; the content is never inspected.
pub fn extension_for_url(url: &str) -> &'static str {
    let url = url.to_lowercase();
    KNOWN_EXTENSIONS
        .into_iter()
        .find(|ext| url.contains(ext))
        .unwrap_or(FALLBACK_EXTENSION)
}

/// Local copy of a remote audio file, owned by a single request.
///
/// The file is removed by [`TransientAudioFile::release`], or on drop if the
/// request bails out early or unwinds.
#[derive(Debug)]
pub struct TransientAudioFile {
    path: TempPath,
    extension: &'static str,
}

impl TransientAudioFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn extension(&self) -> &'static str {
        self.extension
    }

    /// Delete the file now. Failures are logged and swallowed; a file that is
    /// already gone is not a failure.
    pub fn release(self) {
        let path = self.path.to_path_buf();
        match self.path.close() {
            Ok(()) => debug!(path = %path.display(), "Released transient audio file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Transient audio file already removed")
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove transient audio file"),
        }
    }
}

/// HTTP client that materializes audio URLs as [`TransientAudioFile`]s.
#[derive(Debug, Clone)]
pub struct AudioFetcher {
    client: Client,
    timeout: Duration,
    temp_dir: Option<PathBuf>,
}

impl AudioFetcher {
    /// `timeout` bounds the whole download, connect through the last body byte.
    pub fn new(timeout: Duration) -> Result<Self, DownloadError> {
        // The client timeout only bounds each operation; `fetch` enforces the total.
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            timeout,
            temp_dir: None,
        })
    }

    /// Store downloads in `dir` instead of the system temp directory. A
    /// relative `dir` is resolved against the current directory now.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        self.temp_dir = Some(std::path::absolute(&dir).unwrap_or(dir));
        self
    }

    /// Download `url` with a single GET. Non-2xx statuses, timeouts and
    /// connection failures are all reported as [`DownloadError`].
    pub fn fetch(&self, url: &str) -> Result<TransientAudioFile, DownloadError> {
        debug!(url, "Downloading audio");
        let deadline = Instant::now() + self.timeout;

        let mut response = self.client.get(url).send()?.error_for_status()?;

        let extension = extension_for_url(url);
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_FILE_PREFIX).suffix(extension);
        let mut file = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        // A failure past this point drops `file`, which deletes the partial download.
        let mut buffer = [0u8; DOWNLOAD_CHUNK_SIZE];
        let mut written = 0u64;
        loop {
            if Instant::now() >= deadline {
                return Err(DownloadError::TimedOut(self.timeout));
            }
            let n = response.read(&mut buffer).map_err(DownloadError::Body)?;
            if n == 0 {
                break;
            }
            file.write_all(&buffer[..n])?;
            written += n as u64;
        }
        file.flush()?;

        let path = file.into_temp_path();
        debug!(path = %path.display(), bytes = written, "Audio downloaded");

        Ok(TransientAudioFile { path, extension })
    }
}
