use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::error::ResolveError;

/// Downloads and transcodes a streaming-service URL into a file in `output_dir`.
///
/// Implementations write `<video id>.<ext>` into the directory; the resolver
/// locates the file afterwards.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(
        &self,
        url: &str,
        output_dir: &Path,
        transcoder_dir: Option<&Path>,
    ) -> Result<(), ResolveError>;
}

/// Runs `yt-dlp` as a child process
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    binary: Option<PathBuf>,
    timeout: Duration,
}

impl YtDlpExtractor {
    pub fn new(binary: Option<PathBuf>, timeout: Duration) -> Self {
        Self { binary, timeout }
    }

    pub fn binary(&self) -> Option<&Path> {
        self.binary.as_deref()
    }

    /// Audio-only WAV at best quality, single video, overwrite anything left behind
    pub fn build_args(url: &str, output_dir: &Path, transcoder_dir: Option<&Path>) -> Vec<OsString> {
        let template = output_dir.join("%(id)s.%(ext)s");

        let mut args: Vec<OsString> = vec![
            "-x".into(),
            "--audio-format".into(),
            "wav".into(),
            "--audio-quality".into(),
            "0".into(),
            "-o".into(),
            template.into_os_string(),
            "--no-playlist".into(),
        ];
        if let Some(dir) = transcoder_dir {
            args.push("--ffmpeg-location".into());
            args.push(dir.as_os_str().to_os_string());
        }
        args.push("--no-warnings".into());
        args.push("--force-overwrites".into());
        args.push(url.into());
        args
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    async fn extract(
        &self,
        url: &str,
        output_dir: &Path,
        transcoder_dir: Option<&Path>,
    ) -> Result<(), ResolveError> {
        let binary = self
            .binary
            .as_ref()
            .ok_or_else(|| ResolveError::extraction(url, "yt-dlp executable not found"))?;

        log::info!("Starting yt-dlp for {}", url);

        let mut child = Command::new(binary)
            .args(Self::build_args(url, output_dir, transcoder_dir))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ResolveError::extraction(url, format!("failed to start yt-dlp: {}", e)))?;

        let stdout = child.stdout.take().map(|stdout| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => log::debug!("yt-dlp: {}", line),
                        Ok(None) => return Ok(()),
                        Err(e) => return Err(e),
                    }
                }
            })
        });

        let stderr = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => log::warn!("yt-dlp stderr: {}", line),
                        Ok(None) => return Ok(()),
                        Err(e) => return Err(e),
                    }
                }
            })
        });

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                return Err(ResolveError::extraction(url, format!("failed to wait for yt-dlp: {}", e)));
            }
            Err(_) => {
                if let Err(e) = child.kill().await {
                    log::warn!("Could not kill timed out yt-dlp: {}", e);
                }
                return Err(ResolveError::extraction(
                    url,
                    format!("yt-dlp timed out after {}s", self.timeout.as_secs()),
                ));
            }
        };

        for reader in [stdout, stderr].into_iter().flatten() {
            match reader.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    return Err(ResolveError::extraction(url, format!("failed to read yt-dlp output: {}", e)));
                }
                Err(e) => log::warn!("yt-dlp output reader ended abnormally: {}", e),
            }
        }

        if !status.success() {
            let code = status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(ResolveError::extraction(url, format!("yt-dlp exited with status {}", code)));
        }

        log::info!("yt-dlp finished for {}", url);
        Ok(())
    }
}
