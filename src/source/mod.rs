pub mod extractor;
pub mod scratch;
pub mod tools;

#[cfg(test)]
pub mod testing;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::Url;
use tokio::sync::Mutex;

use crate::config::PlayerConfig;
use crate::error::{AudioError, PlayerError, ResolveError};
use crate::logging::OperationTimer;

pub use extractor::{Extractor, YtDlpExtractor};
pub use scratch::ScratchDir;
pub use tools::ToolPaths;

/// Streaming services that never hand out a direct audio file
const UNSUPPORTED_HOSTS: &[&str] = &["spotify.com", "music.apple.com", "tidal.com", "deezer.com"];

/// How a URL will be turned into playable audio
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    LocalFile(PathBuf),
    DirectHttp,
    YouTube,
    Unsupported(String),
}

/// A resource the decoder can open without touching the network
#[derive(Clone)]
pub enum LocalResource {
    File { path: PathBuf },
    Memory { bytes: Arc<[u8]>, extension_hint: Option<String> },
}

impl LocalResource {
    pub fn extension_hint(&self) -> Option<&str> {
        match self {
            LocalResource::File { path } => path.extension().and_then(|e| e.to_str()),
            LocalResource::Memory { extension_hint, .. } => extension_hint.as_deref(),
        }
    }
}

impl fmt::Debug for LocalResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalResource::File { path } => f.debug_struct("File").field("path", path).finish(),
            LocalResource::Memory { bytes, extension_hint } => f
                .debug_struct("Memory")
                .field("len", &bytes.len())
                .field("extension_hint", extension_hint)
                .finish(),
        }
    }
}

impl fmt::Display for LocalResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalResource::File { path } => write!(f, "{}", path.display()),
            LocalResource::Memory { bytes, .. } => write!(f, "<{} bytes in memory>", bytes.len()),
        }
    }
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{}", domain))
}

fn is_youtube_host(host: &str) -> bool {
    host_matches(host, "youtube.com") || host_matches(host, "youtu.be")
}

/// Classify a user-supplied URL or path
pub fn classify(url: &str) -> SourceKind {
    let url = url.trim();
    if url.is_empty() {
        return SourceKind::Unsupported("empty URL".to_string());
    }

    if !url.contains("://") {
        return SourceKind::LocalFile(PathBuf::from(url));
    }

    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(e) => return SourceKind::Unsupported(format!("malformed URL: {}", e)),
    };

    match parsed.scheme() {
        "file" => match parsed.to_file_path() {
            Ok(path) => SourceKind::LocalFile(path),
            Err(()) => SourceKind::Unsupported("file URL has no usable path".to_string()),
        },
        "http" | "https" => {
            let host = parsed.host_str().unwrap_or_default().to_lowercase();
            if is_youtube_host(&host) {
                SourceKind::YouTube
            } else if let Some(service) = UNSUPPORTED_HOSTS.iter().find(|d| host_matches(&host, d)) {
                SourceKind::Unsupported(format!("{} does not provide direct audio files", service))
            } else {
                SourceKind::DirectHttp
            }
        }
        scheme => SourceKind::Unsupported(format!("'{}' URLs are not supported", scheme)),
    }
}

/// Extract the video id from a YouTube watch, share, shorts or embed URL
pub fn youtube_video_id(url: &str) -> Option<String> {
    let from_parsed = Url::parse(url.trim()).ok().and_then(|parsed| {
        let host = parsed.host_str()?.to_lowercase();
        if host_matches(&host, "youtu.be") {
            return parsed.path_segments()?.next().map(str::to_string);
        }
        if !host_matches(&host, "youtube.com") {
            return None;
        }
        if let Some((_, id)) = parsed.query_pairs().find(|(k, _)| k == "v") {
            return Some(id.into_owned());
        }
        let mut segments = parsed.path_segments()?;
        match segments.next()? {
            "shorts" | "embed" | "live" | "v" => segments.next().map(str::to_string),
            _ => None,
        }
    });

    from_parsed
        .or_else(|| {
            // Tolerate strings Url refuses, e.g. missing scheme
            let rest = url
                .split_once("v=")
                .map(|(_, rest)| rest)
                .or_else(|| url.split_once("youtu.be/").map(|(_, rest)| rest))?;
            rest.split(['&', '?', '#', '/']).next().map(str::to_string)
        })
        .filter(|id| !id.is_empty())
}

fn extension_from_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next()?.trim().to_lowercase();
    match mime.as_str() {
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some("wav"),
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/ogg" | "application/ogg" => Some("ogg"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        "audio/aac" | "audio/mp4" | "audio/x-m4a" => Some("m4a"),
        _ => None,
    }
}

/// Turns URLs into local resources.
///
/// YouTube links go through the extractor into the scratch directory; at most
/// one extraction runs at a time so a purge can never delete a file another
/// lookup is about to return.
pub struct SourceResolver {
    extractor: Arc<dyn Extractor>,
    scratch: ScratchDir,
    transcoder_dir: Option<PathBuf>,
    http: reqwest::Client,
    max_stream_bytes: u64,
    extraction_lock: Mutex<()>,
}

impl SourceResolver {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        scratch: ScratchDir,
        transcoder_dir: Option<PathBuf>,
        max_stream_bytes: u64,
    ) -> Self {
        Self {
            extractor,
            scratch,
            transcoder_dir,
            http: reqwest::Client::new(),
            max_stream_bytes,
            extraction_lock: Mutex::new(()),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Production resolver: yt-dlp and ffmpeg located per config, env and PATH
    pub fn from_config(config: &PlayerConfig) -> Self {
        let tools = ToolPaths::discover(config);
        let extractor = YtDlpExtractor::new(tools.extractor, config.extraction_timeout());
        Self::new(
            Arc::new(extractor),
            ScratchDir::new(config.scratch_dir()),
            tools.transcoder_dir,
            config.max_stream_bytes,
        )
    }

    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    pub async fn resolve(&self, url: &str) -> Result<LocalResource, PlayerError> {
        match classify(url) {
            SourceKind::LocalFile(path) => Self::resolve_local(path),
            SourceKind::DirectHttp => self.fetch_http(url).await,
            SourceKind::YouTube => Ok(self.extract_youtube(url).await?),
            SourceKind::Unsupported(reason) => Err(ResolveError::unsupported(url, reason).into()),
        }
    }

    fn resolve_local(path: PathBuf) -> Result<LocalResource, PlayerError> {
        if !path.is_file() {
            return Err(AudioError::DecodeFailed(format!("no such file: {}", path.display())).into());
        }
        Ok(LocalResource::File { path })
    }

    async fn fetch_http(&self, url: &str) -> Result<LocalResource, PlayerError> {
        let timer = OperationTimer::new(format!("fetch {}", url));
        let http_error = |e: reqwest::Error| AudioError::DecodeFailed(format!("HTTP request failed: {}", e));

        let mut response = self
            .http
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(http_error)?;

        let too_large = || AudioError::DecodeFailed(format!("stream exceeds {} bytes", self.max_stream_bytes));
        if response.content_length().map(|len| len > self.max_stream_bytes).unwrap_or(false) {
            return Err(too_large().into());
        }

        let extension_hint = Path::new(response.url().path())
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .or_else(|| {
                response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .and_then(extension_from_content_type)
                    .map(str::to_string)
            });

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(http_error)? {
            if (body.len() + chunk.len()) as u64 > self.max_stream_bytes {
                return Err(too_large().into());
            }
            body.extend_from_slice(&chunk);
        }

        let took = timer.finish();
        log::debug!("Fetched {} bytes from {} in {}ms", body.len(), url, took.as_millis());

        Ok(LocalResource::Memory {
            bytes: body.into(),
            extension_hint,
        })
    }

    async fn extract_youtube(&self, url: &str) -> Result<LocalResource, ResolveError> {
        let _guard = self.extraction_lock.lock().await;
        let scratch_error = |e: std::io::Error| {
            ResolveError::extraction(url, format!("scratch directory {}: {}", self.scratch.path().display(), e))
        };

        self.scratch.ensure().await.map_err(scratch_error)?;
        let purged = self.scratch.purge().await.map_err(scratch_error)?;
        if purged > 0 {
            log::debug!("Purged {} file(s) before extraction", purged);
        }

        let timer = OperationTimer::new(format!("extract {}", url));
        self.extractor
            .extract(url, self.scratch.path(), self.transcoder_dir.as_deref())
            .await?;
        timer.finish_with_threshold(std::time::Duration::from_secs(30));

        let video_id = youtube_video_id(url);
        match self.scratch.locate(video_id.as_deref()).await.map_err(scratch_error)? {
            Some(path) => {
                log::info!("Extracted audio at {}", path.display());
                Ok(LocalResource::File { path })
            }
            None => Err(ResolveError::extraction(url, "extractor produced no audio file")),
        }
    }
}
