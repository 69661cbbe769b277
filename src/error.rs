use std::fmt;
use thiserror::Error;

/// Main player error type
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Source error: {0}")]
    Source(#[from] ResolveError),

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("File error: {0}")]
    File(#[from] std::io::Error),

    #[error("CLI parse error: {0}")]
    Parse(#[from] crate::cli::ParseError),

    #[error("Playback controller is no longer running")]
    ControllerClosed,
}

impl PlayerError {
    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            PlayerError::Source(err) => err.user_message(),
            PlayerError::Audio(err) => err.user_message(),
            PlayerError::Config(err) => err.user_message(),
            PlayerError::File(err) => format!("File system error: {}", err),
            PlayerError::Parse(err) => format!("Command error: {}", err),
            PlayerError::ControllerClosed => "The player has shut down".to_string(),
        }
    }

    /// The pipeline failure kind, if this error came out of the play pipeline
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            PlayerError::Source(err) => Some(err.kind()),
            PlayerError::Audio(err) => err.kind(),
            _ => None,
        }
    }

    /// Check if playback can simply move on to the next track
    pub fn is_recoverable(&self) -> bool {
        match self {
            PlayerError::Source(_) => true,
            PlayerError::Audio(err) => err.is_recoverable(),
            PlayerError::Config(_) => true,
            PlayerError::File(_) => true,
            PlayerError::Parse(_) => false,
            PlayerError::ControllerClosed => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            PlayerError::Source(ResolveError::UnsupportedSource { .. }) => ErrorSeverity::Warning,
            PlayerError::Source(_) => ErrorSeverity::Error,
            PlayerError::Audio(AudioError::FormatUnsupported { .. }) => ErrorSeverity::Warning,
            PlayerError::Audio(_) => ErrorSeverity::Error,
            PlayerError::Config(_) => ErrorSeverity::Warning,
            PlayerError::File(_) => ErrorSeverity::Error,
            PlayerError::Parse(_) => ErrorSeverity::Info,
            PlayerError::ControllerClosed => ErrorSeverity::Critical,
        }
    }
}

/// The failure kinds a play request can end in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnsupportedSource,
    ExtractionFailed,
    FormatUnsupported,
    LineUnavailable,
    DecodeFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnsupportedSource => "UnsupportedSource",
            ErrorKind::ExtractionFailed => "ExtractionFailed",
            ErrorKind::FormatUnsupported => "FormatUnsupported",
            ErrorKind::LineUnavailable => "LineUnavailable",
            ErrorKind::DecodeFailed => "DecodeFailed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step of the play pipeline a failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Resolve,
    Decode,
    Negotiate,
    Open,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Resolve => "resolve",
            PipelineStage::Decode => "decode",
            PipelineStage::Negotiate => "negotiate",
            PipelineStage::Open => "open line",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A play pipeline failure with enough context to diagnose it from the logs
#[derive(Debug, Error)]
#[error("{stage} failed for {url}: {source}")]
pub struct PipelineFailure {
    pub url: String,
    pub stage: PipelineStage,
    #[source]
    pub source: PlayerError,
}

impl PipelineFailure {
    pub fn new(url: impl Into<String>, stage: PipelineStage, source: impl Into<PlayerError>) -> Self {
        Self {
            url: url.into(),
            stage,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        self.source.kind()
    }
}

/// Error severity levels for logging and user feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Info => "INFO",
            ErrorSeverity::Warning => "WARNING",
            ErrorSeverity::Error => "ERROR",
            ErrorSeverity::Critical => "CRITICAL",
        }
    }

    pub fn log_level(&self) -> log::Level {
        match self {
            ErrorSeverity::Info => log::Level::Info,
            ErrorSeverity::Warning => log::Level::Warn,
            ErrorSeverity::Error => log::Level::Error,
            ErrorSeverity::Critical => log::Level::Error,
        }
    }
}

/// Source resolution errors
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Unsupported source {url}: {reason}")]
    UnsupportedSource { url: String, reason: String },

    #[error("Extraction failed for {url}: {reason}")]
    ExtractionFailed { url: String, reason: String },
}

impl ResolveError {
    pub fn unsupported(url: &str, reason: impl Into<String>) -> Self {
        ResolveError::UnsupportedSource {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    pub fn extraction(url: &str, reason: impl Into<String>) -> Self {
        ResolveError::ExtractionFailed {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ResolveError::UnsupportedSource { .. } => ErrorKind::UnsupportedSource,
            ResolveError::ExtractionFailed { .. } => ErrorKind::ExtractionFailed,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            ResolveError::UnsupportedSource { reason, .. } => {
                format!("This link cannot be played: {}", reason)
            }
            ResolveError::ExtractionFailed { reason, .. } => {
                format!("Could not download the audio: {}", reason)
            }
        }
    }
}

/// Audio-related errors
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Format unsupported: {format}")]
    FormatUnsupported { format: String },

    #[error("Audio line unavailable for {format}: {reason}")]
    LineUnavailable { format: String, reason: String },

    #[error("Decode failed: {0}")]
    DecodeFailed(String),

    #[error("Device not found: {device}")]
    DeviceNotFound { device: String },

    #[error("Audio initialization failed: {0}")]
    InitializationFailed(String),
}

impl AudioError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            AudioError::FormatUnsupported { .. } => Some(ErrorKind::FormatUnsupported),
            AudioError::LineUnavailable { .. } => Some(ErrorKind::LineUnavailable),
            AudioError::DecodeFailed(_) => Some(ErrorKind::DecodeFailed),
            AudioError::DeviceNotFound { .. } | AudioError::InitializationFailed(_) => None,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            AudioError::FormatUnsupported { format } => {
                format!("Audio format '{}' is not supported", format)
            }
            AudioError::LineUnavailable { format, .. } => {
                format!("The audio device cannot play {}", format)
            }
            AudioError::DecodeFailed(msg) => {
                format!("Failed to read the audio stream: {}", msg)
            }
            AudioError::DeviceNotFound { device } => {
                format!("Audio device '{}' is not available or has been disconnected", device)
            }
            AudioError::InitializationFailed(msg) => {
                format!("Failed to initialize audio system: {}", msg)
            }
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            AudioError::FormatUnsupported { .. } => true, // Skip to the next track
            AudioError::LineUnavailable { .. } => true,
            AudioError::DecodeFailed(_) => true,
            AudioError::DeviceNotFound { .. } => true, // Can fall back to the default device
            AudioError::InitializationFailed(_) => false,
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found")]
    ConfigDirNotFound,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    DeserializationError(#[from] toml::de::Error),
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::ConfigDirNotFound => {
                "Cannot find or create configuration directory".to_string()
            }
            ConfigError::IoError(err) => {
                format!("Cannot access configuration file: {}", err)
            }
            ConfigError::SerializationError(_) => {
                "Failed to save configuration settings".to_string()
            }
            ConfigError::DeserializationError(_) => {
                "Configuration file is corrupted or has invalid format".to_string()
            }
        }
    }
}
