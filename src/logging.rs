use log::{debug, info, trace, warn, error};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use chrono::{DateTime, Utc};

/// Playback event for logging and diagnostics
#[derive(Debug, Clone)]
pub struct PlaybackEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: PlaybackEventType,
    pub duration: Option<Duration>,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEventType {
    TrackResolving,
    PlaybackStarted,
    PlaybackPaused,
    PlaybackResumed,
    PlaybackStopped,
    TrackLooped,
    TrackSkipped,
    PipelineFailed,
    StaleResultDiscarded,
}

impl PlaybackEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackEventType::TrackResolving => "TRACK_RESOLVING",
            PlaybackEventType::PlaybackStarted => "PLAYBACK_STARTED",
            PlaybackEventType::PlaybackPaused => "PLAYBACK_PAUSED",
            PlaybackEventType::PlaybackResumed => "PLAYBACK_RESUMED",
            PlaybackEventType::PlaybackStopped => "PLAYBACK_STOPPED",
            PlaybackEventType::TrackLooped => "TRACK_LOOPED",
            PlaybackEventType::TrackSkipped => "TRACK_SKIPPED",
            PlaybackEventType::PipelineFailed => "PIPELINE_FAILED",
            PlaybackEventType::StaleResultDiscarded => "STALE_RESULT_DISCARDED",
        }
    }
}

/// Initialize the `log` backend.
///
/// Level comes from `JUKEBOX_LOG_LEVEL` (trace/debug/info/warn/error), default info.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let log_level = std::env::var("JUKEBOX_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let mut builder = env_logger::Builder::new();

    builder.format(|buf, record| {
        use std::io::Write;
        writeln!(
            buf,
            "{} [{}] [{}:{}] {}",
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.file().unwrap_or("unknown"),
            record.line().unwrap_or(0),
            record.args()
        )
    });

    match log_level.to_lowercase().as_str() {
        "trace" => builder.filter_level(log::LevelFilter::Trace),
        "debug" => builder.filter_level(log::LevelFilter::Debug),
        "info" => builder.filter_level(log::LevelFilter::Info),
        "warn" => builder.filter_level(log::LevelFilter::Warn),
        "error" => builder.filter_level(log::LevelFilter::Error),
        _ => builder.filter_level(log::LevelFilter::Info),
    };

    builder.try_init()?;

    info!("Jukebox logging initialized with level: {}", log_level);
    Ok(())
}

/// Records playback events into a bounded history and forwards them to `log`
#[derive(Clone)]
pub struct PlaybackLogger {
    events: Arc<Mutex<VecDeque<PlaybackEvent>>>,
    max_events: usize,
}

impl PlaybackLogger {
    pub fn new() -> Self {
        Self::with_capacity(1000)
    }

    pub fn with_capacity(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
            max_events: max_events.max(1),
        }
    }

    pub fn log_event(&self, event_type: PlaybackEventType, details: String, duration: Option<Duration>) {
        match event_type {
            PlaybackEventType::TrackResolving
            | PlaybackEventType::PlaybackStarted
            | PlaybackEventType::PlaybackPaused
            | PlaybackEventType::PlaybackResumed
            | PlaybackEventType::PlaybackStopped
            | PlaybackEventType::TrackSkipped => {
                info!("[{}] {}", event_type.as_str(), details);
            }
            PlaybackEventType::TrackLooped | PlaybackEventType::StaleResultDiscarded => {
                debug!("[{}] {}", event_type.as_str(), details);
            }
            PlaybackEventType::PipelineFailed => {
                error!("[{}] {}", event_type.as_str(), details);
            }
        }

        let event = PlaybackEvent {
            timestamp: Utc::now(),
            event_type,
            duration,
            details,
        };

        // A poisoned history is still usable; never let diagnostics take playback down
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.push_back(event);
        while events.len() > self.max_events {
            events.pop_front();
        }
    }

    pub fn log_resolving(&self, url: &str) {
        self.log_event(PlaybackEventType::TrackResolving, format!("Resolving: {}", url), None);
    }

    pub fn log_playback_started(&self, title: &str, format_info: &str, took: Duration) {
        self.log_event(
            PlaybackEventType::PlaybackStarted,
            format!("Started playing: {} ({})", title, format_info),
            Some(took),
        );
    }

    pub fn log_paused(&self, title: &str) {
        self.log_event(PlaybackEventType::PlaybackPaused, format!("Paused: {}", title), None);
    }

    pub fn log_resumed(&self, title: &str) {
        self.log_event(PlaybackEventType::PlaybackResumed, format!("Resumed: {}", title), None);
    }

    pub fn log_stopped(&self, reason: &str) {
        self.log_event(PlaybackEventType::PlaybackStopped, format!("Playback stopped: {}", reason), None);
    }

    pub fn log_looped(&self, title: &str, play_count: u32) {
        self.log_event(
            PlaybackEventType::TrackLooped,
            format!("Looping {} (play #{})", title, play_count),
            None,
        );
    }

    pub fn log_skipped(&self, title: &str) {
        self.log_event(PlaybackEventType::TrackSkipped, format!("Skipped: {}", title), None);
    }

    pub fn log_pipeline_failure(&self, failure: &crate::error::PipelineFailure) {
        let kind = failure.kind().map(|k| k.as_str()).unwrap_or("Other");
        self.log_event(
            PlaybackEventType::PipelineFailed,
            format!("[{}] {}", kind, failure),
            None,
        );
    }

    pub fn log_stale_result(&self, url: &str) {
        self.log_event(
            PlaybackEventType::StaleResultDiscarded,
            format!("Discarding late result for {}", url),
            None,
        );
    }

    /// Get recent events, oldest first
    pub fn get_recent_events(&self, count: usize) -> Vec<PlaybackEvent> {
        let events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        let skip = events.len().saturating_sub(count);
        events.iter().skip(skip).cloned().collect()
    }

    pub fn count(&self, event_type: PlaybackEventType) -> usize {
        let events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.iter().filter(|e| e.event_type == event_type).count()
    }
}

impl Default for PlaybackLogger {
    fn default() -> Self {
        Self::new()
    }
}

/// Timer utility for measuring operation durations
pub struct OperationTimer {
    start_time: Instant,
    operation_name: String,
}

impl OperationTimer {
    pub fn new(operation_name: impl Into<String>) -> Self {
        let operation_name = operation_name.into();
        trace!("Starting operation: {}", operation_name);
        Self {
            start_time: Instant::now(),
            operation_name,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn finish(self) -> Duration {
        let duration = self.elapsed();
        trace!("Completed operation '{}' in {}ms", self.operation_name, duration.as_millis());
        duration
    }

    pub fn finish_with_threshold(self, threshold: Duration) -> Duration {
        let duration = self.elapsed();
        if duration > threshold {
            warn!(
                "Operation '{}' took {}ms (threshold: {}ms)",
                self.operation_name,
                duration.as_millis(),
                threshold.as_millis()
            );
        } else {
            debug!("Completed operation '{}' in {}ms", self.operation_name, duration.as_millis());
        }
        duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_logger_starts_empty() {
        let logger = PlaybackLogger::new();
        assert_eq!(logger.max_events, 1000);
        assert!(logger.get_recent_events(10).is_empty());
    }

    #[test]
    fn test_log_event() {
        let logger = PlaybackLogger::new();
        logger.log_event(PlaybackEventType::PlaybackStarted, "Test playback".to_string(), None);

        let events = logger.get_recent_events(1);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].details, "Test playback");
        assert_eq!(events[0].event_type, PlaybackEventType::PlaybackStarted);
    }

    #[test]
    fn test_event_history_limit() {
        let logger = PlaybackLogger::with_capacity(3);
        for i in 0..5 {
            logger.log_event(PlaybackEventType::TrackSkipped, format!("Event {}", i), None);
        }

        let events = logger.get_recent_events(10);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].details, "Event 2");
        assert_eq!(events[2].details, "Event 4");
    }

    #[test]
    fn test_recent_events_returns_newest_in_order() {
        let logger = PlaybackLogger::new();
        logger.log_paused("A");
        logger.log_resumed("A");
        logger.log_stopped("Queue empty");

        let events = logger.get_recent_events(2);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, PlaybackEventType::PlaybackResumed);
        assert_eq!(events[1].event_type, PlaybackEventType::PlaybackStopped);
    }

    #[test]
    fn test_count_by_type() {
        let logger = PlaybackLogger::new();
        logger.log_looped("A", 2);
        logger.log_looped("A", 3);
        logger.log_skipped("A");

        assert_eq!(logger.count(PlaybackEventType::TrackLooped), 2);
        assert_eq!(logger.count(PlaybackEventType::TrackSkipped), 1);
    }

    #[test]
    fn test_operation_timer() {
        let timer = OperationTimer::new("test_operation");
        thread::sleep(Duration::from_millis(10));
        assert!(timer.finish() >= Duration::from_millis(10));
    }

    #[test]
    fn test_event_type_as_str() {
        assert_eq!(PlaybackEventType::PipelineFailed.as_str(), "PIPELINE_FAILED");
        assert_eq!(PlaybackEventType::StaleResultDiscarded.as_str(), "STALE_RESULT_DISCARDED");
    }
}
