use std::time::Duration;

use crate::error::{AudioError, ErrorSeverity, PlayerError, ResolveError};
use crate::logging::PlaybackEvent;
use crate::models::{PlaybackNotification, PlaybackState, PlayerStatus};

/// Status display formatter for the host console
pub struct StatusDisplay;

impl StatusDisplay {
    /// Display the full controller snapshot
    pub fn display_full_status(status: &PlayerStatus) {
        println!("┌─ Jukebox Status ────────────────────────────────────────┐");
        println!("│ Track: {}", Self::truncate(&status.current_title, 50));
        if let Some(url) = &status.current_url {
            println!("│ URL: {}", Self::truncate(url, 52));
        }
        println!("│ Status: {}", Self::format_playback_state(status.state));

        if let Some(session) = status.session {
            println!("│ Session: {} (play #{})", session, status.play_count);
            println!("│ Position: {}", Self::format_duration(status.position));
        }
        if let Some(format) = &status.audio_format {
            println!("│ Format: {}", Self::truncate(format, 49));
        }

        println!("│");
        println!("│ Volume: {:.0}%", status.volume);
        println!("│ Loop: {}", if status.looping { "on" } else { "off" });
        println!("│ Queue: {} track(s)", status.queue_size());
        println!("└─────────────────────────────────────────────────────────┘");
    }

    /// The HUD line shown for a playback notification
    pub fn format_notification(notification: &PlaybackNotification) -> String {
        let icon = if notification.is_playing { "▶" } else { "■" };
        format!("{} {}", icon, notification.title)
    }

    pub fn display_notification(notification: &PlaybackNotification) {
        println!("{}", Self::format_notification(notification));
    }

    pub fn display_queue(queue: &[String]) {
        if queue.is_empty() {
            println!("Queue is empty");
            return;
        }
        println!("Queue ({} tracks):", queue.len());
        for (i, url) in queue.iter().enumerate() {
            println!("  {}: {}", i + 1, Self::truncate(url, 70));
        }
    }

    pub fn display_events(events: &[PlaybackEvent]) {
        if events.is_empty() {
            println!("No playback events recorded");
            return;
        }
        for event in events {
            println!("{}", Self::format_event(event));
        }
    }

    pub fn format_event(event: &PlaybackEvent) -> String {
        let mut line = format!(
            "{} [{}] {}",
            event.timestamp.format("%H:%M:%S"),
            event.event_type.as_str(),
            event.details
        );
        if let Some(duration) = event.duration {
            line.push_str(&format!(" ({}ms)", duration.as_millis()));
        }
        line
    }

    /// Display error message with formatting and a hint where one helps
    pub fn display_error(error: &PlayerError) {
        let severity = error.severity();
        let severity_icon = match severity {
            ErrorSeverity::Info => "ℹ",
            ErrorSeverity::Warning => "⚠",
            ErrorSeverity::Error => "✗",
            ErrorSeverity::Critical => "🔥",
        };

        eprintln!(
            "┌─ {} {} ─────────────────────────────────────────────────┐",
            severity_icon,
            severity.as_str()
        );
        for line in Self::wrap_text(&error.user_message(), 55) {
            eprintln!("│ {}", line);
        }
        if let Some(hint) = Self::error_hint(error) {
            eprintln!("│");
            eprintln!("│ {}", hint);
        }
        eprintln!("└─────────────────────────────────────────────────────────┘");
    }

    fn error_hint(error: &PlayerError) -> Option<&'static str> {
        match error {
            PlayerError::Source(ResolveError::UnsupportedSource { .. }) => {
                Some("Supported: local files, direct audio links, YouTube")
            }
            PlayerError::Source(ResolveError::ExtractionFailed { .. }) => {
                Some("Check that yt-dlp is installed or set JUKEBOX_YTDLP")
            }
            PlayerError::Audio(AudioError::DeviceNotFound { .. }) => {
                Some("Use 'devices' to see available outputs")
            }
            PlayerError::Config(_) => Some("Configuration will use default values"),
            _ => None,
        }
    }

    /// Wrap text to fit within specified width
    fn wrap_text(text: &str, width: usize) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current_line = String::new();

        for word in text.split_whitespace() {
            if current_line.is_empty() {
                current_line = word.to_string();
            } else if current_line.chars().count() + word.chars().count() < width {
                current_line.push(' ');
                current_line.push_str(word);
            } else {
                lines.push(current_line);
                current_line = word.to_string();
            }
        }

        if !current_line.is_empty() {
            lines.push(current_line);
        }
        lines
    }

    /// Format duration as MM:SS or HH:MM:SS for longer tracks
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
        } else {
            format!("{:02}:{:02}", minutes, seconds)
        }
    }

    /// Truncate string to fit display width
    pub fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len || max_len <= 3 {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len - 3).collect();
            format!("{}...", kept)
        }
    }

    pub fn format_playback_state(state: PlaybackState) -> String {
        match state {
            PlaybackState::Idle => "■ Idle".to_string(),
            PlaybackState::Resolving => "… Resolving".to_string(),
            PlaybackState::Playing => "▶ Playing".to_string(),
            PlaybackState::Paused => "⏸ Paused".to_string(),
            PlaybackState::Stopping => "■ Stopping".to_string(),
        }
    }
}
