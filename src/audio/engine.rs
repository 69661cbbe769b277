use std::sync::Arc;

use tokio::sync::mpsc;

use crate::audio::{AudioBackend, AudioLine, PlayableStream, StopCallback, StreamFormat};
use crate::error::AudioError;
use crate::models::{SessionId, Volume};

/// Asynchronous notifications from the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    /// The line for `session` stopped: paused, or played to its end
    Ended { session: SessionId },
}

struct ActiveLine {
    session: SessionId,
    format: StreamFormat,
    line: Box<dyn AudioLine>,
}

/// Owns the single open audio line.
///
/// Opening a line always releases the previous one first. Every stop of the
/// line, including a pause, is reported as [`EngineEvent::Ended`]; telling the
/// two apart is the caller's job.
pub struct PlaybackEngine {
    backend: Arc<dyn AudioBackend>,
    events: mpsc::UnboundedSender<EngineEvent>,
    active: Option<ActiveLine>,
    volume: Volume,
    next_session: u64,
}

impl PlaybackEngine {
    pub fn new(backend: Arc<dyn AudioBackend>, events: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self {
            backend,
            events,
            active: None,
            volume: Volume::default(),
            next_session: 1,
        }
    }

    /// Open a line for `stream`, apply the current volume and start it
    pub fn start(&mut self, stream: PlayableStream) -> Result<SessionId, AudioError> {
        self.release();

        let format = stream.format;
        if !self.backend.is_line_supported(&format) {
            return Err(AudioError::LineUnavailable {
                format: format.to_string(),
                reason: "output does not accept this format".to_string(),
            });
        }

        let session = SessionId(self.next_session);
        self.next_session += 1;

        let sender = self.events.clone();
        let on_stop: StopCallback = Arc::new(move || {
            let _ = sender.send(EngineEvent::Ended { session });
        });

        let mut line = self.backend.open_line(stream, on_stop)?;
        Self::apply_gain(line.as_mut(), self.volume);

        if let Err(e) = line.start() {
            line.close();
            return Err(e);
        }

        log::debug!("Opened line for {} ({})", session, format);
        self.active = Some(ActiveLine { session, format, line });
        Ok(session)
    }

    /// Stop the line but keep it loaded. Returns false when nothing is open.
    pub fn pause(&mut self) -> bool {
        match self.active.as_mut() {
            Some(active) => {
                active.line.stop();
                true
            }
            None => false,
        }
    }

    pub fn resume(&mut self) -> Result<(), AudioError> {
        match self.active.as_mut() {
            Some(active) => active.line.start(),
            None => Err(AudioError::LineUnavailable {
                format: "none".to_string(),
                reason: "no line is open".to_string(),
            }),
        }
    }

    /// Rewind the open line to frame zero and start it again
    pub fn restart(&mut self) -> Result<(), AudioError> {
        match self.active.as_mut() {
            Some(active) => {
                active.line.rewind();
                active.line.start()
            }
            None => Err(AudioError::LineUnavailable {
                format: "none".to_string(),
                reason: "no line is open".to_string(),
            }),
        }
    }

    /// Release the line without reporting a stop
    pub fn stop(&mut self) {
        self.release();
    }

    pub fn set_volume(&mut self, volume: Volume) {
        self.volume = volume;
        if let Some(active) = self.active.as_mut() {
            Self::apply_gain(active.line.as_mut(), volume);
        }
    }

    pub fn volume(&self) -> Volume {
        self.volume
    }

    pub fn active_session(&self) -> Option<SessionId> {
        self.active.as_ref().map(|a| a.session)
    }

    pub fn active_format(&self) -> Option<StreamFormat> {
        self.active.as_ref().map(|a| a.format)
    }

    pub fn position_frames(&self) -> u64 {
        self.active.as_ref().map(|a| a.line.position_frames()).unwrap_or(0)
    }

    fn release(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.line.close();
            log::debug!("Released line for {}", active.session);
        }
    }

    fn apply_gain(line: &mut dyn AudioLine, volume: Volume) {
        match line.gain_range() {
            Some((min_db, max_db)) => line.set_gain(volume.to_decibels(min_db, max_db)),
            None => log::debug!("Line has no gain control; volume {} ignored", volume.percent()),
        }
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.release();
    }
}
