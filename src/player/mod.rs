//! The playback controller.
//!
//! All player state lives in one tokio task. [`PlayerHandle`] sends it
//! commands; resolution results and engine events come back to the same task
//! over internal channels, so every transition is applied in a single place
//! and in a single order.

pub mod observer;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::audio::{decoder, AudioBackend, EngineEvent, FormatNegotiator, PlayableStream, PlaybackEngine};
use crate::error::{PipelineFailure, PipelineStage, PlayerError};
use crate::logging::{OperationTimer, PlaybackEvent, PlaybackLogger};
use crate::models::{PlaybackState, PlayerStatus, SessionId, Track, Volume};
use crate::queue::{QueueController, QueueManager};
use crate::source::SourceResolver;

pub use observer::{ChannelObserver, LogObserver, PlaybackObserver};

const NO_TRACK_TITLE: &str = "No track playing";
const QUEUE_EMPTY_TITLE: &str = "Queue empty";
const STOPPED_TITLE: &str = "Playback stopped";

enum Command {
    Play(String),
    Enqueue(String),
    TogglePlayPause,
    Pause,
    Resume,
    Skip,
    Stop,
    ClearQueue,
    ToggleLoop,
    SetVolume(f32),
    Status(oneshot::Sender<PlayerStatus>),
    Shutdown(oneshot::Sender<()>),
}

/// Outcome of one resolve/decode/negotiate run
struct Prepared {
    request: u64,
    track: Track,
    outcome: Result<PlayableStream, PipelineFailure>,
    took: Duration,
}

/// Cheap, cloneable front door to the controller task.
///
/// Commands are fire-and-forget and applied in the order they were sent.
/// Queries wait for every command sent before them.
#[derive(Clone)]
pub struct PlayerHandle {
    commands: mpsc::UnboundedSender<Command>,
    logger: PlaybackLogger,
}

impl PlayerHandle {
    /// Start the controller task on the current tokio runtime
    pub fn spawn(
        resolver: Arc<SourceResolver>,
        backend: Arc<dyn AudioBackend>,
        observer: Arc<dyn PlaybackObserver>,
    ) -> Self {
        Self::spawn_with_logger(resolver, backend, observer, PlaybackLogger::new())
    }

    pub fn spawn_with_logger(
        resolver: Arc<SourceResolver>,
        backend: Arc<dyn AudioBackend>,
        observer: Arc<dyn PlaybackObserver>,
        logger: PlaybackLogger,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (prepared_tx, prepared_rx) = mpsc::unbounded_channel();
        let (engine_tx, engine_rx) = mpsc::unbounded_channel();

        let controller = PlaybackController {
            resolver,
            negotiator: Arc::new(FormatNegotiator::new(backend.clone())),
            engine: PlaybackEngine::new(backend, engine_tx),
            queue: Box::new(QueueController::new()),
            observer,
            logger: logger.clone(),
            state: PlaybackState::Idle,
            current: None,
            session: None,
            play_count: 0,
            operator_paused: false,
            request: 0,
            pipeline: None,
            prepared_tx,
        };
        tokio::spawn(controller.run(command_rx, prepared_rx, engine_rx));

        Self {
            commands: command_tx,
            logger,
        }
    }

    fn send(&self, command: Command) -> Result<(), PlayerError> {
        self.commands.send(command).map_err(|_| PlayerError::ControllerClosed)
    }

    /// Play `url` now, superseding anything playing or being resolved
    pub fn play(&self, url: impl Into<String>) -> Result<(), PlayerError> {
        self.send(Command::Play(url.into()))
    }

    pub fn add_to_queue(&self, url: impl Into<String>) -> Result<(), PlayerError> {
        self.send(Command::Enqueue(url.into()))
    }

    pub fn toggle_play_pause(&self) -> Result<(), PlayerError> {
        self.send(Command::TogglePlayPause)
    }

    pub fn pause(&self) -> Result<(), PlayerError> {
        self.send(Command::Pause)
    }

    pub fn resume(&self) -> Result<(), PlayerError> {
        self.send(Command::Resume)
    }

    pub fn skip(&self) -> Result<(), PlayerError> {
        self.send(Command::Skip)
    }

    /// Release the current track and go idle; the queue is kept
    pub fn stop(&self) -> Result<(), PlayerError> {
        self.send(Command::Stop)
    }

    pub fn clear_queue(&self) -> Result<(), PlayerError> {
        self.send(Command::ClearQueue)
    }

    pub fn toggle_loop(&self) -> Result<(), PlayerError> {
        self.send(Command::ToggleLoop)
    }

    /// Set the volume in percent; values outside `[0, 100]` are clamped
    pub fn set_volume(&self, percent: f32) -> Result<(), PlayerError> {
        self.send(Command::SetVolume(percent))
    }

    pub async fn status(&self) -> Result<PlayerStatus, PlayerError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Status(reply))?;
        response.await.map_err(|_| PlayerError::ControllerClosed)
    }

    pub async fn is_playing(&self) -> Result<bool, PlayerError> {
        Ok(self.status().await?.is_playing())
    }

    pub async fn current_track_title(&self) -> Result<String, PlayerError> {
        Ok(self.status().await?.current_title)
    }

    /// URL of the track being played, paused or resolved
    pub async fn current_track(&self) -> Result<Option<String>, PlayerError> {
        Ok(self.status().await?.current_url)
    }

    pub async fn queue_size(&self) -> Result<usize, PlayerError> {
        Ok(self.status().await?.queue_size())
    }

    /// Pending URLs in play order
    pub async fn queue(&self) -> Result<Vec<String>, PlayerError> {
        Ok(self.status().await?.queue)
    }

    pub async fn is_looping(&self) -> Result<bool, PlayerError> {
        Ok(self.status().await?.looping)
    }

    pub async fn volume(&self) -> Result<f32, PlayerError> {
        Ok(self.status().await?.volume)
    }

    /// The most recent playback events, oldest first
    pub fn recent_events(&self, count: usize) -> Vec<PlaybackEvent> {
        self.logger.get_recent_events(count)
    }

    pub fn logger(&self) -> &PlaybackLogger {
        &self.logger
    }

    /// Release the audio line and end the controller task
    pub async fn shutdown(&self) -> Result<(), PlayerError> {
        let (reply, done) = oneshot::channel();
        self.send(Command::Shutdown(reply))?;
        done.await.map_err(|_| PlayerError::ControllerClosed)
    }
}

struct PlaybackController {
    resolver: Arc<SourceResolver>,
    negotiator: Arc<FormatNegotiator>,
    engine: PlaybackEngine,
    queue: Box<dyn QueueManager>,
    observer: Arc<dyn PlaybackObserver>,
    logger: PlaybackLogger,
    state: PlaybackState,
    /// Track being resolved, played or paused
    current: Option<Track>,
    session: Option<SessionId>,
    play_count: u32,
    operator_paused: bool,
    /// Id of the only resolution whose result is still wanted
    request: u64,
    pipeline: Option<JoinHandle<()>>,
    prepared_tx: mpsc::UnboundedSender<Prepared>,
}

impl PlaybackController {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut prepared: mpsc::UnboundedReceiver<Prepared>,
        mut engine_events: mpsc::UnboundedReceiver<EngineEvent>,
    ) {
        log::debug!("Playback controller started");

        loop {
            // Engine events first: a pause's stop event must be seen before
            // any command queued behind the pause
            tokio::select! {
                biased;

                Some(event) = engine_events.recv() => self.on_engine_event(event),
                Some(result) = prepared.recv() => self.on_prepared(result),
                command = commands.recv() => match command {
                    Some(Command::Shutdown(done)) => {
                        self.shutdown();
                        let _ = done.send(());
                        break;
                    }
                    Some(command) => self.handle(command),
                    None => {
                        self.shutdown();
                        break;
                    }
                },
            }
        }

        log::debug!("Playback controller stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Play(url) => self.begin(Track::new(url)),
            Command::Enqueue(url) => {
                let track = Track::new(url);
                log::info!("Added to queue: {}", track.url());
                self.queue.enqueue(track);
                log::debug!("Queue size: {}", self.queue.size());
            }
            Command::TogglePlayPause => match self.state {
                PlaybackState::Playing => self.pause(),
                PlaybackState::Paused => self.resume(),
                _ => log::warn!("Nothing loaded to play or pause"),
            },
            Command::Pause => self.pause(),
            Command::Resume => self.resume(),
            Command::Skip => self.skip(),
            Command::Stop => self.stop(),
            Command::ClearQueue => self.queue.clear(),
            Command::ToggleLoop => {
                let looping = self.queue.toggle_looping();
                log::info!("Loop mode: {}", if looping { "ON" } else { "OFF" });
            }
            Command::SetVolume(percent) => {
                let volume = Volume::new(percent);
                self.engine.set_volume(volume);
                log::debug!("Volume set to {}%", volume.percent());
            }
            Command::Status(reply) => {
                let _ = reply.send(self.snapshot());
            }
            // Handled by the run loop
            Command::Shutdown(_) => {}
        }
    }

    /// Supersede everything and start resolving `track`
    fn begin(&mut self, track: Track) {
        self.teardown();

        self.request += 1;
        let request = self.request;
        self.state = PlaybackState::Resolving;
        self.current = Some(track.clone());
        self.logger.log_resolving(track.url());

        let resolver = Arc::clone(&self.resolver);
        let negotiator = Arc::clone(&self.negotiator);
        let results = self.prepared_tx.clone();

        // Superseded pipelines are left to finish; their results are discarded by id
        self.pipeline = Some(tokio::spawn(async move {
            let timer = OperationTimer::new(format!("prepare {}", track.url()));
            let outcome = prepare(&resolver, &negotiator, track.url()).await;
            let took = timer.finish();
            let _ = results.send(Prepared {
                request,
                track,
                outcome,
                took,
            });
        }));
    }

    fn on_prepared(&mut self, prepared: Prepared) {
        if prepared.request != self.request || self.state != PlaybackState::Resolving {
            self.logger.log_stale_result(prepared.track.url());
            return;
        }
        self.pipeline = None;

        let stream = match prepared.outcome {
            Ok(stream) => stream,
            Err(failure) => return self.fail(failure),
        };

        let format_info = stream.format.to_string();
        match self.engine.start(stream) {
            Ok(session) => {
                self.session = Some(session);
                self.play_count = 1;
                self.operator_paused = false;
                self.state = PlaybackState::Playing;

                let title = prepared.track.title().to_string();
                self.logger.log_playback_started(&title, &format_info, prepared.took);
                self.notify(true, &title);
            }
            Err(e) => self.fail(PipelineFailure::new(prepared.track.url(), PipelineStage::Open, e)),
        }
    }

    fn on_engine_event(&mut self, event: EngineEvent) {
        let EngineEvent::Ended { session } = event;

        if self.session != Some(session) {
            log::debug!("Ignoring stop of stale {}", session);
            return;
        }
        if self.operator_paused || self.state != PlaybackState::Playing {
            log::trace!("Line for {} stopped while paused", session);
            return;
        }

        if self.queue.is_looping() {
            match self.engine.restart() {
                Ok(()) => {
                    self.play_count += 1;
                    self.logger.log_looped(&self.current_title(), self.play_count);
                }
                Err(e) => {
                    let url = self.current_url().unwrap_or_default();
                    self.fail(PipelineFailure::new(url, PipelineStage::Open, e));
                }
            }
            return;
        }

        log::debug!("{} finished", session);
        self.advance();
    }

    fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            log::debug!("Pause ignored in state {}", self.state);
            return;
        }
        // Must be set before the line stops so its stop event is read as a pause
        self.operator_paused = true;
        self.engine.pause();
        self.state = PlaybackState::Paused;

        let title = self.current_title();
        self.logger.log_paused(&title);
        self.notify(false, &title);
    }

    fn resume(&mut self) {
        if self.state != PlaybackState::Paused {
            log::debug!("Resume ignored in state {}", self.state);
            return;
        }

        if let Err(e) = self.engine.resume() {
            let url = self.current_url().unwrap_or_default();
            return self.fail(PipelineFailure::new(url, PipelineStage::Open, e));
        }
        self.operator_paused = false;
        self.state = PlaybackState::Playing;

        let title = self.current_title();
        self.logger.log_resumed(&title);
        self.notify(true, &title);
    }

    fn skip(&mut self) {
        if let Some(track) = self.current.as_ref() {
            let title = track.title().to_string();
            self.logger.log_skipped(&title);
            observer::notify_skipped(self.observer.as_ref(), &title);
        }
        self.advance();
    }

    fn stop(&mut self) {
        self.teardown();
        self.request += 1;
        self.state = PlaybackState::Idle;
        self.logger.log_stopped("requested");
        self.notify(false, STOPPED_TITLE);
    }

    /// Play the next queued track, or go idle when there is none
    fn advance(&mut self) {
        self.teardown();
        match self.queue.next() {
            Some(track) => self.begin(track),
            None => {
                self.request += 1;
                self.state = PlaybackState::Idle;
                self.logger.log_stopped("queue empty");
                self.notify(false, QUEUE_EMPTY_TITLE);
            }
        }
    }

    fn fail(&mut self, failure: PipelineFailure) {
        self.logger.log_pipeline_failure(&failure);
        self.advance();
    }

    /// Release the current session without notifying anyone. Callers set
    /// the state that follows.
    fn teardown(&mut self) {
        if self.state != PlaybackState::Idle {
            self.state = PlaybackState::Stopping;
        }
        self.engine.stop();
        self.session = None;
        self.current = None;
        self.play_count = 0;
        self.operator_paused = false;
    }

    fn shutdown(&mut self) {
        self.teardown();
        self.request += 1;
        self.state = PlaybackState::Idle;
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.abort();
        }
    }

    fn notify(&self, is_playing: bool, title: &str) {
        observer::notify(self.observer.as_ref(), is_playing, title);
    }

    fn current_title(&self) -> String {
        self.current
            .as_ref()
            .map(|t| t.title().to_string())
            .unwrap_or_else(|| NO_TRACK_TITLE.to_string())
    }

    fn current_url(&self) -> Option<String> {
        self.current.as_ref().map(|t| t.url().to_string())
    }

    fn snapshot(&self) -> PlayerStatus {
        PlayerStatus {
            state: self.state,
            current_url: self.current_url(),
            current_title: self.current_title(),
            session: self.session,
            play_count: self.play_count,
            volume: self.engine.volume().percent(),
            looping: self.queue.is_looping(),
            operator_paused: self.operator_paused,
            queue: self.queue.snapshot().iter().map(|t| t.url().to_string()).collect(),
            audio_format: self.engine.active_format().map(|f| f.to_string()),
            position: self.position(),
        }
    }

    fn position(&self) -> Duration {
        match self.engine.active_format() {
            Some(format) if format.sample_rate > 0 => {
                Duration::from_secs_f64(self.engine.position_frames() as f64 / format.sample_rate as f64)
            }
            _ => Duration::ZERO,
        }
    }
}

/// Resolve, decode and negotiate off the controller task
async fn prepare(
    resolver: &SourceResolver,
    negotiator: &FormatNegotiator,
    url: &str,
) -> Result<PlayableStream, PipelineFailure> {
    let resource = resolver
        .resolve(url)
        .await
        .map_err(|e| PipelineFailure::new(url, PipelineStage::Resolve, e))?;

    let stream = decoder::decode_blocking(resource)
        .await
        .map_err(|e| PipelineFailure::new(url, PipelineStage::Decode, e))?;

    Ok(negotiator.negotiate(stream))
}
