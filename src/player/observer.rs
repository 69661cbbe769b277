use std::panic::{catch_unwind, AssertUnwindSafe};

use tokio::sync::mpsc;

use crate::models::PlaybackNotification;

/// Receives playback transitions from the controller.
///
/// Calls are made from the controller task, so implementations must return
/// quickly; hand anything slow off to another thread or channel.
pub trait PlaybackObserver: Send + Sync {
    fn on_playback_state_changed(&self, is_playing: bool, title: &str);

    /// A track was skipped on request. Default does nothing.
    fn on_track_skipped(&self, _title: &str) {}
}

/// Writes every transition to the log
#[derive(Debug, Default)]
pub struct LogObserver;

impl PlaybackObserver for LogObserver {
    fn on_playback_state_changed(&self, is_playing: bool, title: &str) {
        if is_playing {
            log::info!("Now playing: {}", title);
        } else {
            log::info!("Not playing: {}", title);
        }
    }

    fn on_track_skipped(&self, title: &str) {
        log::info!("Skipped: {}", title);
    }
}

/// Forwards transitions as [`PlaybackNotification`]s to a channel, e.g. a HUD
/// render loop
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<PlaybackNotification>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PlaybackNotification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl PlaybackObserver for ChannelObserver {
    fn on_playback_state_changed(&self, is_playing: bool, title: &str) {
        // A dropped receiver only means nobody is watching anymore
        let _ = self.sender.send(PlaybackNotification::new(is_playing, title));
    }
}

/// Invoke the observer, containing any panic so it cannot take down the controller
pub(crate) fn notify(observer: &dyn PlaybackObserver, is_playing: bool, title: &str) {
    let result = catch_unwind(AssertUnwindSafe(|| {
        observer.on_playback_state_changed(is_playing, title)
    }));
    if result.is_err() {
        log::error!("Playback observer panicked handling '{}'", title);
    }
}

pub(crate) fn notify_skipped(observer: &dyn PlaybackObserver, title: &str) {
    if catch_unwind(AssertUnwindSafe(|| observer.on_track_skipped(title))).is_err() {
        log::error!("Playback observer panicked handling skip of '{}'", title);
    }
}
