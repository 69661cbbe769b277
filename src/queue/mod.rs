use std::collections::VecDeque;

use crate::models::Track;

/// Core trait for queue management functionality
pub trait QueueManager: Send {
    /// Append a track to the back of the queue
    fn enqueue(&mut self, track: Track);

    /// Remove and return the track at the front
    fn next(&mut self) -> Option<Track>;

    /// Remove every pending track
    fn clear(&mut self);

    /// Number of pending tracks
    fn size(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Pending tracks in play order
    fn snapshot(&self) -> Vec<Track>;

    fn is_looping(&self) -> bool;

    fn set_looping(&mut self, looping: bool);

    /// Flip the loop flag and return the new value
    fn toggle_looping(&mut self) -> bool {
        let looping = !self.is_looping();
        self.set_looping(looping);
        looping
    }
}

/// FIFO of pending tracks plus the loop flag.
///
/// Looping repeats whatever is currently playing; it never cycles the queue.
#[derive(Debug, Default)]
pub struct QueueController {
    pending: VecDeque<Track>,
    looping: bool,
}

impl QueueController {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QueueManager for QueueController {
    fn enqueue(&mut self, track: Track) {
        log::debug!("Queued {} (position {})", track.url(), self.pending.len() + 1);
        self.pending.push_back(track);
    }

    fn next(&mut self) -> Option<Track> {
        self.pending.pop_front()
    }

    fn clear(&mut self) {
        if !self.pending.is_empty() {
            log::debug!("Cleared {} queued track(s)", self.pending.len());
        }
        self.pending.clear();
    }

    fn size(&self) -> usize {
        self.pending.len()
    }

    fn snapshot(&self) -> Vec<Track> {
        self.pending.iter().cloned().collect()
    }

    fn is_looping(&self) -> bool {
        self.looping
    }

    fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }
}
