use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Track;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    Playing,
    Paused,
}

/// The live handle for one loaded track. Released when dropped.
#[derive(Debug)]
pub struct PlayerSession {
    track: Track,
    state: PlayerState,
    released: Arc<AtomicUsize>,
}

impl PlayerSession {
    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }
}

impl Drop for PlayerSession {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::Relaxed);
        debug!(track = %self.track.id, "Player session released");
    }
}

/// Plays a queue of tracks through at most one [`PlayerSession`] at a time.
///
/// Changing track drops the old session before the new one exists.
#[derive(Debug)]
pub struct Player {
    queue: Vec<Track>,
    index: usize,
    volume: u8,
    session: Option<PlayerSession>,
    released: Arc<AtomicUsize>,
}

impl Player {
    pub fn new(queue: Vec<Track>) -> Self {
        Self {
            queue,
            index: 0,
            volume: 50,
            session: None,
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn queue(&self) -> &[Track] {
        &self.queue
    }

    pub fn current(&self) -> Option<&Track> {
        self.queue.get(self.index)
    }

    pub fn session(&self) -> Option<&PlayerSession> {
        self.session.as_ref()
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.session.as_ref().map(|s| s.state), Some(PlayerState::Playing))
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Clamped to 0..=100.
    pub fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(100);
    }

    /// Number of sessions released so far.
    pub fn released_sessions(&self) -> usize {
        self.released.load(Ordering::Relaxed)
    }

    /// Play the current track, loading a session if none is live.
    pub fn play(&mut self) -> Option<&Track> {
        if self.session.is_none() {
            self.load(self.index, PlayerState::Playing);
        } else if let Some(session) = self.session.as_mut() {
            session.state = PlayerState::Playing;
        }
        self.current()
    }

    pub fn pause(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.state = PlayerState::Paused;
        }
    }

    pub fn toggle(&mut self) {
        if self.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Jump to a track in the queue. Keeps playing if it was playing.
    pub fn select(&mut self, track_id: &str) -> Option<&Track> {
        let index = self.queue.iter().position(|t| t.id == track_id)?;
        let state = self.resume_state();
        self.load(index, state);
        self.current()
    }

    pub fn next(&mut self) -> Option<&Track> {
        if self.queue.is_empty() {
            return None;
        }
        let state = self.resume_state();
        self.load((self.index + 1) % self.queue.len(), state);
        self.current()
    }

    pub fn previous(&mut self) -> Option<&Track> {
        if self.queue.is_empty() {
            return None;
        }
        let state = self.resume_state();
        let len = self.queue.len();
        self.load((self.index + len - 1) % len, state);
        self.current()
    }

    pub fn stop(&mut self) {
        self.session = None;
    }

    fn resume_state(&self) -> PlayerState {
        if self.is_playing() {
            PlayerState::Playing
        } else {
            PlayerState::Paused
        }
    }

    fn load(&mut self, index: usize, state: PlayerState) {
        self.session = None;
        self.index = index;
        self.session = self.queue.get(index).cloned().map(|track| PlayerSession {
            track,
            state,
            released: Arc::clone(&self.released),
        });
    }
}
