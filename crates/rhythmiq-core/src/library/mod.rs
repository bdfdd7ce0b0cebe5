//! Music library: liked tracks, playlists and the player.

mod player;

pub use player::{Player, PlayerSession, PlayerState};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::achievements::{AchievementEvaluator, RequirementType};
use crate::error::{Result, ValidationError};

/// Name of the playlist created on first "add to playlist".
pub const DEFAULT_PLAYLIST: &str = "My Playlist";

/// A streamable track. `id` is the video id of the source stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub thumbnail: String,
    /// Display duration, e.g. "3:45" or "Live".
    pub duration: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub tracks: Vec<String>,
}

/// Result of toggling a like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LikeToggle {
    Liked,
    Unliked,
}

pub trait LibraryStore: Send + Sync {
    fn list_tracks(&self) -> Result<Vec<Track>>;

    fn liked_tracks(&self, user: Uuid) -> Result<Vec<String>>;

    /// `false` if the track was already liked.
    fn like_track(&self, user: Uuid, track_id: &str) -> Result<bool>;

    fn unlike_track(&self, user: Uuid, track_id: &str) -> Result<()>;

    /// Oldest first, with their track ids.
    fn list_playlists(&self, user: Uuid) -> Result<Vec<Playlist>>;

    fn create_playlist(&self, user: Uuid, name: &str, now: DateTime<Utc>) -> Result<Playlist>;

    fn delete_playlist(&self, user: Uuid, playlist_id: Uuid) -> Result<()>;

    /// `false` if the track was already in the playlist.
    fn add_to_playlist(&self, user: Uuid, playlist_id: Uuid, track_id: &str) -> Result<bool>;
}

pub struct Library {
    user: Uuid,
    store: Arc<dyn LibraryStore>,
    evaluator: AchievementEvaluator,
}

impl Library {
    pub fn new(user: Uuid, store: Arc<dyn LibraryStore>, evaluator: AchievementEvaluator) -> Self {
        Self {
            user,
            store,
            evaluator,
        }
    }

    pub fn tracks(&self) -> Result<Vec<Track>> {
        self.store.list_tracks()
    }

    pub fn track(&self, track_id: &str) -> Result<Track> {
        self.store
            .list_tracks()?
            .into_iter()
            .find(|t| t.id == track_id)
            .ok_or_else(|| {
                ValidationError::NotFound {
                    kind: "Track",
                    id: track_id.to_string(),
                }
                .into()
            })
    }

    pub fn liked(&self) -> Result<Vec<String>> {
        self.store.liked_tracks(self.user)
    }

    pub fn playlists(&self) -> Result<Vec<Playlist>> {
        self.store.list_playlists(self.user)
    }

    pub fn toggle_like(&self, track_id: &str) -> Result<LikeToggle> {
        self.track(track_id)?;
        if self.liked()?.iter().any(|id| id == track_id) {
            self.store.unlike_track(self.user, track_id)?;
            return Ok(LikeToggle::Unliked);
        }
        self.store.like_track(self.user, track_id)?;
        let count = self.liked()?.len() as u64;
        self.check(RequirementType::LikedTracks, count);
        Ok(LikeToggle::Liked)
    }

    pub fn create_playlist(&self, name: &str, now: DateTime<Utc>) -> Result<Playlist> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyText("Playlist name").into());
        }
        let playlist = self.store.create_playlist(self.user, name, now)?;
        info!(user = %self.user, playlist = %playlist.id, "Playlist created");
        let count = self.playlists()?.len() as u64;
        self.check(RequirementType::PlaylistsCreated, count);
        Ok(playlist)
    }

    pub fn delete_playlist(&self, playlist_id: Uuid) -> Result<()> {
        self.store.delete_playlist(self.user, playlist_id)
    }

    /// Add a track to `playlist`, or to the user's first playlist, creating
    /// [`DEFAULT_PLAYLIST`] when there is none.
    pub fn add_to_playlist(
        &self,
        track_id: &str,
        playlist: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Playlist> {
        self.track(track_id)?;
        let playlists = self.playlists()?;
        let target = match playlist {
            Some(id) => playlists
                .into_iter()
                .find(|p| p.id == id)
                .ok_or_else(|| ValidationError::NotFound {
                    kind: "Playlist",
                    id: id.to_string(),
                })?,
            None => match playlists.into_iter().next() {
                Some(p) => p,
                None => self.create_playlist(DEFAULT_PLAYLIST, now)?,
            },
        };
        if !self.store.add_to_playlist(self.user, target.id, track_id)? {
            return Err(ValidationError::InvalidValue {
                field: "track".into(),
                message: format!("{track_id} is already in {}", target.name),
            }
            .into());
        }
        self.playlists()?
            .into_iter()
            .find(|p| p.id == target.id)
            .ok_or_else(|| {
                ValidationError::NotFound {
                    kind: "Playlist",
                    id: target.id.to_string(),
                }
                .into()
            })
    }

    fn check(&self, requirement: RequirementType, value: u64) {
        if let Err(e) = self.evaluator.check_and_unlock(self.user, requirement, value) {
            warn!(user = %self.user, %requirement, error = %e, "Achievement check failed");
        }
    }
}
