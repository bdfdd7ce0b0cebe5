//! Track and playlist commands.

use chrono::Utc;
use clap::Subcommand;
use rhythmiq_core::library::LikeToggle;
use rhythmiq_core::{Library, Player, ValidationError};
use serde_json::json;
use uuid::Uuid;

use super::{print_json, App, CmdResult};

#[derive(Subcommand)]
pub enum TrackAction {
    /// List the track catalog
    List {
        /// Only liked tracks
        #[arg(long)]
        liked: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Like a track, or unlike it if already liked
    Like {
        /// Track ID
        id: String,
    },
    /// Load a track into the player and show what plays next
    Play {
        /// Track ID
        id: String,
        /// Queue only liked tracks
        #[arg(long)]
        liked: bool,
    },
}

#[derive(Subcommand)]
pub enum PlaylistAction {
    /// List playlists with their tracks
    List,
    /// Create an empty playlist
    Create {
        name: String,
    },
    /// Delete a playlist
    Delete {
        /// Playlist ID
        id: Uuid,
    },
    /// Add a track to a playlist
    Add {
        /// Track ID
        track: String,
        /// Playlist ID (default: your first playlist, created if missing)
        #[arg(long)]
        playlist: Option<Uuid>,
    },
}

fn open_library() -> Result<Library, Box<dyn std::error::Error>> {
    let app = App::open()?;
    let user = app.require_user()?;
    Ok(Library::new(user.id, app.backend.clone(), app.evaluator()))
}

pub fn run_track(action: TrackAction) -> CmdResult {
    let library = open_library()?;

    match action {
        TrackAction::List { liked, json } => {
            let liked_ids = library.liked()?;
            let tracks: Vec<_> = library
                .tracks()?
                .into_iter()
                .filter(|t| !liked || liked_ids.contains(&t.id))
                .collect();
            if json {
                return print_json(&tracks);
            }
            for track in &tracks {
                let heart = if liked_ids.contains(&track.id) { "<3" } else { "  " };
                println!(
                    "{heart} {:<12} {:>6}  {} - {}",
                    track.id, track.duration, track.artist, track.title
                );
            }
        }
        TrackAction::Like { id } => match library.toggle_like(&id)? {
            LikeToggle::Liked => println!("liked {id}"),
            LikeToggle::Unliked => println!("unliked {id}"),
        },
        TrackAction::Play { id, liked } => {
            let mut queue = library.tracks()?;
            if liked {
                let liked_ids = library.liked()?;
                queue.retain(|t| liked_ids.contains(&t.id));
            }
            let mut player = Player::new(queue);
            player.select(&id).ok_or_else(|| ValidationError::NotFound {
                kind: "Track",
                id: id.clone(),
            })?;
            let now_playing = player.play().cloned();
            let queue = player.queue();
            let up_next = queue
                .iter()
                .position(|t| Some(t) == now_playing.as_ref())
                .filter(|_| queue.len() > 1)
                .map(|i| &queue[(i + 1) % queue.len()]);
            print_json(&json!({
                "now_playing": now_playing,
                "up_next": up_next,
                "state": player.session().map(|s| s.state()),
                "volume": player.volume(),
            }))?;
        }
    }
    Ok(())
}

pub fn run_playlist(action: PlaylistAction) -> CmdResult {
    let library = open_library()?;
    let now = Utc::now();

    match action {
        PlaylistAction::List => print_json(&library.playlists()?)?,
        PlaylistAction::Create { name } => {
            let playlist = library.create_playlist(&name, now)?;
            println!("Playlist created: {}", playlist.id);
        }
        PlaylistAction::Delete { id } => {
            library.delete_playlist(id)?;
            println!("Playlist deleted: {id}");
        }
        PlaylistAction::Add { track, playlist } => {
            let playlist = library.add_to_playlist(&track, playlist, now)?;
            println!(
                "added {track} to {} ({} tracks)",
                playlist.name,
                playlist.tracks.len()
            );
        }
    }
    Ok(())
}
