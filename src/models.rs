use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A track observed on the playback provider during one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub provider_id: String,
    pub title: String,
    pub artist: String,
}

impl Track {
    pub fn new(provider_id: &str, title: &str, artist: &str) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            title: title.to_string(),
            artist: artist.to_string(),
        }
    }

    /// The key the history provider understands.
    pub fn identity(&self) -> TrackIdentity {
        TrackIdentity::new(&self.artist, &self.title)
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} – {}", self.artist, self.title)
    }
}

/// Name-based track key: trimmed, compared case-insensitively.
///
/// Two releases of the same song (album cut, remaster, single) share one
/// identity because the history provider cannot tell them apart.
#[derive(Debug, Clone)]
pub struct TrackIdentity {
    artist: String,
    title: String,
    key: (String, String),
}

impl TrackIdentity {
    pub fn new(artist: &str, title: &str) -> Self {
        let artist = artist.trim().to_string();
        let title = title.trim().to_string();
        let key = (artist.to_lowercase(), title.to_lowercase());
        Self { artist, title, key }
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}

impl PartialEq for TrackIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for TrackIdentity {}

impl Hash for TrackIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for TrackIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} – {}", self.artist, self.title)
    }
}

// Spotify accounts service: POST /api/token
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

fn default_expires_in() -> u64 {
    3600
}

// Spotify Web API: GET /v1/me/player/currently-playing
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentlyPlaying {
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub currently_playing_type: Option<String>,
    #[serde(default)]
    pub item: Option<PlayableItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayableItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub item_type: Option<String>,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistRef {
    #[serde(default)]
    pub name: Option<String>,
}

impl CurrentlyPlaying {
    /// Reduce the payload to a [`Track`], or `None` when it is paused, not a
    /// music track, or missing any of id / title / first artist.
    pub fn into_track(self) -> Option<Track> {
        if !self.is_playing {
            return None;
        }
        if let Some(kind) = self.currently_playing_type.as_deref() {
            if kind != "track" {
                return None;
            }
        }

        let item = self.item?;
        if item.item_type.as_deref().is_some_and(|t| t != "track") {
            return None;
        }

        let non_blank = |s: Option<String>| s.filter(|v| !v.trim().is_empty());
        let id = non_blank(item.id)?;
        let title = non_blank(item.name)?;
        let artist = non_blank(item.artists.into_iter().next().and_then(|a| a.name))?;

        Some(Track {
            provider_id: id,
            title,
            artist,
        })
    }
}

// Last.fm: user.getTrackScrobbles
#[derive(Debug, Clone, Deserialize)]
pub struct TrackScrobblesResponse {
    #[serde(default)]
    pub trackscrobbles: Option<TrackScrobbles>,
    #[serde(default)]
    pub error: Option<u32>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackScrobbles {
    #[serde(default)]
    pub track: OneOrMany<Scrobble>,
}

/// Last.fm collapses single-element lists into a bare object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        match self {
            OneOrMany::Many(items) => items.iter(),
            OneOrMany::One(item) => std::slice::from_ref(item).iter(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scrobble {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub date: Option<ScrobbleDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScrobbleDate {
    pub uts: UnixSeconds,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UnixSeconds {
    Number(i64),
    Text(String),
}

impl UnixSeconds {
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let secs = match self {
            UnixSeconds::Number(n) => *n,
            UnixSeconds::Text(s) => s.trim().parse().ok()?,
        };
        DateTime::from_timestamp(secs, 0)
    }
}

impl TrackScrobblesResponse {
    /// Timestamp of the most recent dated scrobble.
    ///
    /// Now-playing markers carry no date and are ignored.
    pub fn latest_scrobble(&self) -> Option<DateTime<Utc>> {
        self.trackscrobbles
            .as_ref()?
            .track
            .iter()
            .filter_map(|s| s.date.as_ref().and_then(|d| d.uts.to_datetime()))
            .max()
    }
}
