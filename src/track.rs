use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A single track as read from the source playlist export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
    /// Dense 0-based index in the source playlist
    pub source_position: usize,
}

impl TrackDescriptor {
    /// Query string sent to the catalog search endpoint
    pub fn search_query(&self) -> String {
        format!("{} {}", self.title.trim(), self.artist.trim())
            .trim()
            .to_string()
    }
}

/// An ordered, non-empty track list plus the identity of the source it came from.
#[derive(Debug, Clone)]
pub struct SourcePlaylist {
    /// Stable identity of the source, the canonical path of the export file
    pub source_id: String,
    pub name: String,
    pub tracks: Vec<TrackDescriptor>,
}

impl SourcePlaylist {
    /// SHA-256 over the ordered track contents.
    ///
    /// Any edit to the track list (reordering, insertion, metadata change) yields a new hash,
    /// which is what invalidates a stale checkpoint.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for track in &self.tracks {
            hasher.update(track.source_position.to_le_bytes());
            hasher.update(track.title.as_bytes());
            hasher.update([0x1f]);
            hasher.update(track.artist.as_bytes());
            hasher.update([0x1f]);
            hasher.update(track.album.as_deref().unwrap_or_default().as_bytes());
            hasher.update([0x1f]);
            hasher.update(track.duration_seconds.unwrap_or_default().to_le_bytes());
            hasher.update([0x1e]);
        }
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
pub(crate) fn track(position: usize, title: &str, artist: &str) -> TrackDescriptor {
    TrackDescriptor {
        title: title.to_string(),
        artist: artist.to_string(),
        album: None,
        duration_seconds: None,
        source_position: position,
    }
}
