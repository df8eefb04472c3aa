use serde::{Deserialize, Serialize};

/* ---------- search.list ---------- */

#[derive(Debug, Clone, Deserialize)]
pub struct SearchListResponse {
    #[serde(default)]
    pub items: Vec<SearchResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResult {
    pub id: SearchResultId,
    #[serde(default)]
    pub snippet: Option<SearchSnippet>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultId {
    /// Only set for `youtube#video` results
    #[serde(default)]
    pub video_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSnippet {
    /// HTML-escaped by the API
    pub title: String,
    #[serde(default)]
    pub channel_title: String,
}

/* ---------- videos.list ---------- */

#[derive(Debug, Clone, Deserialize)]
pub struct VideoListResponse {
    #[serde(default)]
    pub items: Vec<Video>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    #[serde(default)]
    pub content_details: Option<ContentDetails>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentDetails {
    /// ISO-8601 duration such as `PT3M54S`
    #[serde(default)]
    pub duration: Option<String>,
}

/* ---------- playlists.insert ---------- */

#[derive(Debug, Clone, Serialize)]
pub struct PlaylistInsert<'a> {
    pub snippet: PlaylistSnippet<'a>,
    pub status: PlaylistStatus<'a>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaylistSnippet<'a> {
    pub title: &'a str,
    pub description: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistStatus<'a> {
    pub privacy_status: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Playlist {
    pub id: String,
}

/* ---------- playlistItems.insert ---------- */

#[derive(Debug, Clone, Serialize)]
pub struct PlaylistItemInsert<'a> {
    pub snippet: PlaylistItemSnippet<'a>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemSnippet<'a> {
    pub playlist_id: &'a str,
    pub resource_id: VideoResource<'a>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoResource<'a> {
    pub kind: &'a str,
    pub video_id: &'a str,
}

impl<'a> PlaylistItemInsert<'a> {
    pub fn video(playlist_id: &'a str, video_id: &'a str) -> Self {
        Self {
            snippet: PlaylistItemSnippet {
                playlist_id,
                resource_id: VideoResource {
                    kind: "youtube#video",
                    video_id,
                },
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistItem {
    pub id: String,
}

/* ---------- Errors ---------- */

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub errors: Vec<ErrorDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub reason: String,
}
