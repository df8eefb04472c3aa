use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use color_eyre::eyre::{Result, WrapErr};
use regex::Regex;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use super::types::{
    ErrorResponse, Playlist, PlaylistInsert, PlaylistItem, PlaylistItemInsert, PlaylistSnippet,
    PlaylistStatus, SearchListResponse, SearchResult, VideoListResponse,
};
use crate::config::YoutubeConfig;
use crate::matching::{clean_channel_name, is_version_annotation, normalize_string};
use crate::ports::catalog::{Candidate, CatalogClient, CatalogError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Largest page size search.list accepts
const MAX_RESULTS: usize = 50;
/// Music category, keeps podcasts and reaction videos out of the results
const MUSIC_CATEGORY_ID: &str = "10";

const QUOTA_REASONS: [&str; 2] = ["quotaExceeded", "dailyLimitExceeded"];
const THROTTLE_REASONS: [&str; 2] = ["rateLimitExceeded", "userRateLimitExceeded"];

static ISO_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$")
        .expect("duration pattern is valid")
});

/// YouTube Data API v3 client authenticated with an OAuth access token.
pub struct YoutubeClient {
    http: Client,
    access_token: String,
    privacy_status: String,
    search_url: Url,
    videos_url: Url,
    playlists_url: Url,
    playlist_items_url: Url,
}

impl YoutubeClient {
    pub fn new(config: &YoutubeConfig, access_token: impl Into<String>) -> Result<Self> {
        let mut base = config.api_base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .wrap_err_with(|| format!("Invalid YouTube API base URL: {}", config.api_base_url))?;

        Ok(Self {
            http: Client::new(),
            access_token: access_token.into(),
            privacy_status: config.privacy_status.clone(),
            search_url: base_url.join("search")?,
            videos_url: base_url.join("videos")?,
            playlists_url: base_url.join("playlists")?,
            playlist_items_url: base_url.join("playlistItems")?,
        })
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, CatalogError> {
        let response = request
            .bearer_auth(&self.access_token)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|error| CatalogError::Transient(format!("Request failed: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &body));
        }

        response.json::<T>().await.map_err(|error| {
            if error.is_decode() {
                CatalogError::Rejected(format!("Unexpected response body: {error}"))
            } else {
                CatalogError::Transient(format!("Failed to read response: {error}"))
            }
        })
    }

    /// Look up durations for a batch of video ids; ids without a usable duration are absent.
    async fn video_durations(&self, ids: &[&str]) -> Result<HashMap<String, u32>, CatalogError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let joined = ids.join(",");
        let request = self
            .http
            .get(self.videos_url.clone())
            .query(&[("part", "contentDetails"), ("id", joined.as_str())]);
        let response: VideoListResponse = self.send(request).await?;

        Ok(response
            .items
            .into_iter()
            .filter_map(|video| {
                let duration = video
                    .content_details?
                    .duration
                    .as_deref()
                    .and_then(parse_iso8601_duration)?;
                Some((video.id, duration))
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl CatalogClient for YoutubeClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Candidate>, CatalogError> {
        let max_results = limit.clamp(1, MAX_RESULTS).to_string();
        let request = self.http.get(self.search_url.clone()).query(&[
            ("part", "snippet"),
            ("type", "video"),
            ("videoCategoryId", MUSIC_CATEGORY_ID),
            ("maxResults", max_results.as_str()),
            ("q", query),
        ]);
        let response: SearchListResponse = self.send(request).await?;

        let ids: Vec<&str> = response
            .items
            .iter()
            .filter_map(|item| item.id.video_id.as_deref())
            .collect();
        // search.list already spent its quota; never let a failed lookup repeat it
        let durations = self
            .video_durations(&ids)
            .await
            .unwrap_or_else(|error| {
                tracing::warn!("Duration lookup for '{}' failed, continuing without: {}", query, error);
                HashMap::new()
            });

        let candidates = build_candidates(&response.items, &durations);
        tracing::trace!("Search '{}' returned {} candidates", query, candidates.len());
        Ok(candidates)
    }

    async fn create_playlist(
        &self,
        title: &str,
        description: &str,
    ) -> Result<String, CatalogError> {
        let body = PlaylistInsert {
            snippet: PlaylistSnippet { title, description },
            status: PlaylistStatus {
                privacy_status: &self.privacy_status,
            },
        };
        let request = self
            .http
            .post(self.playlists_url.clone())
            .query(&[("part", "snippet,status")])
            .json(&body);
        let playlist: Playlist = self.send(request).await?;
        Ok(playlist.id)
    }

    async fn append_item(&self, playlist_id: &str, catalog_id: &str) -> Result<(), CatalogError> {
        let request = self
            .http
            .post(self.playlist_items_url.clone())
            .query(&[("part", "snippet")])
            .json(&PlaylistItemInsert::video(playlist_id, catalog_id));
        let item: PlaylistItem = self.send(request).await?;
        tracing::trace!("Added {} to {} as {}", catalog_id, playlist_id, item.id);
        Ok(())
    }
}

/// Map a non-success API response to the catalog error taxonomy.
fn classify_error(status: StatusCode, body: &str) -> CatalogError {
    let parsed = serde_json::from_str::<ErrorResponse>(body).ok();
    let reasons: Vec<&str> = parsed
        .as_ref()
        .map(|response| {
            response
                .error
                .errors
                .iter()
                .map(|detail| detail.reason.as_str())
                .collect()
        })
        .unwrap_or_default();
    let has_reason = |wanted: &[&str]| reasons.iter().any(|reason| wanted.contains(reason));

    let message = match parsed.as_ref().map(|response| response.error.message.as_str()) {
        Some(message) if !message.is_empty() => format!("{status}: {message}"),
        _ => status.to_string(),
    };

    if status == StatusCode::FORBIDDEN && has_reason(&QUOTA_REASONS) {
        CatalogError::QuotaExceeded(message)
    } else if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
        || (status == StatusCode::FORBIDDEN && has_reason(&THROTTLE_REASONS))
    {
        CatalogError::Transient(message)
    } else {
        CatalogError::Rejected(message)
    }
}

/// Parse an ISO-8601 duration (`PT1H2M3S`). Zero-length durations, reported for live
/// streams, count as unknown.
pub fn parse_iso8601_duration(value: &str) -> Option<u32> {
    let captures = ISO_DURATION.captures(value)?;
    let part = |index: usize| -> Option<u32> {
        captures
            .get(index)
            .map_or(Some(0), |matched| matched.as_str().parse().ok())
    };

    let seconds = part(1)?
        .checked_mul(86_400)?
        .checked_add(part(2)?.checked_mul(3_600)?)?
        .checked_add(part(3)?.checked_mul(60)?)?
        .checked_add(part(4)?)?;
    (seconds > 0).then_some(seconds)
}

/// Decode the handful of HTML entities the API uses in snippet titles.
fn unescape_html(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Turn search results into candidates, keeping the API's result order.
fn build_candidates(items: &[SearchResult], durations: &HashMap<String, u32>) -> Vec<Candidate> {
    items
        .iter()
        .filter_map(|item| {
            let video_id = item.id.video_id.as_ref()?;
            let snippet = item.snippet.as_ref()?;
            let (title, artist) = split_video_title(&unescape_html(&snippet.title), &snippet.channel_title);
            Some(Candidate {
                catalog_id: video_id.clone(),
                title,
                artist,
                duration_seconds: durations.get(video_id).copied(),
            })
        })
        .collect()
}

/// Work out (title, artist) for a video.
///
/// Auto-generated "Artist - Topic" channels carry the bare track title. Elsewhere
/// uploads are usually titled "Artist - Title", and the channel is only a fallback.
/// A dash followed by a version note ("Song - Remastered 2009") is part of the title,
/// unless the text before the dash is the channel's own artist name.
fn split_video_title(title: &str, channel: &str) -> (String, String) {
    let title = title.trim();
    let channel_artist = clean_channel_name(channel);
    if channel.trim_end().ends_with(" - Topic") {
        return (title.to_string(), channel_artist);
    }

    match title.split_once(" - ") {
        Some((artist, rest))
            if !artist.trim().is_empty()
                && !rest.trim().is_empty()
                && (same_name(artist, &channel_artist) || !is_version_annotation(rest)) =>
        {
            (rest.trim().to_string(), artist.trim().to_string())
        }
        _ => (title.to_string(), channel_artist),
    }
}

/// Compare names ignoring case, punctuation and spacing ("TheBeatles" vs "The Beatles").
fn same_name(a: &str, b: &str) -> bool {
    let squash = |name: &str| normalize_string(name).replace(' ', "");
    let a = squash(a);
    !a.is_empty() && a == squash(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchingConfig;
    use crate::matching::{MatchOutcome, MatchResolver};
    use crate::track::track;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_parse_durations() {
        assert_eq!(parse_iso8601_duration("PT3M54S"), Some(234));
        assert_eq!(parse_iso8601_duration("PT5M"), Some(300));
        assert_eq!(parse_iso8601_duration("PT1H2M3S"), Some(3723));
        assert_eq!(parse_iso8601_duration("PT45S"), Some(45));
        assert_eq!(parse_iso8601_duration("P1DT1S"), Some(86_401));
    }

    #[test]
    fn test_unusable_durations() {
        assert_eq!(parse_iso8601_duration("P0D"), None);
        assert_eq!(parse_iso8601_duration("PT0S"), None);
        assert_eq!(parse_iso8601_duration(""), None);
        assert_eq!(parse_iso8601_duration("3:54"), None);
        assert_eq!(parse_iso8601_duration("PT99999999999S"), None);
    }

    #[test]
    fn test_quota_errors() {
        let body = r#"{"error":{"code":403,"message":"The request cannot be completed because you have exceeded your quota.","errors":[{"reason":"quotaExceeded","domain":"youtube.quota"}]}}"#;
        assert!(matches!(
            classify_error(StatusCode::FORBIDDEN, body),
            CatalogError::QuotaExceeded(_)
        ));

        let body = r#"{"error":{"code":403,"errors":[{"reason":"dailyLimitExceeded"}]}}"#;
        assert!(matches!(
            classify_error(StatusCode::FORBIDDEN, body),
            CatalogError::QuotaExceeded(_)
        ));
    }

    #[test]
    fn test_transient_errors() {
        for status in [
            StatusCode::UNAUTHORIZED,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::SERVICE_UNAVAILABLE,
        ] {
            assert!(
                matches!(classify_error(status, ""), CatalogError::Transient(_)),
                "{status}"
            );
        }

        let body = r#"{"error":{"code":403,"errors":[{"reason":"userRateLimitExceeded"}]}}"#;
        assert!(matches!(
            classify_error(StatusCode::FORBIDDEN, body),
            CatalogError::Transient(_)
        ));
    }

    #[test]
    fn test_rejected_errors() {
        let body = r#"{"error":{"code":404,"message":"Playlist not found","errors":[{"reason":"playlistNotFound"}]}}"#;
        assert_eq!(
            classify_error(StatusCode::NOT_FOUND, body),
            CatalogError::Rejected("404 Not Found: Playlist not found".into())
        );

        // A 403 without a quota reason is a permission problem
        let body = r#"{"error":{"code":403,"errors":[{"reason":"forbidden"}]}}"#;
        assert!(matches!(
            classify_error(StatusCode::FORBIDDEN, body),
            CatalogError::Rejected(_)
        ));
        assert!(matches!(
            classify_error(StatusCode::BAD_REQUEST, "<html>"),
            CatalogError::Rejected(_)
        ));
    }

    #[test]
    fn test_split_video_title() {
        assert_eq!(
            split_video_title("Bohemian Rhapsody", "Queen - Topic"),
            ("Bohemian Rhapsody".to_string(), "Queen".to_string())
        );
        assert_eq!(
            split_video_title("Queen - Bohemian Rhapsody (Official Video)", "Queen Official"),
            (
                "Bohemian Rhapsody (Official Video)".to_string(),
                "Queen".to_string()
            )
        );
        assert_eq!(
            split_video_title("Yesterday", "TheBeatlesVEVO"),
            ("Yesterday".to_string(), "TheBeatles".to_string())
        );
        // Topic channels keep dashes that belong to the title
        assert_eq!(
            split_video_title("Time - Remastered", "Pink Floyd - Topic"),
            ("Time - Remastered".to_string(), "Pink Floyd".to_string())
        );
        // A version note after the dash stays in the title
        assert_eq!(
            split_video_title("Here Comes The Sun - Remastered 2009", "The Beatles"),
            (
                "Here Comes The Sun - Remastered 2009".to_string(),
                "The Beatles".to_string()
            )
        );
        // ...unless the part before the dash is the channel's artist
        assert_eq!(
            split_video_title("Oasis - Live Forever", "OasisVEVO"),
            ("Live Forever".to_string(), "Oasis".to_string())
        );
    }

    #[test]
    fn test_remastered_upload_resolves_to_track() {
        let (title, artist) =
            split_video_title("Here Comes The Sun - Remastered 2009", "The Beatles");
        let candidate = Candidate {
            catalog_id: "sun".into(),
            title,
            artist,
            duration_seconds: None,
        };

        let resolver = MatchResolver::new(MatchingConfig::default());
        let outcome = resolver.resolve(
            &track(0, "Here Comes The Sun", "The Beatles"),
            vec![candidate],
        );
        assert!(matches!(
            outcome,
            MatchOutcome::Matched { ref catalog_id, .. } if catalog_id == "sun"
        ));
    }

    #[test]
    fn test_build_candidates_from_search_response() {
        let response: SearchListResponse = serde_json::from_str(
            r#"{
                "items": [
                    {"id": {"kind": "youtube#video", "videoId": "fJ9rUzIMcZQ"},
                     "snippet": {"title": "Queen &#39;Bohemian Rhapsody&#39; - Live", "channelTitle": "Someone"}},
                    {"id": {"kind": "youtube#channel", "channelId": "UCabc"},
                     "snippet": {"title": "Queen", "channelTitle": "Queen"}},
                    {"id": {"kind": "youtube#video", "videoId": "abc123"},
                     "snippet": {"title": "Bohemian Rhapsody", "channelTitle": "Queen - Topic"}}
                ]
            }"#,
        )
        .unwrap();
        let durations = HashMap::from([("abc123".to_string(), 355)]);

        let candidates = build_candidates(&response.items, &durations);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].catalog_id, "fJ9rUzIMcZQ");
        assert_eq!(candidates[0].title, "Queen 'Bohemian Rhapsody' - Live");
        assert_eq!(candidates[0].artist, "Someone");
        assert_eq!(candidates[0].duration_seconds, None);
        assert_eq!(
            candidates[1],
            Candidate {
                catalog_id: "abc123".into(),
                title: "Bohemian Rhapsody".into(),
                artist: "Queen".into(),
                duration_seconds: Some(355),
            }
        );
    }

    #[test]
    fn test_request_bodies() {
        let body = serde_json::to_value(PlaylistItemInsert::video("PL1", "vid1")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "snippet": {
                    "playlistId": "PL1",
                    "resourceId": {"kind": "youtube#video", "videoId": "vid1"}
                }
            })
        );

        let body = serde_json::to_value(PlaylistInsert {
            snippet: PlaylistSnippet {
                title: "Road Trip",
                description: "",
            },
            status: PlaylistStatus {
                privacy_status: "private",
            },
        })
        .unwrap();
        assert_eq!(body["status"]["privacyStatus"], "private");
        assert_eq!(body["snippet"]["title"], "Road Trip");
    }

    type Hits = Arc<Mutex<Vec<String>>>;

    /// Minimal HTTP/1.1 server on a loopback port. `respond` maps a request path to a
    /// status and JSON body; every request path is recorded in the returned log.
    async fn serve(respond: fn(&str) -> (u16, &'static str)) -> (YoutubeClient, Hits) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let hits: Hits = Arc::new(Mutex::new(Vec::new()));

        let recorded = hits.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buffer = vec![0u8; 16 * 1024];
                let read = socket.read(&mut buffer).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buffer[..read]).to_string();
                let path = request.split_whitespace().nth(1).unwrap_or_default().to_string();
                recorded.lock().unwrap().push(path.clone());

                let (status, body) = respond(&path);
                let reason = StatusCode::from_u16(status)
                    .ok()
                    .and_then(|code| code.canonical_reason())
                    .unwrap_or("Unknown");
                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });

        let config = YoutubeConfig {
            api_base_url: format!("http://{address}/youtube/v3/"),
            ..YoutubeConfig::default()
        };
        let mut client = YoutubeClient::new(&config, "token").unwrap();
        client.http = Client::builder().no_proxy().build().unwrap();
        (client, hits)
    }

    const SEARCH_BODY: &str = r#"{"items": [
        {"id": {"kind": "youtube#video", "videoId": "abc123"},
         "snippet": {"title": "Bohemian Rhapsody", "channelTitle": "Queen - Topic"}}
    ]}"#;

    fn count(hits: &Hits, prefix: &str) -> usize {
        hits.lock()
            .unwrap()
            .iter()
            .filter(|path| path.starts_with(prefix))
            .count()
    }

    #[tokio::test]
    async fn test_search_fetches_durations() {
        let (client, hits) = serve(|path| {
            if path.starts_with("/youtube/v3/search") {
                (200, SEARCH_BODY)
            } else {
                (
                    200,
                    r#"{"items": [{"id": "abc123", "contentDetails": {"duration": "PT5M55S"}}]}"#,
                )
            }
        })
        .await;

        let candidates = client.search("Bohemian Rhapsody Queen", 5).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].artist, "Queen");
        assert_eq!(candidates[0].duration_seconds, Some(355));
        assert_eq!(count(&hits, "/youtube/v3/search?"), 1);
        assert_eq!(count(&hits, "/youtube/v3/videos?"), 1);
    }

    #[tokio::test]
    async fn test_failed_duration_lookup_keeps_search_results() {
        let (client, hits) = serve(|path| {
            if path.starts_with("/youtube/v3/search") {
                (200, SEARCH_BODY)
            } else {
                (503, r#"{"error": {"code": 503, "message": "Backend Error"}}"#)
            }
        })
        .await;

        let candidates = client.search("Bohemian Rhapsody Queen", 5).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].catalog_id, "abc123");
        assert_eq!(candidates[0].duration_seconds, None);
        // The expensive search request went out exactly once
        assert_eq!(count(&hits, "/youtube/v3/search?"), 1);
    }

    #[tokio::test]
    async fn test_quota_error_from_server() {
        let (client, _) = serve(|_| {
            (
                403,
                r#"{"error": {"code": 403, "message": "Quota exceeded", "errors": [{"reason": "quotaExceeded"}]}}"#,
            )
        })
        .await;

        let result = client.create_playlist("Road Trip", "").await;
        assert!(matches!(result, Err(CatalogError::QuotaExceeded(_))));
    }

    #[test]
    fn test_base_url_without_trailing_slash() {
        let config = YoutubeConfig {
            api_base_url: "http://localhost:8080/youtube/v3".into(),
            ..YoutubeConfig::default()
        };
        let client = YoutubeClient::new(&config, "token").unwrap();
        assert_eq!(
            client.search_url.as_str(),
            "http://localhost:8080/youtube/v3/search"
        );
        assert_eq!(
            client.playlist_items_url.as_str(),
            "http://localhost:8080/youtube/v3/playlistItems"
        );
    }
}
