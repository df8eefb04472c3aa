//! Text normalization for comparing source track metadata with catalog metadata.
//!
//! Catalog titles carry a lot of decoration the source export does not ("(Official
//! Video)", "[Remastered 2011]", "Artist - Title", "Artist - Topic" channels), so both
//! sides are reduced to a comparable core before scoring.

use std::collections::BTreeSet;

use unaccent::unaccent;
use unicode_normalization::UnicodeNormalization;

/// Annotations that mark a different performance or arrangement of a song.
const ALTERNATE_MARKERS: &[&str] = &[
    "live",
    "acoustic",
    "unplugged",
    "remix",
    "remixed",
    "cover",
    "instrumental",
    "karaoke",
    "demo",
    "extended mix",
    "club mix",
    "dub mix",
    "sped up",
    "slowed",
    "nightcore",
    "8d audio",
    "rehearsal",
];

/// Annotations that do not change the recording itself.
const BENIGN_MARKERS: &[&str] = &[
    "remastered",
    "remaster",
    "official video",
    "official music video",
    "official audio",
    "official lyric video",
    "lyric video",
    "lyrics",
    "audio",
    "visualizer",
    "hd",
    "hq",
    "4k",
    "explicit",
    "clean",
    "radio edit",
    "single version",
    "album version",
    "mono",
    "stereo",
];

const FEATURING_PATTERNS: &[&str] = &["feat.", "feat ", "ft.", "ft ", "featuring "];

/// Decorations YouTube appends to auto-generated and label channel names.
const CHANNEL_SUFFIXES: &[&str] = &[" - Topic", "VEVO", " Official"];

/// Comparable form of a title plus artist list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedMetadata {
    pub title: String,
    /// Primary artist first, then collaborators and featured artists
    pub artists: Vec<String>,
    /// Alternate-performance marker found in the title annotations, if any
    pub alternate: Option<&'static str>,
}

/// NFKC, strip accents, lowercase, drop punctuation, collapse whitespace.
pub fn normalize_string(s: &str) -> String {
    let composed: String = s.nfkc().collect();

    unaccent(&composed)
        .to_lowercase()
        .chars()
        .filter(|&c| c != '\'' && c != '’')
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a title into its bare text and the contents of any bracketed annotations.
pub fn split_annotations(s: &str) -> (String, Vec<String>) {
    let mut bare = String::new();
    let mut annotations = Vec::new();
    let mut current = String::new();
    let mut closer: Option<char> = None;

    for c in s.chars() {
        match closer {
            None => match c {
                '(' => closer = Some(')'),
                '[' => closer = Some(']'),
                '【' => closer = Some('】'),
                '「' => closer = Some('」'),
                _ => bare.push(c),
            },
            Some(close) if c == close => {
                let content = current.trim();
                if !content.is_empty() {
                    annotations.push(content.to_string());
                }
                current.clear();
                closer = None;
            }
            Some(_) => current.push(c),
        }
    }
    // Unterminated annotation: keep it rather than silently dropping text.
    if !current.trim().is_empty() {
        annotations.push(current.trim().to_string());
    }

    // "Song - Remastered 2011" / "Song - Live at Wembley"
    if let Some(idx) = bare.rfind(" - ") {
        let tail = normalize_string(&bare[idx + 3..]);
        if marker_in(&tail, ALTERNATE_MARKERS).is_some() || marker_in(&tail, BENIGN_MARKERS).is_some()
        {
            annotations.push(bare[idx + 3..].trim().to_string());
            bare.truncate(idx);
        }
    }

    (bare.trim().to_string(), annotations)
}

/// Whether `text` reads as a version note ("Remastered 2009", "Live at Wembley")
/// rather than a title. Bracketed parts are ignored.
pub fn is_version_annotation(text: &str) -> bool {
    let (bare, _) = split_annotations(text);
    let normalized = normalize_string(&bare);
    !normalized.is_empty()
        && (marker_in(&normalized, ALTERNATE_MARKERS).is_some()
            || marker_in(&normalized, BENIGN_MARKERS).is_some())
}

/// Find the first marker that occurs as a whole-word phrase in normalized text.
fn marker_in(normalized: &str, markers: &[&'static str]) -> Option<&'static str> {
    let padded = format!(" {normalized} ");
    markers
        .iter()
        .find(|marker| padded.contains(&format!(" {} ", marker)))
        .copied()
}

fn alternate_marker(annotations: &[String]) -> Option<&'static str> {
    annotations
        .iter()
        .find_map(|a| marker_in(&normalize_string(a), ALTERNATE_MARKERS))
}

/// Locate the first featuring marker that starts a word, returning (start, end) in `lower`.
fn find_featuring(lower: &str) -> Option<(usize, usize)> {
    FEATURING_PATTERNS
        .iter()
        .flat_map(|pattern| {
            lower
                .match_indices(pattern)
                .map(move |(idx, _)| (idx, idx + pattern.len()))
        })
        .filter(|&(idx, _)| {
            lower[..idx]
                .chars()
                .next_back()
                .is_none_or(|prev| prev.is_whitespace() || prev == '(' || prev == '[')
        })
        .min()
}

/// Extract featured artists from a title fragment ("feat. X", "ft. X & Y").
fn featured_artists(s: &str) -> Vec<String> {
    let lower = s.to_lowercase();
    find_featuring(&lower)
        .map(|(_, end)| split_artist_list(&lower[end..]))
        .unwrap_or_default()
}

/// Cut a title at the first featuring marker.
fn strip_featuring(s: &str) -> String {
    let lower = s.to_lowercase();
    match find_featuring(&lower) {
        Some((start, _)) => lower[..start].to_string(),
        None => lower,
    }
}

fn strip_leading_the(s: &str) -> &str {
    s.strip_prefix("the ").unwrap_or(s)
}

/// Split "A, B & C" style artist credits into normalized names.
pub fn split_artist_list(s: &str) -> Vec<String> {
    s.split([',', '&', ';', '/'])
        .flat_map(|part| part.split(" x "))
        .map(|part| normalize_string(part))
        .map(|part| strip_leading_the(&part).to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

/// Remove channel-name decorations such as "Queen - Topic" or "QueenVEVO".
pub fn clean_channel_name(channel: &str) -> String {
    let mut name = channel.trim();
    for suffix in CHANNEL_SUFFIXES {
        if let Some(stripped) = name.strip_suffix(suffix) {
            name = stripped.trim();
        }
    }
    name.to_string()
}

/// Normalize a title/artist pair for scoring.
pub fn normalize_metadata(title: &str, artist: &str) -> NormalizedMetadata {
    let (bare_title, annotations) = split_annotations(title);

    let mut seen = BTreeSet::new();
    let mut artists = Vec::new();
    let credited = split_artist_list(artist)
        .into_iter()
        .chain(featured_artists(title))
        .chain(annotations.iter().flat_map(|a| featured_artists(a)));
    for name in credited {
        if seen.insert(name.clone()) {
            artists.push(name);
        }
    }

    NormalizedMetadata {
        title: strip_leading_the(&normalize_string(&strip_featuring(&bare_title))).to_string(),
        artists,
        alternate: alternate_marker(&annotations),
    }
}
