//! Reader for playlists exported from RiMusic as CSV.
//!
//! RiMusic writes one row per track with the header
//! `PlaylistBrowseId,PlaylistName,MediaId,Title,Artists,Duration,ThumbnailUrl`.

use std::io::Read;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};

use crate::track::{SourcePlaylist, TrackDescriptor};

const TITLE: &str = "Title";
const ARTISTS: &str = "Artists";

#[derive(Debug, thiserror::Error)]
pub enum SourceParseError {
    #[error("Failed to read playlist export {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("Playlist export {path} has no {column} column")]
    MissingColumn { path: PathBuf, column: &'static str },
    #[error("Playlist export {path} contains no tracks")]
    Empty { path: PathBuf },
}

/// Column positions resolved from the header row.
struct Columns {
    title: usize,
    artists: usize,
    album: Option<usize>,
    duration: Option<usize>,
    playlist_name: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord, path: &Path) -> Result<Self, SourceParseError> {
        let find = |name: &str| {
            headers.iter().position(|header| {
                header
                    .trim_start_matches('\u{feff}')
                    .trim()
                    .eq_ignore_ascii_case(name)
            })
        };
        let required = |column: &'static str| {
            find(column).ok_or_else(|| SourceParseError::MissingColumn {
                path: path.to_path_buf(),
                column,
            })
        };

        Ok(Self {
            title: required(TITLE)?,
            artists: required(ARTISTS)?,
            album: find("Album"),
            duration: find("Duration"),
            playlist_name: find("PlaylistName"),
        })
    }
}

/// Read a RiMusic export from disk.
///
/// The playlist name is `playlist_name` when given, otherwise the export's
/// `PlaylistName` column, otherwise the file stem.
pub fn read_playlist(
    path: &Path,
    playlist_name: Option<&str>,
) -> Result<SourcePlaylist, SourceParseError> {
    let file = std::fs::File::open(path).map_err(|error| SourceParseError::Read {
        path: path.to_path_buf(),
        source: error.into(),
    })?;
    let source_id = std::fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string();

    parse_playlist(file, path, source_id, playlist_name)
}

pub fn parse_playlist<R: Read>(
    reader: R,
    path: &Path,
    source_id: String,
    playlist_name: Option<&str>,
) -> Result<SourcePlaylist, SourceParseError> {
    let read_error = |source: csv::Error| SourceParseError::Read {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);
    let columns = Columns::from_headers(reader.headers().map_err(read_error)?, path)?;

    let mut tracks = Vec::new();
    let mut exported_name: Option<String> = None;
    let mut skipped = 0;

    for record in reader.records() {
        let record = record.map_err(read_error)?;
        let field = |index: usize| record.get(index).unwrap_or_default().trim();
        let optional = |index: Option<usize>| {
            index
                .map(field)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        if exported_name.is_none() {
            exported_name = optional(columns.playlist_name);
        }

        let title = field(columns.title);
        if title.is_empty() {
            skipped += 1;
            continue;
        }

        tracks.push(TrackDescriptor {
            title: title.to_string(),
            artist: field(columns.artists).to_string(),
            album: optional(columns.album),
            duration_seconds: columns
                .duration
                .map(field)
                .and_then(parse_duration),
            source_position: tracks.len(),
        });
    }

    if skipped > 0 {
        tracing::warn!("Skipped {} rows without a title in {}", skipped, path.display());
    }
    if tracks.is_empty() {
        return Err(SourceParseError::Empty {
            path: path.to_path_buf(),
        });
    }

    let name = playlist_name
        .map(str::to_string)
        .or(exported_name)
        .or_else(|| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "RiMusic playlist".to_string());

    tracing::debug!("Read {} tracks of '{}' from {}", tracks.len(), name, path.display());
    Ok(SourcePlaylist {
        source_id,
        name,
        tracks,
    })
}

/// Parse `m:ss`, `h:mm:ss` or plain seconds. Zero or malformed values are unknown.
pub fn parse_duration(value: &str) -> Option<u32> {
    let value = value.trim();
    let seconds = if value.contains(':') {
        let parts = value
            .split(':')
            .map(|part| part.trim().parse::<u32>().ok())
            .collect::<Option<Vec<_>>>()?;
        match parts.as_slice() {
            [minutes, seconds] if *seconds < 60 => minutes.checked_mul(60)?.checked_add(*seconds)?,
            [hours, minutes, seconds] if *minutes < 60 && *seconds < 60 => hours
                .checked_mul(3600)?
                .checked_add(minutes * 60)?
                .checked_add(*seconds)?,
            _ => return None,
        }
    } else {
        value.parse::<u32>().ok()?
    };
    (seconds > 0).then_some(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "\
PlaylistBrowseId,PlaylistName,MediaId,Title,Artists,Duration,ThumbnailUrl
,Road Trip,fJ9rUzIMcZQ,Bohemian Rhapsody,Queen,5:55,https://i.ytimg.com/a.jpg
,Road Trip,NrI-UBIB8Jk,\"Under Pressure\",\"Queen, David Bowie\",4:08,
,Road Trip,xyz,,Nobody,1:00,
,Road Trip,abc,Shine On You Crazy Diamond,Pink Floyd,1:13:30,
";

    fn parse(contents: &str, name: Option<&str>) -> Result<SourcePlaylist, SourceParseError> {
        parse_playlist(
            contents.as_bytes(),
            Path::new("/exports/road-trip.csv"),
            "/exports/road-trip.csv".into(),
            name,
        )
    }

    #[test]
    fn test_parse_export() {
        let playlist = parse(EXPORT, None).unwrap();

        assert_eq!(playlist.name, "Road Trip");
        assert_eq!(playlist.source_id, "/exports/road-trip.csv");
        assert_eq!(playlist.tracks.len(), 3);

        let pressure = &playlist.tracks[1];
        assert_eq!(pressure.title, "Under Pressure");
        assert_eq!(pressure.artist, "Queen, David Bowie");
        assert_eq!(pressure.duration_seconds, Some(248));
        assert_eq!(pressure.album, None);

        // Untitled rows are dropped and positions stay dense
        let positions: Vec<usize> = playlist.tracks.iter().map(|t| t.source_position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
        assert_eq!(playlist.tracks[2].duration_seconds, Some(4410));
    }

    #[test]
    fn test_playlist_name_precedence() {
        assert_eq!(parse(EXPORT, Some("Summer")).unwrap().name, "Summer");

        let without_name = "Title,Artists\nSong,Artist\n";
        assert_eq!(parse(without_name, None).unwrap().name, "road-trip");
    }

    #[test]
    fn test_header_matching_ignores_case_and_bom() {
        let contents = "\u{feff}title,ARTISTS,album\nSong,Artist,Record\n";
        let playlist = parse(contents, None).unwrap();
        assert_eq!(playlist.tracks[0].album.as_deref(), Some("Record"));
        assert_eq!(playlist.tracks[0].duration_seconds, None);
    }

    #[test]
    fn test_missing_artists_column() {
        let result = parse("PlaylistName,Title\nMix,Song\n", None);
        assert!(matches!(
            result,
            Err(SourceParseError::MissingColumn {
                column: "Artists",
                ..
            })
        ));
    }

    #[test]
    fn test_empty_export() {
        let header_only = "PlaylistBrowseId,PlaylistName,MediaId,Title,Artists,Duration,ThumbnailUrl\n";
        assert!(matches!(
            parse(header_only, None),
            Err(SourceParseError::Empty { .. })
        ));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("3:54"), Some(234));
        assert_eq!(parse_duration("03:54"), Some(234));
        assert_eq!(parse_duration("1:02:03"), Some(3723));
        assert_eq!(parse_duration("215"), Some(215));
        assert_eq!(parse_duration("0:00"), None);
        assert_eq!(parse_duration("3:75"), None);
        assert_eq!(parse_duration("abc"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn test_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("road-trip.csv");
        std::fs::write(&path, EXPORT).unwrap();

        let playlist = read_playlist(&path, None).unwrap();
        assert_eq!(playlist.tracks.len(), 3);
        // Same file, same identity and hash
        let again = read_playlist(&path, None).unwrap();
        assert_eq!(playlist.source_id, again.source_id);
        assert_eq!(playlist.content_hash(), again.content_hash());
    }

    #[test]
    fn test_missing_file() {
        let result = read_playlist(Path::new("/does/not/exist.csv"), None);
        assert!(matches!(result, Err(SourceParseError::Read { .. })));
    }
}
