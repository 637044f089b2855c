use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const UNKNOWN_ARTIST: &str = "Unknown";

/// Where a track's audio comes from.
///
/// Remote tracks only carry their catalog id: stream addresses expire and
/// are resolved again for every play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum TrackSource {
  Remote { id: String },
  Local { path: PathBuf },
}

/// Metadata supplied by the caller for a remote track.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackMetadata {
  pub title: Option<String>,
  pub artist: Option<String>,
  pub duration_seconds: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
  pub title: String,
  pub artist: String,
  pub duration_seconds: Option<f64>,
  pub source: TrackSource,
}

impl Track {
  /// Local file; title and artist come from an `Artist - Title` file name.
  pub fn local(path: &Path) -> Self {
    let (artist, title) = parse_file_name(path);
    Self {
      title,
      artist,
      duration_seconds: None,
      source: TrackSource::Local {
        path: path.to_path_buf(),
      },
    }
  }

  pub fn remote(id: &str, metadata: &TrackMetadata) -> Self {
    Self {
      title: metadata.title.clone().unwrap_or_else(|| id.to_string()),
      artist: metadata
        .artist
        .clone()
        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
      duration_seconds: metadata.duration_seconds,
      source: TrackSource::Remote { id: id.to_string() },
    }
  }

  pub fn local_path(&self) -> Option<&Path> {
    match &self.source {
      TrackSource::Local { path } => Some(path),
      TrackSource::Remote { .. } => None,
    }
  }
}

/// Split `Artist - Title.ext` into artist and title.
fn parse_file_name(path: &Path) -> (String, String) {
  let stem = path
    .file_stem()
    .map(|s| s.to_string_lossy().into_owned())
    .unwrap_or_default();
  match stem.split_once(" - ") {
    Some((artist, title)) if !artist.trim().is_empty() && !title.trim().is_empty() => {
      (artist.trim().to_string(), title.trim().to_string())
    }
    _ => (UNKNOWN_ARTIST.to_string(), stem.trim().to_string()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_local_track_parses_artist_and_title() {
    let track = Track::local(Path::new("/music/Nina Simone - Feeling Good.mp3"));
    assert_eq!(track.artist, "Nina Simone");
    assert_eq!(track.title, "Feeling Good");
  }

  #[test]
  fn test_local_track_without_separator_uses_unknown_artist() {
    let track = Track::local(Path::new("/music/field-recording.flac"));
    assert_eq!(track.artist, "Unknown");
    assert_eq!(track.title, "field-recording");
  }

  #[test]
  fn test_title_may_contain_separator() {
    let track = Track::local(Path::new("A - B - C.mp3"));
    assert_eq!(track.artist, "A");
    assert_eq!(track.title, "B - C");
  }

  #[test]
  fn test_remote_track_has_no_address() {
    let track = Track::remote("abc", &TrackMetadata::default());
    assert_eq!(track.source, TrackSource::Remote { id: "abc".into() });
    assert_eq!(track.title, "abc");
    assert!(track.local_path().is_none());
  }
}
