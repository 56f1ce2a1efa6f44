use std::path::Path;

use thiserror::Error;
use tracing::warn;

/// The fixed tag set written regardless of container (spec §4.4): title,
/// artist, album, and the optional extras carried through from the track
/// metadata resolved by the Protocol Client.
#[derive(Debug, Clone, Default)]
pub struct TagInput {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: Option<i32>,
    pub genre: Option<String>,
    pub label: Option<String>,
    pub version: Option<String>,
    pub isrc: Option<String>,
    pub track_number: Option<u32>,
    pub cover: Option<Vec<u8>>,
}

#[derive(Debug, Error)]
pub enum TaggingError {
    #[error("couldn't cast tag field `{0}`")]
    TryFromInt(#[from] std::num::TryFromIntError),
    #[error("audiotags error: {0}")]
    AudioTags(#[from] audiotags::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Write `input`'s tags into `path` using the per-container convention
/// (Vorbis comments for FLAC, ID3v2 for MP3, iTunes atoms for MP4/M4A) via
/// the container-agnostic `audiotags` crate. Tagging failures are reported
/// to the caller but are treated as non-fatal at the engine level: the file
/// is still catalogued (spec §4.4/§7).
pub fn tag_file(path: &Path, input: &TagInput) -> Result<(), TaggingError> {
    let mut tag = audiotags::Tag::new().read_from_path(path)?;

    tag.set_title(&input.title);
    tag.set_artist(&input.artist);
    if let Some(year) = input.year {
        tag.set_year(year);
    }
    if let Some(genre) = &input.genre {
        tag.set_genre(genre);
    }
    if let Some(track_number) = input.track_number {
        tag.set_track_number(track_number.try_into()?);
    }

    let cover = input
        .cover
        .as_ref()
        .map(|bytes| audiotags::Picture::new(bytes, audiotags::MimeType::Jpeg));
    tag.set_album(audiotags::Album {
        title: &input.album,
        artist: Some(&input.artist),
        cover,
    });

    tag.write_to_path(path)?;
    Ok(())
}

/// Tag `path`, logging and swallowing any failure (spec §4.4: "tagging
/// errors are non-fatal"). Labels and ISRC are not exposed by `audiotags`'
/// generic interface; they are recorded in the catalog row regardless.
pub fn tag_file_best_effort(path: &Path, input: &TagInput) {
    if let Err(e) = tag_file(path, input) {
        warn!(path = %path.display(), error = %e, "tagging failed, file kept untagged");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_a_tagging_error_not_a_panic() {
        let input = TagInput {
            title: "x".into(),
            artist: "y".into(),
            album: "z".into(),
            ..Default::default()
        };
        let result = tag_file(Path::new("/nonexistent/path/does/not/exist.flac"), &input);
        assert!(result.is_err());
    }
}
