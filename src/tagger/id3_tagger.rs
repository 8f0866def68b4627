use crate::error::{Result, TubeTagError};
use crate::tagger::cover_art::CoverArt;
use id3::frame::{Picture, PictureType};
use id3::{ErrorKind, Tag, TagLike, Version};
use std::path::Path;
use tracing::debug;

const TRACK_FRAME: &str = "TRCK";
const COVER_DESCRIPTION: &str = "Cover";

/// Metadata written onto a downloaded track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackTags {
    pub track_no: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub cover: Option<CoverArt>,
}

pub struct Id3Tagger {
    version: Version,
}

impl Id3Tagger {
    pub fn new() -> Self {
        Self {
            version: Version::Id3v24,
        }
    }

    /// Set TRCK, TIT2, TPE1, TALB and the front cover, keeping any other
    /// frames yt-dlp or the source already wrote.
    pub fn write(&self, path: &Path, tags: &TrackTags) -> Result<()> {
        let mut tag = read_or_new(path)?;

        tag.set_text(TRACK_FRAME, tags.track_no.clone());
        tag.set_title(tags.title.clone());
        tag.set_artist(tags.artist.clone());
        tag.set_album(tags.album.clone());

        if let Some(ref cover) = tags.cover {
            tag.remove_all_pictures();
            tag.add_frame(Picture {
                mime_type: cover.mime_type.clone(),
                picture_type: PictureType::CoverFront,
                description: COVER_DESCRIPTION.to_string(),
                data: cover.data.clone(),
            });
        }

        tag.write_to_path(path, self.version)
            .map_err(|e| tagging_error(path, e))?;

        debug!(
            path = %path.display(),
            title = %tags.title,
            cover_bytes = tags.cover.as_ref().map(CoverArt::len).unwrap_or(0),
            "wrote id3 tags"
        );

        Ok(())
    }

    /// Read back the fields this tagger writes.
    pub fn read(&self, path: &Path) -> Result<TrackTags> {
        let tag = Tag::read_from_path(path).map_err(|e| tagging_error(path, e))?;

        let cover = tag
            .pictures()
            .find(|p| p.picture_type == PictureType::CoverFront)
            .map(|p| CoverArt {
                mime_type: p.mime_type.clone(),
                data: p.data.clone(),
            });

        Ok(TrackTags {
            track_no: tag
                .get(TRACK_FRAME)
                .and_then(|frame| frame.content().text())
                .unwrap_or_default()
                .to_string(),
            title: tag.title().unwrap_or_default().to_string(),
            artist: tag.artist().unwrap_or_default().to_string(),
            album: tag.album().unwrap_or_default().to_string(),
            cover,
        })
    }
}

impl Default for Id3Tagger {
    fn default() -> Self {
        Self::new()
    }
}

fn read_or_new(path: &Path) -> Result<Tag> {
    match Tag::read_from_path(path) {
        Ok(tag) => Ok(tag),
        Err(e) if matches!(e.kind, ErrorKind::NoTag) => Ok(Tag::new()),
        Err(e) => Err(tagging_error(path, e)),
    }
}

fn tagging_error(path: &Path, error: id3::Error) -> TubeTagError {
    match error.kind {
        ErrorKind::Io(io) => TubeTagError::Io(io),
        _ => TubeTagError::Tagging {
            path: path.display().to_string(),
            message: error.description,
        },
    }
}
