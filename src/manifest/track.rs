use crate::error::{Result, TubeTagError};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// One track of a tracklist, with album defaults already applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackEntry {
    /// 1-based position in the tracklist.
    pub position: usize,
    pub url: String,
    pub track_no: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub cover: Option<String>,
}

impl TrackEntry {
    /// URL handed to yt-dlp. Bare video ids become watch URLs.
    pub fn source_url(&self) -> Result<String> {
        let source = self.url.trim();

        if is_video_id(source) {
            return Ok(format!("{}{}", WATCH_URL, source));
        }

        let parsed = Url::parse(source).map_err(|_| TubeTagError::InvalidUrl {
            url: source.to_string(),
        })?;

        match parsed.scheme() {
            "https" | "http" => {}
            _ => {
                return Err(TubeTagError::InvalidUrl {
                    url: source.to_string(),
                })
            }
        }

        if parsed.host_str().is_none() {
            return Err(TubeTagError::InvalidUrl {
                url: source.to_string(),
            });
        }

        Ok(parsed.to_string())
    }

    /// `<output_dir>/<artist> - <album>/<artist> - <track_no> - <title>`, without extension.
    pub fn output_stem(&self, output_dir: &Path) -> PathBuf {
        let folder = sanitize_filename(&format!("{} - {}", self.artist, self.album));
        let file = sanitize_filename(&format!(
            "{} - {} - {}",
            self.artist, self.track_no, self.title
        ));
        output_dir.join(folder).join(file)
    }

    /// Hidden stem next to the final file that downloads are written to
    /// until the MP3 is tagged and renamed into place.
    pub fn download_stem(&self, output_dir: &Path) -> PathBuf {
        let stem = self.output_stem(output_dir);
        let file = stem
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        stem.with_file_name(format!(".{}.part", file))
    }

    pub fn output_path(&self, output_dir: &Path) -> PathBuf {
        let mut path = self.output_stem(output_dir).into_os_string();
        path.push(".mp3");
        PathBuf::from(path)
    }

    pub fn cover_path(&self, cover_dir: &Path) -> Option<PathBuf> {
        self.cover.as_ref().map(|cover| cover_dir.join(cover))
    }

    pub fn is_downloaded(&self, output_dir: &Path) -> bool {
        self.output_path(output_dir).exists()
    }

    pub fn display_name(&self) -> String {
        format!("{}. {} - {}", self.track_no, self.artist, self.title)
    }

    pub(crate) fn check_required(&self) -> std::result::Result<(), String> {
        let fields = [
            ("url", &self.url),
            ("track_no", &self.track_no),
            ("title", &self.title),
            ("artist", &self.artist),
            ("album", &self.album),
        ];

        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(format!("track {} has an empty '{}'", self.position, name));
            }
        }

        if let Some(ref cover) = self.cover {
            if cover.trim().is_empty() {
                return Err(format!("track {} has an empty 'cover'", self.position));
            }
        }

        Ok(())
    }
}

/// Entry exactly as written in the manifest.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawTrack {
    pub url: String,
    #[serde(deserialize_with = "track_number")]
    pub track_no: String,
    pub title: String,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub cover: Option<String>,
}

impl RawTrack {
    pub fn resolve(self, position: usize, defaults: &AlbumDefaults) -> std::result::Result<TrackEntry, String> {
        let artist = self
            .artist
            .or_else(|| defaults.artist.clone())
            .ok_or_else(|| format!("track {} has no 'artist'", position))?;
        let album = self
            .album
            .or_else(|| defaults.album.clone())
            .ok_or_else(|| format!("track {} has no 'album'", position))?;

        Ok(TrackEntry {
            position,
            url: self.url,
            track_no: self.track_no,
            title: self.title,
            artist,
            album,
            cover: self.cover.or_else(|| defaults.cover.clone()),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct AlbumDefaults {
    pub artist: Option<String>,
    pub album: Option<String>,
    pub cover: Option<String>,
}

fn track_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TrackNo {
        Text(String),
        Number(u64),
    }

    Ok(match TrackNo::deserialize(deserializer)? {
        TrackNo::Text(text) => text.trim().to_string(),
        TrackNo::Number(n) => n.to_string(),
    })
}

fn is_video_id(s: &str) -> bool {
    s.len() == 11
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

// Cross-platform filename sanitization
pub fn sanitize_filename(name: &str) -> String {
    let mut sanitized = String::new();

    for ch in name.chars() {
        match ch {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' => sanitized.push('_'),
            '/' | '\\' => sanitized.push('_'),
            c if c.is_control() => sanitized.push('_'),
            c => sanitized.push(c),
        }
    }

    // Trailing dots and spaces break paths on Windows
    let sanitized = sanitized.trim().trim_end_matches(['.', ' ']).to_string();

    if sanitized.is_empty() {
        "untitled".to_string()
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(url: &str) -> TrackEntry {
        TrackEntry {
            position: 1,
            url: url.to_string(),
            track_no: "3".to_string(),
            title: "Come Together".to_string(),
            artist: "The Beatles".to_string(),
            album: "Abbey Road".to_string(),
            cover: Some("abbey.jpg".to_string()),
        }
    }

    #[test]
    fn test_output_paths() {
        let track = entry("https://www.youtube.com/watch?v=45cYwDMibGo");
        let out = Path::new("downloads");

        assert_eq!(
            track.output_path(out),
            PathBuf::from("downloads/The Beatles - Abbey Road/The Beatles - 3 - Come Together.mp3")
        );
        assert_eq!(
            track.output_stem(out),
            PathBuf::from("downloads/The Beatles - Abbey Road/The Beatles - 3 - Come Together")
        );
    }

    #[test]
    fn test_download_stem_is_hidden_sibling() {
        let track = entry("45cYwDMibGo");
        let out = Path::new("downloads");

        assert_eq!(
            track.download_stem(out),
            PathBuf::from("downloads/The Beatles - Abbey Road/.The Beatles - 3 - Come Together.part")
        );
        assert_ne!(
            track.download_stem(out).with_extension("mp3"),
            track.output_path(out)
        );
    }

    #[test]
    fn test_output_path_keeps_dots_in_title() {
        let mut track = entry("45cYwDMibGo");
        track.title = "Vol. 2".to_string();
        let path = track.output_path(Path::new("out"));
        assert!(path.to_string_lossy().ends_with("The Beatles - 3 - Vol. 2.mp3"));
    }

    #[test]
    fn test_output_path_sanitizes_separators() {
        let mut track = entry("45cYwDMibGo");
        track.title = "AC/DC: Live?".to_string();
        let path = track.output_path(Path::new("out"));
        assert_eq!(path.file_name().unwrap(), "The Beatles - 3 - AC_DC_ Live_.mp3");
        assert_eq!(path.parent().unwrap(), Path::new("out/The Beatles - Abbey Road"));
    }

    #[test]
    fn test_source_url_from_video_id() {
        let track = entry("45cYwDMibGo");
        assert_eq!(
            track.source_url().unwrap(),
            "https://www.youtube.com/watch?v=45cYwDMibGo"
        );
    }

    #[test]
    fn test_source_url_passthrough() {
        let track = entry("https://youtu.be/45cYwDMibGo");
        assert_eq!(track.source_url().unwrap(), "https://youtu.be/45cYwDMibGo");
    }

    #[test]
    fn test_source_url_rejects_other_schemes() {
        assert!(entry("ftp://example.com/song").source_url().is_err());
        assert!(entry("not a url").source_url().is_err());
        assert!(entry("file:///etc/passwd").source_url().is_err());
    }

    #[test]
    fn test_cover_path() {
        let track = entry("45cYwDMibGo");
        assert_eq!(
            track.cover_path(Path::new("covers")),
            Some(PathBuf::from("covers/abbey.jpg"))
        );
    }

    #[test]
    fn test_check_required() {
        let mut track = entry("45cYwDMibGo");
        assert!(track.check_required().is_ok());

        track.title = "  ".to_string();
        let message = track.check_required().unwrap_err();
        assert!(message.contains("'title'"));
    }

    #[test]
    fn test_filename_sanitization() {
        assert_eq!(sanitize_filename("normal name"), "normal name");
        assert_eq!(sanitize_filename("bad<>|*chars"), "bad____chars");
        assert_eq!(sanitize_filename("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_filename("   "), "untitled");
        assert_eq!(sanitize_filename("ends..."), "ends");
    }
}
