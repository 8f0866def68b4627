use crate::error::{Result, TubeTagError};
use crate::manifest::track::{AlbumDefaults, RawTrack, TrackEntry};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct Tracklist {
    pub path: PathBuf,
    pub name: String,
    pub tracks: Vec<TrackEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AlbumManifest {
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    album: Option<String>,
    #[serde(default)]
    cover: Option<String>,
    tracks: Vec<RawTrack>,
}

impl Tracklist {
    /// Find the manifest file for a name given on the command line.
    pub fn resolve_path(name: &str, tracklist_dir: &Path) -> Result<PathBuf> {
        let direct = PathBuf::from(name);
        if direct.is_file() {
            return Ok(direct);
        }

        let has_separator = name.contains('/') || name.contains('\\');
        if !has_separator {
            let joined = tracklist_dir.join(name);
            if joined.is_file() {
                return Ok(joined);
            }

            if direct.extension().is_none() {
                let with_ext = tracklist_dir.join(format!("{}.json", name));
                if with_ext.is_file() {
                    return Ok(with_ext);
                }
            }

            return Err(TubeTagError::TracklistNotFound {
                path: joined.display().to_string(),
            });
        }

        Err(TubeTagError::TracklistNotFound {
            path: direct.display().to_string(),
        })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(TubeTagError::TracklistNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::InvalidData => TubeTagError::Manifest {
                path: path.display().to_string(),
                message: format!("could not read tracklist: {}", e),
            },
            _ => TubeTagError::Io(e),
        })?;
        let tracks = Self::parse(&content).map_err(|message| TubeTagError::Manifest {
            path: path.display().to_string(),
            message,
        })?;

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("tracklist")
            .to_string();

        Ok(Self {
            path: path.to_path_buf(),
            name,
            tracks,
        })
    }

    /// Parse manifest text. Accepts a bare array of tracks or an album object
    /// whose `artist`, `album` and `cover` apply to tracks that omit them.
    pub fn parse(content: &str) -> std::result::Result<Vec<TrackEntry>, String> {
        let value: serde_json::Value =
            serde_json::from_str(content).map_err(|e| format!("not valid JSON: {}", e))?;

        let (defaults, raw_tracks) = match value {
            serde_json::Value::Array(_) => {
                let tracks: Vec<RawTrack> =
                    serde_json::from_value(value).map_err(|e| e.to_string())?;
                (AlbumDefaults::default(), tracks)
            }
            serde_json::Value::Object(_) => {
                let album: AlbumManifest =
                    serde_json::from_value(value).map_err(|e| e.to_string())?;
                let defaults = AlbumDefaults {
                    artist: album.artist,
                    album: album.album,
                    cover: album.cover,
                };
                (defaults, album.tracks)
            }
            _ => {
                return Err("expected a JSON array of tracks or an object with 'tracks'".to_string())
            }
        };

        raw_tracks
            .into_iter()
            .enumerate()
            .map(|(index, raw)| raw.resolve(index + 1, &defaults))
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.tracks.is_empty() {
            return Err(self.invalid("the tracklist contains no tracks".to_string()));
        }

        for track in &self.tracks {
            track.check_required().map_err(|message| self.invalid(message))?;
            track.source_url().map_err(|_| {
                self.invalid(format!(
                    "track {} has an invalid url '{}'",
                    track.position, track.url
                ))
            })?;
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    fn invalid(&self, message: String) -> TubeTagError {
        TubeTagError::Manifest {
            path: self.path.display().to_string(),
            message,
        }
    }
}

/// JSON tracklists under `dir`, sorted by path.
pub fn list_tracklists(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(TubeTagError::TracklistNotFound {
            path: dir.display().to_string(),
        });
    }

    let mut found: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(2)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("json"))
        })
        .collect();

    found.sort();
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const ARRAY_MANIFEST: &str = r#"[
        {
            "url": "https://www.youtube.com/watch?v=45cYwDMibGo",
            "track_no": "1",
            "title": "Come Together",
            "artist": "The Beatles",
            "album": "Abbey Road",
            "cover": "abbey.jpg"
        },
        {
            "url": "UelDrZ1aFeY",
            "track_no": 2,
            "title": "Something",
            "artist": "The Beatles",
            "album": "Abbey Road",
            "cover": "abbey.jpg"
        }
    ]"#;

    #[test]
    fn test_load_rejects_invalid_utf8() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, [0xff, 0xfe, b'[', b']']).unwrap();

        match Tracklist::load(&path) {
            Err(TubeTagError::Manifest { message, .. }) => {
                assert!(message.contains("could not read tracklist"));
            }
            other => panic!("expected manifest error, got {:?}", other.map(|t| t.len())),
        }
    }

    #[test]
    fn test_parse_array_manifest() {
        let tracks = Tracklist::parse(ARRAY_MANIFEST).unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].position, 1);
        assert_eq!(tracks[1].track_no, "2");
        assert_eq!(tracks[1].cover.as_deref(), Some("abbey.jpg"));
    }

    #[test]
    fn test_parse_album_manifest_applies_defaults() {
        let content = r#"{
            "artist": "Nina Simone",
            "album": "Pastel Blues",
            "cover": "pastel.png",
            "tracks": [
                { "url": "aaaaaaaaaaa", "track_no": 1, "title": "Be My Husband" },
                { "url": "bbbbbbbbbbb", "track_no": 2, "title": "Nobody", "cover": "alt.png" }
            ]
        }"#;

        let tracks = Tracklist::parse(content).unwrap();
        assert_eq!(tracks[0].artist, "Nina Simone");
        assert_eq!(tracks[0].album, "Pastel Blues");
        assert_eq!(tracks[0].cover.as_deref(), Some("pastel.png"));
        assert_eq!(tracks[1].cover.as_deref(), Some("alt.png"));
    }

    #[test]
    fn test_parse_rejects_unknown_fields() {
        let content = r#"[{ "url": "aaaaaaaaaaa", "track_no": 1, "title": "x",
            "artist": "a", "album": "b", "genre": "rock" }]"#;
        let message = Tracklist::parse(content).unwrap_err();
        assert!(message.contains("genre"));
    }

    #[test]
    fn test_parse_reports_missing_artist() {
        let content = r#"[{ "url": "aaaaaaaaaaa", "track_no": 1, "title": "x", "album": "b" }]"#;
        let message = Tracklist::parse(content).unwrap_err();
        assert!(message.contains("artist"));
    }

    #[test]
    fn test_parse_rejects_scalars() {
        assert!(Tracklist::parse("42").is_err());
        assert!(Tracklist::parse("{ not json").is_err());
    }

    #[test]
    fn test_load_and_validate() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("abbey.json");
        fs::write(&path, ARRAY_MANIFEST).unwrap();

        let tracklist = Tracklist::load(&path).unwrap();
        assert_eq!(tracklist.name, "abbey");
        assert_eq!(tracklist.len(), 2);
        assert!(tracklist.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_tracklist() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.json");
        fs::write(&path, "[]").unwrap();

        let tracklist = Tracklist::load(&path).unwrap();
        assert!(matches!(
            tracklist.validate(),
            Err(TubeTagError::Manifest { .. })
        ));
    }

    #[test]
    fn test_validate_bad_url() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(
            &path,
            r#"[{ "url": "ftp://x/y", "track_no": 1, "title": "t", "artist": "a", "album": "b" }]"#,
        )
        .unwrap();

        let err = Tracklist::load(&path).unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("invalid url"));
    }

    #[test]
    fn test_resolve_path_in_tracklist_dir() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("abbey.json"), ARRAY_MANIFEST).unwrap();

        let resolved = Tracklist::resolve_path("abbey.json", dir.path()).unwrap();
        assert_eq!(resolved, dir.path().join("abbey.json"));

        let resolved = Tracklist::resolve_path("abbey", dir.path()).unwrap();
        assert_eq!(resolved, dir.path().join("abbey.json"));

        assert!(matches!(
            Tracklist::resolve_path("missing", dir.path()),
            Err(TubeTagError::TracklistNotFound { .. })
        ));
    }

    #[test]
    fn test_resolve_direct_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ep.json");
        fs::write(&path, ARRAY_MANIFEST).unwrap();

        let name = path.to_string_lossy().to_string();
        let resolved = Tracklist::resolve_path(&name, Path::new("elsewhere")).unwrap();
        assert_eq!(resolved, path);
    }

    #[test]
    fn test_list_tracklists() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.json"), "[]").unwrap();
        fs::write(dir.path().join("a.json"), "[]").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let found = list_tracklists(dir.path()).unwrap();
        assert_eq!(found, vec![dir.path().join("a.json"), dir.path().join("b.json")]);
    }
}
