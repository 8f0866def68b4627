use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const RECORD: &str = r#"[
    {"url": "45cYwDMibGo", "track_no": 1, "title": "First Light", "artist": "The Band", "album": "Record", "cover": "front.png"},
    {"url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ", "track_no": "2", "title": "Second", "artist": "The Band", "album": "Record"}
]"#;

fn tubetag(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tubetag").unwrap();
    cmd.current_dir(dir)
        .env_remove("TUBETAG_YTDLP")
        .env_remove("RUST_LOG");
    cmd
}

fn workspace(manifest: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("tracklists")).unwrap();
    fs::create_dir_all(dir.path().join("covers")).unwrap();
    fs::write(dir.path().join("tracklists").join("record.json"), manifest).unwrap();
    dir
}

fn expected_mp3(dir: &Path, title: &str, track_no: &str) -> PathBuf {
    dir.join("downloads")
        .join("The Band - Record")
        .join(format!("The Band - {} - {}.mp3", track_no, title))
}

#[test]
fn help_describes_usage() {
    let dir = TempDir::new().unwrap();
    tubetag(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--browser"))
        .stdout(predicate::str::contains("--cover-art-dir"));
}

#[test]
fn generate_config_writes_toml() {
    let dir = TempDir::new().unwrap();
    tubetag(dir.path())
        .arg("--generate-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("tubetag.toml"));

    let content = fs::read_to_string(dir.path().join("tubetag.toml")).unwrap();
    assert!(content.contains("[paths]"));
    assert!(content.contains("ytdlp_path"));
}

#[test]
fn list_shows_tracklists() {
    let dir = workspace(RECORD);
    fs::write(dir.path().join("tracklists").join("ep.json"), "[]").unwrap();

    tubetag(dir.path())
        .arg("--list")
        .assert()
        .success()
        .stdout(predicate::str::contains("record.json"))
        .stdout(predicate::str::contains("ep.json"));
}

#[test]
fn missing_tracklist_exits_with_manifest_code() {
    let dir = workspace(RECORD);
    tubetag(dir.path())
        .arg("nothing-here")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Tracklist not found"));
}

#[test]
fn invalid_manifest_exits_with_manifest_code() {
    let dir = workspace(r#"[{"url": "45cYwDMibGo", "title": "No number"}]"#);
    tubetag(dir.path()).arg("record").assert().code(3);
}

#[test]
fn dry_run_shows_plan_without_downloading() {
    let dir = workspace(RECORD);
    tubetag(dir.path())
        .args(["record", "--dry-run", "--ytdlp", "definitely-not-yt-dlp"])
        .assert()
        .success()
        .stdout(predicate::str::contains("download"))
        .stdout(predicate::str::contains("watch?v=45cYwDMibGo"));

    assert!(!dir.path().join("downloads").exists());
}

#[test]
fn missing_extractor_exits_with_code_6() {
    let dir = workspace(RECORD);
    image::RgbImage::new(8, 8)
        .save(dir.path().join("covers").join("front.png"))
        .unwrap();

    tubetag(dir.path())
        .args(["record", "--ytdlp", "definitely-not-yt-dlp"])
        .assert()
        .code(6)
        .stderr(predicate::str::contains("definitely-not-yt-dlp"));
}

#[test]
fn bad_cover_extension_exits_with_code_8() {
    let manifest = r#"[{"url": "45cYwDMibGo", "track_no": 1, "title": "A", "artist": "B",
        "album": "C", "cover": "front.webp"}]"#;
    let dir = workspace(manifest);
    fs::write(dir.path().join("covers").join("front.webp"), b"RIFF").unwrap();

    tubetag(dir.path())
        .args(["record", "--ytdlp", "definitely-not-yt-dlp"])
        .assert()
        .code(8)
        .stderr(predicate::str::contains("convert to '.jpg' or '.png'"));
}

#[cfg(unix)]
mod with_fake_ytdlp {
    use super::*;
    use id3::TagLike;
    use std::os::unix::fs::PermissionsExt;

    // Writes a few bytes to the `-o` target with the extension filled in.
    const FAKE_YTDLP: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
    echo "2024.08.06"
    exit 0
fi
out=""
while [ $# -gt 0 ]; do
    if [ "$1" = "-o" ]; then
        shift
        out="$1"
    fi
    shift
done
target=$(printf '%s' "$out" | sed 's/%(ext)s/mp3/')
echo "[tubetag] downloading 512 1024 NA"
echo "[tubetag] finished 1024 1024 NA"
echo "[ExtractAudio] Destination: $target"
printf 'not really audio, but enough for a tag\n' > "$target"
"#;

    // Leaves a half-written target behind and never finishes.
    const SLOW_YTDLP: &str = r#"#!/bin/sh
out=""
while [ $# -gt 0 ]; do
    if [ "$1" = "-o" ]; then
        shift
        out="$1"
    fi
    shift
done
target=$(printf '%s' "$out" | sed 's/%(ext)s/mp3/')
printf 'half' > "$target"
echo "[tubetag] downloading 10 100 NA"
exec sleep 30
"#;

    const FAILING_YTDLP: &str = r#"#!/bin/sh
echo "ERROR: [youtube] 45cYwDMibGo: Private video. Sign in if you've been granted access to this video" >&2
exit 1
"#;

    fn install_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn downloads_and_tags_every_track() {
        let dir = workspace(RECORD);
        image::RgbImage::new(640, 480)
            .save(dir.path().join("covers").join("front.png"))
            .unwrap();
        let ytdlp = install_script(dir.path(), "fake-yt-dlp", FAKE_YTDLP);

        tubetag(dir.path())
            .arg("record")
            .arg("--ytdlp")
            .arg(&ytdlp)
            .assert()
            .success();

        let first = expected_mp3(dir.path(), "First Light", "1");
        let tag = id3::Tag::read_from_path(&first).unwrap();
        assert_eq!(tag.title(), Some("First Light"));
        assert_eq!(tag.artist(), Some("The Band"));
        assert_eq!(tag.album(), Some("Record"));
        assert_eq!(tag.track(), Some(1));

        let pictures: Vec<_> = tag.pictures().collect();
        assert_eq!(pictures.len(), 1);
        assert_eq!(pictures[0].mime_type, "image/png");
        let cover = image::load_from_memory(&pictures[0].data).unwrap();
        assert_eq!((cover.width(), cover.height()), (300, 300));

        let second = id3::Tag::read_from_path(expected_mp3(dir.path(), "Second", "2")).unwrap();
        assert_eq!(second.pictures().count(), 0);

        let report = dir
            .path()
            .join("downloads")
            .join(".tubetag")
            .join("record-report.json");
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(report).unwrap()).unwrap();
        assert_eq!(json["summary"]["downloaded"], 2);
    }

    #[test]
    fn second_run_skips_existing_files() {
        let dir = workspace(RECORD);
        image::RgbImage::new(32, 32)
            .save(dir.path().join("covers").join("front.png"))
            .unwrap();
        let ytdlp = install_script(dir.path(), "fake-yt-dlp", FAKE_YTDLP);

        tubetag(dir.path())
            .arg("record")
            .arg("--ytdlp")
            .arg(&ytdlp)
            .assert()
            .success();

        tubetag(dir.path())
            .args(["record", "--output-format", "json", "--ytdlp"])
            .arg(&ytdlp)
            .assert()
            .success()
            .stdout(predicate::str::contains("\"skipped\": 2"));
    }

    #[test]
    fn skipped_tracks_are_reported_without_verbose() {
        let dir = workspace(RECORD);
        image::RgbImage::new(8, 8)
            .save(dir.path().join("covers").join("front.png"))
            .unwrap();
        let ytdlp = install_script(dir.path(), "fake-yt-dlp", FAKE_YTDLP);

        tubetag(dir.path())
            .arg("record")
            .arg("--ytdlp")
            .arg(&ytdlp)
            .assert()
            .success();

        tubetag(dir.path())
            .args(["record", "--output-format", "plain", "--ytdlp"])
            .arg(&ytdlp)
            .assert()
            .success()
            .stdout(predicate::str::contains("WARNING: Already downloaded"));
    }

    #[test]
    fn timed_out_download_is_retried_on_next_run() {
        let dir = workspace(RECORD);
        image::RgbImage::new(8, 8)
            .save(dir.path().join("covers").join("front.png"))
            .unwrap();
        let slow = install_script(dir.path(), "slow-yt-dlp", SLOW_YTDLP);

        tubetag(dir.path())
            .args(["record", "--timeout", "1", "--ytdlp"])
            .arg(&slow)
            .assert()
            .code(9);

        let first = expected_mp3(dir.path(), "First Light", "1");
        assert!(!first.exists());
        let album_dir = first.parent().unwrap();
        let remaining: Vec<_> = fs::read_dir(album_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name())
            .collect();
        assert!(remaining.is_empty(), "left behind: {:?}", remaining);

        let ytdlp = install_script(dir.path(), "fake-yt-dlp", FAKE_YTDLP);
        tubetag(dir.path())
            .args(["record", "--output-format", "json", "--ytdlp"])
            .arg(&ytdlp)
            .assert()
            .success()
            .stdout(predicate::str::contains("\"downloaded\": 2"));

        let tag = id3::Tag::read_from_path(&first).unwrap();
        assert_eq!(tag.title(), Some("First Light"));
    }

    #[test]
    fn forced_run_keeps_old_file_when_cover_is_rejected() {
        let manifest = r#"[{"url": "45cYwDMibGo", "track_no": 1, "title": "First Light",
            "artist": "The Band", "album": "Record", "cover": "front.gif"}]"#;
        let dir = workspace(manifest);
        fs::write(dir.path().join("covers").join("front.gif"), b"GIF89a").unwrap();
        let existing = expected_mp3(dir.path(), "First Light", "1");
        fs::create_dir_all(existing.parent().unwrap()).unwrap();
        fs::write(&existing, b"old audio").unwrap();
        let ytdlp = install_script(dir.path(), "fake-yt-dlp", FAKE_YTDLP);

        tubetag(dir.path())
            .args(["record", "--force", "--ytdlp"])
            .arg(&ytdlp)
            .assert()
            .code(8);

        assert_eq!(fs::read(&existing).unwrap(), b"old audio");
    }

    #[test]
    fn unavailable_video_exits_with_code_10() {
        let dir = workspace(RECORD);
        image::RgbImage::new(8, 8)
            .save(dir.path().join("covers").join("front.png"))
            .unwrap();
        let ytdlp = install_script(dir.path(), "failing-yt-dlp", FAILING_YTDLP);

        tubetag(dir.path())
            .arg("record")
            .arg("--ytdlp")
            .arg(&ytdlp)
            .assert()
            .code(10)
            .stderr(predicate::str::contains("Private video"));
    }

    #[test]
    fn keep_going_finishes_with_code_2() {
        let dir = workspace(RECORD);
        image::RgbImage::new(8, 8)
            .save(dir.path().join("covers").join("front.png"))
            .unwrap();
        let ytdlp = install_script(dir.path(), "failing-yt-dlp", FAILING_YTDLP);

        tubetag(dir.path())
            .args(["record", "--keep-going", "--output-format", "plain", "--ytdlp"])
            .arg(&ytdlp)
            .assert()
            .code(2)
            .stdout(predicate::str::contains("Failed: 2"));
    }
}
