use crate::config::Config;
use crate::error::{Result, TubeTagError};
use crate::manifest::{TrackEntry, Tracklist};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackStatus {
    Downloaded,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackOutcome {
    pub position: usize,
    pub track_no: String,
    pub title: String,
    pub artist: String,
    pub output_path: PathBuf,
    pub status: TrackStatus,
    pub error: Option<String>,
    pub bytes: u64,
    pub duration: Duration,
}

impl TrackOutcome {
    pub fn downloaded(track: &TrackEntry, path: PathBuf, bytes: u64, duration: Duration) -> Self {
        Self::build(track, path, TrackStatus::Downloaded, None, bytes, duration)
    }

    pub fn skipped(track: &TrackEntry, path: PathBuf) -> Self {
        let bytes = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        Self::build(track, path, TrackStatus::Skipped, None, bytes, Duration::ZERO)
    }

    pub fn failed(track: &TrackEntry, path: PathBuf, error: String, duration: Duration) -> Self {
        Self::build(track, path, TrackStatus::Failed, Some(error), 0, duration)
    }

    fn build(
        track: &TrackEntry,
        output_path: PathBuf,
        status: TrackStatus,
        error: Option<String>,
        bytes: u64,
        duration: Duration,
    ) -> Self {
        Self {
            position: track.position,
            track_no: track.track_no.clone(),
            title: track.title.clone(),
            artist: track.artist.clone(),
            output_path,
            status,
            error,
            bytes,
            duration,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchSummary {
    pub total_tracks: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total_bytes: u64,
    pub duration: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub output_dir: PathBuf,
    pub cover_art_dir: PathBuf,
    pub browser: Option<String>,
    pub audio_quality: String,
    pub artwork_size: u32,
}

impl From<&Config> for ConfigSnapshot {
    fn from(config: &Config) -> Self {
        Self {
            output_dir: config.paths.output_dir.clone(),
            cover_art_dir: config.paths.cover_art_dir.clone(),
            browser: config.download.browser.clone(),
            audio_quality: config.download.audio_quality.clone(),
            artwork_size: config.artwork.size,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchReport {
    pub tracklist: String,
    pub tracklist_path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub tracks: Vec<TrackOutcome>,
    pub summary: FetchSummary,
    pub config_used: ConfigSnapshot,
    #[serde(skip, default = "Instant::now")]
    started: Instant,
}

impl FetchReport {
    pub fn new(tracklist: &Tracklist, config: &Config) -> Self {
        Self {
            tracklist: tracklist.name.clone(),
            tracklist_path: tracklist.path.clone(),
            started_at: Utc::now(),
            finished_at: None,
            tracks: Vec::with_capacity(tracklist.len()),
            summary: FetchSummary {
                total_tracks: tracklist.len(),
                ..FetchSummary::default()
            },
            config_used: ConfigSnapshot::from(config),
            started: Instant::now(),
        }
    }

    pub fn record(&mut self, outcome: TrackOutcome) {
        match outcome.status {
            TrackStatus::Downloaded => {
                self.summary.downloaded += 1;
                self.summary.total_bytes += outcome.bytes;
            }
            TrackStatus::Skipped => self.summary.skipped += 1,
            TrackStatus::Failed => self.summary.failed += 1,
        }
        self.tracks.push(outcome);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
        self.summary.duration = self.started.elapsed();
    }

    pub fn processed(&self) -> usize {
        self.tracks.len()
    }

    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }

    pub fn errors(&self) -> Vec<String> {
        self.tracks
            .iter()
            .filter_map(|t| {
                t.error
                    .as_ref()
                    .map(|e| format!("{} - {}: {}", t.track_no, t.title, e))
            })
            .collect()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Persists reports under `<output_dir>/.tubetag/`.
pub struct ReportWriter {
    report_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            report_dir: output_dir.join(".tubetag"),
        }
    }

    pub fn report_path(&self, report: &FetchReport) -> PathBuf {
        self.report_dir
            .join(format!("{}-report.json", report.tracklist))
    }

    pub fn save(&self, report: &FetchReport) -> Result<PathBuf> {
        fs::create_dir_all(&self.report_dir)?;

        let path = self.report_path(report);
        let json = serde_json::to_string_pretty(report).map_err(|e| TubeTagError::Config {
            message: format!("Failed to serialize report to JSON: {}", e),
        })?;
        fs::write(&path, json)?;

        Ok(path)
    }
}
