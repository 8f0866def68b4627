pub mod cli;
pub mod config;
pub mod downloader;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod report;
pub mod tagger;
pub mod ui;

// Public API re-exports
pub use cli::{Cli, OutputFormat};
pub use config::{CliOverrides, Config};
pub use error::{Result, TubeTagError, UserFriendlyError};

// Core functionality re-exports
pub use downloader::{DownloadOutcome, DownloadProgress, YtDlp};
pub use manifest::{TrackEntry, Tracklist};
pub use report::{FetchReport, FetchSummary, ReportWriter, TrackOutcome, TrackStatus};
pub use tagger::{CoverArt, Id3Tagger, TrackTags};
pub use ui::{GracefulShutdown, OutputFormatter, OutputMode, ProgressManager};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};
use crate::ui::output::ProgressAwareOutput;

/// Main library interface: turns a tracklist into tagged MP3 files.
pub struct TubeTag {
    config: Config,
    output_formatter: OutputFormatter,
    progress_manager: ProgressManager,
    shutdown: GracefulShutdown,
    force: bool,
    verbose: u8,
}

/// What a dry run found for one track.
#[derive(Debug, Clone)]
pub struct PlannedTrack {
    pub track: TrackEntry,
    pub source_url: String,
    pub output_path: PathBuf,
    pub already_downloaded: bool,
    pub cover_path: Option<PathBuf>,
    pub cover_problem: Option<String>,
}

impl PlannedTrack {
    pub fn will_download(&self, force: bool) -> bool {
        force || !self.already_downloaded
    }
}

#[derive(Debug, Clone)]
pub struct FetchPlan {
    pub tracklist: Tracklist,
    pub tracks: Vec<PlannedTrack>,
    /// `None` when the extractor could not be run.
    pub extractor_version: Option<String>,
}

impl FetchPlan {
    pub fn pending(&self, force: bool) -> usize {
        self.tracks.iter().filter(|t| t.will_download(force)).count()
    }

    pub fn cover_problems(&self) -> usize {
        self.tracks.iter().filter(|t| t.cover_problem.is_some()).count()
    }
}

impl TubeTag {
    pub fn new(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Result<Self> {
        let output_formatter = OutputFormatter::new(output_mode, verbose, quiet);
        let progress_manager = ProgressManager::new(!quiet && output_mode == OutputMode::Human);
        let shutdown = GracefulShutdown::new()?;

        Ok(Self {
            config,
            output_formatter,
            progress_manager,
            shutdown,
            force: false,
            verbose,
        })
    }

    /// Instance without a Ctrl+C handler, so tests can build several.
    #[cfg(test)]
    pub fn new_for_test(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        Self {
            config,
            output_formatter: OutputFormatter::new(output_mode, verbose, quiet),
            progress_manager: ProgressManager::new(false),
            shutdown: GracefulShutdown::new_for_test(),
            force: false,
            verbose,
        }
    }

    pub fn from_cli(cli_args: &Cli) -> Result<Self> {
        let config = cli_args.load_config()?;
        let output_mode = match cli_args.output_format {
            OutputFormat::Human => OutputMode::Human,
            OutputFormat::Json => OutputMode::Json,
            OutputFormat::Plain => OutputMode::Plain,
        };

        Ok(Self::new(config, output_mode, cli_args.verbose, cli_args.quiet)?
            .with_force(cli_args.force))
    }

    /// Re-download tracks whose MP3 already exists.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Download and tag every track of a tracklist, in order.
    pub async fn fetch_tracklist(&self, name: &str) -> Result<FetchReport> {
        self.shutdown.check_shutdown()?;

        let tracklist = self.load_tracklist(name)?;
        self.output_formatter.start_operation(&format!(
            "Fetching {} tracks from '{}'",
            tracklist.len(),
            tracklist.name
        ));

        let output_dir = self.config.paths.output_dir.clone();
        fs::create_dir_all(&output_dir).map_err(|e| io_error(&output_dir, e))?;

        let mut report = FetchReport::new(&tracklist, &self.config);
        let overall = self
            .progress_manager
            .create_tracklist_progress(tracklist.len() as u64);
        let output = ProgressAwareOutput::new(&self.output_formatter, Some(&self.progress_manager));

        for track in &tracklist.tracks {
            if let Err(e) = self.shutdown.check_shutdown() {
                overall.abandon_with_message("Cancelled");
                return Err(e);
            }

            overall.set_message(track.display_name());
            let started = Instant::now();

            let outcome = match self.fetch_track(track).await {
                Ok(outcome) => outcome,
                Err(TubeTagError::Cancelled) => {
                    overall.abandon_with_message("Cancelled");
                    return Err(TubeTagError::Cancelled);
                }
                Err(e) if self.config.download.keep_going => {
                    warn!(track = %track.display_name(), error = %e, "track failed, continuing");
                    TrackOutcome::failed(
                        track,
                        track.output_path(&output_dir),
                        e.user_message(),
                        started.elapsed(),
                    )
                }
                Err(e) => {
                    overall.abandon_with_message(format!("Failed at {}", track.display_name()));
                    return Err(e);
                }
            };

            output.track_outcome(&outcome);
            report.record(outcome);
            overall.inc(1);
        }

        ui::progress::finish_progress_with_summary(
            &overall,
            &format!("Processed {} tracks", report.processed()),
            report.elapsed(),
        );
        report.finish();

        if self.config.output.write_report {
            match ReportWriter::new(&output_dir).save(&report) {
                Ok(path) => self
                    .output_formatter
                    .debug(&format!("Report written to {}", path.display())),
                Err(e) => self
                    .output_formatter
                    .warning(&format!("Could not write report: {}", e.user_message())),
            }
        }

        Ok(report)
    }

    /// Fetch a single track: skip, download, tag, then move into place.
    ///
    /// The MP3 is written under a hidden stem and only renamed over
    /// `output_path` once tagging succeeded, so a failed or interrupted
    /// run never leaves a file that a later run would skip.
    async fn fetch_track(&self, track: &TrackEntry) -> Result<TrackOutcome> {
        let output_dir = &self.config.paths.output_dir;
        let output_path = track.output_path(output_dir);

        if output_path.exists() {
            if !self.force {
                info!(path = %output_path.display(), "already downloaded, skipping");
                return Ok(TrackOutcome::skipped(track, output_path));
            }
            debug!(path = %output_path.display(), "existing file will be replaced");
        }

        let url = track.source_url()?;
        // Bad artwork fails the track before anything is downloaded.
        let cover = self.load_cover(track)?;

        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }

        let progress = self
            .progress_manager
            .create_download_progress(&track.display_name());
        let callback = {
            let pb = progress.clone();
            move |update: DownloadProgress| ui::progress::update_download_progress(&pb, &update)
        };

        let extractor = self
            .extractor()
            .with_progress(callback)
            .with_shutdown_flag(self.shutdown.flag());
        let stem = track.download_stem(output_dir);
        extractor.remove_leftovers(&stem).await;

        info!(%url, path = %output_path.display(), "downloading track");
        let download = match extractor.extract_mp3(&url, &stem).await {
            Ok(download) => {
                progress.finish_and_clear();
                download
            }
            Err(e) => {
                progress.abandon();
                return Err(e);
            }
        };

        let tags = TrackTags {
            track_no: track.track_no.clone(),
            title: track.title.clone(),
            artist: track.artist.clone(),
            album: track.album.clone(),
            cover,
        };
        if let Err(e) = Id3Tagger::new().write(&download.path, &tags) {
            extractor.remove_leftovers(&stem).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&download.path, &output_path) {
            extractor.remove_leftovers(&stem).await;
            return Err(io_error(&output_path, e));
        }

        let bytes = fs::metadata(&output_path)
            .map(|m| m.len())
            .unwrap_or(download.bytes);

        Ok(TrackOutcome::downloaded(
            track,
            output_path,
            bytes,
            download.duration,
        ))
    }

    /// Inspect a tracklist without downloading anything.
    pub async fn plan(&self, name: &str) -> Result<FetchPlan> {
        let tracklist = self.load_tracklist(name)?;
        let output_dir = &self.config.paths.output_dir;

        let mut tracks = Vec::with_capacity(tracklist.len());
        for track in &tracklist.tracks {
            let cover_path = track.cover_path(&self.config.paths.cover_art_dir);
            let cover_problem = cover_path.as_deref().and_then(check_cover);

            tracks.push(PlannedTrack {
                track: track.clone(),
                source_url: track.source_url()?,
                output_path: track.output_path(output_dir),
                already_downloaded: track.is_downloaded(output_dir),
                cover_path,
                cover_problem,
            });
        }

        let extractor_version = match self.extractor().version().await {
            Ok(version) => Some(version),
            Err(e) => {
                debug!(error = %e, "extractor version unavailable");
                None
            }
        };

        Ok(FetchPlan {
            tracklist,
            tracks,
            extractor_version,
        })
    }

    pub fn list_tracklists(&self) -> Result<Vec<PathBuf>> {
        manifest::list_tracklists(&self.config.paths.tracklist_dir)
    }

    fn load_tracklist(&self, name: &str) -> Result<Tracklist> {
        let path = Tracklist::resolve_path(name, &self.config.paths.tracklist_dir)?;
        debug!(path = %path.display(), "loading tracklist");

        let tracklist = Tracklist::load(&path)?;
        tracklist.validate()?;
        Ok(tracklist)
    }

    fn load_cover(&self, track: &TrackEntry) -> Result<Option<CoverArt>> {
        match track.cover_path(&self.config.paths.cover_art_dir) {
            Some(path) => CoverArt::load(&path, self.config.artwork.size).map(Some),
            None => Ok(None),
        }
    }

    fn extractor(&self) -> YtDlp {
        let download = &self.config.download;
        YtDlp::new(download.ytdlp_path.clone())
            .with_browser(download.browser.clone())
            .with_format(download.format.clone())
            .with_audio_format(download.audio_format.clone())
            .with_audio_quality(download.audio_quality.clone())
            .with_timeout(self.config.download_timeout_duration())
            .with_verbose(self.verbose >= 3)
    }

    pub fn generate_sample_config<P: AsRef<Path>>(output_path: P) -> Result<()> {
        let sample_config = Config::create_sample_config();
        fs::write(output_path.as_ref(), sample_config)
            .map_err(|e| io_error(output_path.as_ref(), e))?;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn output_formatter(&self) -> &OutputFormatter {
        &self.output_formatter
    }

    pub fn progress_manager(&self) -> &ProgressManager {
        &self.progress_manager
    }

    pub fn is_force(&self) -> bool {
        self.force
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.is_running()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.request_shutdown();
    }

    pub fn handle_error(&self, error: &TubeTagError) {
        self.progress_manager.clear();
        self.output_formatter.print_user_friendly_error(error);
    }
}

fn check_cover(path: &Path) -> Option<String> {
    if let Err(e) = tagger::cover_art::cover_format(path) {
        return Some(e.user_message());
    }
    if !path.is_file() {
        return Some(format!("{} does not exist", path.display()));
    }
    None
}

fn io_error(path: &Path, error: std::io::Error) -> TubeTagError {
    if error.kind() == std::io::ErrorKind::PermissionDenied {
        TubeTagError::Permission {
            path: path.display().to_string(),
        }
    } else {
        TubeTagError::Io(error)
    }
}
