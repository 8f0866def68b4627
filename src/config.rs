use crate::error::{Result, TubeTagError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub download: DownloadConfig,
    pub artwork: ArtworkConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    pub output_dir: PathBuf,
    pub cover_art_dir: PathBuf,
    pub tracklist_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub ytdlp_path: String,
    pub browser: Option<String>,
    pub format: String,
    pub audio_format: String,
    pub audio_quality: String,
    pub timeout: u64,
    pub keep_going: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ArtworkConfig {
    /// Edge length in pixels of the embedded cover; 0 embeds the file as is.
    pub size: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub write_report: bool,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("downloads"),
            cover_art_dir: PathBuf::from("covers"),
            tracklist_dir: PathBuf::from("tracklists"),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: "yt-dlp".to_string(),
            browser: Some("safari".to_string()),
            format: "bestaudio/best".to_string(),
            audio_format: "mp3".to_string(),
            audio_quality: "192".to_string(),
            timeout: 600, // 10 minutes per track
            keep_going: false,
        }
    }
}

impl Default for ArtworkConfig {
    fn default() -> Self {
        Self { size: 300 }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { write_report: true }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(TubeTagError::Config {
                message: format!("Configuration file not found: {}", path.display()),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| TubeTagError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| TubeTagError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;

        Ok(config)
    }

    pub fn load_with_defaults<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_paths = ["tubetag.toml", ".tubetag.toml"];

                for default_path in &default_paths {
                    if Path::new(default_path).exists() {
                        return Self::load_from_file(default_path);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    pub fn merge_with_cli_args(&mut self, cli_args: &CliOverrides) {
        if let Some(ref output_dir) = cli_args.output_dir {
            self.paths.output_dir = output_dir.clone();
        }

        if let Some(ref cover_art_dir) = cli_args.cover_art_dir {
            self.paths.cover_art_dir = cover_art_dir.clone();
        }

        if let Some(ref tracklist_dir) = cli_args.tracklist_dir {
            self.paths.tracklist_dir = tracklist_dir.clone();
        }

        if let Some(ref ytdlp_path) = cli_args.ytdlp_path {
            self.download.ytdlp_path = ytdlp_path.clone();
        }

        if cli_args.no_cookies {
            self.download.browser = None;
        } else if let Some(ref browser) = cli_args.browser {
            self.download.browser = Some(browser.clone());
        }

        if let Some(ref quality) = cli_args.audio_quality {
            self.download.audio_quality = quality.clone();
        }

        if let Some(timeout) = cli_args.timeout {
            self.download.timeout = timeout;
        }

        if cli_args.keep_going {
            self.download.keep_going = true;
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|e| TubeTagError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        std::fs::write(path, content).map_err(|e| TubeTagError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.download.ytdlp_path.trim().is_empty() {
            return Err(TubeTagError::Config {
                message: "The yt-dlp path cannot be empty".to_string(),
            });
        }

        if self.download.timeout == 0 {
            return Err(TubeTagError::Config {
                message: "Download timeout must be greater than 0".to_string(),
            });
        }

        if self.download.format.trim().is_empty() {
            return Err(TubeTagError::Config {
                message: "Download format selector cannot be empty".to_string(),
            });
        }

        // Tags are written with an ID3 writer, which only fits MP3 output
        if !self.download.audio_format.eq_ignore_ascii_case("mp3") {
            return Err(TubeTagError::Config {
                message: format!(
                    "Unsupported audio format '{}': only mp3 can be tagged",
                    self.download.audio_format
                ),
            });
        }

        let quality = self.download.audio_quality.trim_end_matches(['k', 'K']);
        if quality.parse::<u32>().is_err() {
            return Err(TubeTagError::Config {
                message: format!(
                    "Audio quality must be a bitrate such as 192 or 320K, got '{}'",
                    self.download.audio_quality
                ),
            });
        }

        if let Some(ref browser) = self.download.browser {
            if !crate::cli::SUPPORTED_BROWSERS.contains(&browser.to_lowercase().as_str()) {
                return Err(TubeTagError::Config {
                    message: format!(
                        "Unsupported browser '{}'. Choose one of: {}",
                        browser,
                        crate::cli::SUPPORTED_BROWSERS.join(", ")
                    ),
                });
            }
        }

        if self.artwork.size > 3000 {
            return Err(TubeTagError::Config {
                message: "Artwork size must be 3000 pixels or less".to_string(),
            });
        }

        Ok(())
    }

    pub fn download_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.download.timeout)
    }

    pub fn create_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config).unwrap_or_else(|_| String::new())
    }
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub output_dir: Option<PathBuf>,
    pub cover_art_dir: Option<PathBuf>,
    pub tracklist_dir: Option<PathBuf>,
    pub ytdlp_path: Option<String>,
    pub browser: Option<String>,
    pub no_cookies: bool,
    pub audio_quality: Option<String>,
    pub timeout: Option<u64>,
    pub keep_going: bool,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output_dir(mut self, output_dir: Option<PathBuf>) -> Self {
        self.output_dir = output_dir;
        self
    }

    pub fn with_cover_art_dir(mut self, cover_art_dir: Option<PathBuf>) -> Self {
        self.cover_art_dir = cover_art_dir;
        self
    }

    pub fn with_tracklist_dir(mut self, tracklist_dir: Option<PathBuf>) -> Self {
        self.tracklist_dir = tracklist_dir;
        self
    }

    pub fn with_ytdlp_path(mut self, ytdlp_path: Option<String>) -> Self {
        self.ytdlp_path = ytdlp_path;
        self
    }

    pub fn with_browser(mut self, browser: Option<String>) -> Self {
        self.browser = browser;
        self
    }

    pub fn with_no_cookies(mut self, no_cookies: bool) -> Self {
        self.no_cookies = no_cookies;
        self
    }

    pub fn with_audio_quality(mut self, quality: Option<String>) -> Self {
        self.audio_quality = quality;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<u64>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_keep_going(mut self, keep_going: bool) -> Self {
        self.keep_going = keep_going;
        self
    }
}
