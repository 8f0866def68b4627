use crate::config::{CliOverrides, Config};
use crate::error::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Browsers yt-dlp can read cookies from.
pub const SUPPORTED_BROWSERS: &[&str] = &[
    "brave", "chrome", "chromium", "edge", "firefox", "opera", "safari", "vivaldi", "whale",
];

#[derive(Parser, Debug)]
#[command(name = "tubetag")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Download YouTube audio as tagged MP3 files")]
#[command(
    long_about = "TubeTag reads a JSON tracklist, downloads each track's audio with yt-dlp, \
                  converts it to MP3 and writes title, artist, album, track number and cover \
                  art into the file's ID3 tag."
)]
#[command(before_help = "🎵 TubeTag - YouTube to tagged MP3")]
#[command(after_help = "EXAMPLES:\n  \
    tubetag album.json\n  \
    tubetag -t album.json --browser firefox --output-dir music\n  \
    tubetag ./lists/ep.json --cover-art-dir art --quality 320 --keep-going\n  \
    tubetag album.json --dry-run\n  \
    tubetag --list\n\n\
    Tracklists are JSON arrays of {url, track_no, title, artist, album, cover} objects.")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Tracklist file name (looked up in --tracklist-dir) or path
    #[arg(required_unless_present_any = ["generate_config", "list", "tracklist_flag"])]
    pub tracklist: Option<String>,

    /// Tracklist file name, same as the positional argument
    #[arg(short = 't', long = "tracklist", conflicts_with = "tracklist")]
    pub tracklist_flag: Option<String>,

    /// Browser to read YouTube cookies from
    #[arg(short, long, value_enum)]
    pub browser: Option<Browser>,

    /// Do not pass any browser cookies to yt-dlp
    #[arg(long, conflicts_with = "browser")]
    pub no_cookies: bool,

    /// Folder receiving downloaded MP3 files
    #[arg(long, help = "Folder containing downloaded MP3 files (default: downloads)")]
    pub output_dir: Option<PathBuf>,

    /// Folder containing cover art images
    #[arg(long, help = "Folder containing cover art images (default: covers)")]
    pub cover_art_dir: Option<PathBuf>,

    /// Folder containing tracklist files
    #[arg(long, help = "Folder containing tracklist files (default: tracklists)")]
    pub tracklist_dir: Option<PathBuf>,

    /// yt-dlp executable
    #[arg(long = "ytdlp", env = "TUBETAG_YTDLP", help = "Path to the yt-dlp executable")]
    pub ytdlp_path: Option<String>,

    /// MP3 bitrate in kbps
    #[arg(long, help = "MP3 bitrate passed to yt-dlp (e.g. 192, 320)")]
    pub quality: Option<String>,

    /// Per-track download timeout in seconds
    #[arg(long, help = "Timeout for a single track download (seconds)")]
    pub timeout: Option<u64>,

    /// Configuration file path
    #[arg(short, long, help = "Path to TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Output format for results
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Verbose output level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Re-download tracks whose MP3 already exists
    #[arg(long, help = "Download again even if the MP3 file already exists")]
    pub force: bool,

    /// Continue with the next track when one fails
    #[arg(long, help = "Keep processing the tracklist after a failed track")]
    pub keep_going: bool,

    /// Dry run (show what would be done without executing)
    #[arg(long, help = "Show what would be downloaded without doing it")]
    pub dry_run: bool,

    /// List available tracklists
    #[arg(long, help = "List tracklists found in the tracklist directory")]
    pub list: bool,

    /// Generate sample configuration file
    #[arg(long, help = "Generate a sample configuration file")]
    pub generate_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Browser {
    Brave,
    Chrome,
    Chromium,
    Edge,
    Firefox,
    Opera,
    Safari,
    Vivaldi,
    Whale,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Brave => "brave",
            Browser::Chrome => "chrome",
            Browser::Chromium => "chromium",
            Browser::Edge => "edge",
            Browser::Firefox => "firefox",
            Browser::Opera => "opera",
            Browser::Safari => "safari",
            Browser::Vivaldi => "vivaldi",
            Browser::Whale => "whale",
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON formatted output
    Json,
    /// Plain text output
    Plain,
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_with_defaults(self.config.as_ref())?;

        let overrides = self.create_cli_overrides();
        config.merge_with_cli_args(&overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn create_cli_overrides(&self) -> CliOverrides {
        let quality = self
            .quality
            .as_ref()
            .map(|q| q.trim().trim_end_matches(['k', 'K']).to_string());

        CliOverrides::new()
            .with_output_dir(self.output_dir.clone())
            .with_cover_art_dir(self.cover_art_dir.clone())
            .with_tracklist_dir(self.tracklist_dir.clone())
            .with_ytdlp_path(self.ytdlp_path.clone())
            .with_browser(self.browser.map(|b| b.as_str().to_string()))
            .with_no_cookies(self.no_cookies)
            .with_audio_quality(quality)
            .with_timeout(self.timeout)
            .with_keep_going(self.keep_going)
    }

    /// Tracklist name from either the positional argument or `--tracklist`.
    pub fn tracklist_name(&self) -> Option<&str> {
        self.tracklist
            .as_deref()
            .or(self.tracklist_flag.as_deref())
    }

    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_tracklist() {
        let cli = Cli::try_parse_from(["tubetag", "album.json"]).unwrap();
        assert_eq!(cli.tracklist_name(), Some("album.json"));
        assert!(cli.browser.is_none());
    }

    #[test]
    fn test_flag_tracklist() {
        let cli = Cli::try_parse_from(["tubetag", "-t", "album.json", "-b", "firefox"]).unwrap();
        assert_eq!(cli.tracklist_name(), Some("album.json"));
        assert_eq!(cli.browser, Some(Browser::Firefox));
    }

    #[test]
    fn test_tracklist_required() {
        assert!(Cli::try_parse_from(["tubetag", "--force"]).is_err());
        assert!(Cli::try_parse_from(["tubetag", "--list"]).is_ok());
        assert!(Cli::try_parse_from(["tubetag", "--generate-config"]).is_ok());
    }

    #[test]
    fn test_unknown_browser_rejected() {
        assert!(Cli::try_parse_from(["tubetag", "a.json", "--browser", "netscape"]).is_err());
    }

    #[test]
    fn test_browser_names_match_supported_list() {
        for browser in Browser::value_variants() {
            assert!(SUPPORTED_BROWSERS.contains(&browser.as_str()));
        }
    }

    #[test]
    fn test_overrides_from_cli() {
        let cli = Cli::try_parse_from([
            "tubetag",
            "album.json",
            "--browser",
            "chrome",
            "--quality",
            "320K",
            "--output-dir",
            "music",
            "--keep-going",
        ])
        .unwrap();

        let overrides = cli.create_cli_overrides();
        assert_eq!(overrides.browser.as_deref(), Some("chrome"));
        assert_eq!(overrides.audio_quality.as_deref(), Some("320"));
        assert_eq!(overrides.output_dir, Some(PathBuf::from("music")));
        assert!(overrides.keep_going);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["tubetag", "a.json", "-q", "-v"]).is_err());
    }

    #[test]
    fn test_verbosity_level() {
        let cli = Cli::try_parse_from(["tubetag", "a.json", "-vv"]).unwrap();
        assert_eq!(cli.verbosity_level(), 2);

        let cli = Cli::try_parse_from(["tubetag", "a.json", "-q"]).unwrap();
        assert_eq!(cli.verbosity_level(), 0);
    }
}
