use thiserror::Error;

#[derive(Error, Debug)]
pub enum TubeTagError {
    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid tracklist {path}: {message}")]
    Manifest { path: String, message: String },

    #[error("Tracklist not found: {path}")]
    TracklistNotFound { path: String },

    #[error("Invalid track source: {url}")]
    InvalidUrl { url: String },

    #[error("Authentication failed for: {url}")]
    AuthenticationFailed { url: String, message: String },

    #[error("Network error occurred")]
    NetworkError { message: String },

    #[error("Track unavailable: {url}")]
    TrackUnavailable { url: String, message: String },

    #[error("Extractor not found: {program}")]
    ExtractorNotFound { program: String },

    #[error("Missing dependency: {message}")]
    MissingDependency { message: String },

    #[error("Extraction failed for {url}: {message}")]
    Extraction { url: String, message: String },

    #[error("Invalid cover art {path}: {message}")]
    InvalidCoverArt { path: String, message: String },

    #[error("Failed to write tags to {path}: {message}")]
    Tagging { path: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Permission denied: {path}")]
    Permission { path: String },

    #[error("Operation was cancelled by user")]
    Cancelled,

    #[error("Operation timed out after {seconds} seconds")]
    Timeout { seconds: u64 },
}

pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for TubeTagError {
    fn user_message(&self) -> String {
        match self {
            TubeTagError::Manifest { path, message } => {
                format!("Tracklist {} is invalid: {}", path, message)
            }
            TubeTagError::TracklistNotFound { path } => {
                format!("Tracklist not found: {}", path)
            }
            TubeTagError::InvalidUrl { url } => {
                format!("Invalid track URL or video id: {}", url)
            }
            TubeTagError::AuthenticationFailed { url, message } => {
                format!("Authentication failed for {}: {}", url, message)
            }
            TubeTagError::NetworkError { message } => {
                format!("Network error: {}", message)
            }
            TubeTagError::TrackUnavailable { url, message } => {
                format!("Track unavailable ({}): {}", url, message)
            }
            TubeTagError::ExtractorNotFound { program } => {
                format!("Could not run the extractor '{}'", program)
            }
            TubeTagError::Extraction { url, message } => {
                format!("yt-dlp failed for {}: {}", url, message)
            }
            TubeTagError::InvalidCoverArt { path, message } => {
                format!("Cover art {} could not be used: {}", path, message)
            }
            TubeTagError::Tagging { path, message } => {
                format!("Could not tag {}: {}", path, message)
            }
            TubeTagError::Config { message } => {
                format!("Configuration error: {}", message)
            }
            TubeTagError::Permission { path } => {
                format!("Permission denied accessing: {}", path)
            }
            TubeTagError::Cancelled => "Operation was cancelled by user".to_string(),
            TubeTagError::Timeout { seconds } => {
                format!("Download timed out after {} seconds", seconds)
            }
            _ => self.to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            TubeTagError::Manifest { .. } => Some(
                "A tracklist is a JSON array of objects with url, track_no, title, artist, album and cover fields.".to_string()
            ),
            TubeTagError::TracklistNotFound { .. } => Some(
                "Check the name, pass a full path, or point --tracklist-dir at the folder holding your tracklists. Use --list to see what is available.".to_string()
            ),
            TubeTagError::InvalidUrl { .. } => Some(
                "Use a full https://www.youtube.com/watch?v=... URL or an 11 character video id.".to_string()
            ),
            TubeTagError::AuthenticationFailed { .. } => Some(
                "Log into YouTube in your browser and pick it with --browser so its cookies can be used.".to_string()
            ),
            TubeTagError::NetworkError { .. } => Some(
                "Check your internet connection and try again.".to_string()
            ),
            TubeTagError::TrackUnavailable { .. } => Some(
                "The video may be private, removed or region locked. Replace its url in the tracklist.".to_string()
            ),
            TubeTagError::ExtractorNotFound { .. } => Some(
                "Install yt-dlp (https://github.com/yt-dlp/yt-dlp) or pass its location with --ytdlp.".to_string()
            ),
            TubeTagError::MissingDependency { .. } => Some(
                "Install ffmpeg and make sure it is on your PATH; yt-dlp needs it to convert audio to MP3.".to_string()
            ),
            TubeTagError::InvalidCoverArt { .. } => Some(
                "Convert the cover art to '.jpg' or '.png' and check that it is inside --cover-art-dir.".to_string()
            ),
            TubeTagError::Config { .. } => Some(
                "Check your configuration file syntax and ensure all required fields are present.".to_string()
            ),
            TubeTagError::Permission { .. } => Some(
                "Ensure you have the necessary read/write permissions for the target directory.".to_string()
            ),
            TubeTagError::Timeout { .. } => Some(
                "The download took longer than expected. Try again or increase the timeout with --timeout.".to_string()
            ),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for TubeTagError {
    fn from(error: toml::de::Error) -> Self {
        TubeTagError::Config {
            message: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TubeTagError>;
