pub mod ytdlp;

pub use ytdlp::{
    classify_failure, parse_progress_line, DownloadOutcome, DownloadProgress, DownloadStage, YtDlp,
};
