use crate::error::{Result, TubeTagError};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, trace, warn};

const PROGRESS_PREFIX: &str = "[tubetag]";
const PROGRESS_TEMPLATE: &str = "download:[tubetag] %(progress.status)s \
%(progress.downloaded_bytes)s %(progress.total_bytes)s %(progress.total_bytes_estimate)s";
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStage {
    Starting,
    Downloading,
    Converting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadProgress {
    pub stage: DownloadStage,
    pub downloaded_bytes: u64,
    pub total_bytes: Option<u64>,
}

impl DownloadProgress {
    pub fn starting() -> Self {
        Self {
            stage: DownloadStage::Starting,
            downloaded_bytes: 0,
            total_bytes: None,
        }
    }

    pub fn percentage(&self) -> Option<f64> {
        match self.total_bytes {
            Some(total) if total > 0 => {
                Some((self.downloaded_bytes as f64 / total as f64 * 100.0).min(100.0))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    pub path: PathBuf,
    pub bytes: u64,
    pub duration: Duration,
}

/// Runs yt-dlp to fetch one track and convert it to MP3.
pub struct YtDlp {
    program: String,
    browser: Option<String>,
    format: String,
    audio_format: String,
    audio_quality: String,
    timeout: Duration,
    verbose: bool,
    progress_callback: Option<Box<dyn Fn(DownloadProgress) + Send + Sync>>,
    running: Arc<AtomicBool>,
}

impl YtDlp {
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
            browser: None,
            format: "bestaudio/best".to_string(),
            audio_format: "mp3".to_string(),
            audio_quality: "192".to_string(),
            timeout: Duration::from_secs(600),
            verbose: false,
            progress_callback: None,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn with_browser<S: Into<String>>(mut self, browser: Option<S>) -> Self {
        self.browser = browser.map(Into::into);
        self
    }

    pub fn with_format<S: Into<String>>(mut self, format: S) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_audio_format<S: Into<String>>(mut self, audio_format: S) -> Self {
        self.audio_format = audio_format.into();
        self
    }

    pub fn with_audio_quality<S: Into<String>>(mut self, quality: S) -> Self {
        self.audio_quality = quality.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(DownloadProgress) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Box::new(callback));
        self
    }

    /// Share a cancellation flag; the child is killed once it turns false.
    pub fn with_shutdown_flag(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = running;
        self
    }

    pub fn build_args(&self, url: &str, output_stem: &Path) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(ref browser) = self.browser {
            args.push("--cookies-from-browser".to_string());
            args.push(browser.clone());
        }

        args.extend([
            "-f".to_string(),
            self.format.clone(),
            "-x".to_string(),
            "--audio-format".to_string(),
            self.audio_format.clone(),
            "--audio-quality".to_string(),
            format!("{}K", self.audio_quality.trim_end_matches(['k', 'K'])),
            "--no-playlist".to_string(),
            "--newline".to_string(),
            "--progress-template".to_string(),
            PROGRESS_TEMPLATE.to_string(),
            "-o".to_string(),
            output_template(output_stem),
        ]);

        if self.verbose {
            args.push("--verbose".to_string());
        }

        args.push(url.to_string());
        args
    }

    /// Final path yt-dlp writes for `output_stem` once conversion is done.
    pub fn converted_path(&self, output_stem: &Path) -> PathBuf {
        let mut path = output_stem.as_os_str().to_os_string();
        path.push(".");
        path.push(&self.audio_format);
        PathBuf::from(path)
    }

    pub async fn version(&self) -> Result<String> {
        let output = Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(TubeTagError::Extraction {
                url: "--version".to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Download `url` into `<output_stem>.mp3`. Whatever the run leaves next to
    /// the stem is removed when it fails, times out or is cancelled.
    pub async fn extract_mp3(&self, url: &str, output_stem: &Path) -> Result<DownloadOutcome> {
        let start_time = Instant::now();
        let args = self.build_args(url, output_stem);
        debug!(program = %self.program, ?args, "spawning yt-dlp");

        self.report(DownloadProgress::starting());

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stdout = child.stdout.take().ok_or_else(|| TubeTagError::Extraction {
            url: url.to_string(),
            message: "could not capture yt-dlp output".to_string(),
        })?;
        let mut stderr = child.stderr.take().ok_or_else(|| TubeTagError::Extraction {
            url: url.to_string(),
            message: "could not capture yt-dlp errors".to_string(),
        })?;

        let stderr_reader = tokio::spawn(async move {
            let mut text = String::new();
            let _ = stderr.read_to_string(&mut text).await;
            text
        });

        let status = match self.supervise(&mut child, stdout).await {
            Ok(status) => status,
            Err(e) => {
                stderr_reader.abort();
                self.remove_leftovers(output_stem).await;
                return Err(e);
            }
        };
        let stderr_text = stderr_reader.await.unwrap_or_default();

        for line in stderr_text.lines() {
            trace!(target: "tubetag::ytdlp", "{}", line);
        }

        if !status.success() {
            warn!(%url, code = ?status.code(), "yt-dlp exited with failure");
            self.remove_leftovers(output_stem).await;
            return Err(classify_failure(&stderr_text, url));
        }

        let path = self.converted_path(output_stem);
        let bytes = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.len(),
            Err(_) => {
                self.remove_leftovers(output_stem).await;
                return Err(TubeTagError::Extraction {
                    url: url.to_string(),
                    message: format!("yt-dlp finished but {} was not created", path.display()),
                });
            }
        };
        debug!(path = %path.display(), bytes, "yt-dlp produced mp3");

        Ok(DownloadOutcome {
            path,
            bytes,
            duration: start_time.elapsed(),
        })
    }

    /// Delete every file yt-dlp may have written for `output_stem`
    /// (`<stem>.mp3`, `<stem>.webm.part`, ...).
    pub async fn remove_leftovers(&self, output_stem: &Path) {
        let (Some(dir), Some(name)) = (output_stem.parent(), output_stem.file_name()) else {
            return;
        };
        let dir = if dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            dir
        };
        let prefix = format!("{}.", name.to_string_lossy());

        let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
            return;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                debug!(path = %entry.path().display(), "removing partial download");
                if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                    warn!(path = %entry.path().display(), error = %e, "could not remove partial download");
                }
            }
        }
    }

    /// Follow stdout until the child exits, killing it on timeout or shutdown.
    async fn supervise(&self, child: &mut Child, stdout: ChildStdout) -> Result<ExitStatus> {
        let mut lines = BufReader::new(stdout).lines();
        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);
        let mut shutdown_check = tokio::time::interval(SHUTDOWN_POLL);
        let mut stdout_open = true;

        let outcome = loop {
            tokio::select! {
                _ = &mut deadline => {
                    break Err(TubeTagError::Timeout {
                        seconds: self.timeout.as_secs(),
                    });
                }
                _ = shutdown_check.tick() => {
                    if !self.running.load(Ordering::SeqCst) {
                        break Err(TubeTagError::Cancelled);
                    }
                }
                line = lines.next_line(), if stdout_open => match line {
                    Ok(Some(line)) => self.handle_line(&line),
                    Ok(None) | Err(_) => stdout_open = false,
                },
                status = child.wait(), if !stdout_open => {
                    break status.map_err(TubeTagError::from);
                }
            }
        };

        if outcome.is_err() {
            if let Err(e) = child.kill().await {
                debug!(error = %e, "yt-dlp already exited");
            }
        }
        outcome
    }

    fn handle_line(&self, line: &str) {
        trace!(target: "tubetag::ytdlp", "{}", line);

        if let Some(progress) = parse_progress_line(line) {
            self.report(progress);
        }
    }

    fn report(&self, progress: DownloadProgress) {
        if let Some(ref callback) = self.progress_callback {
            callback(progress);
        }
    }

    fn spawn_error(&self, error: std::io::Error) -> TubeTagError {
        match error.kind() {
            std::io::ErrorKind::NotFound => TubeTagError::ExtractorNotFound {
                program: self.program.clone(),
            },
            std::io::ErrorKind::PermissionDenied => TubeTagError::Permission {
                path: self.program.clone(),
            },
            _ => TubeTagError::Io(error),
        }
    }
}

/// yt-dlp expands `%(...)s` fields in `-o`, so literal percent signs are doubled.
fn output_template(output_stem: &Path) -> String {
    format!(
        "{}.%(ext)s",
        output_stem.to_string_lossy().replace('%', "%%")
    )
}

fn progress_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\[tubetag\] (\w+) (\S+) (\S+) (\S+)\s*$").expect("progress pattern is valid")
    })
}

/// Parse one stdout line of yt-dlp run with our progress template.
pub fn parse_progress_line(line: &str) -> Option<DownloadProgress> {
    let line = line.trim();

    if line.starts_with("[ExtractAudio]") {
        return Some(DownloadProgress {
            stage: DownloadStage::Converting,
            downloaded_bytes: 0,
            total_bytes: None,
        });
    }

    if !line.starts_with(PROGRESS_PREFIX) {
        return None;
    }

    let caps = progress_regex().captures(line)?;
    let downloaded_bytes = parse_bytes(&caps[2]).unwrap_or(0);
    let total_bytes = parse_bytes(&caps[3]).or_else(|| parse_bytes(&caps[4]));

    let stage = match &caps[1] {
        "downloading" => DownloadStage::Downloading,
        "finished" => DownloadStage::Converting,
        _ => return None,
    };

    Some(DownloadProgress {
        stage,
        downloaded_bytes,
        total_bytes,
    })
}

// yt-dlp prints "NA" for unknown sizes and floats for estimates
fn parse_bytes(field: &str) -> Option<u64> {
    field
        .parse::<u64>()
        .ok()
        .or_else(|| field.parse::<f64>().ok().filter(|v| *v >= 0.0).map(|v| v as u64))
}

/// Map yt-dlp's stderr to the error kind the user can act on.
pub fn classify_failure(stderr: &str, url: &str) -> TubeTagError {
    let message = error_line(stderr);
    let lower = stderr.to_lowercase();

    let contains_any = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if contains_any(&[
        "ffmpeg not found",
        "ffprobe and ffmpeg not found",
        "ffprobe not found",
    ]) {
        return TubeTagError::MissingDependency { message };
    }

    if contains_any(&[
        "sign in to confirm",
        "login required",
        "use --cookies",
        "failed to decrypt",
        "cookies database",
        "http error 403",
    ]) {
        return TubeTagError::AuthenticationFailed {
            url: url.to_string(),
            message,
        };
    }

    if contains_any(&[
        "video unavailable",
        "private video",
        "has been removed",
        "not available in your country",
        "http error 404",
    ]) {
        return TubeTagError::TrackUnavailable {
            url: url.to_string(),
            message,
        };
    }

    if contains_any(&[
        "unable to download webpage",
        "connection refused",
        "connection reset",
        "timed out",
        "name or service not known",
        "temporary failure in name resolution",
        "network is unreachable",
        "getaddrinfo failed",
    ]) {
        return TubeTagError::NetworkError { message };
    }

    TubeTagError::Extraction {
        url: url.to_string(),
        message,
    }
}

fn error_line(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    lines
        .iter()
        .rev()
        .find_map(|l| l.strip_prefix("ERROR:"))
        .map(|l| l.trim().to_string())
        .or_else(|| lines.last().map(|l| l.to_string()))
        .unwrap_or_else(|| "yt-dlp exited without an error message".to_string())
}
