use crate::error::{TubeTagError, UserFriendlyError};
use crate::report::{FetchReport, TrackOutcome, TrackStatus};
use crate::ui::progress::format_duration;
use console::{style, Emoji, Term};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
    Plain,
}

// Emojis with text fallbacks
static CHECKMARK: Emoji = Emoji("✅ ", "✓ ");
static CROSS: Emoji = Emoji("❌ ", "✗ ");
static INFO: Emoji = Emoji("ℹ️  ", "i ");
static WARNING: Emoji = Emoji("⚠️  ", "! ");
static MUSIC: Emoji = Emoji("🎵 ", "> ");
static SPARKLES: Emoji = Emoji("✨ ", "* ");

pub struct OutputFormatter {
    mode: OutputMode,
    use_colors: bool,
    verbose_level: u8,
    quiet: bool,
}

impl OutputFormatter {
    pub fn new(mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        let use_colors = match mode {
            OutputMode::Human => Term::stdout().features().colors_supported() && !quiet,
            _ => false,
        };

        Self {
            mode,
            use_colors,
            verbose_level: if quiet { 0 } else { verbose },
            quiet,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Success, message),
            OutputMode::Json => self.print_json_message("success", message),
            OutputMode::Plain => println!("SUCCESS: {}", message),
        }
    }

    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Error, message),
            OutputMode::Json => self.print_json_message("error", message),
            OutputMode::Plain => eprintln!("ERROR: {}", message),
        }
    }

    pub fn warning(&self, message: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Warning, message),
                OutputMode::Json => self.print_json_message("warning", message),
                OutputMode::Plain => println!("WARNING: {}", message),
            }
        }
    }

    pub fn info(&self, message: &str) {
        if self.should_show_message(1) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Info, message),
                OutputMode::Json => self.print_json_message("info", message),
                OutputMode::Plain => println!("INFO: {}", message),
            }
        }
    }

    pub fn debug(&self, message: &str) {
        if self.should_show_message(2) {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        println!("  {}", style(message).dim());
                    } else {
                        println!("  DEBUG: {}", message);
                    }
                }
                OutputMode::Json => self.print_json_message("debug", message),
                OutputMode::Plain => println!("DEBUG: {}", message),
            }
        }
    }

    pub fn start_operation(&self, operation: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        println!("{}{}", MUSIC, style(operation).bold());
                    } else {
                        println!("> {}", operation);
                    }
                }
                OutputMode::Json => self.print_json_message("operation_start", operation),
                OutputMode::Plain => println!("STARTING: {}", operation),
            }
        }
    }

    pub fn print_user_friendly_error(&self, error: &TubeTagError) {
        let user_message = error.user_message();
        self.error(&user_message);

        if let Some(suggestion) = error.suggestion() {
            match self.mode {
                OutputMode::Human => {
                    eprintln!();
                    if self.use_colors {
                        eprintln!(
                            "{}{}",
                            INFO,
                            style(&format!("Suggestion: {}", suggestion)).cyan()
                        );
                    } else {
                        eprintln!("Suggestion: {}", suggestion);
                    }
                }
                OutputMode::Json => {
                    self.print_json_object(&serde_json::json!({
                        "type": "suggestion",
                        "message": suggestion
                    }));
                }
                OutputMode::Plain => {
                    eprintln!("SUGGESTION: {}", suggestion);
                }
            }
        }
    }

    /// One line per finished track.
    pub fn print_track_outcome(&self, outcome: &TrackOutcome) {
        let label = format!("{} - {} - {}", outcome.artist, outcome.track_no, outcome.title);
        match outcome.status {
            TrackStatus::Downloaded => self.success(&format!(
                "Tagged {} ({})",
                label,
                format_bytes(outcome.bytes)
            )),
            TrackStatus::Skipped => self.warning(&format!(
                "Already downloaded: {}",
                outcome.output_path.display()
            )),
            TrackStatus::Failed => self.error(&format!(
                "Failed {}: {}",
                label,
                outcome.error.as_deref().unwrap_or("unknown error")
            )),
        }
    }

    pub fn print_fetch_report(&self, report: &FetchReport) {
        match self.mode {
            OutputMode::Human => {
                if !self.quiet {
                    self.print_human_report(report)
                }
            }
            OutputMode::Json => {
                let json_output =
                    serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string());
                println!("{}", json_output);
            }
            OutputMode::Plain => self.print_plain_report(report),
        }
    }

    pub fn print_header(&self, title: &str) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                println!();
                if self.use_colors {
                    println!("{} {}", SPARKLES, style(title).bold().cyan());
                } else {
                    println!("=== {} ===", title);
                }
                println!();
            }
            OutputMode::Json => {
                self.print_json_object(&serde_json::json!({
                    "type": "header",
                    "title": title
                }));
            }
            OutputMode::Plain => {
                println!("=== {} ===", title);
            }
        }
    }

    pub fn print_separator(&self) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                if self.use_colors {
                    println!("{}", style("─".repeat(60)).dim());
                } else {
                    println!("{}", "-".repeat(60));
                }
            }
            OutputMode::Plain => {
                println!("{}", "-".repeat(60));
            }
            OutputMode::Json => {}
        }
    }

    pub fn print_json_object(&self, obj: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string(obj).unwrap_or_else(|_| "{}".to_string())
        );
    }

    fn should_show_message(&self, min_verbose_level: u8) -> bool {
        !self.quiet && self.verbose_level >= min_verbose_level
    }

    fn print_human_message(&self, msg_type: MessageType, message: &str) {
        let (emoji, styled) = match msg_type {
            MessageType::Success => (CHECKMARK, style(message).green().bold()),
            MessageType::Error => (CROSS, style(message).red().bold()),
            MessageType::Warning => (WARNING, style(message).yellow().bold()),
            MessageType::Info => (INFO, style(message).cyan()),
        };

        if self.use_colors {
            match msg_type {
                MessageType::Error => eprintln!("{}{}", emoji, styled),
                _ => println!("{}{}", emoji, styled),
            }
        } else {
            let prefix = match msg_type {
                MessageType::Success => "✓",
                MessageType::Error => "✗",
                MessageType::Warning => "!",
                MessageType::Info => "i",
            };

            match msg_type {
                MessageType::Error => eprintln!("{} {}", prefix, message),
                _ => println!("{} {}", prefix, message),
            }
        }
    }

    fn print_json_message(&self, level: &str, message: &str) {
        self.print_json_object(&serde_json::json!({
            "type": "message",
            "level": level,
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339()
        }));
    }

    fn highlight(&self, value: String) -> String {
        if self.use_colors {
            style(value).cyan().bold().to_string()
        } else {
            value
        }
    }

    fn print_human_report(&self, report: &FetchReport) {
        let summary = &report.summary;

        println!();
        self.print_separator();

        if report.has_failures() {
            if self.use_colors {
                println!(
                    "{}{}",
                    WARNING,
                    style(format!("Tracklist '{}' finished with errors", report.tracklist))
                        .yellow()
                        .bold()
                );
            } else {
                println!("! Tracklist '{}' finished with errors", report.tracklist);
            }
        } else if self.use_colors {
            println!(
                "{} {}",
                style(format!("Tracklist '{}' completed!", report.tracklist))
                    .green()
                    .bold(),
                CHECKMARK
            );
        } else {
            println!("✓ Tracklist '{}' completed!", report.tracklist);
        }

        println!();
        println!("  Downloaded:   {}", self.highlight(summary.downloaded.to_string()));
        println!("  Skipped:      {}", self.highlight(summary.skipped.to_string()));
        if summary.failed > 0 {
            println!("  Failed:       {}", self.highlight(summary.failed.to_string()));
        }
        let untouched = summary
            .total_tracks
            .saturating_sub(summary.downloaded + summary.skipped + summary.failed);
        if untouched > 0 {
            println!("  Not reached:  {}", self.highlight(untouched.to_string()));
        }
        println!(
            "  Total size:   {}",
            self.highlight(format_bytes(summary.total_bytes))
        );
        println!(
            "  Time taken:   {}",
            self.highlight(format_duration(summary.duration))
        );
        println!(
            "  Output:       {}",
            report.config_used.output_dir.display()
        );

        let errors = report.errors();
        if !errors.is_empty() {
            println!();
            println!("Issues encountered:");
            for error in errors {
                println!("  - {}", error);
            }
        }

        self.print_separator();
    }

    fn print_plain_report(&self, report: &FetchReport) {
        println!("REPORT: Tracklist {} processed", report.tracklist);
        println!("Tracks: {}", report.summary.total_tracks);
        println!("Downloaded: {}", report.summary.downloaded);
        println!("Skipped: {}", report.summary.skipped);
        println!("Failed: {}", report.summary.failed);
        println!("Size: {} bytes", report.summary.total_bytes);
        println!("Duration: {:?}", report.summary.duration);

        for error in report.errors() {
            println!("ERROR: {}", error);
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum MessageType {
    Success,
    Error,
    Warning,
    Info,
}

pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

// Progress-aware output wrapper
pub struct ProgressAwareOutput<'a> {
    formatter: &'a OutputFormatter,
    progress_manager: Option<&'a crate::ui::ProgressManager>,
}

impl<'a> ProgressAwareOutput<'a> {
    pub fn new(
        formatter: &'a OutputFormatter,
        progress_manager: Option<&'a crate::ui::ProgressManager>,
    ) -> Self {
        Self {
            formatter,
            progress_manager,
        }
    }

    pub fn suspend_and_print<F>(&self, f: F)
    where
        F: FnOnce(&OutputFormatter),
    {
        if let Some(pm) = self.progress_manager {
            pm.suspend(|| f(self.formatter));
        } else {
            f(self.formatter);
        }
    }

    pub fn track_outcome(&self, outcome: &TrackOutcome) {
        self.suspend_and_print(|f| f.print_track_outcome(outcome));
    }
}
