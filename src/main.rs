use clap::Parser;
use std::process;
use tubetag::{
    logging, Cli, FetchPlan, OutputFormatter, OutputMode, TubeTag, TubeTagError,
    UserFriendlyError,
};

#[tokio::main]
async fn main() {
    let exit_code = run().await;
    process::exit(exit_code);
}

async fn run() -> i32 {
    let cli = Cli::parse();
    logging::init_logging(cli.verbosity_level(), cli.quiet);

    // Handle special commands first
    if cli.generate_config {
        return handle_generate_config(&cli);
    }

    let tubetag = match TubeTag::from_cli(&cli) {
        Ok(tubetag) => tubetag,
        Err(e) => {
            print_startup_error(&e);
            return exit_code_for(&e);
        }
    };

    if cli.list {
        return handle_list(&tubetag);
    }

    let tracklist = match cli.tracklist_name() {
        Some(name) => name.to_string(),
        None => {
            tubetag
                .output_formatter()
                .error("No tracklist given. Pass a tracklist name or use --list.");
            return 1;
        }
    };

    if cli.dry_run {
        return handle_dry_run(&tracklist, &tubetag).await;
    }

    match tubetag.fetch_tracklist(&tracklist).await {
        Ok(report) => {
            tubetag.output_formatter().print_fetch_report(&report);

            if report.has_failures() {
                2 // Finished, some tracks failed
            } else {
                0
            }
        }
        Err(e) => {
            tubetag.handle_error(&e);
            exit_code_for(&e)
        }
    }
}

fn exit_code_for(error: &TubeTagError) -> i32 {
    match error {
        TubeTagError::Cancelled => 130, // Interrupted (SIGINT)
        TubeTagError::Manifest { .. }
        | TubeTagError::TracklistNotFound { .. }
        | TubeTagError::InvalidUrl { .. } => 3,
        TubeTagError::AuthenticationFailed { .. } => 4,
        TubeTagError::NetworkError { .. } => 5,
        TubeTagError::ExtractorNotFound { .. } | TubeTagError::MissingDependency { .. } => 6,
        TubeTagError::Permission { .. } => 7,
        TubeTagError::InvalidCoverArt { .. } => 8,
        TubeTagError::Timeout { .. } => 9,
        TubeTagError::TrackUnavailable { .. } => 10,
        _ => 1,
    }
}

fn handle_generate_config(cli: &Cli) -> i32 {
    let config_path = cli
        .config
        .as_ref()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| "tubetag.toml".to_string());

    match TubeTag::generate_sample_config(&config_path) {
        Ok(()) => {
            println!("Generated sample configuration file: {}", config_path);
            println!("\nTo use this configuration:");
            println!("  tubetag <tracklist> --config {}", config_path);
            println!("\nEdit the file to set your folders, browser and bitrate.");
            0
        }
        Err(e) => {
            eprintln!("Failed to generate configuration file: {}", e.user_message());
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            1
        }
    }
}

fn handle_list(tubetag: &TubeTag) -> i32 {
    let formatter = tubetag.output_formatter();
    let tracklist_dir = &tubetag.config().paths.tracklist_dir;

    let found = match tubetag.list_tracklists() {
        Ok(found) => found,
        Err(e) => {
            formatter.print_user_friendly_error(&e);
            return exit_code_for(&e);
        }
    };

    if formatter.mode() == OutputMode::Json {
        let names: Vec<String> = found.iter().map(|p| p.display().to_string()).collect();
        formatter.print_json_object(&serde_json::json!({
            "type": "tracklists",
            "directory": tracklist_dir.display().to_string(),
            "tracklists": names,
        }));
        return 0;
    }

    if found.is_empty() {
        formatter.warning(&format!(
            "No tracklists found in {}",
            tracklist_dir.display()
        ));
        return 0;
    }

    formatter.print_header(&format!("Tracklists in {}", tracklist_dir.display()));
    for path in &found {
        let shown = path.strip_prefix(tracklist_dir).unwrap_or(path);
        println!("  {}", shown.display());
    }

    0
}

async fn handle_dry_run(tracklist: &str, tubetag: &TubeTag) -> i32 {
    let formatter = tubetag.output_formatter();

    let spinner = tubetag
        .progress_manager()
        .create_spinner(&format!("Checking tracklist '{}'", tracklist));
    let plan = tubetag.plan(tracklist).await;
    spinner.finish_and_clear();

    let plan = match plan {
        Ok(plan) => plan,
        Err(e) => {
            formatter.print_user_friendly_error(&e);
            return exit_code_for(&e);
        }
    };

    if formatter.mode() == OutputMode::Json {
        formatter.print_json_object(&plan_to_json(&plan, tubetag.is_force()));
        return 0;
    }

    formatter.info("DRY RUN MODE - Nothing will be downloaded");
    formatter.print_separator();

    formatter.info("Configuration that would be used:");
    let config = tubetag.config();

    println!("  yt-dlp: {}", config.download.ytdlp_path);
    println!(
        "  Cookies from: {}",
        config.download.browser.as_deref().unwrap_or("(none)")
    );
    println!(
        "  Audio: {} at {}K",
        config.download.audio_format, config.download.audio_quality
    );
    println!("  Timeout: {} seconds", config.download.timeout);
    println!("  Output directory: {}", config.paths.output_dir.display());
    println!("  Cover art directory: {}", config.paths.cover_art_dir.display());
    println!("  Cover size: {}px", config.artwork.size);

    match plan.extractor_version {
        Some(ref version) => formatter.success(&format!("yt-dlp {} is available", version)),
        None => formatter.warning(&format!(
            "Could not run '{}'; downloads would fail",
            config.download.ytdlp_path
        )),
    }

    formatter.print_separator();
    formatter.info(&format!(
        "Plan for '{}' ({})",
        plan.tracklist.name,
        plan.tracklist.path.display()
    ));

    for planned in &plan.tracks {
        let action = if !planned.already_downloaded {
            "download"
        } else if tubetag.is_force() {
            "replace"
        } else {
            "skip"
        };
        println!(
            "  [{:>8}] {} -> {}",
            action,
            planned.source_url,
            planned.output_path.display()
        );
        if let Some(ref problem) = planned.cover_problem {
            formatter.warning(&format!("    cover: {}", problem));
        }
    }

    formatter.print_separator();
    formatter.success(&format!(
        "{} of {} tracks would be downloaded",
        plan.pending(tubetag.is_force()),
        plan.tracks.len()
    ));
    if plan.cover_problems() > 0 {
        formatter.warning(&format!(
            "{} tracks have cover art problems and would fail",
            plan.cover_problems()
        ));
    }
    formatter.info("Run without --dry-run to download");

    0
}

fn plan_to_json(plan: &FetchPlan, force: bool) -> serde_json::Value {
    let tracks: Vec<serde_json::Value> = plan
        .tracks
        .iter()
        .map(|planned| {
            serde_json::json!({
                "track": planned.track,
                "source_url": planned.source_url,
                "output_path": planned.output_path,
                "already_downloaded": planned.already_downloaded,
                "will_download": planned.will_download(force),
                "cover_path": planned.cover_path,
                "cover_problem": planned.cover_problem,
            })
        })
        .collect();

    serde_json::json!({
        "type": "dry_run",
        "tracklist": plan.tracklist.name,
        "tracklist_path": plan.tracklist.path,
        "extractor_version": plan.extractor_version,
        "pending": plan.pending(force),
        "tracks": tracks,
    })
}

fn print_startup_error(error: &TubeTagError) {
    let formatter = OutputFormatter::new(OutputMode::Human, 0, false);
    formatter.print_user_friendly_error(error);
}
