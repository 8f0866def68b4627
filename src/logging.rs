use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter for a `-v` count. Quiet runs only report errors.
pub fn default_filter(verbosity: u8, quiet: bool) -> String {
    let level = if quiet {
        "error"
    } else {
        match verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    format!("tubetag={}", level)
}

/// Install the stderr subscriber. `RUST_LOG` wins over the `-v` count.
/// Calling this twice is harmless; the second call is ignored.
pub fn init_logging(verbosity: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity, quiet)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_levels() {
        assert_eq!(default_filter(0, false), "tubetag=warn");
        assert_eq!(default_filter(1, false), "tubetag=info");
        assert_eq!(default_filter(2, false), "tubetag=debug");
        assert_eq!(default_filter(5, false), "tubetag=trace");
        assert_eq!(default_filter(3, true), "tubetag=error");
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        init_logging(0, true);
        init_logging(2, false);
    }
}
