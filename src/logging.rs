use anyhow::Result;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Parses a log level name, or one of the numeric levels older deployments
/// set (`-4` debug, `0` info, `4` warn, `8` error).
///
/// # Errors
/// Returns an error for unknown names or numbers.
pub fn parse_log_level(raw: &str) -> Result<LevelFilter> {
    let level = match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" | "-4" => LevelFilter::DEBUG,
        "info" | "0" => LevelFilter::INFO,
        "warn" | "warning" | "4" => LevelFilter::WARN,
        "error" | "8" => LevelFilter::ERROR,
        "off" => LevelFilter::OFF,
        other => anyhow::bail!("Unknown log level: {other:?}"),
    };
    Ok(level)
}

/// Installs the global tracing subscriber. `RUST_LOG` takes precedence over
/// the configured level.
///
/// # Errors
/// Returns an error if the configured level is invalid.
pub fn init_tracing(log_level: &str) -> Result<()> {
    let level = parse_log_level(log_level)?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}
