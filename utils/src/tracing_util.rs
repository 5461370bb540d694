//! Helpers related to tracing, used by main entrypoints

use tracing::level_filters::LevelFilter;

/// Initialize tracing with the default configuration.
///
/// Warnings and errors are shown by default; `verbose` also enables debug
/// output, which includes every external command executed. `RUST_LOG`
/// directives are honored in both cases.
pub fn initialize_tracing(verbose: bool) {
    // Don't include timestamps and such because they're not really useful and
    // too verbose, and plus several log targets such as journald will already
    // include timestamps.
    let format = tracing_subscriber::fmt::format()
        .without_time()
        .with_target(false)
        .compact();
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    // Log to stderr by default
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .event_format(format)
        .with_writer(std::io::stderr)
        .init();
}
