use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Initializes logging for the application.
///
/// Sets up two logging outputs:
/// - Console: compact format on stderr, warnings only by default so the progress line stays
///   readable
/// - File: JSON format in the application data dir (`logs/`) for bug reports
///
/// Log files are rotated daily to prevent unbounded growth.
///
/// Default file log level is "info" with the task and service crates at debug. RUST_LOG
/// overrides both outputs:
/// - RUST_LOG=debug batch-delete ...
/// - RUST_LOG=task_core=trace batch-delete ...
///
/// Returns a guard that must be kept alive for the duration of the program.
/// Dropping this guard will cause file logging to stop.
pub fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .compact()
        .with_filter(console_filter);

    let (file_layer, guard) = match file_system::get_log_dir() {
        Ok(log_dir) => {
            let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "app.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            let file_filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,service=debug,task_core=debug"));
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(file_filter);
            (Some(file_layer), Some(guard))
        }
        Err(e) => {
            eprintln!("Warning: Failed to create log directory: {}", e);
            eprintln!("Logs will only be written to console.");
            (None, None)
        }
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    guard
}
