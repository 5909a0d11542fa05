//! Tracing initialization

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install the global subscriber: env-filtered console output plus an
/// optional daily-rolling file layer when a log directory is configured.
pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},strata=debug", config.level)));

    // File logging is opt-in via STRATA_LOG_DIR (LOG_DIR as fallback).
    let log_dir = std::env::var("STRATA_LOG_DIR")
        .or_else(|_| std::env::var("LOG_DIR"))
        .ok();

    // `tracing_appender::rolling::daily` panics if it cannot create the
    // initial log file, so preflight writability before installing it.
    let file_layer = log_dir.and_then(|dir| {
        if std::fs::create_dir_all(&dir).is_err() {
            eprintln!("Warning: could not create log directory {dir}, file logging disabled");
            return None;
        }
        let test_path = std::path::Path::new(&dir).join(".strata_write_test");
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&test_path)
        {
            Ok(_) => {
                let _ = std::fs::remove_file(&test_path);

                let file_appender = tracing_appender::rolling::daily(&dir, "strata.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

                // Keep the guard alive for the process lifetime.
                Box::leak(Box::new(guard));

                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!(
                    "Warning: could not write to log directory {dir} ({e}), file logging disabled"
                );
                None
            }
        }
    });

    let console_layer = tracing_subscriber::fmt::layer().with_target(true);

    if config.json {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(console_layer)
            .try_init();
    }
}
