use crate::models::CallLog;
use log::{debug, error, info, warn, LevelFilter};
use std::sync::Once;
use tracing::level_filters::LevelFilter as TracingLevel;
use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

static INIT: Once = Once::new();

/// Initialize the global logger.
///
/// `RUST_LOG` wins when set; otherwise `level` (e.g. "info", "debug",
/// "credential_proxy=trace") is used as the filter directive.
pub fn init_logger(level: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level))
            .unwrap_or_else(|_| EnvFilter::new("info"));
        let max_level = log_max_level(&filter);

        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .with_level(true)
            .with_ansi(true)
            .finish();

        if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Warning: Failed to set tracing subscriber: {:?}", e);
        }

        // Initialize LogTracer to bridge log events to tracing (after subscriber is set up)
        if let Err(e) = LogTracer::init() {
            eprintln!("Warning: Failed to initialize LogTracer: {:?}", e);
        }

        log::set_max_level(max_level);
    });
}

/// The most verbose level any directive in `filter` enables, as a `log` level
fn log_max_level(filter: &EnvFilter) -> LevelFilter {
    match filter.max_level_hint() {
        Some(hint) if hint == TracingLevel::OFF => LevelFilter::Off,
        Some(hint) if hint == TracingLevel::ERROR => LevelFilter::Error,
        Some(hint) if hint == TracingLevel::WARN => LevelFilter::Warn,
        Some(hint) if hint == TracingLevel::INFO => LevelFilter::Info,
        Some(hint) if hint == TracingLevel::DEBUG => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Log one outbound call record at debug level
pub fn log_call(record: &CallLog) {
    match serde_json::to_string(record) {
        Ok(json) => debug!("CALL: {}", json),
        Err(e) => warn!("Failed to serialize call record: {}", e),
    }
}

/// Log an error message
pub fn log_error(message: &str) {
    error!("{}", message);
}

/// Log an info message
pub fn log_info(message: &str) {
    info!("{}", message);
}

/// Convenience macro for logging errors
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logging::log_error(&format!($($arg)*));
    };
}

/// Convenience macro for logging info messages
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logging::log_info(&format!($($arg)*));
    };
}
