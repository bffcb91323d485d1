pub mod core;
pub mod markdown;
pub mod parser;
pub mod pipeline;
pub mod providers;
pub mod writeback;

use tracing_subscriber::EnvFilter;

use crate::core::config::env_flag_enabled;

fn log_level_from_env() -> &'static str {
    match std::env::var("WEBHOOK_ANALYST_LOG")
        .unwrap_or_else(|_| "info".to_string())
        .to_ascii_lowercase()
        .as_str()
    {
        "trace" => "trace",
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    }
}

fn log_directives() -> String {
    let level = log_level_from_env();
    if env_flag_enabled("HTTP_DEBUG") {
        level.to_string()
    } else {
        format!("{level},reqwest=warn,hyper=warn,hyper_util=warn")
    }
}

/// Installs the global subscriber. Calling it again is a no-op.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_directives()))
        .with_target(true)
        .try_init();
}
