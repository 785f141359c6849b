use tracing_subscriber::EnvFilter;

use crate::settings::{LogConfig, LogFormat};

const LEVELS: [&str; 4] = ["debug", "info", "warn", "error"];

/// Configured level, lowercased; anything unrecognised falls back to `info`.
fn level(cfg: &LogConfig) -> String {
    let level = cfg.level.trim().to_lowercase();
    if LEVELS.contains(&level.as_str()) {
        level
    } else {
        "info".into()
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the config level.
pub fn init(cfg: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level(cfg)));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let _ = match cfg.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
}
