//! Tracing setup for hosts embedding the core.

use crate::config::{AppConfig, LogLevel};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

pub type ReloadHandle = reload::Handle<EnvFilter, Registry>;

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
///
/// When the host already installed a subscriber the handle still works but
/// only controls the filter that was not installed.
pub fn init_tracing(config: &AppConfig) -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_filter_str()));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    let installed = tracing_subscriber::registry()
        .with(filter_layer)
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .try_init();
    match installed {
        Ok(()) => info!(
            level = %config.log_level,
            "Logging initialized; override level with log_level or RUST_LOG"
        ),
        Err(err) => warn!("Tracing subscriber already installed: {err}"),
    }
    handle
}

pub fn set_log_level(handle: &ReloadHandle, level: LogLevel) {
    let parsed = EnvFilter::new(level.as_filter_str());
    if let Err(err) = handle.modify(|filter| *filter = parsed) {
        warn!(%level, "Failed to update log level: {err}");
    } else {
        info!(%level, "Applied log level");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changing_level_after_init_does_not_panic() {
        let handle = init_tracing(&AppConfig::default());
        set_log_level(&handle, LogLevel::Debug);
        set_log_level(&handle, LogLevel::Warn);
    }
}
