use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;

use super::StaticConfig;

static CONFIG: OnceLock<ArcSwap<StaticConfig>> = OnceLock::new();

/// Get the global configuration instance
///
/// Returns an Arc pointer to the configuration, which is cheap to clone
/// and doesn't hold any locks.
pub fn get_config() -> Arc<StaticConfig> {
    try_get_config().unwrap_or_else(|| Arc::new(StaticConfig::default()))
}

/// Get the global configuration if `init_config()` has been called
pub fn try_get_config() -> Option<Arc<StaticConfig>> {
    CONFIG.get().map(|cfg| cfg.load_full())
}

/// Initialize the global configuration
///
/// Loads configuration from "config.toml" in the current directory plus
/// `LC__*` environment overrides. Missing file means in-memory defaults.
///
/// # Examples
/// ```no_run
/// use linkcycle::config::init_config;
/// init_config();
/// ```
pub fn init_config() {
    CONFIG.get_or_init(|| ArcSwap::from_pointee(StaticConfig::load()));
}

/// Initialize (or replace) the global configuration with an explicit value
pub fn init_config_with(config: StaticConfig) {
    CONFIG
        .get_or_init(|| ArcSwap::from_pointee(StaticConfig::default()))
        .store(Arc::new(config));
}
