// @fileoverview Logger bootstrap
//
// The library only talks to the `log` facade. Applications that want output
// without wiring their own logger can call `init_logging` once at startup.

use crate::config::KeychainConfig;

/// Install `env_logger` at the configured level
///
/// `RUST_LOG` takes precedence when set. Returns `false` if a logger was
/// already installed.
pub fn init_logging(config: &KeychainConfig) -> bool {
    let mut builder = env_logger::Builder::new();
    builder.parse_filters(&format!("mr_keychain={}", config.log_level.trim()));
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.try_init().is_ok()
}
