//! Logger setup for plugin binaries.
//!
//! A plugin loaded into the host has no Rust logger unless it installs one.
//! [`init`] is called by the bridge on register; it is a no-op when a logger
//! is already set or the `env-logger` feature is off.

/// Environment variable holding the filter, e.g. `FLB_BRIDGE_LOG=debug`.
pub const LOG_ENV: &str = "FLB_BRIDGE_LOG";

pub fn init() {
    #[cfg(feature = "env-logger")]
    {
        let env = env_logger::Env::new().filter_or(LOG_ENV, "info");
        if env_logger::Builder::from_env(env)
            .format_timestamp_millis()
            .try_init()
            .is_err()
        {
            log::debug!("Logger already installed; keeping it");
        }
    }
}
