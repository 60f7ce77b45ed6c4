//! Application configuration: loads and validates [`RootConfig`] at startup,
//! replacing the ad hoc per-variable `env::var` reads a naive main() would
//! otherwise do with the crate-wide `from_env`/`validate` contract every
//! `backplane-core` sub-config already implements.

use backplane_core::config::RootConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] backplane_core::config::ConfigError),
}

pub struct AppConfig {
    pub root: RootConfig,
}

impl AppConfig {
    /// Loads configuration from the process environment (after `.env` has
    /// been applied by the caller) and validates it before the server binds
    /// to a socket or touches storage.
    pub fn load() -> Result<Self, ConfigError> {
        let root = RootConfig::from_env()?;
        root.validate()?;
        Ok(Self { root })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.root.api.host, self.root.api.port)
    }
}
