//! Environment configuration utilities
//!
//! Utilities for loading and validating environment variables with type
//! conversion and default-value handling, used by every `*Config::from_env`
//! in this crate and in the component crates built on top of it.

use crate::config::{ConfigError, ConfigResult};
use std::env;
use std::str::FromStr;

/// Environment variable loader with type conversion and validation.
pub struct EnvLoader;

impl EnvLoader {
    /// Load a required environment variable.
    pub fn load_required<T>(key: &str) -> ConfigResult<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let value = env::var(key).map_err(|_| ConfigError::EnvVarNotFound(key.to_string()))?;
        value
            .parse()
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", key, e)))
    }

    /// Load an optional environment variable with a default value.
    pub fn load_with_default<T>(key: &str, default: T) -> ConfigResult<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match env::var(key) {
            Ok(value) => value
                .parse()
                .map_err(|e| ConfigError::ParseError(format!("{}: {}", key, e))),
            Err(_) => Ok(default),
        }
    }

    /// Load an optional environment variable.
    pub fn load_optional<T>(key: &str) -> ConfigResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match env::var(key) {
            Ok(value) => {
                let parsed = value
                    .parse()
                    .map_err(|e| ConfigError::ParseError(format!("{}: {}", key, e)))?;
                Ok(Some(parsed))
            }
            Err(_) => Ok(None),
        }
    }

    /// Load a boolean environment variable, accepting common string
    /// variations.
    pub fn load_bool(key: &str, default: bool) -> bool {
        match env::var(key).as_deref() {
            Ok("true" | "True" | "TRUE" | "1" | "yes" | "Yes" | "YES" | "on" | "On" | "ON") => true,
            Ok("false" | "False" | "FALSE" | "0" | "no" | "No" | "NO" | "off" | "Off" | "OFF") => false,
            _ => default,
        }
    }

    /// Load a duration given in whole seconds.
    pub fn load_duration_seconds(key: &str, default_seconds: u64) -> ConfigResult<std::time::Duration> {
        let seconds: u64 = Self::load_with_default(key, default_seconds)?;
        Ok(std::time::Duration::from_secs(seconds))
    }

    /// Load a duration given in whole milliseconds.
    pub fn load_duration_millis(key: &str, default_millis: u64) -> ConfigResult<std::time::Duration> {
        let millis: u64 = Self::load_with_default(key, default_millis)?;
        Ok(std::time::Duration::from_millis(millis))
    }
}

/// Environment variable validator for preflight checks at startup.
pub struct EnvValidator;

impl EnvValidator {
    /// Validate that every named variable is present, without parsing it.
    pub fn validate_required_vars(required_vars: &[&str]) -> ConfigResult<()> {
        for var in required_vars {
            env::var(var).map_err(|_| ConfigError::EnvVarNotFound(var.to_string()))?;
        }
        Ok(())
    }

    /// Validate that, if present, a variable names an HTTP(S) URL.
    pub fn validate_url_var(key: &str) -> ConfigResult<()> {
        if let Ok(url) = env::var(key) {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: url,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn load_required_parses_present_value() {
        env::set_var("TEST_REQUIRED", "42");
        let result: ConfigResult<i32> = EnvLoader::load_required("TEST_REQUIRED");
        assert_eq!(result.unwrap(), 42);
        env::remove_var("TEST_REQUIRED");
        let result: ConfigResult<i32> = EnvLoader::load_required("TEST_REQUIRED");
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn load_with_default_falls_back() {
        env::remove_var("TEST_DEFAULT");
        let result: ConfigResult<i32> = EnvLoader::load_with_default("TEST_DEFAULT", 50);
        assert_eq!(result.unwrap(), 50);

        env::set_var("TEST_DEFAULT", "100");
        let result: ConfigResult<i32> = EnvLoader::load_with_default("TEST_DEFAULT", 50);
        assert_eq!(result.unwrap(), 100);
        env::remove_var("TEST_DEFAULT");
    }

    #[test]
    #[serial]
    fn load_bool_accepts_variations() {
        env::set_var("TEST_BOOL_TRUE", "yes");
        assert!(EnvLoader::load_bool("TEST_BOOL_TRUE", false));
        env::set_var("TEST_BOOL_FALSE", "off");
        assert!(!EnvLoader::load_bool("TEST_BOOL_FALSE", true));
        env::remove_var("TEST_BOOL_MISSING");
        assert!(EnvLoader::load_bool("TEST_BOOL_MISSING", true));
        env::remove_var("TEST_BOOL_TRUE");
        env::remove_var("TEST_BOOL_FALSE");
    }

    #[test]
    #[serial]
    fn validate_url_var_rejects_non_http() {
        env::set_var("TEST_URL", "ftp://example.com");
        assert!(EnvValidator::validate_url_var("TEST_URL").is_err());
        env::set_var("TEST_URL", "https://example.com");
        assert!(EnvValidator::validate_url_var("TEST_URL").is_ok());
        env::remove_var("TEST_URL");
    }
}
