//! Field-level validation for each config section.
//!
//! Malformed individual fields never wedge the pipeline — callers decide whether to
//! reject a save outright or fall back to the default for just that field. This module only
//! classifies validity; it does not decide the recovery policy.

use crate::error::ConfigError;
use crate::model::{DownloaderConfig, ProgramConfig, ProxyConfig};

fn invalid(section: &'static str, field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidField {
        section,
        field,
        reason: reason.into(),
    }
}

/// Validate the `program` section.
pub fn validate_program(config: &ProgramConfig) -> Result<(), ConfigError> {
    if config.rss_time < 300 {
        return Err(invalid("program", "rss_time", "must be at least 300 seconds"));
    }
    if config.webui_port == 0 {
        return Err(invalid("program", "webui_port", "must be between 1 and 65535"));
    }
    Ok(())
}

/// Validate the `downloader` section. `path` and `host` are required non-empty values.
pub fn validate_downloader(config: &DownloaderConfig) -> Result<(), ConfigError> {
    if config.path.trim().is_empty() {
        return Err(invalid("downloader", "path", "must not be empty"));
    }
    if config.host.trim().is_empty() {
        return Err(invalid("downloader", "host", "must not be empty"));
    }
    Ok(())
}

/// Validate the `proxy` section. `port == 0` is treated as "unset" and always valid.
pub fn validate_proxy(config: &ProxyConfig) -> Result<(), ConfigError> {
    if config.enable && config.host.trim().is_empty() {
        return Err(invalid("proxy", "host", "must not be empty when proxy.enable is true"));
    }
    Ok(())
}
