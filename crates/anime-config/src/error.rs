//! Errors produced while loading, validating, or saving `config.json`.

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read (and was not simply absent).
    #[error("failed to read config file at {path}")]
    Read {
        /// Path that failed to read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The config file could not be written.
    #[error("failed to write config file at {path}")]
    Write {
        /// Path that failed to write.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The config file's top level was not a JSON object.
    #[error("config file at {path} is not a JSON object")]
    NotAnObject {
        /// Path of the offending file.
        path: String,
    },
    /// The file contained invalid JSON.
    #[error("config file at {path} contains invalid JSON")]
    Malformed {
        /// Path of the offending file.
        path: String,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },
    /// A section's stored value did not deserialize into its typed model even after
    /// merging in defaults for missing fields.
    #[error("section '{section}' could not be decoded")]
    SectionDecode {
        /// Offending section name.
        section: String,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },
    /// A field failed validation.
    #[error("invalid value for '{field}' in '{section}': {reason}")]
    InvalidField {
        /// Section containing the invalid field.
        section: &'static str,
        /// Field name.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },
}

/// Convenience alias for config-store results.
pub type ConfigResult<T> = Result<T, ConfigError>;
