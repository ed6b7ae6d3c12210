//! Error taxonomy shared by the pipeline crates.

use std::error::Error as StdError;

use thiserror::Error;

/// Primary error type returned by pipeline components.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Transport failure (`status == 0`) or a non-2xx HTTP response.
    #[error("network request failed")]
    Network {
        /// HTTP status code, or 0 for a transport-level failure.
        status: u16,
    },
    /// Malformed response body, missing required field, or a non-retryable decode failure.
    #[error("response could not be parsed")]
    Parse {
        /// Short identifier of what was being parsed (e.g. `"rss"`, `"tmdb-search"`).
        context: &'static str,
        /// Underlying parse failure, when one is available.
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
    /// The downloader rejected the configured credentials.
    #[error("downloader rejected credentials")]
    DownloadAuth,
    /// The downloader's IP has been banned or otherwise forbidden.
    #[error("downloader forbade the request")]
    DownloadForbidden,
    /// A caller observed a session that already gave up permanently.
    #[error("downloader session is permanently failed")]
    DownloadLogin,
    /// A torrent key (UID, hash, URL) was malformed or unknown to the downloader.
    #[error("torrent key was malformed or unknown")]
    DownloadKey {
        /// The offending key.
        key: String,
    },
}

impl CoreError {
    /// Build a [`CoreError::Parse`] with no underlying source error.
    #[must_use]
    pub const fn parse(context: &'static str) -> Self {
        Self::Parse {
            context,
            source: None,
        }
    }

    /// Build a [`CoreError::Parse`] wrapping an underlying decode failure.
    pub fn parse_with(context: &'static str, source: impl StdError + Send + Sync + 'static) -> Self {
        Self::Parse {
            context,
            source: Some(Box::new(source)),
        }
    }

    /// True when the error is retryable at the network layer (5xx or transport failure).
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { status } if *status == 0 || *status >= 500)
    }
}

/// Convenience alias for pipeline results.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_retryable_classification() {
        assert!(CoreError::Network { status: 0 }.is_retryable());
        assert!(CoreError::Network { status: 503 }.is_retryable());
        assert!(!CoreError::Network { status: 404 }.is_retryable());
    }

    #[test]
    fn parse_helpers_build_expected_variants() {
        let bare = CoreError::parse("rss");
        assert_eq!(bare.to_string(), "response could not be parsed");
        assert!(matches!(bare, CoreError::Parse { source: None, .. }));

        let wrapped = CoreError::parse_with(
            "tmdb-search",
            std::io::Error::new(std::io::ErrorKind::Other, "boom"),
        );
        assert!(matches!(wrapped, CoreError::Parse { source: Some(_), .. }));
    }

    #[test]
    fn download_errors_display_distinct_messages() {
        assert_eq!(
            CoreError::DownloadAuth.to_string(),
            "downloader rejected credentials"
        );
        assert_eq!(
            CoreError::DownloadForbidden.to_string(),
            "downloader forbade the request"
        );
        assert_eq!(
            CoreError::DownloadLogin.to_string(),
            "downloader session is permanently failed"
        );
        assert_eq!(
            CoreError::DownloadKey {
                key: "abc".into()
            }
            .to_string(),
            "torrent key was malformed or unknown"
        );
    }
}
