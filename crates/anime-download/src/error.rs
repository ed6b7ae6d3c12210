//! Errors specific to the session manager, download queue, and `.torrent` parser. Adapter
//! calls themselves still return [`anime_core::CoreError`]; this module only covers
//! failures that originate above the `Downloader` trait boundary.

use anime_core::CoreError;
use thiserror::Error;

/// Errors raised by [`crate::session`], [`crate::queue`], and [`crate::torrent_file`].
#[derive(Debug, Error)]
pub enum DownloadError {
    /// `ensureLogin` did not observe a login outcome within its wait budget.
    #[error("timed out waiting for the download session to log in")]
    LoginTimeout,
    /// The session gave up permanently after an authentication or forbidden response.
    #[error("download session is permanently failed")]
    SessionFailed,
    /// The `.torrent` metainfo could not be decoded as a bencoded dictionary.
    #[error("torrent metainfo could not be decoded")]
    MetainfoDecode(#[source] serde_bencode::Error),
    /// The metainfo dictionary was missing a required `info` key.
    #[error("torrent metainfo is missing its info dictionary")]
    MissingInfoDict,
    /// A magnet URI was missing its `xt` (exact topic / info-hash) parameter.
    #[error("magnet URI is missing an info-hash")]
    MagnetMissingInfoHash,
    /// The adapter call itself failed; not an authentication problem.
    #[error("downloader call failed")]
    Adapter(#[source] CoreError),
}

impl From<CoreError> for DownloadError {
    fn from(err: CoreError) -> Self {
        Self::Adapter(err)
    }
}

/// Convenience alias for results from this crate's internal layers.
pub type Result<T> = std::result::Result<T, DownloadError>;
