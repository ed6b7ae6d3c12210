//! # Design
//!
//! - One error family for the rename stage; the two failure modes the source
//!   distinguishes are "the save path doesn't match the expected layout" (aborts the
//!   whole torrent, per SPEC_FULL §4.10) and "the downloader/persistence call itself
//!   failed" (wrapped from the crates that already classify those failures).

use thiserror::Error;

/// Result type for the rename stage.
pub type RenameResult<T> = Result<T, RenameError>;

/// Errors produced while renaming a completed torrent's files.
#[derive(Debug, Error)]
pub enum RenameError {
    /// The downloader's save path, relative to its configured root, did not match the
    /// `<title>[ (year)]/Season <n>` layout the rename stage requires.
    #[error("save path does not match the expected <title>[ (year)]/Season <n> layout")]
    LayoutMismatch {
        /// The offending relative path.
        relative: String,
    },
    /// A downloader or session-manager operation failed.
    #[error("downloader operation failed")]
    Downloader(#[from] anime_download::DownloadError),
    /// A persistence operation failed.
    #[error("persistence operation failed")]
    Data(#[from] anime_data::DataError),
}
