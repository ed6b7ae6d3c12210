#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

//! Download-client session management, the submission queue, progress tracking, and
//! a qBittorrent adapter for the acquisition pipeline.
//!
//! [`session::DownloadSession`] wraps any [`anime_core::Downloader`] with login-state
//! tracking and rate limiting; [`queue::DownloadQueue`] buffers torrents awaiting
//! submission; [`progress`] drives a submitted torrent from UID resolution through to
//! completion over [`anime_events::EventBus`]; [`qbittorrent::QbittorrentDownloader`]
//! is the shipped [`anime_core::Downloader`] implementation.

pub mod error;
pub mod progress;
pub mod qbittorrent;
pub mod queue;
pub mod session;
pub mod torrent_file;

pub use error::{DownloadError, Result as DownloadResult};
pub use qbittorrent::QbittorrentDownloader;
pub use queue::{DownloadDispatchTask, DownloadQueue};
pub use session::{DownloadSession, SessionState};
