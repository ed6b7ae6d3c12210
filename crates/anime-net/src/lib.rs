#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

//! Shared outbound HTTP layer.
//!
//! Every outbound read used by the rest of the pipeline goes through one [`NetClient`]
//! instance: a TTL-cached, request-coalescing, retrying GET, plus derived RSS/JSON/torrent
//! helpers and proxy support.

mod cache;
/// Shared HTTP client, retry policy, and request coalescing.
pub mod client;
/// Proxy configuration.
pub mod proxy;
/// RSS decoding and torrent-item normalization.
pub mod rss;

pub use client::{NetClient, NetClientConfig};
pub use proxy::{ProxyConfig, ProxyKind};
pub use rss::{RssChannel, RssItem, TorrentListItem, extract_torrents, normalize_title, parse_rss};
