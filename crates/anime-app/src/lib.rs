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
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Application bootstrap wiring for the acquisition pipeline.
//!
//! Layout: `bootstrap.rs` (service wiring and shutdown), `refresh.rs` (the RSS
//! refresh pipeline, scheduled per §4.4), `filter.rs` (torrent admission filter).

/// Application bootstrap and service wiring.
pub mod bootstrap;
/// Torrent admission filter applied before a novel torrent reaches the download queue.
pub mod filter;
/// The RSS refresh pipeline: polling, show discovery, and download dispatch.
pub mod refresh;

pub use bootstrap::run_app;
