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

//! Shared data access layer for the acquisition pipeline: migrations and the
//! [`DataStore`] repository over shows, tracker/TMDB identities, parsed titles, RSS
//! sources, and torrents.

mod candidate;
pub mod error;
mod rows;
mod store;

pub use candidate::{ParsedTitleCandidate, ShowCandidate};
pub use error::{DataError, Result as DataResult};
pub use store::DataStore;
