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
#![allow(clippy::multiple_crate_versions)]

//! Renames completed torrent files into the Plex-style library layout.
//!
//! [`layout`] holds the pure save-path/basename logic; [`service`] wires it to the
//! downloader session, event bus, and persistence layer.

pub mod error;
pub mod layout;
pub mod service;

pub use error::{RenameError, RenameResult};
pub use layout::{build_basename, infer_location, relative_to_root, InferredLocation};
pub use service::{FileOutcome, RenameService};
