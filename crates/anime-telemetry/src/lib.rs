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

//! Telemetry primitives shared across the acquisition pipeline's crates.
//!
//! Layout: `init.rs` (logging setup), `context.rs` (process-wide application span),
//! `metrics.rs` (Prometheus registry).

pub mod context;
pub mod init;
pub mod metrics;

pub use context::{GlobalContextGuard, record_app_mode};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
pub use metrics::{Metrics, MetricsSnapshot, TorrentStage};
