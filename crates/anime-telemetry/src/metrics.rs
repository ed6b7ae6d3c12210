//! Prometheus-backed metrics registry for the acquisition pipeline.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters/gauge/histogram the pipeline stages increment directly;
//!   nothing here is HTTP- or admin-API-shaped since this program has no such surface.

use std::convert::TryFrom;
use std::time::Duration;

use anyhow::{Context, Result};
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

/// Prometheus-backed metrics registry shared across the pipeline's components.
#[derive(Clone)]
pub struct Metrics {
    inner: std::sync::Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    torrents_total: IntCounterVec,
    downloads_in_flight: IntGauge,
    identify_latency_seconds: Histogram,
    rename_failures_total: IntCounter,
    filter_malformed_regex_total: IntCounter,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Torrents currently awaiting submission or completion.
    pub downloads_in_flight: i64,
    /// Total torrent rename failures (single-file, non-fatal) observed.
    pub rename_failures_total: u64,
    /// Total malformed filter regexes encountered.
    pub filter_malformed_regex_total: u64,
}

/// Lifecycle stage recorded against the `torrents_total` counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TorrentStage {
    /// Added to the download queue.
    Enqueued,
    /// Submitted to the downloader.
    Submitted,
    /// Downloader reported completion.
    Completed,
    /// Files renamed into the library layout.
    Renamed,
    /// Transitioned to the terminal failed state.
    Failed,
}

impl TorrentStage {
    const fn label(self) -> &'static str {
        match self {
            Self::Enqueued => "enqueued",
            Self::Submitted => "submitted",
            Self::Completed => "completed",
            Self::Renamed => "renamed",
            Self::Failed => "failed",
        }
    }
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let torrents_total = IntCounterVec::new(
            Opts::new("torrents_total", "Torrents observed by pipeline stage"),
            &["stage"],
        )?;
        let downloads_in_flight = IntGauge::with_opts(Opts::new(
            "downloads_in_flight",
            "Torrents currently submitted but not yet completed",
        ))?;
        let identify_latency_seconds = Histogram::with_opts(HistogramOpts::new(
            "identify_latency_seconds",
            "Latency of the tracker/TMDB identification call",
        ))?;
        let rename_failures_total = IntCounter::with_opts(Opts::new(
            "rename_failures_total",
            "Single-file rename failures that did not abort the torrent",
        ))?;
        let filter_malformed_regex_total = IntCounter::with_opts(Opts::new(
            "filter_malformed_regex_total",
            "Malformed include/exclude filter patterns treated as non-matching",
        ))?;

        registry.register(Box::new(torrents_total.clone()))?;
        registry.register(Box::new(downloads_in_flight.clone()))?;
        registry.register(Box::new(identify_latency_seconds.clone()))?;
        registry.register(Box::new(rename_failures_total.clone()))?;
        registry.register(Box::new(filter_malformed_regex_total.clone()))?;

        Ok(Self {
            inner: std::sync::Arc::new(MetricsInner {
                registry,
                torrents_total,
                downloads_in_flight,
                identify_latency_seconds,
                rename_failures_total,
                filter_malformed_regex_total,
            }),
        })
    }

    /// Increment the torrent-stage counter for `stage`.
    pub fn inc_torrent_stage(&self, stage: TorrentStage) {
        self.inner
            .torrents_total
            .with_label_values(&[stage.label()])
            .inc();
    }

    /// Set the in-flight download gauge.
    pub fn set_downloads_in_flight(&self, count: i64) {
        self.inner.downloads_in_flight.set(count);
    }

    /// Record one `identify()` call's wall-clock latency.
    pub fn observe_identify_latency(&self, duration: Duration) {
        self.inner.identify_latency_seconds.observe(duration.as_secs_f64());
    }

    /// Increment the single-file rename failure counter.
    pub fn inc_rename_failure(&self) {
        self.inner.rename_failures_total.inc();
    }

    /// Increment the malformed-filter-regex counter.
    pub fn inc_filter_malformed_regex(&self) {
        self.inner.filter_malformed_regex_total.inc();
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded buffer is not
    /// valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .context("failed to encode Prometheus metrics")?;
        String::from_utf8(buffer).context("metrics output was not valid UTF-8")
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            downloads_in_flight: self.inner.downloads_in_flight.get(),
            rename_failures_total: self.inner.rename_failures_total.get(),
            filter_malformed_regex_total: self.inner.filter_malformed_regex_total.get(),
        }
    }

    /// Convert a duration to milliseconds saturating at `i64::MAX`.
    pub(crate) fn duration_to_ms(duration: Duration) -> i64 {
        i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_to_ms_saturates_on_large_values() {
        let duration = Duration::from_secs(u64::MAX / 2);
        assert_eq!(Metrics::duration_to_ms(duration), i64::MAX);
    }

    #[test]
    fn metrics_snapshot_reflects_updates() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_torrent_stage(TorrentStage::Enqueued);
        metrics.inc_torrent_stage(TorrentStage::Submitted);
        metrics.inc_torrent_stage(TorrentStage::Completed);
        metrics.inc_torrent_stage(TorrentStage::Renamed);
        metrics.set_downloads_in_flight(3);
        metrics.observe_identify_latency(Duration::from_millis(250));
        metrics.inc_rename_failure();
        metrics.inc_filter_malformed_regex();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.downloads_in_flight, 3);
        assert_eq!(snapshot.rename_failures_total, 1);
        assert_eq!(snapshot.filter_malformed_regex_total, 1);

        let rendered = metrics.render()?;
        assert!(rendered.contains("torrents_total"));
        assert!(rendered.contains("identify_latency_seconds"));
        assert!(rendered.contains("downloads_in_flight"));
        Ok(())
    }
}
