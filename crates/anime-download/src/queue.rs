//! The bounded download queue: `Add`/`Clear` plus the scheduled dispatch task that
//! drains queued torrents into the download session.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use anime_core::model::{Show, Torrent};
use anime_events::{Event, EventBus};
use anime_net::NetClient;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::session::{DownloadSession, SessionState};
use crate::torrent_file;

const QUEUE_CAPACITY: usize = 100;
const DISPATCH_INTERVAL: Duration = Duration::from_secs(5);

/// A bounded, deduplicated queue of torrents awaiting submission to the downloader.
pub struct DownloadQueue {
    sender: mpsc::Sender<(Torrent, Show)>,
    receiver: tokio::sync::Mutex<mpsc::Receiver<(Torrent, Show)>>,
    queued: Mutex<HashSet<String>>,
    session: DownloadSession,
    net: NetClient,
    save_path_root: String,
    bus: EventBus,
}

impl DownloadQueue {
    /// Build an empty queue bound to `session`, fetching raw `.torrent` payloads through
    /// `net`, rooting resolved save paths under `save_path_root`, and publishing
    /// [`Event::DownloadCheck`] on `bus` after each successful submission.
    #[must_use]
    pub fn new(session: DownloadSession, net: NetClient, save_path_root: String, bus: EventBus) -> Self {
        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
        Self {
            sender,
            receiver: tokio::sync::Mutex::new(receiver),
            queued: Mutex::new(HashSet::new()),
            session,
            net,
            save_path_root,
            bus,
        }
    }

    /// Enqueue `torrent` (owned by `show`) for submission to the downloader.
    ///
    /// Drops the pair silently (logging a warning) when the session has permanently
    /// failed, the URL is already queued, login cannot be established within the usual
    /// 10 s budget, or `cancel` fires before the channel accepts the item.
    pub async fn add(&self, cancel: &CancellationToken, torrent: Torrent, show: Show) {
        if self.session.state() == SessionState::FailedTerminal {
            warn!(url = %torrent.url, "download session permanently failed; dropping enqueue");
            return;
        }

        let url = torrent.url.clone();
        {
            let mut queued = self.queued.lock().expect("queue membership mutex poisoned");
            if !queued.insert(url.clone()) {
                return;
            }
        }

        if let Err(err) = self.session.ensure_login(cancel).await {
            warn!(url = %url, error = %err, "could not establish download session; dropping enqueue");
            self.queued.lock().expect("queue membership mutex poisoned").remove(&url);
            return;
        }

        tokio::select! {
            () = cancel.cancelled() => {
                warn!(url = %url, "cancelled while enqueuing torrent");
                self.queued.lock().expect("queue membership mutex poisoned").remove(&url);
            }
            result = self.sender.send((torrent, show)) => {
                if result.is_err() {
                    warn!(url = %url, "download queue closed; dropping enqueue");
                    self.queued.lock().expect("queue membership mutex poisoned").remove(&url);
                }
            }
        }
    }

    /// Drain the channel and clear all membership marks.
    pub async fn clear(&self) {
        let mut receiver = self.receiver.lock().await;
        while receiver.try_recv().is_ok() {}
        self.queued.lock().expect("queue membership mutex poisoned").clear();
    }

    fn requeue(&self, torrent: Torrent, show: Show) {
        let url = torrent.url.clone();
        self.queued.lock().expect("queue membership mutex poisoned").insert(url.clone());
        if self.sender.try_send((torrent, show)).is_err() {
            warn!(url = %url, "download queue full; dropping torrent after failed submission");
            self.queued.lock().expect("queue membership mutex poisoned").remove(&url);
        }
    }

    /// Perform a single non-blocking dispatch attempt: pop one queued pair (if any) and
    /// submit it to the downloader, re-enqueuing on failure.
    pub async fn dispatch_once(&self, cancel: &CancellationToken) {
        let item = {
            let mut receiver = self.receiver.lock().await;
            receiver.try_recv().ok()
        };
        let Some((torrent, show)) = item else {
            return;
        };
        self.queued
            .lock()
            .expect("queue membership mutex poisoned")
            .remove(&torrent.url);

        let save_path = format!("{}/{}", self.save_path_root, show.save_path());
        match self.resolve(&torrent.url).await {
            Ok(info) => match self.session.add(cancel, &info, &save_path).await {
                Ok(uid) => {
                    info!(url = %torrent.url, uid = %uid, "submitted torrent to downloader");
                    let _ = self.bus.publish(Event::DownloadCheck {
                        guids: vec![uid],
                        torrent,
                        show,
                    });
                }
                Err(err) => {
                    warn!(url = %torrent.url, error = %err, "submission failed, re-enqueuing");
                    self.requeue(torrent, show);
                }
            },
            Err(err) => {
                warn!(url = %torrent.url, error = %err, "could not resolve torrent metainfo, re-enqueuing");
                self.requeue(torrent, show);
            }
        }
    }

    async fn resolve(&self, url: &str) -> anyhow::Result<anime_core::model::TorrentInfo> {
        if url.starts_with("magnet:") {
            return Ok(torrent_file::parse_magnet(url)?);
        }
        let bytes = self.net.get(url).await?;
        Ok(torrent_file::parse_metainfo(bytes.as_slice())?)
    }
}

/// Scheduled task draining [`DownloadQueue`] every 5 s.
pub struct DownloadDispatchTask {
    queue: std::sync::Arc<DownloadQueue>,
}

impl DownloadDispatchTask {
    /// Build a task bound to `queue`.
    #[must_use]
    pub const fn new(queue: std::sync::Arc<DownloadQueue>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl anime_scheduler::ScheduledTask for DownloadDispatchTask {
    fn name(&self) -> &str {
        "download-dispatch"
    }

    fn interval(&self) -> Duration {
        DISPATCH_INTERVAL
    }

    fn enabled(&self) -> bool {
        true
    }

    async fn run(&self, ctx: CancellationToken) -> anyhow::Result<()> {
        self.queue.dispatch_once(&ctx).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anime_net::{NetClient, NetClientConfig};
    use anime_test_support::fixtures::{sample_show, sample_torrent, FakeDownloader, FakeDownloaderBehavior};

    use super::*;

    fn queue_with(session: DownloadSession) -> DownloadQueue {
        let net = NetClient::new(NetClientConfig::default()).expect("net client");
        DownloadQueue::new(session, net, "/downloads".to_string(), EventBus::new())
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_urls_are_dropped() {
        let fake = Arc::new(FakeDownloader::new(FakeDownloaderBehavior::default()));
        let cancel = CancellationToken::new();
        let session = DownloadSession::spawn(fake, cancel.clone());
        let queue = queue_with(session);

        let torrent = sample_torrent(1);
        let show = sample_show();
        queue.add(&cancel, torrent.clone(), show.clone()).await;
        queue.add(&cancel, torrent, show).await;

        assert_eq!(queue.queued.lock().expect("lock").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_terminal_session_drops_enqueue() {
        let fake = Arc::new(FakeDownloader::new(FakeDownloaderBehavior {
            auth: anime_test_support::fixtures::FakeOutcome::AuthError,
            ..Default::default()
        }));
        let cancel = CancellationToken::new();
        let session = DownloadSession::spawn(fake, cancel.clone());
        // Drive the session into FailedTerminal by attempting a guarded call.
        let _ = session.ensure_login(&cancel).await;
        tokio::time::advance(Duration::from_millis(10)).await;

        let queue = queue_with(session);
        queue.add(&cancel, sample_torrent(2), sample_show()).await;

        assert!(queue.queued.lock().expect("lock").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn clear_drains_channel_and_membership() {
        let fake = Arc::new(FakeDownloader::new(FakeDownloaderBehavior::default()));
        let cancel = CancellationToken::new();
        let session = DownloadSession::spawn(fake, cancel.clone());
        let queue = queue_with(session);

        queue.add(&cancel, sample_torrent(3), sample_show()).await;
        assert_eq!(queue.queued.lock().expect("lock").len(), 1);

        queue.clear().await;
        assert!(queue.queued.lock().expect("lock").is_empty());
    }
}
