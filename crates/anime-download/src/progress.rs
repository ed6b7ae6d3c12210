//! Reacts to the event bus's `DownloadCheck`/`DownloadingCheck` topics, resolving a
//! submitted torrent's downloader UID and then polling it through to completion.

use std::sync::Arc;
use std::time::Duration;

use anime_core::model::{DownloadState, Show, Torrent};
use anime_data::DataStore;
use anime_events::{Event, EventBus};
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::session::DownloadSession;

const CHECK_DELAY: Duration = Duration::from_secs(10);
const DOWNLOADING_TIMEOUT: chrono::Duration = chrono::Duration::hours(4);

/// Spawn the background task that drives torrents from UID resolution through to
/// completion, handing off to the rename stage via [`Event::Rename`].
pub fn spawn(
    bus: EventBus,
    session: DownloadSession,
    store: Arc<DataStore>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stream = bus.subscribe(None);
        loop {
            let envelope = tokio::select! {
                () = cancel.cancelled() => break,
                envelope = stream.next() => envelope,
            };
            let Some(envelope) = envelope else {
                break;
            };

            match envelope.event {
                Event::DownloadCheck {
                    guids,
                    torrent,
                    show,
                } => {
                    let bus = bus.clone();
                    let session = session.clone();
                    let store = Arc::clone(&store);
                    let cancel = cancel.clone();
                    tokio::spawn(async move {
                        handle_download_check(&bus, &session, &store, &cancel, guids, torrent, show)
                            .await;
                    });
                }
                Event::DownloadingCheck {
                    torrent,
                    show,
                    start_time,
                } => {
                    let bus = bus.clone();
                    let session = session.clone();
                    let store = Arc::clone(&store);
                    let cancel = cancel.clone();
                    tokio::spawn(async move {
                        handle_downloading_check(
                            &bus, &session, &store, &cancel, torrent, show, start_time,
                        )
                        .await;
                    });
                }
                Event::Rename { .. } | Event::Notification { .. } => {}
            }
        }
    })
}

async fn handle_download_check(
    bus: &EventBus,
    session: &DownloadSession,
    store: &DataStore,
    cancel: &CancellationToken,
    guids: Vec<String>,
    mut torrent: Torrent,
    show: Show,
) {
    tokio::select! {
        () = cancel.cancelled() => return,
        () = sleep(CHECK_DELAY) => {}
    }

    for guid in &guids {
        match session.check_hash(cancel, guid).await {
            Ok(Some(uid)) => {
                torrent.download_uid = Some(uid);
                torrent.downloaded = DownloadState::Submitted;
                if let Err(err) = store.update_torrent(&torrent).await {
                    warn!(url = %torrent.url, error = %err, "failed to persist resolved download UID");
                }
                let _ = bus.publish(Event::DownloadingCheck {
                    torrent,
                    show,
                    start_time: Utc::now(),
                });
                return;
            }
            Ok(None) => continue,
            Err(err) => {
                warn!(url = %torrent.url, %guid, error = %err, "check_hash call failed");
            }
        }
    }

    warn!(url = %torrent.url, "no candidate GUID resolved to a download UID");
}

async fn handle_downloading_check(
    bus: &EventBus,
    session: &DownloadSession,
    store: &DataStore,
    cancel: &CancellationToken,
    mut torrent: Torrent,
    show: Show,
    start_time: DateTime<Utc>,
) {
    if Utc::now() - start_time > DOWNLOADING_TIMEOUT {
        torrent.downloaded = DownloadState::Failed;
        if let Err(err) = store.update_torrent(&torrent).await {
            warn!(url = %torrent.url, error = %err, "failed to persist download timeout");
        }
        warn!(url = %torrent.url, "download exceeded its 4h timeout; giving up");
        return;
    }

    let Some(uid) = torrent.download_uid.clone() else {
        warn!(url = %torrent.url, "downloading-check event missing a resolved download UID");
        return;
    };

    let snapshot = match session.get_torrent_info(cancel, &uid).await {
        Ok(snapshot) => snapshot,
        Err(err) => {
            warn!(url = %torrent.url, error = %err, "get_torrent_info failed, retrying next tick");
            let _ = bus.publish(Event::DownloadingCheck {
                torrent,
                show,
                start_time,
            });
            return;
        }
    };

    let delay = next_poll_delay(snapshot.eta_seconds);
    tokio::select! {
        () = cancel.cancelled() => return,
        () = sleep(delay) => {}
    }

    let snapshot = match session.get_torrent_info(cancel, &uid).await {
        Ok(snapshot) => snapshot,
        Err(err) => {
            warn!(url = %torrent.url, error = %err, "get_torrent_info failed, retrying next tick");
            let _ = bus.publish(Event::DownloadingCheck {
                torrent,
                show,
                start_time,
            });
            return;
        }
    };

    if snapshot.is_complete() {
        torrent.downloaded = DownloadState::Completed;
        if let Err(err) = store.update_torrent(&torrent).await {
            warn!(url = %torrent.url, error = %err, "failed to persist download completion");
        }
        info!(url = %torrent.url, "download complete, handing off to rename");
        let _ = bus.publish(Event::Rename { torrent, show });
    } else {
        let _ = bus.publish(Event::DownloadingCheck {
            torrent,
            show,
            start_time,
        });
    }
}

/// Map an ETA (seconds) to the poll interval the downloading-check loop should sleep.
const fn next_poll_delay(eta_seconds: i64) -> Duration {
    if eta_seconds <= 0 {
        Duration::from_secs(10)
    } else if eta_seconds < 60 {
        Duration::from_secs(10)
    } else if eta_seconds < 300 {
        Duration::from_secs(30)
    } else if eta_seconds < 1800 {
        Duration::from_secs(120)
    } else {
        Duration::from_secs(300)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anime_test_support::fixtures::{sample_show, sample_torrent, FakeDownloader, FakeDownloaderBehavior};

    use super::*;

    #[test]
    fn poll_delay_buckets_match_the_eta_table() {
        assert_eq!(next_poll_delay(-5), Duration::from_secs(10));
        assert_eq!(next_poll_delay(0), Duration::from_secs(10));
        assert_eq!(next_poll_delay(59), Duration::from_secs(10));
        assert_eq!(next_poll_delay(60), Duration::from_secs(30));
        assert_eq!(next_poll_delay(299), Duration::from_secs(30));
        assert_eq!(next_poll_delay(300), Duration::from_secs(120));
        assert_eq!(next_poll_delay(1799), Duration::from_secs(120));
        assert_eq!(next_poll_delay(1800), Duration::from_secs(300));
    }

    #[tokio::test(start_paused = true)]
    async fn download_check_resolves_uid_and_publishes_downloading_check() {
        let fake = Arc::new(FakeDownloader::new(FakeDownloaderBehavior {
            resolved_uid: Some("resolved-uid".to_string()),
            ..Default::default()
        }));
        let cancel = CancellationToken::new();
        let session = DownloadSession::spawn(fake, cancel.clone());
        let bus = EventBus::new();
        let mut stream = bus.subscribe(None);
        let store = DataStore::connect("sqlite::memory:")
            .await
            .expect("in-memory store");

        let torrent = sample_torrent(1);
        let show = sample_show();
        store
            .create_torrent(&torrent)
            .await
            .expect("seed torrent row");

        tokio::spawn({
            let bus = bus.clone();
            let session = session.clone();
            let cancel = cancel.clone();
            let torrent = torrent.clone();
            let show = show.clone();
            async move {
                handle_download_check(
                    &bus,
                    &session,
                    &store,
                    &cancel,
                    vec!["guid-1".to_string()],
                    torrent,
                    show,
                )
                .await;
            }
        });

        tokio::time::advance(CHECK_DELAY + Duration::from_secs(1)).await;

        let envelope = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("event published")
            .expect("stream open");
        assert!(matches!(envelope.event, Event::DownloadingCheck { .. }));
    }
}
