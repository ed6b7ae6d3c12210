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

//! The in-memory event bus carrying the download pipeline's four topics.
//!
//! The bus provides a typed [`Event`] enum, sequential identifiers, and support for
//! replaying recently-published events to late subscribers. Internally it uses
//! `tokio::sync::broadcast` with a bounded buffer; when the channel overflows, the
//! oldest events are dropped for slow subscribers rather than blocking publishers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anime_core::model::{Message, Show, Torrent};
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::sync::broadcast::{Receiver, Sender};
use tracing::error;

/// Identifier assigned to each event published on the bus.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// The four topics carried by the download pipeline's event bus.
#[derive(Debug, Clone)]
pub enum Event {
    /// We just submitted a torrent under one or more candidate GUIDs and need the
    /// downloader to resolve which one became the true UID.
    DownloadCheck {
        /// Candidate GUIDs returned by the downloader at submission time.
        guids: Vec<String>,
        /// Torrent being resolved.
        torrent: Torrent,
        /// Owning show.
        show: Show,
    },
    /// Poll the downloader for progress on a torrent already resolved to a UID.
    DownloadingCheck {
        /// Torrent being polled.
        torrent: Torrent,
        /// Owning show.
        show: Show,
        /// Wall-clock time the torrent entered the downloading state.
        start_time: DateTime<Utc>,
    },
    /// Files for a torrent are on disk and ready to be renamed into the library layout.
    Rename {
        /// Torrent whose files should be renamed.
        torrent: Torrent,
        /// Owning show.
        show: Show,
    },
    /// A user-facing notification should be dispatched.
    Notification {
        /// Message to deliver.
        message: Message,
    },
}

impl Event {
    /// Machine-friendly discriminator, useful for logging and metrics labels.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::DownloadCheck { .. } => "download_check",
            Self::DownloadingCheck { .. } => "downloading_check",
            Self::Rename { .. } => "rename",
            Self::Notification { .. } => "notification",
        }
    }
}

/// Metadata wrapper around an [`Event`]: each envelope tracks its sequence number
/// and emission timestamp.
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    /// Monotonic identifier assigned to the wrapped event.
    pub id: EventId,
    /// Timestamp recording when the envelope was produced.
    pub timestamp: DateTime<Utc>,
    /// Wrapped event payload.
    pub event: Event,
}

/// Shared event bus built on top of `tokio::sync::broadcast`.
#[derive(Clone)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    buffer: Arc<Mutex<VecDeque<EventEnvelope>>>,
    next_id: Arc<AtomicU64>,
    replay_capacity: usize,
}

impl EventBus {
    /// Construct a new bus with the provided broadcast capacity.
    ///
    /// The broadcast channel uses the same capacity as the in-memory replay buffer,
    /// so slow subscribers and the replay backlog drop events consistently.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "event bus capacity must be positive");
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            buffer: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            next_id: Arc::new(AtomicU64::new(1)),
            replay_capacity: capacity,
        }
    }

    /// Construct a bus with the default in-memory buffer size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    /// Publish a new event to the bus, assigning it a sequential identifier.
    ///
    /// Delivery to subscribers is non-blocking: a subscriber that cannot keep up
    /// simply lags and later observes a gap, it never blocks this call. Publishing
    /// succeeds even with zero live subscribers.
    ///
    /// # Panics
    ///
    /// Panics if the replay buffer mutex has been poisoned.
    pub fn publish(&self, event: Event) -> EventId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = EventEnvelope {
            id,
            timestamp: Utc::now(),
            event,
        };

        {
            let mut buffer = self.lock_buffer();
            if buffer.len() == self.replay_capacity {
                buffer.pop_front();
            }
            buffer.push_back(envelope.clone());
        }

        // `send` only errors when there are no receivers; publishing with no
        // subscribers is a normal and expected occurrence.
        let _ = self.sender.send(envelope);
        id
    }

    /// Subscribe to the bus, replaying any buffered events newer than `since_id`.
    ///
    /// # Panics
    ///
    /// Panics if the replay buffer mutex has been poisoned.
    #[must_use]
    pub fn subscribe(&self, since_id: Option<EventId>) -> EventStream {
        let mut backlog = VecDeque::new();
        if let Some(since) = since_id {
            let buffer = self.lock_buffer();
            for item in buffer.iter() {
                if item.id > since {
                    backlog.push_back(item.clone());
                }
            }
        }

        let receiver = self.sender.subscribe();
        EventStream { backlog, receiver }
    }

    /// Returns the last assigned identifier, if any events have been published.
    ///
    /// # Panics
    ///
    /// Panics if the replay buffer mutex has been poisoned.
    #[must_use]
    pub fn last_event_id(&self) -> Option<EventId> {
        let buffer = self.lock_buffer();
        buffer.back().map(|event| event.id)
    }

    fn lock_buffer(&self) -> MutexGuard<'_, VecDeque<EventEnvelope>> {
        match self.buffer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("event buffer mutex poisoned; continuing with recovered guard");
                poisoned.into_inner()
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream wrapper that yields events from the replay backlog first, then the live bus.
pub struct EventStream {
    backlog: VecDeque<EventEnvelope>,
    receiver: Receiver<EventEnvelope>,
}

impl EventStream {
    /// Receive the next event, respecting the replay backlog first.
    ///
    /// A subscriber that lags behind the broadcast channel's capacity observes a
    /// gap (dropped events) rather than this call failing outright; it simply
    /// resumes from the next event still buffered by the channel.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        if let Some(event) = self.backlog.pop_front() {
            return Some(event);
        }

        match self.receiver.recv().await {
            Ok(event) => Some(event),
            Err(broadcast::error::RecvError::Lagged(_)) => self.receiver.recv().await.ok(),
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anime_core::model::{DownloadState, ParserTag};
    use std::collections::HashSet;
    use std::time::Duration;
    use tokio::task;
    use tokio::time::timeout;

    const PUBLISH_TIMEOUT: Duration = Duration::from_secs(1);

    fn sample_show() -> Show {
        Show {
            id: 1,
            official_title: "Demo Show".into(),
            year: Some(2024),
            season: 1,
            eps_collected: false,
            episode_offset: 0,
            include_pattern: None,
            exclude_pattern: None,
            parser_tag: ParserTag::Tmdb,
            rss_source_url: None,
            poster_url: None,
            deleted: false,
            tracker_id: None,
            tmdb_id: None,
        }
    }

    fn sample_torrent(id: usize) -> Torrent {
        Torrent {
            url: format!("magnet:?xt=urn:btih:{id}"),
            display_name: format!("Demo Show - {id:02}"),
            downloaded: DownloadState::Submitted,
            renamed: false,
            download_uid: None,
            show_id: 1,
            homepage: None,
            created_at: Utc::now(),
        }
    }

    fn sample_downloading_check(id: usize) -> Event {
        Event::DownloadingCheck {
            torrent: sample_torrent(id),
            show: sample_show(),
            start_time: Utc::now(),
        }
    }

    #[test]
    fn event_kinds_cover_all_variants() {
        let show = sample_show();
        let torrent = sample_torrent(1);
        assert_eq!(
            Event::DownloadCheck {
                guids: vec!["abc".into()],
                torrent: torrent.clone(),
                show: show.clone(),
            }
            .kind(),
            "download_check"
        );
        assert_eq!(sample_downloading_check(1).kind(), "downloading_check");
        assert_eq!(
            Event::Rename {
                torrent: torrent.clone(),
                show: show.clone(),
            }
            .kind(),
            "rename"
        );
        assert_eq!(
            Event::Notification {
                message: Message {
                    title: "t".into(),
                    body: "b".into(),
                    season: None,
                    episode: None,
                    poster_url: None,
                    image_bytes: None,
                },
            }
            .kind(),
            "notification"
        );
    }

    #[tokio::test]
    async fn sequential_ids_and_replay() {
        let bus = EventBus::with_capacity(16);

        let mut last_id = 0;
        for i in 0..5 {
            last_id = bus.publish(sample_downloading_check(i));
        }
        assert_eq!(last_id, 5);

        let mut stream = bus.subscribe(Some(2));
        let mut received = Vec::new();
        for _ in 0..3 {
            if let Some(event) = stream.next().await {
                received.push(event);
            }
        }

        assert_eq!(received.len(), 3);
        assert_eq!(received.first().unwrap().id, 3);
        assert_eq!(received.last().unwrap().id, 5);
    }

    #[tokio::test]
    async fn load_test_does_not_stall_publishers() {
        let bus = Arc::new(EventBus::with_capacity(512));
        let mut stream = bus.subscribe(None);

        let publisher = {
            let bus = bus.clone();
            task::spawn(async move {
                for i in 0..500 {
                    let publish_bus = bus.clone();
                    timeout(PUBLISH_TIMEOUT, async move {
                        let _ = publish_bus.publish(sample_downloading_check(i));
                    })
                    .await
                    .expect("publish timed out");
                }
            })
        };

        let consumer = task::spawn(async move {
            let mut ids = HashSet::new();
            while ids.len() < 500 {
                if let Some(event) = stream.next().await {
                    ids.insert(event.id);
                }
            }
            ids
        });

        publisher.await.expect("publisher task panicked");
        let ids = consumer.await.expect("consumer task panicked");
        assert_eq!(ids.len(), 500);
    }

    #[tokio::test]
    async fn last_event_id_reflects_recent_publish() {
        let bus = EventBus::with_capacity(2);
        assert!(bus.last_event_id().is_none(), "no events published yet");
        let published = bus.publish(sample_downloading_check(0));
        assert_eq!(bus.last_event_id(), Some(published));
    }

    #[tokio::test]
    async fn stream_returns_none_after_sender_dropped() {
        let mut stream = {
            let bus = EventBus::with_capacity(1);
            let stream = bus.subscribe(None);
            drop(bus);
            stream
        };
        assert!(
            stream.next().await.is_none(),
            "closing the sender should end the stream"
        );
    }

    #[tokio::test]
    async fn unsubscribed_receiver_does_not_crash_publisher() {
        let bus = EventBus::with_capacity(4);
        {
            let _dropped_stream = bus.subscribe(None);
        }
        // The subscriber above was dropped before any publish; the broadcast
        // sender must tolerate publishing with no live receivers.
        let id = bus.publish(sample_downloading_check(0));
        assert_eq!(id, 1);
    }
}
