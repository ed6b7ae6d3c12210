//! Shared HTTP client: retry, TTL cache, and in-flight request coalescing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anime_core::{CoreError, CoreResult};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::cache::TtlCache;
use crate::proxy::ProxyConfig;
use crate::rss::{self, RssChannel, TorrentListItem};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PROXY_TEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_ATTEMPTS: u8 = 3;
const RETRY_WAIT: Duration = Duration::from_secs(5);
const MAX_BACKOFF: Duration = Duration::from_secs(10);
const COALESCE_CAPACITY: usize = 64;

/// Outcome shared with any caller coalesced onto an in-flight fetch.
type FetchOutcome = Result<Arc<Vec<u8>>, u16>;

/// Construction options for [`NetClient`].
#[derive(Debug, Clone, Default)]
pub struct NetClientConfig {
    /// Proxy to route all requests through, when configured.
    pub proxy: Option<ProxyConfig>,
}

/// Process-wide shared HTTP layer. One instance should be constructed and reused.
pub struct NetClient {
    http: reqwest::Client,
    cache: Mutex<TtlCache>,
    inflight: Mutex<HashMap<String, broadcast::Sender<FetchOutcome>>>,
}

impl NetClient {
    /// Build a new client, applying proxy configuration if present.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Network`] if the underlying transport cannot be constructed
    /// (e.g. a malformed proxy URL).
    pub fn new(config: NetClientConfig) -> CoreResult<Self> {
        let mut builder = reqwest::Client::builder().timeout(REQUEST_TIMEOUT);
        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy.to_url())
                .map_err(|_| CoreError::Network { status: 0 })?;
            builder = builder.proxy(proxy);
        }
        let http = builder
            .build()
            .map_err(|_| CoreError::Network { status: 0 })?;
        Ok(Self {
            http,
            cache: Mutex::new(TtlCache::default()),
            inflight: Mutex::new(HashMap::new()),
        })
    }

    /// Fetch `url`, serving from cache when fresh and coalescing concurrent identical
    /// requests onto a single execution.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Network`] on a transport failure, a 4xx response, or a 5xx
    /// response that exhausted retries.
    pub async fn get(&self, url: &str) -> CoreResult<Arc<Vec<u8>>> {
        if let Some(bytes) = self.cache_get(url) {
            return Ok(bytes);
        }

        let existing = {
            let mut inflight = self.inflight.lock().expect("inflight mutex poisoned");
            match inflight.get(url) {
                Some(sender) => Some(sender.subscribe()),
                None => {
                    let (sender, _receiver) = broadcast::channel(COALESCE_CAPACITY);
                    inflight.insert(url.to_string(), sender);
                    None
                }
            }
        };

        if let Some(mut receiver) = existing {
            debug!(url, "coalescing onto in-flight request");
            loop {
                match receiver.recv().await {
                    Ok(outcome) => return outcome_to_result(outcome),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(CoreError::Network { status: 0 });
                    }
                }
            }
        }

        let outcome = self.fetch_with_retry(url).await;

        if let Ok(bytes) = &outcome {
            self.cache_insert(url, Arc::clone(bytes));
        }

        let sender = {
            let mut inflight = self.inflight.lock().expect("inflight mutex poisoned");
            inflight.remove(url)
        };
        if let Some(sender) = sender {
            let _ = sender.send(outcome.clone());
        }

        outcome_to_result(outcome)
    }

    /// Fetch and decode a JSON body.
    ///
    /// # Errors
    ///
    /// Propagates [`CoreError::Network`] from the fetch, or returns [`CoreError::Parse`]
    /// when the body is not valid JSON for `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> CoreResult<T> {
        let bytes = self.get(url).await?;
        serde_json::from_slice(&bytes).map_err(|source| CoreError::parse_with("json", source))
    }

    /// Fetch and decode an RSS channel.
    ///
    /// # Errors
    ///
    /// Propagates [`CoreError::Network`] from the fetch, or returns [`CoreError::Parse`]
    /// when the body is not well-formed RSS.
    pub async fn get_rss(&self, url: &str) -> CoreResult<RssChannel> {
        let bytes = self.get(url).await?;
        rss::parse_rss(&bytes)
    }

    /// Fetch an RSS feed and return its items normalized into [`TorrentListItem`]s.
    ///
    /// # Errors
    ///
    /// Same as [`NetClient::get_rss`].
    pub async fn get_torrents(&self, url: &str) -> CoreResult<Vec<TorrentListItem>> {
        let channel = self.get_rss(url).await?;
        Ok(rss::extract_torrents(&channel))
    }

    /// Submit a `multipart/form-data` request with form fields and file parts.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Network`] on transport failure or a non-2xx response.
    pub async fn post_data(
        &self,
        url: &str,
        form: &[(&str, &str)],
        files: &[(&str, &str, Vec<u8>)],
    ) -> CoreResult<Arc<Vec<u8>>> {
        let mut multipart = reqwest::multipart::Form::new();
        for (key, value) in form {
            multipart = multipart.text((*key).to_string(), (*value).to_string());
        }
        for (field, filename, bytes) in files {
            let part = reqwest::multipart::Part::bytes(bytes.clone())
                .file_name((*filename).to_string());
            multipart = multipart.part((*field).to_string(), part);
        }

        let response = self
            .http
            .post(url)
            .multipart(multipart)
            .send()
            .await
            .map_err(|_| CoreError::Network { status: 0 })?;
        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::Network {
                status: status.as_u16(),
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|_| CoreError::Network { status: 0 })?;
        Ok(Arc::new(bytes.to_vec()))
    }

    /// Perform a single GET against `probe_url` through the configured proxy with a 10s
    /// timeout, to let an operator validate proxy settings before saving them.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Network`] if the probe request fails or times out.
    pub async fn test_proxy(&self, probe_url: &str) -> CoreResult<()> {
        let response = self
            .http
            .get(probe_url)
            .timeout(PROXY_TEST_TIMEOUT)
            .send()
            .await
            .map_err(|_| CoreError::Network { status: 0 })?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(CoreError::Network {
                status: response.status().as_u16(),
            })
        }
    }

    async fn fetch_with_retry(&self, url: &str) -> FetchOutcome {
        let mut backoff_used = Duration::ZERO;
        for attempt in 1..=MAX_ATTEMPTS {
            match self.http.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .bytes()
                            .await
                            .map(|bytes| Arc::new(bytes.to_vec()))
                            .map_err(|_| 0u16);
                    }
                    if !is_retryable_status(status) || attempt == MAX_ATTEMPTS {
                        return Err(status.as_u16());
                    }
                    warn!(url, %status, attempt, "retryable HTTP status");
                }
                Err(err) => {
                    if attempt == MAX_ATTEMPTS {
                        return Err(0);
                    }
                    warn!(url, attempt, error = %err, "transport failure, retrying");
                }
            }

            let wait = RETRY_WAIT.min(MAX_BACKOFF.saturating_sub(backoff_used));
            if !wait.is_zero() {
                sleep(wait).await;
                backoff_used += wait;
            }
        }
        Err(0)
    }

    fn cache_get(&self, url: &str) -> Option<Arc<Vec<u8>>> {
        self.cache.lock().expect("cache mutex poisoned").get(url)
    }

    fn cache_insert(&self, url: &str, bytes: Arc<Vec<u8>>) {
        self.cache
            .lock()
            .expect("cache mutex poisoned")
            .insert(url.to_string(), bytes);
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error()
}

fn outcome_to_result(outcome: FetchOutcome) -> CoreResult<Arc<Vec<u8>>> {
    outcome.map_err(|status| CoreError::Network { status })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;
    use tokio::net::TcpListener;
    use tokio::sync::Barrier;

    async fn spawn_counting_server(hits: Arc<AtomicUsize>, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                hits.fetch_add(1, Ordering::SeqCst);
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                use tokio::io::AsyncWriteExt;
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        format!("http://{addr}/")
    }

    #[tokio::test]
    async fn concurrent_gets_coalesce_into_one_request() {
        let hits = Arc::new(AtomicUsize::new(0));
        let url = spawn_counting_server(Arc::clone(&hits), "hello").await;
        let client = Arc::new(NetClient::new(NetClientConfig::default()).expect("client"));

        let barrier = Arc::new(Barrier::new(10));
        let mut handles = Vec::new();
        for _ in 0..10 {
            let client = Arc::clone(&client);
            let url = url.clone();
            let barrier = Arc::clone(&barrier);
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                client.get(&url).await
            }));
        }

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.expect("task").expect("get"));
        }

        for result in &results {
            assert_eq!(result.as_slice(), b"hello");
        }
        // Coalescing must collapse the whole concurrent burst onto exactly one physical
        // request, not merely "fewer than one per caller".
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        tokio::time::sleep(StdDuration::from_millis(50)).await;
        let cached = client.get(&url).await.expect("cached get");
        assert_eq!(cached.as_slice(), b"hello");
        assert!(hits.load(Ordering::SeqCst) < 10, "cache hit must not add a request");
    }

    #[tokio::test]
    async fn four_xx_is_not_retried() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = Arc::clone(&hits);
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                hits_clone.fetch_add(1, Ordering::SeqCst);
                use tokio::io::AsyncWriteExt;
                let _ = socket
                    .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                    .await;
            }
        });

        let client = NetClient::new(NetClientConfig::default()).expect("client");
        let result = client.get(&format!("http://{addr}/")).await;
        assert!(matches!(result, Err(CoreError::Network { status: 404 })));
        assert_eq!(hits.load(Ordering::SeqCst), 1, "4xx must not be retried");
    }
}
