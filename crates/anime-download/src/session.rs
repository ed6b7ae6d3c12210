//! Download-client session manager: a login state-machine actor feeding a
//! rate-limited wrapper over an [`anime_core::Downloader`] implementation.
//!
//! The source models this as a trio of channels (a coalescing size-1 mailbox, a
//! closed-channel "not logging in" signal, a closed-channel "gave up permanently"
//! signal). Per SPEC_FULL's REDESIGN FLAGS, this rewrite prefers the more idiomatic
//! actor shape: an explicit [`SessionState`] broadcast over a `watch` channel, driven
//! by a single actor task that owns the coalescing login-request mailbox.

use std::sync::Arc;
use std::time::Duration;

use anime_core::model::{TorrentFileEntry, TorrentInfo, TorrentInfoSnapshot};
use anime_core::{CoreError, CoreResult, Downloader};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{DownloadError, Result};

/// Wait budget for [`DownloadSession::ensure_login`], mirroring the source's
/// `ensureLogin` 10 second ceiling.
const ENSURE_LOGIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Backoff after a network failure during auth, mirroring the source's retry delay.
const AUTH_NETWORK_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Login state of a [`DownloadSession`].
///
/// Named per SPEC_FULL's REDESIGN FLAGS (`{LoggedOut, LoggingIn, LoggedIn,
/// FailedTerminal}`) rather than the source's implicit channel-state encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session established; the next guarded call will trigger a login attempt.
    LoggedOut,
    /// A login attempt is in flight.
    LoggingIn,
    /// Session established; guarded calls may proceed once the rate limiter admits them.
    LoggedIn,
    /// The downloader rejected credentials or forbade the client. Only an external
    /// configuration change (a process restart with corrected credentials) can recover
    /// from this state; the session manager never attempts to leave it.
    FailedTerminal,
}

/// Session manager wrapping an [`anime_core::Downloader`] with login tracking and
/// rate limiting.
///
/// Every guarded operation follows the wrapper pattern from SPEC_FULL §4.8:
/// `ensure_login → limiter.until_ready → call downloader → on auth failure, reset`.
#[derive(Clone)]
pub struct DownloadSession {
    downloader: Arc<dyn Downloader>,
    state_rx: watch::Receiver<SessionState>,
    login_request: mpsc::Sender<()>,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl DownloadSession {
    /// Build a session manager and spawn its login actor.
    ///
    /// The actor runs for the lifetime of `cancel`; dropping every clone of the
    /// returned [`DownloadSession`] before then simply leaves the actor idling on its
    /// mailbox until cancellation.
    #[must_use]
    pub fn spawn(downloader: Arc<dyn Downloader>, cancel: CancellationToken) -> Self {
        let (state_tx, state_rx) = watch::channel(SessionState::LoggedOut);
        let (login_tx, login_rx) = mpsc::channel(1);
        let interval = downloader.poll_interval_ms().max(1);
        let quota = Quota::with_period(Duration::from_millis(interval))
            .expect("poll interval is non-zero")
            .allow_burst(NonZeroU32::new(1).expect("1 is non-zero"));
        let limiter = Arc::new(RateLimiter::direct(quota));

        tokio::spawn(run_login_actor(
            downloader.clone(),
            state_tx,
            login_tx.clone(),
            login_rx,
            cancel,
        ));

        // The very first guarded call must observe `LoggedOut` and trigger a login;
        // no pre-seeded request is needed because `ensure_login` always sends one
        // itself before waiting.
        Self {
            downloader,
            state_rx,
            login_request: login_tx,
            limiter,
        }
    }

    /// Current login state, without blocking.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Block (up to [`ENSURE_LOGIN_TIMEOUT`]) until the session is logged in, or
    /// `cancel` fires, whichever happens first.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::SessionFailed`] if the session has given up
    /// permanently, or [`DownloadError::LoginTimeout`] on cancellation or timeout.
    pub async fn ensure_login(&self, cancel: &CancellationToken) -> Result<()> {
        let mut rx = self.state_rx.clone();
        if *rx.borrow() == SessionState::LoggedIn {
            return Ok(());
        }
        if *rx.borrow() == SessionState::FailedTerminal {
            return Err(DownloadError::SessionFailed);
        }
        // Coalescing: a login attempt may already be queued or in flight; a dropped
        // send here just means one is already pending.
        let _ = self.login_request.try_send(());

        let wait = async {
            loop {
                match *rx.borrow() {
                    SessionState::LoggedIn => return Ok(()),
                    SessionState::FailedTerminal => return Err(DownloadError::SessionFailed),
                    SessionState::LoggedOut | SessionState::LoggingIn => {}
                }
                if rx.changed().await.is_err() {
                    return Err(DownloadError::SessionFailed);
                }
            }
        };

        tokio::select! {
            () = cancel.cancelled() => Err(DownloadError::LoginTimeout),
            res = wait => res,
            () = tokio::time::sleep(ENSURE_LOGIN_TIMEOUT) => Err(DownloadError::LoginTimeout),
        }
    }

    /// Re-open the login request mailbox after a guarded call observes an
    /// authentication failure mid-session (the downloader silently expired a
    /// session that `ensure_login` had previously approved).
    fn reset_login(&self) {
        let _ = self.login_request.try_send(());
    }

    /// Run the `ensure_login → limiter.until_ready` prelude common to every guarded
    /// operation below, resetting the login mailbox if `result` reports an
    /// authentication failure that slipped past a session `ensure_login` had
    /// already approved.
    async fn prelude(&self, cancel: &CancellationToken) -> Result<()> {
        self.ensure_login(cancel).await?;
        self.limiter.until_ready().await;
        Ok(())
    }

    fn translate<T>(&self, result: CoreResult<T>) -> Result<T> {
        match result {
            Err(err @ (CoreError::DownloadAuth | CoreError::DownloadForbidden)) => {
                self.reset_login();
                let _ = err;
                Err(DownloadError::SessionFailed)
            }
            other => other.map_err(DownloadError::from),
        }
    }

    /// Submit already-parsed torrent metainfo at `save_path`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::LoginTimeout`]/[`DownloadError::SessionFailed`] if the
    /// session cannot be established, otherwise the adapter's own failure.
    pub async fn add(
        &self,
        cancel: &CancellationToken,
        info: &TorrentInfo,
        save_path: &str,
    ) -> Result<String> {
        self.prelude(cancel).await?;
        let result = self.downloader.add(info, save_path).await;
        self.translate(result)
    }

    /// Remove a torrent, optionally with its on-disk data.
    ///
    /// # Errors
    ///
    /// See [`DownloadSession::add`].
    pub async fn delete(&self, cancel: &CancellationToken, uid: &str, with_data: bool) -> Result<()> {
        self.prelude(cancel).await?;
        let result = self.downloader.delete(uid, with_data).await;
        self.translate(result)
    }

    /// Rename one file inside a torrent's payload.
    ///
    /// # Errors
    ///
    /// See [`DownloadSession::add`].
    pub async fn rename(
        &self,
        cancel: &CancellationToken,
        uid: &str,
        old_path: &str,
        new_path: &str,
    ) -> Result<()> {
        self.prelude(cancel).await?;
        let result = self.downloader.rename(uid, old_path, new_path).await;
        self.translate(result)
    }

    /// List the files exposed by a torrent.
    ///
    /// # Errors
    ///
    /// See [`DownloadSession::add`].
    pub async fn get_torrent_files(
        &self,
        cancel: &CancellationToken,
        uid: &str,
    ) -> Result<Vec<TorrentFileEntry>> {
        self.prelude(cancel).await?;
        let result = self.downloader.get_torrent_files(uid).await;
        self.translate(result)
    }

    /// Fetch a point-in-time status snapshot for a torrent.
    ///
    /// # Errors
    ///
    /// See [`DownloadSession::add`].
    pub async fn get_torrent_info(
        &self,
        cancel: &CancellationToken,
        uid: &str,
    ) -> Result<TorrentInfoSnapshot> {
        self.prelude(cancel).await?;
        let result = self.downloader.get_torrent_info(uid).await;
        self.translate(result)
    }

    /// Resolve a candidate GUID to the downloader's true UID, if known yet.
    ///
    /// # Errors
    ///
    /// See [`DownloadSession::add`].
    pub async fn check_hash(&self, cancel: &CancellationToken, guid: &str) -> Result<Option<String>> {
        self.prelude(cancel).await?;
        let result = self.downloader.check_hash(guid).await;
        self.translate(result)
    }
}

async fn run_login_actor(
    downloader: Arc<dyn Downloader>,
    state_tx: watch::Sender<SessionState>,
    self_tx: mpsc::Sender<()>,
    mut login_rx: mpsc::Receiver<()>,
    cancel: CancellationToken,
) {
    if let Err(err) = downloader.init().await {
        warn!(error = %err, "downloader init failed; login attempts will still proceed");
    }

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            received = login_rx.recv() => {
                if received.is_none() {
                    break;
                }
            }
        }

        let _ = state_tx.send(SessionState::LoggingIn);
        match downloader.auth().await {
            Ok(()) => {
                info!("download session authenticated");
                let _ = state_tx.send(SessionState::LoggedIn);
                // Drain any request that coalesced while we were logging in.
                while login_rx.try_recv().is_ok() {}
            }
            Err(CoreError::Network { status }) => {
                warn!(status, "download session auth hit a network error; retrying in 30s");
                let _ = state_tx.send(SessionState::LoggedOut);
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(AUTH_NETWORK_RETRY_DELAY) => {}
                }
                let _ = self_tx.try_send(());
            }
            Err(CoreError::DownloadAuth | CoreError::DownloadForbidden) => {
                warn!("download session auth rejected; session permanently failed");
                let _ = state_tx.send(SessionState::FailedTerminal);
                break;
            }
            Err(err) => {
                warn!(error = %err, "download session auth failed with an unexpected error");
                let _ = state_tx.send(SessionState::LoggedOut);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anime_test_support::fixtures::{FakeDownloader, FakeDownloaderBehavior, FakeOutcome};
    use std::time::Duration as StdDuration;

    #[tokio::test(start_paused = true)]
    async fn first_guarded_call_triggers_login_and_succeeds() {
        let fake = Arc::new(FakeDownloader::new(FakeDownloaderBehavior::default()));
        let cancel = CancellationToken::new();
        let session = DownloadSession::spawn(fake.clone(), cancel.clone());

        tokio::time::sleep(StdDuration::from_millis(1)).await;
        let cancel_for_call = cancel.clone();
        session
            .ensure_login(&cancel_for_call)
            .await
            .expect("login should succeed");
        assert_eq!(session.state(), SessionState::LoggedIn);
    }

    #[tokio::test(start_paused = true)]
    async fn auth_rejection_moves_to_failed_terminal() {
        let fake = Arc::new(FakeDownloader::new(FakeDownloaderBehavior {
            auth: FakeOutcome::AuthError,
            ..Default::default()
        }));
        let cancel = CancellationToken::new();
        let session = DownloadSession::spawn(fake, cancel.clone());

        let err = session.ensure_login(&cancel).await.unwrap_err();
        assert!(matches!(err, DownloadError::SessionFailed));
        assert_eq!(session.state(), SessionState::FailedTerminal);
    }

    #[tokio::test(start_paused = true)]
    async fn network_failure_retries_after_thirty_seconds() {
        let fake = Arc::new(FakeDownloader::new(FakeDownloaderBehavior {
            auth: FakeOutcome::NetworkError(0),
            ..Default::default()
        }));
        let cancel = CancellationToken::new();
        let session = DownloadSession::spawn(fake.clone(), cancel.clone());

        tokio::time::sleep(StdDuration::from_millis(1)).await;
        assert_eq!(session.state(), SessionState::LoggedOut);

        fake.set_auth_outcome(FakeOutcome::Ok);
        tokio::time::advance(StdDuration::from_secs(31)).await;
        tokio::time::sleep(StdDuration::from_millis(1)).await;
        assert_eq!(session.state(), SessionState::LoggedIn);
    }
}
