//! Session lifecycle manager.
//!
//! States are implicit in the snapshot: before the first authority check the
//! last persisted snapshot is exposed as-is; afterwards a held token means
//! authenticated and no token means unauthenticated.
//!
//! One named wake-up ([`REFRESH_ALARM`]) drives both the proactive refresh
//! before expiry and the retries after a failed authority check. Firing it
//! always runs a forced authority check.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::backoff::Backoff;
use super::session::{AuthSession, SessionPatch};
use super::store::AuthStateStore;
use super::{AuthBackend, SessionError, StateBroadcaster, REFRESH_ALARM};
use crate::alarms::Alarms;
use crate::clock::Clock;
use crate::config::Config;
use crate::events::{EventKind, EventRegistry, LifecycleEvent};
use crate::models::{AuthStatus, VerifyResponse};
use crate::storage::Storage;
use crate::surface::Surface;

/// Refresh this many seconds before the token expires.
const REFRESH_LEAD_SECS: i64 = 60;

/// Never schedule a refresh sooner than this many seconds from now.
const MIN_REFRESH_DELAY_SECS: i64 = 5;

/// Pause between authority checks while waiting for an interactive sign-in.
const LOGIN_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Give up on an interactive sign-in after this long.
const LOGIN_TIMEOUT: Duration = Duration::from_secs(60);

/// Injected platform capabilities.
#[derive(Clone)]
pub struct Capabilities {
    pub storage: Arc<dyn Storage>,
    pub alarms: Arc<dyn Alarms>,
    pub surface: Arc<dyn Surface>,
    pub clock: Arc<dyn Clock>,
}

/// Where the sign-in and sign-out surfaces live.
#[derive(Debug, Clone)]
pub struct SurfaceUrls {
    pub sign_in: String,
    pub sign_out: String,
}

impl SurfaceUrls {
    pub fn from_config(config: &Config) -> Self {
        Self {
            sign_in: config.url(&config.paths.sign_in),
            sign_out: config.url(&config.paths.sign_out),
        }
    }
}

/// Result of an authority check that completed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AuthOutcome {
    Authenticated { state: AuthSession },
    Unauthenticated { state: AuthSession },
}

impl AuthOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthOutcome::Authenticated { .. })
    }

    pub fn state(&self) -> &AuthSession {
        match self {
            AuthOutcome::Authenticated { state } | AuthOutcome::Unauthenticated { state } => state,
        }
    }

    pub fn into_state(self) -> AuthSession {
        match self {
            AuthOutcome::Authenticated { state } | AuthOutcome::Unauthenticated { state } => state,
        }
    }
}

struct Inner {
    store: AuthStateStore,
    backend: Arc<dyn AuthBackend>,
    alarms: Arc<dyn Alarms>,
    surface: Arc<dyn Surface>,
    clock: Arc<dyn Clock>,
    backoff: Mutex<Backoff>,
    urls: SurfaceUrls,
}

/// Owns the session state machine. Clone is cheap and shares the same state.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn AuthBackend>, caps: Capabilities, urls: SurfaceUrls) -> Self {
        let store = AuthStateStore::new(caps.storage, caps.alarms.clone(), StateBroadcaster::new());
        Self {
            inner: Arc::new(Inner {
                store,
                backend,
                alarms: caps.alarms,
                surface: caps.surface,
                clock: caps.clock,
                backoff: Mutex::new(Backoff::new()),
                urls,
            }),
        }
    }

    /// Current snapshot.
    pub fn state(&self) -> AuthSession {
        self.inner.store.get()
    }

    pub fn broadcaster(&self) -> &StateBroadcaster {
        self.inner.store.broadcaster()
    }

    /// Delay the next backoff retry would use.
    pub fn current_backoff(&self) -> Duration {
        self.backoff().current()
    }

    pub fn is_token_valid(&self) -> bool {
        self.state().is_token_valid(self.inner.clock.now())
    }

    /// Load the persisted session and schedule a refresh if it has not expired.
    ///
    /// Does not contact the backend; the loaded snapshot is exposed as-is
    /// until the first authority check.
    pub async fn initialize(&self) -> AuthSession {
        let session = self.inner.store.load().await;
        if let Some(expires_at) = session.expires_at {
            if expires_at > self.inner.clock.now() {
                self.schedule_refresh(expires_at);
            }
        }
        info!(signed_in = session.is_signed_in(), "Session manager initialized");
        session
    }

    /// Wire lifecycle events: install/startup run an unforced check, the
    /// refresh wake-up runs a forced one.
    pub fn register(&self, registry: &mut EventRegistry) {
        for kind in [EventKind::Installed, EventKind::Startup] {
            let manager = self.clone();
            registry.register(kind, move |event| {
                let manager = manager.clone();
                async move {
                    debug!(?event, "Lifecycle authentication");
                    if let Err(e) = manager.authenticate(false).await {
                        warn!(error = %e, "Lifecycle authentication failed");
                    }
                }
            });
        }

        let manager = self.clone();
        registry.register(EventKind::Alarm, move |event| {
            let manager = manager.clone();
            async move {
                if let LifecycleEvent::Alarm(name) = event {
                    manager.on_alarm(&name).await;
                }
            }
        });
    }

    /// Handle a fired wake-up. Only [`REFRESH_ALARM`] is ours.
    pub async fn on_alarm(&self, name: &str) {
        if name != REFRESH_ALARM {
            return;
        }
        debug!("Refresh wake-up fired");
        if let Err(e) = self.authenticate(true).await {
            warn!(error = %e, "Scheduled refresh failed");
        }
    }

    /// Make sure the session is authenticated.
    ///
    /// Unforced with a valid token, this answers from the cached snapshot
    /// and revalidates in the background. Otherwise it runs one authority
    /// check: an authenticated answer is persisted and resets the backoff;
    /// an unauthenticated answer clears the session; both an unauthenticated
    /// answer and a transport failure schedule a backoff retry. A transport
    /// failure leaves the session untouched.
    pub async fn authenticate(&self, force: bool) -> Result<AuthOutcome, SessionError> {
        if !force {
            let cached = self.state();
            if cached.is_token_valid(self.inner.clock.now()) {
                self.spawn_silent_verify();
                return Ok(AuthOutcome::Authenticated { state: cached });
            }
        }

        match self.inner.backend.check_session().await {
            Ok(status) if status.authenticated => {
                let state = self.accept(status).await;
                info!("Authority check succeeded");
                Ok(AuthOutcome::Authenticated { state })
            }
            Ok(_) => {
                info!("Authority check reports signed out, clearing session");
                let state = self.inner.store.clear().await;
                self.schedule_backoff();
                Ok(AuthOutcome::Unauthenticated { state })
            }
            Err(e) => {
                warn!(error = %e, "Authority check failed");
                self.schedule_backoff();
                Err(SessionError::Transport(e))
            }
        }
    }

    /// Verify `token` (or the current token). A valid answer for the
    /// current token stamps `last_verified_at`; failures never clear the
    /// session.
    pub async fn verify(&self, token: Option<String>) -> Result<VerifyResponse, SessionError> {
        let token = token
            .or_else(|| self.state().token)
            .ok_or(SessionError::NoToken)?;

        match self.inner.backend.verify_token(&token).await {
            Ok(response) => {
                if response.valid {
                    self.inner
                        .store
                        .mark_verified(&token, self.inner.clock.now())
                        .await;
                }
                Ok(response)
            }
            Err(e) => {
                warn!(error = %e, "Token verification failed");
                Err(SessionError::VerificationFailed(e.to_string()))
            }
        }
    }

    /// Open the sign-in surface and poll the authority check until it
    /// reports authenticated or [`LOGIN_TIMEOUT`] elapses. Polls never
    /// overlap.
    pub async fn login(&self) -> Result<AuthOutcome, SessionError> {
        if let Err(e) = self.inner.surface.open(&self.inner.urls.sign_in).await {
            warn!(error = %e, "Failed to open sign-in surface");
        }

        let started = tokio::time::Instant::now();
        loop {
            if started.elapsed() >= LOGIN_TIMEOUT {
                info!("Interactive login timed out");
                return Err(SessionError::LoginTimeout);
            }

            match self.inner.backend.check_session().await {
                Ok(status) if status.authenticated => {
                    let state = self.accept(status).await;
                    info!("Interactive login succeeded");
                    return Ok(AuthOutcome::Authenticated { state });
                }
                Ok(_) => debug!("Still signed out, polling again"),
                Err(e) => debug!(error = %e, "Login poll failed, polling again"),
            }

            tokio::time::sleep(LOGIN_POLL_INTERVAL).await;
        }
    }

    /// Clear the session and open the sign-out surface. Succeeds even if
    /// the surface cannot be opened.
    pub async fn logout(&self) -> AuthSession {
        let cleared = self.inner.store.clear().await;
        if let Err(e) = self.inner.surface.open(&self.inner.urls.sign_out).await {
            warn!(error = %e, "Failed to open sign-out surface");
        }
        info!("Logged out");
        cleared
    }

    /// Register the retry wake-up at `now + current delay`, superseding any
    /// pending wake-up, then double the delay (capped). Returns the delay used.
    pub fn schedule_backoff(&self) -> Duration {
        let delay = self.backoff().next_delay();
        let when = self.inner.clock.now() + chrono::Duration::seconds(delay.as_secs() as i64);
        self.inner.alarms.create(REFRESH_ALARM, when);
        info!(delay_secs = delay.as_secs(), "Authority check retry scheduled");
        delay
    }

    /// Persist an authenticated answer, reschedule the refresh, reset backoff.
    async fn accept(&self, status: AuthStatus) -> AuthSession {
        let expires_at = status.resolve_expiry(self.inner.clock.now());
        let state = self
            .inner
            .store
            .set(SessionPatch::authenticated(status.token, status.user, expires_at))
            .await;
        self.schedule_refresh(expires_at);
        self.backoff().reset();
        if let Some(user) = state.user.as_ref() {
            debug!(user = user.display_name(), "Session accepted");
        }
        state
    }

    fn schedule_refresh(&self, expires_at: DateTime<Utc>) {
        let when = refresh_time(self.inner.clock.now(), expires_at);
        self.inner.alarms.create(REFRESH_ALARM, when);
        debug!(when = %when, "Proactive refresh scheduled");
    }

    fn spawn_silent_verify(&self) {
        let manager = self.clone();
        tokio::spawn(async move {
            manager.verify_silently().await;
        });
    }

    /// Background revalidation. Failures are logged and otherwise ignored.
    async fn verify_silently(&self) {
        let Some(token) = self.state().token else {
            return;
        };
        match self.inner.backend.verify_token(&token).await {
            Ok(response) if response.valid => {
                self.inner
                    .store
                    .mark_verified(&token, self.inner.clock.now())
                    .await;
            }
            Ok(_) => debug!("Background verify reported the token invalid"),
            Err(e) => warn!(error = %e, "Background verify failed"),
        }
    }

    fn backoff(&self) -> MutexGuard<'_, Backoff> {
        self.inner.backoff.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// `max(now + 5s, expires_at - 60s)`
fn refresh_time(now: DateTime<Utc>, expires_at: DateTime<Utc>) -> DateTime<Utc> {
    (expires_at - chrono::Duration::seconds(REFRESH_LEAD_SECS))
        .max(now + chrono::Duration::seconds(MIN_REFRESH_DELAY_SECS))
}
