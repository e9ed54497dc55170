//! Scripted capabilities for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::alarms::Alarms;
use crate::api::ApiError;
use crate::auth::{AuthBackend, Capabilities, SessionManager, SurfaceUrls};
use crate::clock::Clock;
use crate::models::{AuthStatus, User, VerifyResponse};
use crate::storage::MemoryStorage;
use crate::surface::Surface;

pub fn authenticated(token: &str, ttl_seconds: Option<i64>) -> AuthStatus {
    AuthStatus {
        authenticated: true,
        token: Some(token.to_string()),
        user: Some(User {
            id: Some("u1".to_string()),
            email: Some("ann@example.test".to_string()),
            name: Some("Ann".to_string()),
        }),
        expires_at: None,
        ttl_seconds,
    }
}

pub fn unauthenticated() -> AuthStatus {
    AuthStatus {
        authenticated: false,
        token: None,
        user: None,
        expires_at: None,
        ttl_seconds: None,
    }
}

/// Backend answering from queued results. An empty check queue answers
/// "signed out"; an empty verify queue answers "invalid".
#[derive(Default)]
pub struct ScriptedBackend {
    checks: Mutex<VecDeque<Result<AuthStatus, ApiError>>>,
    verifies: Mutex<VecDeque<Result<VerifyResponse, ApiError>>>,
    check_calls: AtomicUsize,
    verify_calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn push_check(&self, result: Result<AuthStatus, ApiError>) {
        self.checks.lock().unwrap().push_back(result);
    }

    pub fn push_verify(&self, result: Result<VerifyResponse, ApiError>) {
        self.verifies.lock().unwrap().push_back(result);
    }

    pub fn check_calls(&self) -> usize {
        self.check_calls.load(Ordering::SeqCst)
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthBackend for ScriptedBackend {
    async fn check_session(&self) -> Result<AuthStatus, ApiError> {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        self.checks
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(unauthenticated()))
    }

    async fn verify_token(&self, _token: &str) -> Result<VerifyResponse, ApiError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.verifies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(VerifyResponse::default()))
    }
}

/// Records wake-ups instead of arming timers.
#[derive(Default)]
pub struct RecordingAlarms {
    pending: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl RecordingAlarms {
    pub fn pending(&self, name: &str) -> Option<DateTime<Utc>> {
        self.pending.lock().unwrap().get(name).copied()
    }
}

impl Alarms for RecordingAlarms {
    fn create(&self, name: &str, when: DateTime<Utc>) {
        self.pending.lock().unwrap().insert(name.to_string(), when);
    }

    fn clear(&self, name: &str) -> bool {
        self.pending.lock().unwrap().remove(name).is_some()
    }
}

#[derive(Default)]
pub struct RecordingSurface {
    opened: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl RecordingSurface {
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    /// Make every later `open` fail (after recording the URL).
    pub fn fail_opens(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Surface for RecordingSurface {
    async fn open(&self, url: &str) -> anyhow::Result<()> {
        self.opened.lock().unwrap().push(url.to_string());
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("surface unavailable");
        }
        Ok(())
    }
}

/// A clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

pub struct Harness {
    pub manager: SessionManager,
    pub backend: Arc<ScriptedBackend>,
    pub alarms: Arc<RecordingAlarms>,
    pub surface: Arc<RecordingSurface>,
    pub clock: Arc<ManualClock>,
    pub storage: Arc<MemoryStorage>,
    pub urls: SurfaceUrls,
}

pub fn harness() -> Harness {
    build(
        Arc::new(ScriptedBackend::default()),
        Arc::new(RecordingAlarms::default()),
        Arc::new(RecordingSurface::default()),
        Arc::new(ManualClock::default()),
        Arc::new(MemoryStorage::new()),
    )
}

impl Harness {
    /// Rebuild the manager over `storage`, keeping every other capability.
    pub fn with_storage(self, storage: MemoryStorage) -> Harness {
        build(
            self.backend,
            self.alarms,
            self.surface,
            self.clock,
            Arc::new(storage),
        )
    }
}

fn build(
    backend: Arc<ScriptedBackend>,
    alarms: Arc<RecordingAlarms>,
    surface: Arc<RecordingSurface>,
    clock: Arc<ManualClock>,
    storage: Arc<MemoryStorage>,
) -> Harness {
    let urls = SurfaceUrls {
        sign_in: "https://app.test/api/auth/signin".to_string(),
        sign_out: "https://app.test/api/auth/signout".to_string(),
    };
    let caps = Capabilities {
        storage: storage.clone(),
        alarms: alarms.clone(),
        surface: surface.clone(),
        clock: clock.clone(),
    };
    let manager = SessionManager::new(backend.clone(), caps, urls.clone());
    Harness {
        manager,
        backend,
        alarms,
        surface,
        clock,
        storage,
        urls,
    }
}

mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_manual_clock_moves_only_when_set() {
        let clock = ManualClock::default();
        let start = clock.now();
        clock.set(start + Duration::seconds(30));
        assert_eq!(clock.now() - start, Duration::seconds(30));
    }
}
