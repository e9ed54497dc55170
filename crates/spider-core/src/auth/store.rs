use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::broadcast::StateBroadcaster;
use super::session::{AuthSession, SessionPatch};
use super::REFRESH_ALARM;
use crate::alarms::Alarms;
use crate::storage::Storage;

const KEY_TOKEN: &str = "token";
const KEY_EXPIRES_AT: &str = "expiresAt";
const KEY_USER: &str = "user";
const KEY_LAST_VERIFIED_AT: &str = "lastVerifiedAt";

const SESSION_KEYS: [&str; 4] = [KEY_TOKEN, KEY_EXPIRES_AT, KEY_USER, KEY_LAST_VERIFIED_AT];

/// In-memory mirror of the persisted session.
///
/// The snapshot lock is never held across an await: each mutation merges
/// under the lock, then persists and broadcasts the merged copy. Mutations
/// take `writes` for their whole span, so storage always ends up holding
/// the latest merged snapshot. Persisting errors are logged and swallowed;
/// the in-memory snapshot stays authoritative for the life of the process.
pub struct AuthStateStore {
    state: Mutex<AuthSession>,
    writes: tokio::sync::Mutex<()>,
    storage: Arc<dyn Storage>,
    alarms: Arc<dyn Alarms>,
    broadcaster: StateBroadcaster,
}

impl AuthStateStore {
    pub fn new(
        storage: Arc<dyn Storage>,
        alarms: Arc<dyn Alarms>,
        broadcaster: StateBroadcaster,
    ) -> Self {
        Self {
            state: Mutex::new(AuthSession::default()),
            writes: tokio::sync::Mutex::new(()),
            storage,
            alarms,
            broadcaster,
        }
    }

    /// Current snapshot.
    pub fn get(&self) -> AuthSession {
        self.lock().clone()
    }

    pub fn broadcaster(&self) -> &StateBroadcaster {
        &self.broadcaster
    }

    /// Replace the in-memory snapshot with what is persisted. Unreadable
    /// fields load as null. Does not broadcast.
    pub(crate) async fn load(&self) -> AuthSession {
        let loaded = AuthSession {
            token: self.read_field(KEY_TOKEN).await,
            expires_at: self.read_field(KEY_EXPIRES_AT).await,
            user: self.read_field(KEY_USER).await,
            last_verified_at: self.read_field(KEY_LAST_VERIFIED_AT).await,
        };
        *self.lock() = loaded.clone();
        debug!(signed_in = loaded.is_signed_in(), "Session loaded from storage");
        loaded
    }

    /// Merge `patch` into the snapshot, persist the full result, broadcast it.
    pub(crate) async fn set(&self, patch: SessionPatch) -> AuthSession {
        let _write = self.writes.lock().await;
        let next = {
            let mut state = self.lock();
            *state = state.merged(patch);
            state.clone()
        };
        self.persist(&next).await;
        self.broadcaster.publish(next.clone());
        next
    }

    /// Stamp `last_verified_at` only if `token` is still the current token.
    pub(crate) async fn mark_verified(&self, token: &str, at: DateTime<Utc>) -> bool {
        let _write = self.writes.lock().await;
        let next = {
            let mut state = self.lock();
            if state.token.as_deref() != Some(token) {
                return false;
            }
            *state = state.merged(SessionPatch::verified_at(at));
            state.clone()
        };
        self.persist(&next).await;
        self.broadcaster.publish(next);
        true
    }

    /// Reset to an empty session, drop persisted keys, cancel the pending
    /// wake-up and broadcast.
    pub(crate) async fn clear(&self) -> AuthSession {
        let _write = self.writes.lock().await;
        *self.lock() = AuthSession::default();
        if let Err(e) = self.storage.remove(&SESSION_KEYS).await {
            warn!(error = %e, "Failed to remove persisted session");
        }
        self.alarms.clear(REFRESH_ALARM);
        let cleared = AuthSession::default();
        self.broadcaster.publish(cleared.clone());
        cleared
    }

    async fn persist(&self, session: &AuthSession) {
        let entries = vec![
            (KEY_TOKEN.to_string(), to_value(&session.token)),
            (KEY_EXPIRES_AT.to_string(), to_value(&session.expires_at)),
            (KEY_USER.to_string(), to_value(&session.user)),
            (KEY_LAST_VERIFIED_AT.to_string(), to_value(&session.last_verified_at)),
        ];
        if let Err(e) = self.storage.set(entries).await {
            warn!(error = %e, "Failed to persist session");
        }
    }

    async fn read_field<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = match self.storage.get(key).await {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = key, error = %e, "Failed to read persisted session field");
                return None;
            }
        };
        match serde_json::from_value::<Option<T>>(value) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(key = key, error = %e, "Ignoring malformed persisted session field");
                None
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, AuthSession> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn to_value<T: serde::Serialize>(field: &Option<T>) -> Value {
    serde_json::to_value(field).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::models::User;
    use crate::storage::MemoryStorage;
    use crate::test_support::RecordingAlarms;

    fn store_with(storage: Arc<MemoryStorage>) -> (AuthStateStore, Arc<RecordingAlarms>) {
        let alarms = Arc::new(RecordingAlarms::default());
        let store = AuthStateStore::new(storage, alarms.clone(), StateBroadcaster::new());
        (store, alarms)
    }

    #[tokio::test]
    async fn test_load_reads_persisted_fields() {
        let storage = Arc::new(MemoryStorage::with_entries([
            ("token", Value::from("tok")),
            ("expiresAt", Value::from("2030-01-01T00:00:00Z")),
            ("user", serde_json::json!({"id": "u1", "email": "a@b.test", "name": "Ann"})),
            ("lastVerifiedAt", Value::Null),
        ]));
        let (store, _) = store_with(storage);

        let loaded = store.load().await;
        assert_eq!(loaded.token.as_deref(), Some("tok"));
        assert_eq!(loaded.expires_at.unwrap().to_rfc3339(), "2030-01-01T00:00:00+00:00");
        assert_eq!(loaded.user.unwrap().name.as_deref(), Some("Ann"));
        assert!(loaded.last_verified_at.is_none());
        assert_eq!(store.get().token.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_load_tolerates_malformed_expiry() {
        let storage = Arc::new(MemoryStorage::with_entries([
            ("token", Value::from("tok")),
            ("expiresAt", Value::from("not a date")),
        ]));
        let (store, _) = store_with(storage);

        let loaded = store.load().await;
        assert_eq!(loaded.token.as_deref(), Some("tok"));
        assert!(loaded.expires_at.is_none());
    }

    #[tokio::test]
    async fn test_set_persists_full_snapshot_and_broadcasts() {
        let storage = Arc::new(MemoryStorage::new());
        let (store, _) = store_with(storage.clone());
        let mut rx = store.broadcaster().subscribe();

        let expires = Utc::now() + Duration::hours(1);
        let user = User {
            id: Some("u1".to_string()),
            ..User::default()
        };
        store
            .set(SessionPatch::authenticated(Some("tok".to_string()), Some(user), expires))
            .await;

        assert_eq!(storage.get("token").await.unwrap(), Some(Value::from("tok")));
        assert_eq!(storage.get("lastVerifiedAt").await.unwrap(), Some(Value::Null));
        assert!(storage.contains("expiresAt"));
        assert_eq!(rx.recv().await.unwrap().token.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_mark_verified_requires_current_token() {
        let (store, _) = store_with(Arc::new(MemoryStorage::new()));
        let expires = Utc::now() + Duration::hours(1);
        store
            .set(SessionPatch::authenticated(Some("new".to_string()), None, expires))
            .await;

        let now = Utc::now();
        assert!(!store.mark_verified("old", now).await);
        assert!(store.get().last_verified_at.is_none());

        assert!(store.mark_verified("new", now).await);
        assert_eq!(store.get().last_verified_at, Some(now));
    }

    #[tokio::test]
    async fn test_clear_removes_keys_cancels_wakeup_and_broadcasts() {
        let storage = Arc::new(MemoryStorage::with_entries([
            ("token", Value::from("tok")),
            ("crawl_1", Value::from("kept")),
        ]));
        let (store, alarms) = store_with(storage.clone());
        store.load().await;
        alarms.create(REFRESH_ALARM, Utc::now() + Duration::minutes(5));
        let mut rx = store.broadcaster().subscribe();

        store.clear().await;

        assert!(!storage.contains("token"));
        assert!(storage.contains("crawl_1"));
        assert!(alarms.pending(REFRESH_ALARM).is_none());
        assert_eq!(rx.recv().await.unwrap(), AuthSession::default());
    }
}
