use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use super::{Storage, StorageError};

/// Stores each key as a pretty-printed JSON file in a directory.
///
/// Writes and removals are serialized, so the entries of one `set` land
/// together and never interleave with another caller's.
pub struct FileStorage {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(dir: PathBuf) -> Result<Self, StorageError> {
        std::fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            key: dir.display().to_string(),
            source,
        })?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

fn io_error(key: &str) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        key: key.to_string(),
        source,
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let path = self.entry_path(key)?;
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(key)(e)),
        };
        let value = serde_json::from_str(&contents).map_err(|source| StorageError::Corrupt {
            key: key.to_string(),
            source,
        })?;
        Ok(Some(value))
    }

    async fn set(&self, entries: Vec<(String, Value)>) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        for (key, value) in entries {
            let path = self.entry_path(&key)?;
            let contents =
                serde_json::to_string_pretty(&value).map_err(|source| StorageError::Corrupt {
                    key: key.clone(),
                    source,
                })?;
            // Write then rename so a crash never leaves a truncated entry.
            let tmp = path.with_extension("json.tmp");
            tokio::fs::write(&tmp, contents).await.map_err(io_error(&key))?;
            tokio::fs::rename(&tmp, &path).await.map_err(io_error(&key))?;
            debug!(key = %key, "Stored entry");
        }
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        for key in keys {
            let path = self.entry_path(key)?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(io_error(key)(e)),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("state")).unwrap();

        storage
            .set(vec![("expiresAt".to_string(), Value::from("2030-01-01T00:00:00Z"))])
            .await
            .unwrap();
        assert!(dir.path().join("state/expiresAt.json").exists());

        // A fresh instance over the same directory sees the entry.
        let reopened = FileStorage::new(dir.path().join("state")).unwrap();
        assert_eq!(
            reopened.get("expiresAt").await.unwrap(),
            Some(Value::from("2030-01-01T00:00:00Z"))
        );

        reopened.remove(&["expiresAt", "never-written"]).await.unwrap();
        assert_eq!(reopened.get("expiresAt").await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_stay_consistent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(FileStorage::new(dir.path().to_path_buf()).unwrap());

        let mut tasks = Vec::new();
        for i in 0..100 {
            let storage = storage.clone();
            tasks.push(tokio::spawn(async move {
                storage
                    .set(vec![
                        ("token".to_string(), Value::from(format!("tok-{}", i))),
                        ("user".to_string(), serde_json::json!({"id": i})),
                    ])
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().expect("every write succeeds");
        }

        // Both keys come from the same write.
        let token = storage.get("token").await.unwrap().unwrap();
        let user = storage.get("user").await.unwrap().unwrap();
        assert_eq!(token, Value::from(format!("tok-{}", user["id"])));
        assert!(!dir.path().join("token.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_rejects_path_traversal_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();

        for key in ["../escape", ".hidden", "a/b", ""] {
            assert!(matches!(
                storage.get(key).await,
                Err(StorageError::InvalidKey(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("token.json"), "{not json").unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();

        assert!(matches!(
            storage.get("token").await,
            Err(StorageError::Corrupt { .. })
        ));
    }
}
