//! Session token storage.
//!
//! [`FileSessionPersistence`] keeps a small JSON object on disk and survives
//! restarts. [`MemorySessionPersistence`] lives as long as the process and is
//! what tests use.

use crate::error::PersistenceError;
use crate::providers::SessionPersistence;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

type Entries = BTreeMap<String, String>;

/// JSON file storage.
///
/// Writes go to a sibling temp file that is then renamed over the target, so
/// a crash never leaves a half-written file behind. Writes through one
/// instance (and its clones) are serialized.
#[derive(Debug, Clone)]
pub struct FileSessionPersistence {
    path: PathBuf,
    write_lock: Arc<tokio::sync::Mutex<()>>,
}

impl FileSessionPersistence {
    /// Storage backed by `path`; the file is created on first save
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// The backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entries(path: &Path) -> Result<Entries, PersistenceError> {
        match tokio::fs::read(path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Entries::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(Entries::new()),
            Err(error) => Err(error.into()),
        }
    }

    async fn write_entries(path: &Path, entries: &Entries) -> Result<(), PersistenceError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_vec_pretty(entries)
            .map_err(|error| PersistenceError::Io(error.to_string()))?;

        let mut temp = path.as_os_str().to_owned();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);

        tokio::fs::write(&temp, contents).await?;
        tokio::fs::rename(&temp, path).await?;
        Ok(())
    }
}

impl SessionPersistence for FileSessionPersistence {
    fn save(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send {
        let path = self.path.clone();
        let write_lock = Arc::clone(&self.write_lock);
        let (key, value) = (key.to_string(), value.to_string());

        async move {
            let _guard = write_lock.lock().await;
            let mut entries = match Self::read_entries(&path).await {
                Ok(entries) => entries,
                Err(PersistenceError::Corrupt(reason)) => {
                    tracing::warn!(
                        path = %path.display(),
                        %reason,
                        "Replacing corrupt session file"
                    );
                    Entries::new()
                },
                Err(error) => return Err(error),
            };
            entries.insert(key, value);
            Self::write_entries(&path, &entries).await?;
            tracing::debug!(path = %path.display(), "Session file written");
            Ok(())
        }
    }

    fn load(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, PersistenceError>> + Send {
        let path = self.path.clone();
        let key = key.to_string();

        async move {
            let mut entries = Self::read_entries(&path).await?;
            Ok(entries.remove(&key))
        }
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    values: HashMap<String, String>,
    saves: Vec<(String, String)>,
    failures: VecDeque<PersistenceError>,
}

/// Process-local storage.
///
/// Clones share their data. Every save attempt is recorded, and failures can
/// be scripted for upcoming saves.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionPersistence {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemorySessionPersistence {
    /// Empty storage
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage already holding `value` under `key`
    #[must_use]
    pub fn with_value(key: &str, value: &str) -> Self {
        let storage = Self::new();
        storage.lock().values.insert(key.to_string(), value.to_string());
        storage
    }

    /// Makes the next save fail with `error`
    pub fn fail_next_save(&self, error: PersistenceError) {
        self.lock().failures.push_back(error);
    }

    /// Save attempts so far, in order, including failed ones
    #[must_use]
    pub fn saves(&self) -> Vec<(String, String)> {
        self.lock().saves.clone()
    }

    /// Currently stored value for `key`
    #[must_use]
    pub fn value(&self, key: &str) -> Option<String> {
        self.lock().values.get(key).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionPersistence for MemorySessionPersistence {
    fn save(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send {
        let outcome = {
            let mut inner = self.lock();
            inner.saves.push((key.to_string(), value.to_string()));
            match inner.failures.pop_front() {
                Some(error) => Err(error),
                None => {
                    inner.values.insert(key.to_string(), value.to_string());
                    Ok(())
                },
            }
        };
        std::future::ready(outcome)
    }

    fn load(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, PersistenceError>> + Send {
        std::future::ready(Ok(self.value(key)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::providers::SESSION_TOKEN_KEY;

    #[tokio::test]
    async fn file_round_trip_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let storage = FileSessionPersistence::new(&path);
        assert_eq!(storage.load(SESSION_TOKEN_KEY).await, Ok(None));

        storage.save(SESSION_TOKEN_KEY, "abc").await.unwrap();
        storage.save("other", "x").await.unwrap();
        storage.save(SESSION_TOKEN_KEY, "def").await.unwrap();

        let reopened = FileSessionPersistence::new(&path);
        assert_eq!(reopened.load(SESSION_TOKEN_KEY).await, Ok(Some("def".to_string())));
        assert_eq!(reopened.load("other").await, Ok(Some("x".to_string())));

        let raw: Entries = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw.len(), 2);
    }

    #[tokio::test]
    async fn corrupt_file_fails_load_and_is_replaced_on_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, b"{not json").unwrap();

        let storage = FileSessionPersistence::new(&path);
        assert!(matches!(
            storage.load(SESSION_TOKEN_KEY).await,
            Err(PersistenceError::Corrupt(_))
        ));

        storage.save(SESSION_TOKEN_KEY, "abc").await.unwrap();
        assert_eq!(storage.load(SESSION_TOKEN_KEY).await, Ok(Some("abc".to_string())));
    }

    #[tokio::test]
    async fn unwritable_location_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"").unwrap();

        let storage = FileSessionPersistence::new(blocker.join("session.json"));
        assert!(matches!(
            storage.save(SESSION_TOKEN_KEY, "abc").await,
            Err(PersistenceError::Io(_))
        ));
    }

    #[tokio::test]
    async fn memory_records_attempts_and_scripted_failures() {
        let storage = MemorySessionPersistence::new();
        storage.fail_next_save(PersistenceError::Io("disk full".to_string()));

        assert!(storage.save(SESSION_TOKEN_KEY, "a").await.is_err());
        assert_eq!(storage.value(SESSION_TOKEN_KEY), None);

        storage.save(SESSION_TOKEN_KEY, "b").await.unwrap();
        assert_eq!(storage.load(SESSION_TOKEN_KEY).await, Ok(Some("b".to_string())));
        assert_eq!(storage.saves().len(), 2);
    }

    #[tokio::test]
    async fn memory_with_value_is_loadable() {
        let storage = MemorySessionPersistence::with_value(SESSION_TOKEN_KEY, "t");
        assert_eq!(storage.load(SESSION_TOKEN_KEY).await, Ok(Some("t".to_string())));
        assert!(storage.saves().is_empty());
    }
}
