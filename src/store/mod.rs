//! Document store for casegen
//!
//! Persists providers, test cases and transcripts as JSON collections in the
//! data directory. Every write is a whole-file atomic replace taken under an
//! exclusive advisory lock; reads take a shared lock.

use crate::model::{ProviderConfig, TestCase, Transcript};
use anyhow::Context;
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use uuid::Uuid;

const LOCK_FILE: &str = ".lock";
const STORE_LOCK_TIMEOUT_SECS: u64 = 5;
const STORE_LOCK_RETRY_MS: u64 = 50;

/// An entity that lives in one named collection
pub trait Record: Serialize + DeserializeOwned + Clone {
    /// File stem of the collection, e.g. `test_cases` for `test_cases.json`
    const COLLECTION: &'static str;

    fn id(&self) -> Uuid;
}

impl Record for ProviderConfig {
    const COLLECTION: &'static str = "providers";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Record for TestCase {
    const COLLECTION: &'static str = "test_cases";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Record for Transcript {
    const COLLECTION: &'static str = "transcripts";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// The store manager
#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
}

struct StoreLock {
    file: std::fs::File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl Store {
    /// Open a store rooted at `dir`, creating it if needed
    pub fn open(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create data directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn collection_path<R: Record>(&self) -> PathBuf {
        self.dir.join(format!("{}.json", R::COLLECTION))
    }

    fn lock(&self, exclusive: bool) -> anyhow::Result<StoreLock> {
        let lock_path = self.dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        let start = Instant::now();
        loop {
            let result = if exclusive {
                FileExt::try_lock_exclusive(&file)
            } else {
                FileExt::try_lock_shared(&file)
            };
            match result {
                Ok(()) => break,
                Err(err) => {
                    if err.kind() != ErrorKind::WouldBlock {
                        return Err(err.into());
                    }
                    if start.elapsed() >= Duration::from_secs(STORE_LOCK_TIMEOUT_SECS) {
                        return Err(anyhow::anyhow!(
                            "Timed out waiting for store lock ({}s)",
                            STORE_LOCK_TIMEOUT_SECS
                        ));
                    }
                    std::thread::sleep(Duration::from_millis(STORE_LOCK_RETRY_MS));
                }
            }
        }

        Ok(StoreLock { file })
    }

    /// Read a collection without taking the lock. Missing file is empty.
    fn read_unlocked<R: Record>(&self) -> anyhow::Result<Vec<R>> {
        let path = self.collection_path::<R>();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to read {}", path.display()))
            }
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("Collection file {} is corrupted", path.display()))
    }

    fn write_unlocked<R: Record>(&self, records: &[R]) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(records)?;
        write_atomic(&self.collection_path::<R>(), &content)
    }

    /// Load a whole collection under a shared lock
    pub fn all<R: Record>(&self) -> anyhow::Result<Vec<R>> {
        let _lock = self.lock(false)?;
        self.read_unlocked()
    }

    pub fn find<R: Record>(&self, filter: impl Fn(&R) -> bool) -> anyhow::Result<Vec<R>> {
        Ok(self.all::<R>()?.into_iter().filter(|r| filter(r)).collect())
    }

    pub fn get<R: Record>(&self, id: Uuid) -> anyhow::Result<Option<R>> {
        Ok(self.all::<R>()?.into_iter().find(|r| r.id() == id))
    }

    /// Run `f` against the collection under the exclusive lock and persist
    /// the result in one atomic write.
    pub fn modify<R: Record, T>(&self, f: impl FnOnce(&mut Vec<R>) -> T) -> anyhow::Result<T> {
        let _lock = self.lock(true)?;
        let mut records = self.read_unlocked::<R>()?;
        let out = f(&mut records);
        self.write_unlocked(&records)?;
        Ok(out)
    }

    pub fn insert<R: Record>(&self, record: R) -> anyhow::Result<R> {
        self.modify(|records: &mut Vec<R>| {
            records.push(record.clone());
        })?;
        Ok(record)
    }

    pub fn insert_many<R: Record>(&self, batch: &[R]) -> anyhow::Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.modify(|records: &mut Vec<R>| records.extend_from_slice(batch))
    }

    /// Apply `patch` to the record with `id`; `None` when it does not exist
    pub fn update<R: Record>(
        &self,
        id: Uuid,
        patch: impl FnOnce(&mut R),
    ) -> anyhow::Result<Option<R>> {
        self.modify(|records: &mut Vec<R>| {
            let record = records.iter_mut().find(|r| r.id() == id)?;
            patch(record);
            Some(record.clone())
        })
    }

    /// Apply `patch` to every record matching `filter`; returns how many
    pub fn update_where<R: Record>(
        &self,
        filter: impl Fn(&R) -> bool,
        mut patch: impl FnMut(&mut R),
    ) -> anyhow::Result<usize> {
        self.modify(|records: &mut Vec<R>| {
            let mut count = 0;
            for record in records.iter_mut().filter(|r| filter(r)) {
                patch(record);
                count += 1;
            }
            count
        })
    }

    pub fn delete<R: Record>(&self, id: Uuid) -> anyhow::Result<bool> {
        self.modify(|records: &mut Vec<R>| {
            let before = records.len();
            records.retain(|r| r.id() != id);
            records.len() != before
        })
    }

    pub fn delete_all<R: Record>(&self) -> anyhow::Result<usize> {
        self.modify(|records: &mut Vec<R>| {
            let count = records.len();
            records.clear();
            count
        })
    }
}

/// Run synchronous store work on the blocking pool.
///
/// Store calls take file locks and may wait for them, so async callers go
/// through here instead of calling the store on a runtime thread.
pub async fn blocking<T, E, F>(f: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: From<anyhow::Error> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| E::from(anyhow::anyhow!("store task failed: {}", err)))?
}

fn write_atomic(path: &Path, content: &str) -> anyhow::Result<()> {
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        let _ = std::fs::set_permissions(&tmp_path, perms);
    }

    #[cfg(windows)]
    {
        if path.exists() {
            let _ = fs::remove_file(path);
        }
    }

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewTranscript;
    use pretty_assertions::assert_eq;

    fn transcript(title: &str) -> Transcript {
        NewTranscript {
            title: title.to_string(),
            content: format!("{} notes", title),
            meeting_date: None,
            participants: None,
        }
        .into_transcript()
    }

    fn case(title: &str) -> TestCase {
        TestCase::new(
            title.to_string(),
            "d".to_string(),
            "p".to_string(),
            vec!["step".to_string()],
            "e".to_string(),
        )
    }

    #[test]
    fn test_empty_collection_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        assert!(store.all::<Transcript>().unwrap().is_empty());
        assert!(store.get::<TestCase>(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_insert_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        let standup = store.insert(transcript("Standup")).unwrap();
        let retro = store.insert(transcript("Retro")).unwrap();

        assert_eq!(store.get::<Transcript>(standup.id).unwrap(), Some(standup.clone()));
        assert_eq!(store.all::<Transcript>().unwrap().len(), 2);

        assert!(store.delete::<Transcript>(standup.id).unwrap());
        assert!(!store.delete::<Transcript>(standup.id).unwrap());
        assert_eq!(store.all::<Transcript>().unwrap(), vec![retro]);
    }

    #[test]
    fn test_collections_are_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        store.insert(case("Login")).unwrap();
        store.insert(transcript("Kickoff")).unwrap();

        assert!(dir.path().join("test_cases.json").exists());
        assert!(dir.path().join("transcripts.json").exists());
        assert_eq!(store.all::<TestCase>().unwrap().len(), 1);
    }

    #[test]
    fn test_update_and_update_where() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let login = case("Login");
        let logout = case("Logout");
        store.insert_many(&[login.clone(), logout.clone()]).unwrap();

        let updated = store
            .update::<TestCase>(login.id, |c| c.title = "Sign in".to_string())
            .unwrap();
        assert_eq!(updated.map(|c| c.title), Some("Sign in".to_string()));
        assert!(store
            .update::<TestCase>(Uuid::new_v4(), |c| c.is_selected = true)
            .unwrap()
            .is_none());

        let count = store
            .update_where::<TestCase>(|c| c.id == logout.id, |c| c.is_selected = true)
            .unwrap();
        assert_eq!(count, 1);
        let selected = store.find::<TestCase>(|c| c.is_selected).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, logout.id);
    }

    #[test]
    fn test_delete_all() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        store.insert_many(&[case("a"), case("b"), case("c")]).unwrap();

        assert_eq!(store.delete_all::<TestCase>().unwrap(), 3);
        assert!(store.all::<TestCase>().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_collection_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        fs::write(dir.path().join("transcripts.json"), "[{").unwrap();

        let err = store.all::<Transcript>().unwrap_err();
        assert!(err.to_string().contains("corrupted"));
    }

    #[tokio::test]
    async fn test_waiting_for_lock_does_not_stall_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        store.insert(case("Login")).unwrap();

        let held = store.lock(true).unwrap();
        let waiting = {
            let store = store.clone();
            tokio::spawn(blocking(move || store.all::<TestCase>()))
        };

        // The test runtime has a single thread; it keeps running while the
        // store call waits on the lock.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(!waiting.is_finished());

        drop(held);
        let cases = waiting.await.unwrap().unwrap();
        assert_eq!(cases.len(), 1);
    }
}
