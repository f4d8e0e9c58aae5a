use std::{
    future::Future,
    io::ErrorKind,
    ops::Deref,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Result};
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncWriteExt},
};
use tracing::debug;

/// Interface for the durable medium behind the log store. Each key holds one serialized
/// document.
pub trait KeyValueStore {
    /// Returns [None] when nothing was ever written under `key`.
    fn read(&self, key: &str) -> impl Future<Output = Result<Option<String>>>;

    fn write(&self, key: &str, value: String) -> impl Future<Output = Result<()>>;

    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> impl Future<Output = Result<()>>;
}

impl<T: Deref> KeyValueStore for T
where
    T::Target: KeyValueStore,
{
    fn read(&self, key: &str) -> impl Future<Output = Result<Option<String>>> {
        self.deref().read(key)
    }

    fn write(&self, key: &str, value: String) -> impl Future<Output = Result<()>> {
        self.deref().write(key, value)
    }

    fn remove(&self, key: &str) -> impl Future<Output = Result<()>> {
        self.deref().remove(key)
    }
}

/// Stores every key as `<key>.json` inside a directory. Files are locked while they are read
/// or replaced so that two running trackers never observe half written documents.
pub struct FileKeyValueStore {
    store_dir: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(store_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&store_dir)?;

        Ok(Self { store_dir })
    }

    fn key_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\', '.']) {
            return Err(anyhow!("Illegal store key {key:?}"));
        }
        Ok(self.store_dir.join(format!("{key}.json")))
    }

    async fn read_locked(path: &Path) -> std::result::Result<String, std::io::Error> {
        let mut file = File::open(path).await?;
        file.lock_shared()?;
        let mut content = String::new();
        let result = file.read_to_string(&mut content).await;
        file.unlock_async().await?;
        result?;
        Ok(content)
    }

    async fn write_locked(path: &Path, value: &[u8]) -> Result<()> {
        let mut file = File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .await?;

        // Truncation waits for the lock, otherwise a reader could see an empty document.
        file.lock_exclusive()?;
        let result = async {
            file.set_len(0).await?;
            file.write_all(value).await?;
            file.flush().await?;
            file.sync_data().await?;
            Ok::<_, std::io::Error>(())
        }
        .await;
        file.unlock_async().await?;
        Ok(result?)
    }
}

impl KeyValueStore for FileKeyValueStore {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.key_path(key)?;
        debug!("Reading {path:?}");
        match Self::read_locked(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, value: String) -> Result<()> {
        let path = self.key_path(key)?;
        debug!("Writing {} bytes into {path:?}", value.len());
        Self::write_locked(&path, value.as_bytes()).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.key_path(key)?;
        debug!("Removing {path:?}");
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Keeps documents in memory. Nothing survives the process.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryKeyValueStore {
    values: std::sync::Mutex<std::collections::HashMap<String, String>>,
}

#[cfg(test)]
impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(self, key: &str, value: impl Into<String>) -> Self {
        self.lock().insert(key.to_owned(), value.into());
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, std::collections::HashMap<String, String>> {
        // A poisoned map is still a valid map, nothing is left half updated.
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
impl KeyValueStore for MemoryKeyValueStore {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    async fn write(&self, key: &str, value: String) -> Result<()> {
        self.lock().insert(key.to_owned(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }
}
