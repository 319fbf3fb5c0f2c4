use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::{collections::HashMap, path::PathBuf, sync::Arc};
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

use crate::infrastructure::config::StorageConfig;

#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> anyhow::Result<()>;
    async fn delete(&self, key: &str) -> anyhow::Result<()>;
    /// `None` when nothing is stored under `key`.
    async fn get(&self, key: &str) -> anyhow::Result<Option<Bytes>>;
}

pub fn build_storage(config: &StorageConfig) -> anyhow::Result<Arc<dyn StorageBackend>> {
    match config.provider.as_str() {
        "local" => Ok(Arc::new(LocalStorage::new(config.local_path.clone())?)),
        "memory" => Ok(Arc::new(MemoryStorage::default())),
        other => anyhow::bail!("unsupported storage provider: {other}"),
    }
}

fn local_storage_root(path: Option<&str>) -> PathBuf {
    PathBuf::from(path.unwrap_or("./uploads"))
}

/// Object key for an evidence file: grouped per activity, with a fresh id
/// so re-uploads of the same name never overwrite each other.
pub fn evidence_key(activity_id: Uuid, extension: &str) -> String {
    format!(
        "{activity_id}/{}{}",
        Uuid::new_v4(),
        extension.to_ascii_lowercase()
    )
}

struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    fn new(path: Option<String>) -> anyhow::Result<Self> {
        let root = local_storage_root(path.as_deref());
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let mut path = self.root.clone();
        path.push(key);
        path
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> anyhow::Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::File::create(path).await?;
        file.write_all(&data).await?;
        file.flush().await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        let path = self.path_for(key);
        if fs::try_exists(&path).await? {
            fs::remove_file(path).await?;
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<Bytes>> {
        let path = self.path_for(key);
        if !fs::try_exists(&path).await? {
            return Ok(None);
        }
        Ok(Some(Bytes::from(fs::read(path).await?)))
    }
}

#[derive(Default)]
struct MemoryStorage {
    objects: RwLock<HashMap<String, Bytes>>,
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> anyhow::Result<()> {
        self.objects.write().insert(key.to_string(), data);
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.objects.write().remove(key);
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<Bytes>> {
        Ok(self.objects.read().get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_storage_writes_and_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(Some(dir.path().to_string_lossy().to_string())).unwrap();
        let activity = Uuid::new_v4();
        let key = evidence_key(activity, ".PDF");
        assert!(key.starts_with(&activity.to_string()));
        assert!(key.ends_with(".pdf"));

        storage
            .put(&key, Bytes::from_static(b"%PDF-1.4"), "application/pdf")
            .await
            .unwrap();
        let stored = std::fs::read(dir.path().join(&key)).unwrap();
        assert_eq!(stored, b"%PDF-1.4");
        assert_eq!(
            storage.get(&key).await.unwrap().as_deref(),
            Some(&b"%PDF-1.4"[..])
        );

        storage.delete(&key).await.unwrap();
        assert!(!dir.path().join(&key).exists());
        assert_eq!(storage.get(&key).await.unwrap(), None);
        // deleting twice is harmless
        storage.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn memory_storage_returns_present_objects_only() {
        let storage = MemoryStorage::default();
        storage
            .put("a/photo.jpg", Bytes::from_static(b"jpg"), "image/jpeg")
            .await
            .unwrap();
        assert_eq!(
            storage.get("a/photo.jpg").await.unwrap(),
            Some(Bytes::from_static(b"jpg"))
        );
        storage.delete("a/photo.jpg").await.unwrap();
        assert_eq!(storage.get("a/photo.jpg").await.unwrap(), None);
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let config = StorageConfig {
            provider: "s3".into(),
            local_path: None,
        };
        let err = build_storage(&config).err().unwrap();
        assert_eq!(err.to_string(), "unsupported storage provider: s3");
    }
}
