use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::item::{Item, ItemContent};
use crate::error::{Error, Result};

/// Durable item metadata plus managed blob storage.
///
/// Metadata lives in one JSON file rewritten in full on every mutation
/// (tmp file + rename, so a concurrent reader never observes a partial
/// write). All mutations funnel through [`ItemStore::mutate`], the single
/// serialization point for cut transitions: two concurrent acknowledgments
/// on the same item can never both observe the same stale pending set.
#[derive(Clone)]
pub struct ItemStore {
    inner: Arc<Inner>,
}

struct Inner {
    data_dir: PathBuf,
    meta_path: PathBuf,
    items: Mutex<Vec<Item>>,
}

impl ItemStore {
    /// Open (or initialize) the store rooted at `data_dir`.
    ///
    /// Existing metadata is loaded so items survive process restart.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(data_dir.join("blobs"))?;
        fs::create_dir_all(data_dir.join("tmp"))?;

        let meta_path = data_dir.join("items.json");
        let items: Vec<Item> = if meta_path.exists() {
            serde_json::from_str(&fs::read_to_string(&meta_path)?)?
        } else {
            Vec::new()
        };

        Ok(Self {
            inner: Arc::new(Inner {
                data_dir,
                meta_path,
                items: Mutex::new(items),
            }),
        })
    }

    /// Directory for spooling uploads before they are moved into blob storage.
    pub fn tmp_dir(&self) -> PathBuf {
        self.inner.data_dir.join("tmp")
    }

    pub fn blob_path(&self, stored_name: &str) -> PathBuf {
        self.inner.data_dir.join("blobs").join(stored_name)
    }

    /// Run a transactional read-modify-write over the whole item set.
    ///
    /// The closure works on a private copy; nothing becomes visible to other
    /// callers or hits disk unless it returns `Ok` and the rewrite succeeds.
    pub async fn mutate<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Vec<Item>) -> Result<R>,
    {
        let mut guard = self.inner.items.lock().await;
        let mut working = guard.clone();
        let out = f(&mut working)?;
        self.persist(&working)?;
        *guard = working;
        Ok(out)
    }

    fn persist(&self, items: &[Item]) -> Result<()> {
        let content = serde_json::to_string_pretty(items)?;
        let tmp_path = self.inner.meta_path.with_extension("json.tmp");
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, &self.inner.meta_path)?;
        Ok(())
    }

    /// All items, newest first.
    pub async fn list(&self) -> Vec<Item> {
        let mut items = self.inner.items.lock().await.clone();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items
    }

    pub async fn get(&self, id: &str) -> Option<Item> {
        let items = self.inner.items.lock().await;
        items.iter().find(|it| it.id == id).cloned()
    }

    pub async fn add_text(&self, text: impl Into<String>) -> Result<Item> {
        let item = Item::new_text(text.into());
        let added = item.clone();
        self.mutate(move |items| {
            items.push(item);
            Ok(())
        })
        .await?;
        info!("Added text item {}", added.id);
        Ok(added)
    }

    /// Move a blob into managed storage and record its metadata.
    ///
    /// The blob is durably placed before the metadata write, so a failed
    /// upload never leaves a record pointing at nothing. If the metadata
    /// write fails afterwards the orphaned blob is a tolerated leak.
    pub async fn add_file(
        &self,
        display_name: &str,
        source: &Path,
        mime_type: &str,
    ) -> Result<Item> {
        let id = Uuid::new_v4().to_string();
        let ext = Path::new(display_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();
        let stored_name = format!("{}{}", id, ext);
        let dest = self.blob_path(&stored_name);

        move_file(source, &dest)?;
        let size = fs::metadata(&dest)?.len();

        let item = Item {
            id,
            content: ItemContent::File {
                name: display_name.to_string(),
                stored_name,
                mime_type: mime_type.to_string(),
                size,
            },
            created_at: chrono::Utc::now(),
            cut: None,
        };
        let added = item.clone();
        self.mutate(move |items| {
            items.push(item);
            Ok(())
        })
        .await?;
        info!("Added file item {} ({})", added.id, display_name);
        Ok(added)
    }

    /// Remove an item's metadata, then its blob best-effort.
    pub async fn delete(&self, id: &str) -> Result<Item> {
        let removed = self
            .mutate(|items| {
                let idx = items
                    .iter()
                    .position(|it| it.id == id)
                    .ok_or_else(|| Error::not_found(format!("item {}", id)))?;
                Ok(items.remove(idx))
            })
            .await?;
        self.remove_blob(&removed);
        info!("Deleted item {}", id);
        Ok(removed)
    }

    /// Read-modify-write of one item's metadata; the path every cut
    /// transition goes through.
    pub async fn update<F>(&self, id: &str, f: F) -> Result<Item>
    where
        F: FnOnce(&mut Item) -> Result<()>,
    {
        self.mutate(|items| {
            let item = items
                .iter_mut()
                .find(|it| it.id == id)
                .ok_or_else(|| Error::not_found(format!("item {}", id)))?;
            f(item)?;
            Ok(item.clone())
        })
        .await
    }

    /// Best-effort blob cleanup. A missing or undeletable blob is a leak,
    /// not a correctness bug; listings no longer reference it.
    pub fn remove_blob(&self, item: &Item) {
        if let Some(stored_name) = item.stored_name() {
            let path = self.blob_path(stored_name);
            if let Err(e) = fs::remove_file(&path) {
                warn!("Failed to remove blob {:?}: {}", path, e);
            }
        }
    }
}

fn move_file(source: &Path, dest: &Path) -> Result<()> {
    if fs::rename(source, dest).is_ok() {
        return Ok(());
    }
    // Cross-device fallback: copy, then drop the spooled source.
    fs::copy(source, dest)?;
    let _ = fs::remove_file(source);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn write_source(store: &ItemStore, content: &[u8]) -> PathBuf {
        let path = store.tmp_dir().join(Uuid::new_v4().to_string());
        tokio::fs::write(&path, content).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let dir = tempdir().unwrap();
        let store = ItemStore::open(dir.path()).unwrap();

        store.add_text("first").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = store.add_text("second").await.unwrap();

        let items = store.list().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, second.id);
    }

    #[tokio::test]
    async fn test_add_file_moves_blob_into_storage() {
        let dir = tempdir().unwrap();
        let store = ItemStore::open(dir.path()).unwrap();

        let source = write_source(&store, b"blob bytes").await;
        let item = store
            .add_file("notes.txt", &source, "text/plain")
            .await
            .unwrap();

        let stored_name = item.stored_name().unwrap();
        assert!(stored_name.ends_with(".txt"));
        assert!(store.blob_path(stored_name).exists());
        assert!(!source.exists());
        match &item.content {
            ItemContent::File { size, .. } => assert_eq!(*size, 10),
            other => panic!("expected file item, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_tolerates_missing_blob() {
        let dir = tempdir().unwrap();
        let store = ItemStore::open(dir.path()).unwrap();

        let source = write_source(&store, b"x").await;
        let item = store.add_file("a.bin", &source, "application/octet-stream").await.unwrap();

        // Simulate an earlier leak: blob already gone.
        fs::remove_file(store.blob_path(item.stored_name().unwrap())).unwrap();

        store.delete(&item.id).await.unwrap();
        assert!(store.get(&item.id).await.is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_item_is_not_found() {
        let dir = tempdir().unwrap();
        let store = ItemStore::open(dir.path()).unwrap();
        let err = store.delete("nope").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_items_survive_reopen() {
        let dir = tempdir().unwrap();
        let item = {
            let store = ItemStore::open(dir.path()).unwrap();
            store.add_text("persisted").await.unwrap()
        };

        let reopened = ItemStore::open(dir.path()).unwrap();
        let found = reopened.get(&item.id).await.expect("item reloaded");
        match found.content {
            ItemContent::Text { ref text } => assert_eq!(text, "persisted"),
            other => panic!("expected text item, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_update_changes_nothing() {
        let dir = tempdir().unwrap();
        let store = ItemStore::open(dir.path()).unwrap();
        let item = store.add_text("stable").await.unwrap();

        let err = store
            .update(&item.id, |it| {
                it.cut = None;
                Err(Error::invalid_state("boom"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));

        // In-memory and on-disk state both untouched.
        assert_eq!(store.list().await.len(), 1);
        let reopened = ItemStore::open(dir.path()).unwrap();
        assert!(reopened.get(&item.id).await.is_some());
    }

    #[tokio::test]
    async fn test_update_missing_item_is_not_found() {
        let dir = tempdir().unwrap();
        let store = ItemStore::open(dir.path()).unwrap();
        let err = store.update("nope", |_| Ok(())).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
