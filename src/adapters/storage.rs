use crate::domain::model::Item;
use crate::domain::ports::ItemStore;
use crate::utils::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use url::form_urlencoded;

/// In-process store, mostly for tests and `--store memory`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<HashMap<String, Item>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn add(&self, item: &Item) -> Result<(), StoreError> {
        let mut items = self.items.write();
        if items.contains_key(item.id()) {
            return Err(StoreError::Duplicate {
                id: item.id().to_string(),
            });
        }
        items.insert(item.id().to_string(), item.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.items
            .write()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    async fn get(&self, id: &str) -> Result<Item, StoreError> {
        self.items
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredItem {
    item: Item,
    stored_at: DateTime<Utc>,
}

/// One JSON document per item under a data directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    /// Creates the directory if needed. Failing here is a startup error.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;

        let metadata = tokio::fs::metadata(&root).await?;
        if metadata.permissions().readonly() {
            return Err(StoreError::Backend {
                message: format!("data directory {} is read-only", root.display()),
            });
        }

        tracing::info!("💾 Item store at {}", root.display());
        Ok(Self { root })
    }

    fn path_for(&self, id: &str) -> PathBuf {
        // percent-encode 可逆，不同 id 不會對到同一個檔案
        let file_name: String = form_urlencoded::byte_serialize(id.as_bytes()).collect();
        self.root.join(format!("{}.json", file_name))
    }
}

/// 寫入失敗時刪掉半成品，否則之後的 add 會一直回報 Duplicate
async fn write_or_discard<W: AsyncWrite + Unpin>(
    mut file: W,
    path: &Path,
    data: &[u8],
) -> Result<(), StoreError> {
    let written = match file.write_all(data).await {
        Ok(()) => file.flush().await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        drop(file);
        if let Err(remove_err) = tokio::fs::remove_file(path).await {
            tracing::warn!("Could not remove partial file {}: {}", path.display(), remove_err);
        }
        return Err(e.into());
    }
    Ok(())
}

#[async_trait]
impl ItemStore for JsonFileStore {
    async fn add(&self, item: &Item) -> Result<(), StoreError> {
        let path = self.path_for(item.id());
        let record = StoredItem {
            item: item.clone(),
            stored_at: Utc::now(),
        };
        let data = serde_json::to_vec_pretty(&record)?;

        // create_new 讓重複寫入跟資料庫主鍵衝突一樣失敗
        let file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::Duplicate {
                    id: item.id().to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        write_or_discard(file, &path, &data).await?;
        tracing::debug!("Stored {} at {}", item.id(), path.display());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StoreError::NotFound { id: id.to_string() })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, id: &str) -> Result<Item, StoreError> {
        let data = match tokio::fs::read(self.path_for(id)).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound { id: id.to_string() })
            }
            Err(e) => return Err(e.into()),
        };
        let record: StoredItem = serde_json::from_slice(&data)?;
        Ok(record.item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Enrichment;
    use tempfile::TempDir;

    fn enriched(id: &str, markets: &[&str]) -> Item {
        let mut item = Item::new(id, 2).unwrap();
        item.enrich(Enrichment {
            markets: markets.iter().map(|m| m.to_string()).collect(),
        });
        item
    }

    #[tokio::test]
    async fn test_memory_store_add_get_delete() {
        let store = MemoryStore::new();
        let item = enriched("eth", &["binance"]);

        store.add(&item).await.unwrap();
        assert_eq!(store.get("eth").await.unwrap(), item);
        assert!(matches!(
            store.add(&item).await,
            Err(StoreError::Duplicate { .. })
        ));

        store.delete("eth").await.unwrap();
        assert!(store.is_empty());
        assert!(matches!(
            store.delete("eth").await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_json_store_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(temp_dir.path().join("coins")).await.unwrap();
        let item = enriched("eth", &["binance", "coinbase"]);

        store.add(&item).await.unwrap();
        let loaded = store.get("eth").await.unwrap();
        assert_eq!(loaded.markets(), ["binance", "coinbase"]);
        assert_eq!(loaded.batch(), 2);

        assert!(matches!(
            store.add(&item).await,
            Err(StoreError::Duplicate { .. })
        ));

        store.delete("eth").await.unwrap();
        assert!(matches!(
            store.get("eth").await,
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.delete("eth").await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_json_store_keeps_ids_inside_root() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(temp_dir.path()).await.unwrap();

        let item = enriched("../escape", &[]);
        store.add(&item).await.unwrap();

        assert!(temp_dir.path().join("..%2Fescape.json").exists());
        assert_eq!(store.get("../escape").await.unwrap().id(), "../escape");
    }

    #[tokio::test]
    async fn test_json_store_keeps_similar_ids_apart() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(temp_dir.path()).await.unwrap();

        store.add(&enriched("a/b", &["binance"])).await.unwrap();
        store.add(&enriched("a_b", &["kraken"])).await.unwrap();
        store.add(&enriched("a b", &[])).await.unwrap();
        store.add(&enriched("a+b", &[])).await.unwrap();

        let slash = store.get("a/b").await.unwrap();
        assert_eq!(slash.id(), "a/b");
        assert_eq!(slash.markets(), ["binance"]);

        let underscore = store.get("a_b").await.unwrap();
        assert_eq!(underscore.id(), "a_b");
        assert_eq!(underscore.markets(), ["kraken"]);

        assert_eq!(store.get("a b").await.unwrap().id(), "a b");
        assert_eq!(store.get("a+b").await.unwrap().id(), "a+b");

        store.delete("a/b").await.unwrap();
        assert!(store.get("a_b").await.is_ok());
    }

    struct BrokenWriter;

    impl AsyncWrite for BrokenWriter {
        fn poll_write(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            std::task::Poll::Ready(Err(std::io::Error::new(ErrorKind::Other, "disk full")))
        }

        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(temp_dir.path()).await.unwrap();
        let path = store.path_for("eth");
        tokio::fs::write(&path, b"{\"item\":").await.unwrap();

        let result = write_or_discard(BrokenWriter, &path, b"{}").await;
        assert!(matches!(result, Err(StoreError::Io(_))));
        assert!(!path.exists());

        // 之後同一個 id 可以正常寫入
        store.add(&enriched("eth", &["binance"])).await.unwrap();
        assert_eq!(store.get("eth").await.unwrap().markets(), ["binance"]);
    }
}
