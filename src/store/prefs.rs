//! Preferences kept in one JSON object on disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use gdata_core::host::PreferenceStore;
use gdata_core::{GdataError, GdataResult};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

pub struct FilePreferenceStore {
    path: PathBuf,
    values: Mutex<Map<String, Value>>,
}

impl FilePreferenceStore {
    pub async fn open(path: &Path) -> GdataResult<Self> {
        let values = match tokio::fs::read_to_string(path).await {
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                GdataError::Host(format!("Failed to parse {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => {
                return Err(GdataError::Host(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        Ok(FilePreferenceStore {
            path: path.to_path_buf(),
            values: Mutex::new(values),
        })
    }

    async fn persist(&self, values: &Map<String, Value>) -> GdataResult<()> {
        write_atomic(&self.path, &serde_json::to_string_pretty(values)?).await
    }
}

#[async_trait]
impl PreferenceStore for FilePreferenceStore {
    async fn get(&self, key: &str) -> GdataResult<Option<Value>> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> GdataResult<()> {
        let mut values = self.values.lock().await;
        values.insert(key.to_string(), value);
        self.persist(&values).await
    }

    async fn remove(&self, key: &str) -> GdataResult<()> {
        let mut values = self.values.lock().await;
        if values.remove(key).is_some() {
            self.persist(&values).await?;
        }
        Ok(())
    }
}

/// Write through a sibling temp file so readers never see a partial file.
pub async fn write_atomic(path: &Path, contents: &str) -> GdataResult<()> {
    let io_err = |e: std::io::Error| GdataError::Host(format!("{}: {}", path.display(), e));

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, contents).await.map_err(io_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let store = FilePreferenceStore::open(&path).await.unwrap();
        assert_eq!(store.get("calendars.id1.eventSyncToken").await.unwrap(), None);
        store
            .set("calendars.id1.eventSyncToken", json!("token"))
            .await
            .unwrap();
        store
            .set("settings.sendEventNotifications", json!(true))
            .await
            .unwrap();
        store.remove("settings.sendEventNotifications").await.unwrap();

        let reopened = FilePreferenceStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.get("calendars.id1.eventSyncToken").await.unwrap(),
            Some(json!("token"))
        );
        assert_eq!(
            reopened.get("settings.sendEventNotifications").await.unwrap(),
            None
        );
        assert!(!dir.path().join("prefs.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = FilePreferenceStore::open(&path).await.err().unwrap();
        assert!(matches!(err, GdataError::Host(_)));
    }
}
