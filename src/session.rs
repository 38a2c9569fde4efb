//! Bearer tokens read from `<session_dir>/<session>.token`.
//!
//! Obtaining and refreshing tokens is left to whatever signs the user in;
//! this provider only reads what is on disk and re-reads it after the
//! remote rejected a token.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use gdata_core::{GdataError, GdataResult};
use gdata_provider_google::TokenProvider;
use tokio::sync::Mutex;
use tracing::debug;

pub struct FileTokenProvider {
    dir: PathBuf,
    cache: Mutex<HashMap<String, String>>,
}

impl FileTokenProvider {
    pub fn new(dir: &Path) -> Self {
        FileTokenProvider {
            dir: dir.to_path_buf(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn token_path(&self, session_id: &str) -> PathBuf {
        let stem: String = session_id
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.dir.join(format!("{}.token", stem))
    }
}

#[async_trait]
impl TokenProvider for FileTokenProvider {
    async fn access_token(&self, session_id: &str) -> GdataResult<String> {
        let mut cache = self.cache.lock().await;
        if let Some(token) = cache.get(session_id) {
            return Ok(token.clone());
        }

        let path = self.token_path(session_id);
        let token = tokio::fs::read_to_string(&path)
            .await
            .map(|t| t.trim().to_string())
            .map_err(|e| {
                GdataError::Auth(format!(
                    "No access token for session {} at {}: {}",
                    session_id,
                    path.display(),
                    e
                ))
            })?;
        if token.is_empty() {
            return Err(GdataError::Auth(format!(
                "Token file {} is empty",
                path.display()
            )));
        }

        debug!(session = session_id, "Loaded access token");
        cache.insert(session_id.to_string(), token.clone());
        Ok(token)
    }

    async fn invalidate(&self, session_id: &str) -> GdataResult<()> {
        self.cache.lock().await.remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_token_is_reread_after_invalidate() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sessionId.token"), "first\n").unwrap();
        let provider = FileTokenProvider::new(dir.path());

        assert_eq!(provider.access_token("sessionId").await.unwrap(), "first");

        std::fs::write(dir.path().join("sessionId.token"), "second").unwrap();
        assert_eq!(provider.access_token("sessionId").await.unwrap(), "first");

        provider.invalidate("sessionId").await.unwrap();
        assert_eq!(provider.access_token("sessionId").await.unwrap(), "second");
    }

    #[tokio::test]
    async fn test_missing_token_is_an_auth_error() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FileTokenProvider::new(dir.path());

        let err = provider.access_token("nobody").await.unwrap_err();
        assert!(matches!(err, GdataError::Auth(_)));
    }
}
