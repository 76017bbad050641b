//! Local persistence for chat sessions.
//!
//! The whole session list is stored as a single JSON document, rewritten after
//! every change. Nothing is synced anywhere.

use std::path::{Path, PathBuf};
use tokio::fs;

use crate::core_types::ChatSession;
use crate::errors::SearchError;

pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every stored session. A missing file is an empty list.
    pub async fn load(&self) -> Result<Vec<ChatSession>, SearchError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No session file at {}", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(SearchError::Storage(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let sessions: Vec<ChatSession> = serde_json::from_str(&content).map_err(|e| {
            SearchError::Storage(format!(
                "Failed to parse sessions from {}: {}",
                self.path.display(),
                e
            ))
        })?;
        log::info!("Loaded {} session(s) from {}", sessions.len(), self.path.display());
        Ok(sessions)
    }

    /// Replace the stored sessions. Written to a sibling temp file first so a
    /// crash never leaves a truncated document behind.
    pub async fn save(&self, sessions: &[ChatSession]) -> Result<(), SearchError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| {
                SearchError::Storage(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let json = serde_json::to_string(sessions)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json).await.map_err(|e| {
            SearchError::Storage(format!("Failed to write {}: {}", tmp_path.display(), e))
        })?;
        fs::rename(&tmp_path, &self.path).await.map_err(|e| {
            SearchError::Storage(format!("Failed to replace {}: {}", self.path.display(), e))
        })?;

        log::debug!("Saved {} session(s) to {}", sessions.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::{GroundingSource, Message, ReasoningMethod};

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("sessions.json"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("nested/dir/sessions.json"));

        let mut session = ChatSession::new();
        session.reasoning_method = ReasoningMethod::Crec;
        session.push(Message::user("hello", vec!["data:image/png;base64,AAAA".to_string()]));
        let mut answer = Message::assistant("hi");
        answer.sources = Some(vec![GroundingSource::new("Example", "https://example.com")]);
        session.push(answer);

        store.save(&[session.clone(), ChatSession::new()]).await.unwrap();
        let loaded = store.load().await.unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], session);
        assert!(!dir.path().join("nested/dir/sessions.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let err = SessionStore::new(path).load().await.unwrap_err();
        assert!(matches!(err, SearchError::Storage(_)));
    }
}
