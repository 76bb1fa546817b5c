use super::{Session, SessionError};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// JSON file holding the cookie records of the last fresh login.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Absent file means "no session yet". A corrupt file is treated the same
    /// way so a bad write never locks the run out of logging in again.
    pub async fn load(&self) -> Result<Option<Session>, SessionError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No persisted session");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<Session>(&content) {
            Ok(session) if session.is_empty() => Ok(None),
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!(path = %self.path.display(), "Ignoring unreadable session file: {}", e);
                Ok(None)
            }
        }
    }

    /// Overwrites the file wholesale.
    pub async fn save(&self, session: &Session) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(session)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    pub async fn delete(&self) -> Result<(), SessionError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::CookieRecord;

    fn cookie(name: &str) -> CookieRecord {
        CookieRecord {
            name: name.into(),
            value: "v".into(),
            domain: ".example.com".into(),
            path: "/".into(),
            expires: None,
            http_only: false,
            secure: true,
            same_site: Some("Lax".into()),
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("cookies.json"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_overwrites_and_load_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("nested").join("cookies.json"));

        store
            .save(&Session::new(vec![cookie("a"), cookie("b")]))
            .await
            .unwrap();
        store.save(&Session::new(vec![cookie("c")])).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.cookies().len(), 1);
        assert_eq!(loaded.cookies()[0].name, "c");

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.trim_start().starts_with('['));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(SessionStore::new(path).load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("cookies.json"));
        store.save(&Session::new(vec![cookie("a")])).await.unwrap();
        store.delete().await.unwrap();
        store.delete().await.unwrap();
        assert!(!store.path().exists());
    }
}
