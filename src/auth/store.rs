//! Durable bearer-token storage
//!
//! The session token is one opaque string kept in a single file under the
//! config directory and mirrored in memory, so reads never touch the
//! disk. Writes go disk-first: a failed write leaves the previous token
//! in place. Absence of a token means "unauthenticated".

use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;

/// Access to the current bearer token. At most one value is current at
/// any time; every mutation is visible to subsequent reads immediately.
pub trait TokenStore: Send + Sync {
    /// Current token, or `None` when unauthenticated.
    fn token(&self) -> Option<String>;

    /// Replace the current token, persisting it durably.
    fn set_token(&self, value: &str) -> Result<()>;

    /// Forget the token, in memory and on disk.
    fn clear_token(&self) -> Result<()>;
}

/// Token store backed by a single fixed-name file.
pub struct FileTokenStore {
    path: PathBuf,
    current: Mutex<Option<String>>,
}

impl FileTokenStore {
    /// Open the store at `path`, loading any previously persisted token.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let current = match fs::read_to_string(&path) {
            Ok(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read token file {}", path.display()))
            }
        };
        Ok(Self {
            path,
            current: Mutex::new(current),
        })
    }

    fn write_file(&self, value: &str) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }
        fs::write(&self.path, value).context("Failed to write token file")?;

        // Restrictive permissions: the file holds a live credential
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&self.path, perms).context("Failed to set token file permissions")?;
        }

        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn token(&self) -> Option<String> {
        self.current.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set_token(&self, value: &str) -> Result<()> {
        self.write_file(value)?;
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(value.to_string());
        Ok(())
    }

    fn clear_token(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e).context("Failed to remove token file"),
        }
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

/// In-memory store for tests: same contract, no disk.
#[cfg(test)]
pub struct MemoryTokenStore {
    current: Mutex<Option<String>>,
}

#[cfg(test)]
impl MemoryTokenStore {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    pub fn with_token(value: &str) -> Self {
        Self {
            current: Mutex::new(Some(value.to_string())),
        }
    }
}

#[cfg(test)]
impl TokenStore for MemoryTokenStore {
    fn token(&self) -> Option<String> {
        self.current.lock().unwrap().clone()
    }

    fn set_token(&self, value: &str) -> Result<()> {
        *self.current.lock().unwrap() = Some(value.to_string());
        Ok(())
    }

    fn clear_token(&self) -> Result<()> {
        *self.current.lock().unwrap() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> FileTokenStore {
        FileTokenStore::open(dir.path().join("token")).unwrap()
    }

    #[test]
    fn test_empty_store_has_no_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.token(), None);
    }

    #[test]
    fn test_set_is_immediately_visible() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.set_token("tok-1").unwrap();
        assert_eq!(store.token(), Some("tok-1".to_string()));
    }

    #[test]
    fn test_token_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        store_in(&dir).set_token("tok-1").unwrap();

        let reopened = store_in(&dir);
        assert_eq!(reopened.token(), Some("tok-1".to_string()));
    }

    #[test]
    fn test_overwrite_is_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.set_token("tok-1").unwrap();
        store.set_token("tok-2").unwrap();
        assert_eq!(store.token(), Some("tok-2".to_string()));

        let reopened = store_in(&dir);
        assert_eq!(reopened.token(), Some("tok-2".to_string()));
    }

    #[test]
    fn test_clear_removes_memory_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.set_token("tok-1").unwrap();
        store.clear_token().unwrap();
        assert_eq!(store.token(), None);
        assert!(!dir.path().join("token").exists());

        let reopened = store_in(&dir);
        assert_eq!(reopened.token(), None);
    }

    #[test]
    fn test_clear_on_empty_store_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.clear_token().unwrap();
        store.clear_token().unwrap();
        assert_eq!(store.token(), None);
    }

    #[test]
    fn test_stray_whitespace_in_file_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("token"), "tok-1\n").unwrap();
        let store = store_in(&dir);
        assert_eq!(store.token(), Some("tok-1".to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn test_token_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.set_token("tok-1").unwrap();
        let mode = std::fs::metadata(dir.path().join("token"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
