//! Per-transport high-water marks, persisted so reconnects and daemon
//! restarts do not re-process history.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use teleclaw_core::fsutil::write_atomic;

use crate::error::{Result, TransportError};

#[derive(Debug, Serialize, Deserialize)]
struct CursorFile {
    cursor: String,
}

/// One small JSON file per transport under `cursors/`, written atomically.
pub struct CursorStore {
    dir: PathBuf,
}

impl CursorStore {
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Load the persisted cursor for `transport`, if any. An unreadable file
    /// is treated as no cursor — the transport re-polls from its own notion
    /// of "recent" rather than failing startup.
    pub fn load(&self, transport: &str) -> Option<String> {
        let path = self.path(transport);
        let raw = fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<CursorFile>(&raw) {
            Ok(f) => Some(f.cursor),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "discarding unreadable cursor file");
                None
            }
        }
    }

    /// Persist `cursor` via write-temp-and-rename.
    pub fn save(&self, transport: &str, cursor: &str) -> Result<()> {
        let path = self.path(transport);
        let json = serde_json::to_vec_pretty(&CursorFile {
            cursor: cursor.to_string(),
        })
        .map_err(|e| TransportError::Permanent(format!("cursor encode: {e}")))?;

        write_atomic(&path, &json)
            .map_err(|e| TransportError::Transient(format!("cursor write: {e}")))
    }

    fn path(&self, transport: &str) -> PathBuf {
        self.dir.join(format!("{transport}.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_cursor_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = CursorStore::open(dir.path()).unwrap();
        assert_eq!(store.load("mail"), None);
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = CursorStore::open(dir.path()).unwrap();
        store.save("mail", "uid:4711").unwrap();
        assert_eq!(store.load("mail"), Some("uid:4711".to_string()));
    }

    #[test]
    fn cursors_are_isolated_per_transport() {
        let dir = tempfile::tempdir().unwrap();
        let store = CursorStore::open(dir.path()).unwrap();
        store.save("mail", "uid:1").unwrap();
        store.save("chat", "offset:9").unwrap();
        assert_eq!(store.load("mail"), Some("uid:1".to_string()));
        assert_eq!(store.load("chat"), Some("offset:9".to_string()));
    }

    #[test]
    fn garbage_cursor_file_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let store = CursorStore::open(dir.path()).unwrap();
        fs::write(dir.path().join("mail.json"), b"not json").unwrap();
        assert_eq!(store.load("mail"), None);
    }
}
