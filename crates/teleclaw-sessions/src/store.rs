//! File-backed session registry.
//!
//! One JSON file per session under `sessions/`, flushed with
//! write-temp + fsync + rename after every mutation. A single writer is
//! serialized behind the inner mutex; readers get cloned snapshots. Expired
//! records are garbage-collected lazily on read, so `find_by_token` can never
//! hand out a stale record.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, info, warn};

use teleclaw_core::fsutil::write_atomic;
use teleclaw_core::ids::mint_token;

use crate::error::{Result, SessionError};
use crate::types::SessionRecord;

/// Mint attempts before surfacing `TokenSpaceExhausted`. With 36^8 tokens a
/// collision streak this long means the store itself is corrupt.
const MINT_ATTEMPTS: u32 = 8;

pub struct SessionStore {
    dir: PathBuf,
    inner: Mutex<HashMap<String, SessionRecord>>,
}

impl SessionStore {
    /// Open (or create) the registry at `dir` and load every record in it.
    ///
    /// Unreadable files are skipped with a warning rather than aborting
    /// startup; the daemon owns this directory exclusively, so damage means
    /// an interrupted write of a single record at worst.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let mut map = HashMap::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match fs::read_to_string(&path)
                .map_err(SessionError::from)
                .and_then(|s| serde_json::from_str::<SessionRecord>(&s).map_err(SessionError::from))
            {
                Ok(rec) => {
                    map.insert(rec.id.clone(), rec);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable session file"),
            }
        }

        info!(dir = %dir.display(), count = map.len(), "session store opened");
        Ok(Self {
            dir,
            inner: Mutex::new(map),
        })
    }

    /// Insert a new record. Fails with `DuplicateToken` when another live
    /// session holds the same token, and `InvalidRecord` when the expiry is
    /// not after the creation time.
    pub fn create(&self, record: SessionRecord, now: DateTime<Utc>) -> Result<String> {
        if record.expires_at <= record.created_at {
            return Err(SessionError::InvalidRecord(format!(
                "expires_at {} is not after created_at {}",
                record.expires_at, record.created_at
            )));
        }

        let mut map = self.inner.lock().unwrap();
        let clash = map
            .values()
            .any(|r| r.token == record.token && !r.is_expired(now));
        if clash {
            return Err(SessionError::DuplicateToken {
                token: record.token.clone(),
            });
        }

        self.persist(&record)?;
        let id = record.id.clone();
        debug!(session_id = %id, token = %record.token, "session created");
        map.insert(id.clone(), record);
        Ok(id)
    }

    /// Draw token candidates until one is free among live sessions.
    pub fn mint_unique_token<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let map = self.inner.lock().unwrap();
        for _ in 0..MINT_ATTEMPTS {
            let candidate = mint_token(rng);
            let taken = map
                .values()
                .any(|r| r.token == candidate && !r.is_expired(now));
            if !taken {
                return Ok(candidate);
            }
        }
        Err(SessionError::TokenSpaceExhausted {
            attempts: MINT_ATTEMPTS,
        })
    }

    /// Look up a live session by token (case-insensitive).
    ///
    /// An expired match is garbage-collected on the spot and reported as
    /// `NotFound` — callers never see stale records.
    pub fn find_by_token(&self, token: &str, now: DateTime<Utc>) -> Result<SessionRecord> {
        let wanted = token.to_ascii_uppercase();
        let mut map = self.inner.lock().unwrap();

        let hit = map
            .values()
            .find(|r| r.token == wanted)
            .map(|r| (r.id.clone(), r.is_expired(now)));

        match hit {
            Some((id, false)) => Ok(map[&id].clone()),
            Some((id, true)) => {
                self.remove_file(&id);
                map.remove(&id);
                debug!(session_id = %id, token = %wanted, "expired session collected on read");
                Err(SessionError::NotFound { token: wanted })
            }
            None => Err(SessionError::NotFound { token: wanted }),
        }
    }

    /// Return a record by id, expired or not (used by the admin surface).
    pub fn get(&self, id: &str) -> Option<SessionRecord> {
        self.inner.lock().unwrap().get(id).cloned()
    }

    /// Bump the accepted-command counter. Atomic under the single writer.
    pub fn increment_command_count(&self, id: &str) -> Result<u64> {
        let mut map = self.inner.lock().unwrap();
        let rec = map.get_mut(id).ok_or_else(|| SessionError::NotFound {
            token: id.to_string(),
        })?;
        rec.command_count += 1;
        let count = rec.command_count;
        let snapshot = rec.clone();
        self.persist(&snapshot)?;
        Ok(count)
    }

    /// Attach (or replace) the audit copy of the last outbound notification.
    pub fn attach_notification(
        &self,
        id: &str,
        payload: teleclaw_core::types::NotificationPayload,
    ) -> Result<()> {
        let mut map = self.inner.lock().unwrap();
        let rec = map.get_mut(id).ok_or_else(|| SessionError::NotFound {
            token: id.to_string(),
        })?;
        rec.notification = Some(payload);
        let snapshot = rec.clone();
        self.persist(&snapshot)
    }

    /// Remove a record. Idempotent — deleting a missing id is a no-op.
    pub fn delete(&self, id: &str) -> Result<()> {
        let mut map = self.inner.lock().unwrap();
        if map.remove(id).is_some() {
            self.remove_file(id);
            debug!(session_id = %id, "session deleted");
        }
        Ok(())
    }

    /// Drop every record with `expires_at <= now`. Returns the count removed.
    pub fn gc(&self, now: DateTime<Utc>) -> usize {
        let mut map = self.inner.lock().unwrap();
        let dead: Vec<String> = map
            .values()
            .filter(|r| r.is_expired(now))
            .map(|r| r.id.clone())
            .collect();
        for id in &dead {
            self.remove_file(id);
            map.remove(id);
        }
        if !dead.is_empty() {
            info!(count = dead.len(), "expired sessions collected");
        }
        dead.len()
    }

    /// Snapshot of all records, live and expired, newest first.
    pub fn list(&self) -> Vec<SessionRecord> {
        let map = self.inner.lock().unwrap();
        let mut all: Vec<SessionRecord> = map.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all
    }

    pub fn count_live(&self, now: DateTime<Utc>) -> usize {
        self.inner
            .lock()
            .unwrap()
            .values()
            .filter(|r| !r.is_expired(now))
            .count()
    }

    // --- private helpers ---------------------------------------------------

    fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn persist(&self, record: &SessionRecord) -> Result<()> {
        let json = serde_json::to_vec_pretty(record)?;
        write_atomic(&self.record_path(&record.id), &json)?;
        Ok(())
    }

    fn remove_file(&self, id: &str) {
        let path = self.record_path(id);
        if let Err(e) = fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "failed to remove session file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionRecord;
    use chrono::{Duration, TimeZone};
    use teleclaw_core::types::TransportKind;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap()
    }

    fn record(id: &str, token: &str, at: DateTime<Utc>) -> SessionRecord {
        SessionRecord::new(
            id.into(),
            token.into(),
            TransportKind::Mail,
            "ops@example.com",
            "claw-main",
            "teleclaw",
            at,
            24,
        )
    }

    #[test]
    fn create_then_find_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();

        let rec = record("s1", "ABCDEFGH", now());
        store.create(rec.clone(), now()).unwrap();

        let found = store.find_by_token("abcdefgh", now()).unwrap();
        assert_eq!(found, rec);
    }

    #[test]
    fn duplicate_live_token_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();

        store.create(record("s1", "SAMETOKN", now()), now()).unwrap();
        let err = store
            .create(record("s2", "SAMETOKN", now()), now())
            .unwrap_err();
        assert!(matches!(err, SessionError::DuplicateToken { .. }));
    }

    #[test]
    fn expired_token_may_be_reused() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();

        store.create(record("s1", "SAMETOKN", now()), now()).unwrap();
        let later = now() + Duration::hours(25);
        store.create(record("s2", "SAMETOKN", later), later).unwrap();
    }

    #[test]
    fn expired_lookup_is_not_found_and_collected() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();

        store.create(record("s1", "WXYZ0123", now()), now()).unwrap();
        let later = now() + Duration::hours(25);
        let err = store.find_by_token("WXYZ0123", later).unwrap_err();
        assert!(matches!(err, SessionError::NotFound { .. }));
        // The record file is gone too.
        assert!(!dir.path().join("s1.json").exists());
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SessionStore::open(dir.path()).unwrap();
            store.create(record("s1", "ABCDEFGH", now()), now()).unwrap();
        }
        let store = SessionStore::open(dir.path()).unwrap();
        assert!(store.find_by_token("ABCDEFGH", now()).is_ok());
    }

    #[test]
    fn increment_command_count_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();
        store.create(record("s1", "ABCDEFGH", now()), now()).unwrap();

        assert_eq!(store.increment_command_count("s1").unwrap(), 1);
        assert_eq!(store.increment_command_count("s1").unwrap(), 2);

        let reopened = SessionStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get("s1").unwrap().command_count, 2);
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();
        store.create(record("s1", "ABCDEFGH", now()), now()).unwrap();

        store.delete("s1").unwrap();
        store.delete("s1").unwrap();
        assert!(store.get("s1").is_none());
    }

    #[test]
    fn gc_removes_only_expired() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();

        store.create(record("old", "AAAA1111", now()), now()).unwrap();
        let later = now() + Duration::hours(25);
        store.create(record("new", "BBBB2222", later), later).unwrap();

        assert_eq!(store.gc(later), 1);
        assert!(store.get("old").is_none());
        assert!(store.get("new").is_some());
    }

    #[test]
    fn rejects_expiry_before_creation() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();
        let mut rec = record("s1", "ABCDEFGH", now());
        rec.expires_at = rec.created_at;
        assert!(matches!(
            store.create(rec, now()),
            Err(SessionError::InvalidRecord(_))
        ));
    }

    #[test]
    fn mint_skips_live_collisions() {
        struct ConstRng;
        impl rand::RngCore for ConstRng {
            fn next_u32(&mut self) -> u32 {
                1
            }
            fn next_u64(&mut self) -> u64 {
                1
            }
            fn fill_bytes(&mut self, dest: &mut [u8]) {
                dest.fill(1);
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();

        // A constant RNG always mints the same token; once that token is
        // live, minting must exhaust instead of returning a duplicate.
        let mut rng = ConstRng;
        let tok = store.mint_unique_token(&mut rng, now()).unwrap();
        store.create(record("s1", &tok, now()), now()).unwrap();

        let err = store.mint_unique_token(&mut rng, now()).unwrap_err();
        assert!(matches!(err, SessionError::TokenSpaceExhausted { .. }));
    }
}
