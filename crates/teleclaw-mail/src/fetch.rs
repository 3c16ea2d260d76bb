//! Mailbox fetching behind a narrow trait.
//!
//! The relay never speaks IMAP itself — a `MailFetcher` hands it raw
//! RFC 5322 messages newer than a cursor. [`MaildirFetcher`] reads a local
//! maildir-style directory (one message per file, delivered by the MTA or a
//! sync tool); a TLS IMAP fetcher implements the same trait against the
//! `[transports.mail.imap]` settings.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use teleclaw_transport::error::{Result, TransportError};

/// One raw message plus the watermark that identifies it.
#[derive(Debug, Clone)]
pub struct RawMail {
    /// Opaque, strictly increasing per mailbox (IMAP UID, maildir filename).
    pub uid: String,
    pub bytes: Vec<u8>,
}

/// Fetch raw messages strictly newer than a cursor.
#[async_trait]
pub trait MailFetcher: Send + Sync {
    /// Returns messages with uid greater than `cursor` in uid order, plus
    /// the new cursor (`None` when nothing arrived). Idempotent for an
    /// unchanged mailbox and equal cursor.
    async fn fetch_since(&self, cursor: Option<&str>) -> Result<(Vec<RawMail>, Option<String>)>;
}

/// Maildir-style fetcher: one file per message, filename is the uid.
///
/// Delivery agents write maildir files with monotonically sortable names
/// (timestamp-prefixed), which is exactly the watermark contract.
pub struct MaildirFetcher {
    dir: PathBuf,
}

impl MaildirFetcher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl MailFetcher for MaildirFetcher {
    async fn fetch_since(&self, cursor: Option<&str>) -> Result<(Vec<RawMail>, Option<String>)> {
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| TransportError::Transient(format!("maildir read: {e}")))?;

        let mut names: Vec<String> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| TransportError::Transient(format!("maildir read: {e}")))?;
            if !entry.path().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            // In-progress deliveries use a tmp suffix; skip them.
            if name.ends_with(".tmp") {
                continue;
            }
            if cursor.is_none_or(|c| name.as_str() > c) {
                names.push(name);
            }
        }
        names.sort();

        let mut mails = Vec::with_capacity(names.len());
        for name in &names {
            let bytes = std::fs::read(self.dir.join(name))
                .map_err(|e| TransportError::Transient(format!("maildir read {name}: {e}")))?;
            mails.push(RawMail {
                uid: name.clone(),
                bytes,
            });
        }

        let new_cursor = names.last().cloned();
        debug!(count = mails.len(), cursor = ?new_cursor, "maildir fetch");
        Ok((mails, new_cursor))
    }
}
