//! Drop-folder delivery — the degraded mode for hosts without a multiplexer.
//!
//! Each command becomes one JSON file in a directory a companion watcher on
//! the assistant side consumes. Files are written atomically so the watcher
//! never reads a half-written command. There is no pane to scrape, so
//! delivery completes as soon as the file lands.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::info;

use teleclaw_core::fsutil::write_atomic;

use crate::backend::DeliveryBackend;
use crate::error::Result;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DroppedCommand<'a> {
    pane: &'a str,
    command: &'a str,
    dropped_at: chrono::DateTime<Utc>,
}

pub struct DropFolderBackend {
    dir: PathBuf,
    /// Distinguishes files dropped within the same millisecond.
    seq: std::sync::atomic::AtomicU64,
}

impl DropFolderBackend {
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            seq: std::sync::atomic::AtomicU64::new(0),
        })
    }
}

#[async_trait]
impl DeliveryBackend for DropFolderBackend {
    fn name(&self) -> &str {
        "drop-folder"
    }

    async fn deliver(&self, pane: &str, command: &str) -> Result<()> {
        let now = Utc::now();
        let seq = self.seq.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let file = self
            .dir
            .join(format!("{}-{seq:04}-{pane}.json", now.timestamp_millis()));
        let json = serde_json::to_vec_pretty(&DroppedCommand {
            pane,
            command,
            dropped_at: now,
        })
        .map_err(|e| std::io::Error::other(e.to_string()))?;

        write_atomic(&file, &json)?;
        info!(path = %file.display(), "command dropped for pickup");
        Ok(())
    }

    /// Nothing to cancel — an undelivered file would already be consumed.
    async fn cancel(&self, _pane: &str) -> Result<()> {
        Ok(())
    }
}
