//! Durable FIFO command queue.
//!
//! The whole queue lives in one JSON file with a top-level `commandQueue`
//! array, rewritten atomically after every mutation. Ordering is strict FIFO
//! within a session; across sessions at most one command per session is
//! handed out as executing at a time. Recovery after a crash rewrites
//! `executing` entries back to `queued` — delivery is at-least-once and the
//! injector's clear-before-type discipline absorbs the duplicate.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use teleclaw_core::config::RETRY_BACKOFF_SECS;
use teleclaw_core::fsutil::write_atomic;
use teleclaw_core::ids::command_id;

use crate::error::{QueueError, Result};
use crate::types::{CommandStatus, QueuedCommand};

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueueFile {
    command_queue: Vec<QueuedCommand>,
}

pub struct CommandQueue {
    path: PathBuf,
    inner: Mutex<Vec<QueuedCommand>>,
}

impl CommandQueue {
    /// Open the queue file at `path`, creating an empty queue when absent.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let commands = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str::<QueueFile>(&raw)?.command_queue,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        info!(path = %path.display(), count = commands.len(), "command queue opened");
        Ok(Self {
            path,
            inner: Mutex::new(commands),
        })
    }

    /// Append a command and flush. Returns the new queue id.
    pub fn enqueue(&self, session_id: &str, command: &str, now: DateTime<Utc>) -> Result<String> {
        let mut rng = rand::rng();
        let mut commands = self.inner.lock().unwrap();

        // Regenerate on the (millisecond-scale) chance of an id collision.
        let id = loop {
            let candidate = command_id(now, &mut rng);
            if !commands.iter().any(|c| c.id == candidate) {
                break candidate;
            }
        };

        commands.push(QueuedCommand::new(id.clone(), session_id, command, now));
        self.persist(&commands)?;
        debug!(queue_id = %id, session_id, "command enqueued");
        Ok(id)
    }

    /// Oldest ready command whose session has nothing executing, or `None`.
    pub fn dequeue(&self, now: DateTime<Utc>) -> Option<QueuedCommand> {
        let commands = self.inner.lock().unwrap();
        let busy = executing_sessions(&commands);
        commands
            .iter()
            .filter(|c| c.is_ready(now) && !busy.contains(c.session_id.as_str()))
            .min_by(|a, b| a.queued_at.cmp(&b.queued_at).then(a.id.cmp(&b.id)))
            .cloned()
    }

    /// All ready commands, at most one per session, in enqueue order. The
    /// dispatcher runs them concurrently across sessions.
    pub fn dequeue_ready(&self, now: DateTime<Utc>) -> Vec<QueuedCommand> {
        let commands = self.inner.lock().unwrap();
        let mut taken: HashSet<String> = executing_sessions(&commands)
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut sorted: Vec<&QueuedCommand> =
            commands.iter().filter(|c| c.is_ready(now)).collect();
        sorted.sort_by(|a, b| a.queued_at.cmp(&b.queued_at).then(a.id.cmp(&b.id)));

        let mut ready = Vec::new();
        for cmd in sorted {
            if taken.insert(cmd.session_id.clone()) {
                ready.push(cmd.clone());
            }
        }
        ready
    }

    pub fn mark_executing(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        self.transition(id, CommandStatus::Executing, |cmd| {
            cmd.status = CommandStatus::Executing;
            cmd.executed_at = Some(now);
        })
    }

    pub fn mark_completed(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        self.transition(id, CommandStatus::Completed, |cmd| {
            cmd.status = CommandStatus::Completed;
            cmd.completed_at = Some(now);
            cmd.error = None;
        })
    }

    /// Record a failure. With retries left the command re-queues with a
    /// linear backoff (`retries × 60 s`); otherwise it is terminal-failed.
    /// Returns `true` when the command will be retried.
    pub fn mark_failed(&self, id: &str, error: &str, now: DateTime<Utc>) -> Result<bool> {
        let mut commands = self.inner.lock().unwrap();
        let cmd = find_mut(&mut commands, id)?;

        if cmd.status != CommandStatus::Executing {
            return Err(QueueError::InvalidTransition {
                id: id.to_string(),
                from: cmd.status,
                to: CommandStatus::Failed,
            });
        }

        cmd.retries += 1;
        cmd.error = Some(error.to_string());
        cmd.failed_at = Some(now);

        let will_retry = cmd.retries < cmd.max_retries;
        if will_retry {
            cmd.status = CommandStatus::Queued;
            cmd.retry_at = Some(now + Duration::seconds(cmd.retries as i64 * RETRY_BACKOFF_SECS));
            warn!(
                queue_id = %id,
                retries = cmd.retries,
                max = cmd.max_retries,
                error,
                "command failed, re-queued with backoff"
            );
        } else {
            cmd.status = CommandStatus::Failed;
            warn!(queue_id = %id, retries = cmd.retries, error, "command terminally failed");
        }

        self.persist(&commands)?;
        Ok(will_retry)
    }

    /// Cancel a queued or executing command. The injector side of an
    /// in-flight cancellation is the dispatcher's business.
    pub fn cancel(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        let mut commands = self.inner.lock().unwrap();
        let cmd = find_mut(&mut commands, id)?;

        if cmd.status.is_terminal() {
            return Err(QueueError::InvalidTransition {
                id: id.to_string(),
                from: cmd.status,
                to: CommandStatus::Cancelled,
            });
        }

        cmd.status = CommandStatus::Cancelled;
        cmd.completed_at = Some(now);
        self.persist(&commands)?;
        info!(queue_id = %id, "command cancelled");
        Ok(())
    }

    /// Startup recovery: every `executing` entry goes back to `queued` with
    /// its retry count unchanged. Returns how many were recovered.
    pub fn recover(&self) -> Result<usize> {
        let mut commands = self.inner.lock().unwrap();
        let mut recovered = 0;
        for cmd in commands.iter_mut() {
            if cmd.status == CommandStatus::Executing {
                cmd.status = CommandStatus::Queued;
                cmd.retry_at = None;
                recovered += 1;
            }
        }
        if recovered > 0 {
            self.persist(&commands)?;
            warn!(count = recovered, "recovered executing commands from previous run");
        }
        Ok(recovered)
    }

    /// Drop terminal commands older than `max_age`. Returns the count removed.
    pub fn cleanup(&self, max_age: Duration, now: DateTime<Utc>) -> Result<usize> {
        let mut commands = self.inner.lock().unwrap();
        let before = commands.len();
        commands.retain(|c| {
            let done_at = c.completed_at.or(c.failed_at).unwrap_or(c.queued_at);
            !(c.status.is_terminal() && done_at + max_age <= now)
        });
        let removed = before - commands.len();
        if removed > 0 {
            self.persist(&commands)?;
            info!(count = removed, "old terminal commands cleaned up");
        }
        Ok(removed)
    }

    /// Drop every command regardless of status. Admin `commands clear`.
    pub fn clear(&self) -> Result<usize> {
        let mut commands = self.inner.lock().unwrap();
        let removed = commands.len();
        commands.clear();
        self.persist(&commands)?;
        Ok(removed)
    }

    pub fn get(&self, id: &str) -> Option<QueuedCommand> {
        self.inner.lock().unwrap().iter().find(|c| c.id == id).cloned()
    }

    /// Snapshot in enqueue order.
    pub fn list(&self) -> Vec<QueuedCommand> {
        let mut all = self.inner.lock().unwrap().clone();
        all.sort_by(|a, b| a.queued_at.cmp(&b.queued_at).then(a.id.cmp(&b.id)));
        all
    }

    /// (queued, executing, terminal) counts for the status surface.
    pub fn counts(&self) -> (usize, usize, usize) {
        let commands = self.inner.lock().unwrap();
        let queued = commands
            .iter()
            .filter(|c| c.status == CommandStatus::Queued)
            .count();
        let executing = commands
            .iter()
            .filter(|c| c.status == CommandStatus::Executing)
            .count();
        (queued, executing, commands.len() - queued - executing)
    }

    // --- private helpers ---------------------------------------------------

    fn transition(
        &self,
        id: &str,
        to: CommandStatus,
        apply: impl FnOnce(&mut QueuedCommand),
    ) -> Result<()> {
        let mut commands = self.inner.lock().unwrap();
        let cmd = find_mut(&mut commands, id)?;

        let allowed = match to {
            CommandStatus::Executing => cmd.status == CommandStatus::Queued,
            CommandStatus::Completed => cmd.status == CommandStatus::Executing,
            _ => false,
        };
        if !allowed {
            return Err(QueueError::InvalidTransition {
                id: id.to_string(),
                from: cmd.status,
                to,
            });
        }

        apply(cmd);
        self.persist(&commands)
    }

    fn persist(&self, commands: &[QueuedCommand]) -> Result<()> {
        let file = QueueFile {
            command_queue: commands.to_vec(),
        };
        let json = serde_json::to_vec_pretty(&file)?;
        write_atomic(&self.path, &json)?;
        Ok(())
    }
}

fn executing_sessions(commands: &[QueuedCommand]) -> HashSet<&str> {
    commands
        .iter()
        .filter(|c| c.status == CommandStatus::Executing)
        .map(|c| c.session_id.as_str())
        .collect()
}

fn find_mut<'a>(commands: &'a mut [QueuedCommand], id: &str) -> Result<&'a mut QueuedCommand> {
    commands
        .iter_mut()
        .find(|c| c.id == id)
        .ok_or_else(|| QueueError::NotFound { id: id.to_string() })
}
