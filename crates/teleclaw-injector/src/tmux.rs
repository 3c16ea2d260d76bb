//! tmux implementation of [`PaneDriver`].
//!
//! Every operation is one tmux CLI invocation via `tokio::process::Command`
//! — arguments are passed as an exec vector, so user text is never
//! reinterpreted by a shell. Literal payloads go through `send-keys -l`;
//! named keys (`C-u`, `Enter`) go without it.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::driver::{ControlKey, PaneDriver};
use crate::error::{InjectorError, Result};

pub struct TmuxDriver {
    bin: PathBuf,
}

impl TmuxDriver {
    /// Resolve the multiplexer binary on PATH.
    pub fn discover(bin: &str) -> Result<Self> {
        let bin = which::which(bin)
            .map_err(|e| InjectorError::MultiplexerUnavailable(format!("{bin}: {e}")))?;
        info!(bin = %bin.display(), "multiplexer resolved");
        Ok(Self { bin })
    }

    async fn run(&self, args: &[&str]) -> Result<std::process::Output> {
        debug!(?args, "tmux");
        let output = Command::new(&self.bin)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;
        Ok(output)
    }

    /// Run and require a zero exit status.
    async fn run_checked(&self, args: &[&str]) -> Result<std::process::Output> {
        let output = self.run(args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InjectorError::CommandFailed(format!(
                "tmux {}: {}",
                args.first().unwrap_or(&""),
                stderr.trim()
            )));
        }
        Ok(output)
    }
}

#[async_trait]
impl PaneDriver for TmuxDriver {
    async fn has_session(&self, pane: &str) -> Result<bool> {
        // Non-zero exit simply means "no such session" here.
        let output = self.run(&["has-session", "-t", pane]).await?;
        Ok(output.status.success())
    }

    async fn create_session(&self, pane: &str, cwd: &str, command: &str) -> Result<()> {
        self.run_checked(&["new-session", "-d", "-s", pane, "-c", cwd, command])
            .await?;
        info!(pane, cwd, "pane bootstrapped");
        Ok(())
    }

    async fn send_text(&self, pane: &str, text: &str) -> Result<()> {
        self.run_checked(&["send-keys", "-t", pane, "-l", text])
            .await?;
        Ok(())
    }

    async fn send_key(&self, pane: &str, key: ControlKey) -> Result<()> {
        self.run_checked(&["send-keys", "-t", pane, key.key_name()])
            .await?;
        Ok(())
    }

    async fn capture(&self, pane: &str, lines: u32) -> Result<String> {
        let start = format!("-{lines}");
        let output = self
            .run_checked(&["capture-pane", "-t", pane, "-p", "-S", &start])
            .await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
