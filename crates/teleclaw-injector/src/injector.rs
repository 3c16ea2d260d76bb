//! The injection sequence and confirmation loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use teleclaw_core::config::{InjectorConfig, PromptPolicy};

use crate::backend::DeliveryBackend;
use crate::classify::{classify, PromptClass};
use crate::driver::{ControlKey, PaneDriver};
use crate::error::{InjectorError, Result};

/// Pause after clearing the input line.
const PAUSE_AFTER_CLEAR: Duration = Duration::from_millis(200);
/// Pause after typing the payload, before committing it.
const PAUSE_AFTER_TYPE: Duration = Duration::from_millis(200);
/// Pause after Enter, before the first capture.
const PAUSE_AFTER_COMMIT: Duration = Duration::from_millis(1000);
/// Confirmation-loop attempts and their spacing.
const CONFIRM_ATTEMPTS: u32 = 8;
const CONFIRM_INTERVAL: Duration = Duration::from_millis(1500);
/// Pause between typing a prompt answer and committing it.
const ANSWER_SETTLE: Duration = Duration::from_millis(300);
/// Extra settle after answering a multi-option consent prompt.
const CONSENT_SETTLE: Duration = Duration::from_millis(2000);
/// Wait before re-capturing an unrecognized tail.
const UNKNOWN_WAIT: Duration = Duration::from_millis(2000);
/// Grace after bootstrapping a pane, so the assistant can draw its prompt.
const BOOTSTRAP_SETTLE: Duration = Duration::from_millis(1500);

/// Types commands into a live pane and answers confirmation prompts.
pub struct PaneInjector {
    driver: Arc<dyn PaneDriver>,
    config: InjectorConfig,
}

impl PaneInjector {
    pub fn new(driver: Arc<dyn PaneDriver>, config: InjectorConfig) -> Self {
        Self { driver, config }
    }

    /// Make sure the named pane exists, bootstrapping it when missing.
    ///
    /// A failed bootstrap retries once with the configured absolute-path
    /// fallback command before giving up with `PaneMissing`.
    async fn ensure_pane(&self, pane: &str) -> Result<()> {
        if self.driver.has_session(pane).await? {
            return Ok(());
        }

        info!(pane, "pane missing, bootstrapping assistant session");
        let primary = self
            .driver
            .create_session(pane, &self.config.workdir, &self.config.assistant_cmd)
            .await;

        match primary {
            Ok(()) => {}
            Err(e) => {
                let Some(fallback) = &self.config.assistant_fallback_cmd else {
                    return Err(InjectorError::PaneMissing(format!("{pane}: {e}")));
                };
                warn!(pane, error = %e, "startup command failed, trying fallback");
                self.driver
                    .create_session(pane, &self.config.workdir, fallback)
                    .await
                    .map_err(|e| InjectorError::PaneMissing(format!("{pane}: {e}")))?;
            }
        }

        sleep(BOOTSTRAP_SETTLE).await;
        Ok(())
    }

    /// Answer `class`. Returns `true` when the loop should keep watching.
    async fn answer(&self, pane: &str, class: PromptClass) -> Result<bool> {
        match class {
            PromptClass::MultiOptionConsent => {
                let digit = match self.config.prompt_default {
                    // Option 2 suppresses future prompts for the rest of the
                    // session — required for unattended operation.
                    PromptPolicy::Permissive => "2",
                    PromptPolicy::Conservative => "1",
                };
                debug!(pane, digit, "answering multi-option consent");
                self.driver.send_text(pane, digit).await?;
                sleep(ANSWER_SETTLE).await;
                self.driver.send_key(pane, ControlKey::Enter).await?;
                sleep(CONSENT_SETTLE).await;
                Ok(true)
            }
            PromptClass::SingleOptionConsent => {
                debug!(pane, "answering single-option consent");
                self.driver.send_text(pane, "1").await?;
                sleep(ANSWER_SETTLE).await;
                self.driver.send_key(pane, ControlKey::Enter).await?;
                Ok(true)
            }
            PromptClass::YesNo => {
                debug!(pane, "answering y/n prompt");
                self.driver.send_text(pane, "y").await?;
                sleep(ANSWER_SETTLE).await;
                self.driver.send_key(pane, ControlKey::Enter).await?;
                Ok(true)
            }
            PromptClass::PressEnter => {
                debug!(pane, "pressing enter");
                self.driver.send_key(pane, ControlKey::Enter).await?;
                Ok(true)
            }
            PromptClass::Working => Ok(true),
            PromptClass::Unknown => {
                sleep(UNKNOWN_WAIT).await;
                Ok(true)
            }
            PromptClass::Idle | PromptClass::AssistantError => Ok(false),
        }
    }

    /// Watch the pane and answer prompts until idle, error, or exhaustion.
    async fn confirmation_loop(&self, pane: &str) -> Result<()> {
        for attempt in 1..=CONFIRM_ATTEMPTS {
            let tail = self.driver.capture(pane, self.config.capture_lines).await?;
            let class = classify(&tail);
            debug!(pane, attempt, ?class, "confirmation pass");

            match class {
                PromptClass::Idle => {
                    info!(pane, attempt, "idle prompt reached");
                    return Ok(());
                }
                PromptClass::AssistantError => {
                    let summary: String = tail
                        .lines()
                        .rev()
                        .find(|l| !l.trim().is_empty())
                        .unwrap_or("unknown error")
                        .trim()
                        .to_string();
                    return Err(InjectorError::AssistantError(summary));
                }
                other => {
                    self.answer(pane, other).await?;
                }
            }

            sleep(CONFIRM_INTERVAL).await;
        }

        Err(InjectorError::InjectionTimeout {
            attempts: CONFIRM_ATTEMPTS,
        })
    }
}

#[async_trait]
impl DeliveryBackend for PaneInjector {
    fn name(&self) -> &str {
        "tmux"
    }

    /// The three-step ordering (clear, type, commit) is load-bearing: the
    /// assistant's input buffer may already hold text — ours, after a crashed
    /// run — and a single atomic send would concatenate instead of replace.
    async fn deliver(&self, pane: &str, command: &str) -> Result<()> {
        self.ensure_pane(pane).await?;

        self.driver.send_key(pane, ControlKey::CtrlU).await?;
        sleep(PAUSE_AFTER_CLEAR).await;

        self.driver.send_text(pane, command).await?;
        sleep(PAUSE_AFTER_TYPE).await;

        self.driver.send_key(pane, ControlKey::Enter).await?;
        sleep(PAUSE_AFTER_COMMIT).await;

        self.confirmation_loop(pane).await
    }

    /// Clear the input line only. `C-c` would risk killing the assistant.
    async fn cancel(&self, pane: &str) -> Result<()> {
        self.driver.send_key(pane, ControlKey::CtrlU).await
    }
}
