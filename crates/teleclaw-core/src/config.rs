use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

// Relay constants — shared across crates so the contracts line up
pub const TOKEN_LEN: usize = 8;
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const RETRY_BACKOFF_SECS: i64 = 60; // linear: retries × 60 s
pub const DISPATCH_INTERVAL_SECS: u64 = 5;
pub const MAIL_POLL_INTERVAL_SECS: u64 = 30;
pub const POLL_BACKOFF_BASE_SECS: u64 = 5;
pub const POLL_BACKOFF_MAX_SECS: u64 = 300; // 5 minutes
pub const SHUTDOWN_GRACE_SECS: u64 = 60;
pub const COMMAND_MAX_AGE_HOURS: i64 = 24;

/// Top-level config (teleclaw.toml + TELECLAW_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeleclawConfig {
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub injector: InjectorConfig,
    #[serde(default)]
    pub transports: TransportsConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

impl Default for TeleclawConfig {
    fn default() -> Self {
        Self {
            relay: RelayConfig::default(),
            injector: InjectorConfig::default(),
            transports: TransportsConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

/// Pane-monitor settings: which panes to watch and whom to notify when the
/// assistant inside goes idle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_monitor_interval")]
    pub interval_secs: u64,
    #[serde(default)]
    pub panes: Vec<MonitoredPane>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_monitor_interval(),
            panes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoredPane {
    /// tmux session name holding the assistant.
    pub pane: String,
    /// Project label echoed in notifications.
    pub project: String,
    /// Transport used for the notification and the replies it invites.
    pub transport: crate::types::TransportKind,
    /// Transport-specific address the notification goes to.
    pub recipient: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Directory holding sessions/, queue.json, cursors/ and relay.pid.
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
    /// Product tag rendered into notification subjects: `[<product> #TOKEN]`.
    #[serde(default = "default_product")]
    pub product: String,
    #[serde(default = "default_dispatch_interval")]
    pub dispatch_interval_secs: u64,
    #[serde(default = "default_session_ttl")]
    pub session_ttl_hours: i64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            product: default_product(),
            dispatch_interval_secs: default_dispatch_interval(),
            session_ttl_hours: default_session_ttl(),
        }
    }
}

/// How the injector answers multi-option consent prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromptPolicy {
    /// Answer "1. Yes" — the assistant keeps asking on later actions.
    Conservative,
    /// Answer "2. Yes, and don't ask again" — required for unattended runs.
    #[default]
    Permissive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectorConfig {
    /// Multiplexer binary; resolved on PATH at startup.
    #[serde(default = "default_mux_bin")]
    pub multiplexer_bin: String,
    /// Command launched inside a freshly bootstrapped pane.
    #[serde(default = "default_assistant_cmd")]
    pub assistant_cmd: String,
    /// Absolute-path invocation tried once when `assistant_cmd` fails.
    pub assistant_fallback_cmd: Option<String>,
    /// Working directory for bootstrapped panes.
    #[serde(default = "default_workdir")]
    pub workdir: String,
    #[serde(default)]
    pub prompt_default: PromptPolicy,
    /// Lines captured from the pane tail on each confirmation-loop pass.
    #[serde(default = "default_capture_lines")]
    pub capture_lines: u32,
    /// Degraded mode: commands are dropped as files here when no
    /// multiplexer is available.
    pub drop_dir: Option<String>,
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self {
            multiplexer_bin: default_mux_bin(),
            assistant_cmd: default_assistant_cmd(),
            assistant_fallback_cmd: None,
            workdir: default_workdir(),
            prompt_default: PromptPolicy::default(),
            capture_lines: default_capture_lines(),
            drop_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TransportsConfig {
    pub mail: Option<MailConfig>,
    pub chat: Option<ChatConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub imap: ImapConfig,
    pub smtp: SmtpConfig,
    /// Deny-by-default sender allowlist; `"*"` allows everyone.
    #[serde(default)]
    pub allow_senders: Vec<String>,
    #[serde(default = "default_mail_poll")]
    pub poll_interval_secs: u64,
    /// Local maildir consumed by the built-in fetcher. A TLS IMAP fetcher
    /// plugs in behind the same trait using the `imap` section below.
    pub maildir: Option<String>,
}

/// IMAP endpoint settings consumed by `MailFetcher` implementations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImapConfig {
    pub host: String,
    #[serde(default = "default_imap_port")]
    pub port: u16,
    #[serde(default = "bool_true")]
    pub secure: bool,
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub user: String,
    pub password: String,
    /// RFC 5322 From address for outbound notifications.
    pub from: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// HMAC-SHA256 signing secret for webhook verification.
    pub channel_secret: String,
    /// Bearer token for the bot platform's reply/push API.
    pub channel_token: String,
    #[serde(default = "default_chat_api_base")]
    pub api_base: String,
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_chat_port")]
    pub port: u16,
    /// Allowed chat user ids (deny-by-default; `"*"` allows everyone).
    #[serde(default)]
    pub allow_users: Vec<String>,
    /// Allowed group ids.
    #[serde(default)]
    pub allow_groups: Vec<String>,
}

fn bool_true() -> bool {
    true
}
fn default_state_dir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.teleclaw", home)
}
fn default_product() -> String {
    "Teleclaw".to_string()
}
fn default_dispatch_interval() -> u64 {
    DISPATCH_INTERVAL_SECS
}
fn default_session_ttl() -> i64 {
    DEFAULT_SESSION_TTL_HOURS
}
fn default_mux_bin() -> String {
    "tmux".to_string()
}
fn default_assistant_cmd() -> String {
    "claude --dangerously-skip-permissions".to_string()
}
fn default_workdir() -> String {
    ".".to_string()
}
fn default_capture_lines() -> u32 {
    200
}
fn default_monitor_interval() -> u64 {
    5
}
fn default_mail_poll() -> u64 {
    MAIL_POLL_INTERVAL_SECS
}
fn default_imap_port() -> u16 {
    993
}
fn default_smtp_port() -> u16 {
    587
}
fn default_chat_api_base() -> String {
    "https://api.chat.example.com".to_string()
}
fn default_bind() -> String {
    "127.0.0.1".to_string()
}
fn default_chat_port() -> u16 {
    18790
}

impl TeleclawConfig {
    /// Load config from a TOML file with TELECLAW_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.teleclaw/teleclaw.toml
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);
        tracing::debug!(path = %path, "loading config");

        let config: TeleclawConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("TELECLAW_").split("_"))
            .extract()
            .map_err(|e| crate::error::TeleclawError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Startup validation for things figment cannot express: at least one
    /// transport must be enabled, and credentials must be non-empty.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.transports.mail.is_none() && self.transports.chat.is_none() {
            return Err(crate::error::TeleclawError::Config(
                "no transport configured: enable [transports.mail] or [transports.chat]".into(),
            ));
        }
        if let Some(mail) = &self.transports.mail {
            if mail.smtp.from.is_empty() {
                return Err(crate::error::TeleclawError::Config(
                    "transports.mail.smtp.from must not be empty".into(),
                ));
            }
        }
        if let Some(chat) = &self.transports.chat {
            if chat.channel_secret.is_empty() || chat.channel_token.is_empty() {
                return Err(crate::error::TeleclawError::Config(
                    "transports.chat requires channel_secret and channel_token".into(),
                ));
            }
        }
        Ok(())
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.teleclaw/teleclaw.toml", home)
}
