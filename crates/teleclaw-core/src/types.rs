use serde::{Deserialize, Serialize};
use std::fmt;

/// Which transport a session is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Mail,
    Chat,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Mail => write!(f, "mail"),
            TransportKind::Chat => write!(f, "chat"),
        }
    }
}

impl std::str::FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "mail" => Ok(TransportKind::Mail),
            "chat" => Ok(TransportKind::Chat),
            other => Err(format!("unknown transport: {other}")),
        }
    }
}

/// The outbound notification a transport renders into its native message.
///
/// The subject carries the bracketed token tag and the body carries the
/// `Session ID:` line, so replies resolve unambiguously whichever field the
/// user's client preserves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub subject: String,
    pub body: String,
    /// Machine-readable copy of the token embedded in subject and body.
    pub token: String,
    pub session_id: String,
    /// Free-form project label echoed back to the user.
    pub project: String,
    /// Optional quick-reply actions for transports that render buttons.
    #[serde(default)]
    pub actions: Vec<String>,
}
