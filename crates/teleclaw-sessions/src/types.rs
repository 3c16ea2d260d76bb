use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use teleclaw_core::types::{NotificationPayload, TransportKind};

/// A durable session record binding a token to a recipient and a pane.
///
/// One JSON file per record lives under `sessions/<id>.json`. Records are
/// minted by the pane monitor when it emits an outbound notification and die
/// when they expire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// UUID v4 string — primary key and file name stem.
    pub id: String,
    /// 8-character upper-case alphanumeric token, unique among live sessions.
    pub token: String,
    /// Which transport delivered the notification and accepts replies.
    pub transport: TransportKind,
    /// Transport-specific address (email address, chat user id).
    pub recipient: String,
    /// Name of the tmux session holding the assistant.
    pub pane: String,
    /// Free-form project label echoed back to the user.
    pub project: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Count of accepted commands; never decreases.
    #[serde(default)]
    pub command_count: u64,
    /// Copy of the last outbound payload, kept for audit and debugging.
    pub notification: Option<NotificationPayload>,
}

impl SessionRecord {
    /// Build a record expiring `ttl_hours` after `now`.
    pub fn new(
        id: String,
        token: String,
        transport: TransportKind,
        recipient: impl Into<String>,
        pane: impl Into<String>,
        project: impl Into<String>,
        now: DateTime<Utc>,
        ttl_hours: i64,
    ) -> Self {
        Self {
            id,
            token,
            transport,
            recipient: recipient.into(),
            pane: pane.into(),
            project: project.into(),
            created_at: now,
            expires_at: now + Duration::hours(ttl_hours),
            command_count: 0,
            notification: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record_at(now: DateTime<Utc>) -> SessionRecord {
        SessionRecord::new(
            "id-1".into(),
            "ABCD1234".into(),
            TransportKind::Mail,
            "ops@example.com",
            "claw-main",
            "teleclaw",
            now,
            24,
        )
    }

    #[test]
    fn expiry_is_exclusive_of_lifetime() {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap();
        let rec = record_at(now);
        assert!(!rec.is_expired(now));
        assert!(!rec.is_expired(now + Duration::hours(23)));
        assert!(rec.is_expired(now + Duration::hours(24)));
        assert!(rec.is_expired(now + Duration::hours(25)));
    }

    #[test]
    fn serde_roundtrip_preserves_fields() {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap();
        let rec = record_at(now);
        let json = serde_json::to_string(&rec).unwrap();
        let back: SessionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rec);
    }
}
