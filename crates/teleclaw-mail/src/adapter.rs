//! The mail transport: maildir/IMAP inbound, SMTP outbound.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use mail_parser::MessageParser;
use tracing::{debug, info, warn};

use teleclaw_core::config::MailConfig;
use teleclaw_core::types::{NotificationPayload, TransportKind};
use teleclaw_transport::error::{Result, TransportError};
use teleclaw_transport::transport::{InboundTransport, OutboundTransport};
use teleclaw_transport::types::{InboundEnvelope, PollBatch};

use crate::allow;
use crate::fetch::{MailFetcher, RawMail};

pub struct MailTransport {
    config: MailConfig,
    fetcher: Arc<dyn MailFetcher>,
    smtp: SmtpTransport,
    from: Mailbox,
}

impl MailTransport {
    /// Build the adapter. SMTP uses STARTTLS against the configured relay;
    /// misconfiguration here is permanent and fails startup.
    pub fn new(config: MailConfig, fetcher: Arc<dyn MailFetcher>) -> Result<Self> {
        let smtp = SmtpTransport::starttls_relay(&config.smtp.host)
            .map_err(|e| TransportError::Permanent(format!("smtp relay: {e}")))?
            .port(config.smtp.port)
            .credentials(Credentials::new(
                config.smtp.user.clone(),
                config.smtp.password.clone(),
            ))
            .build();

        let from: Mailbox = config
            .smtp
            .from
            .parse()
            .map_err(|e| TransportError::Permanent(format!("smtp from address: {e}")))?;

        Ok(Self {
            config,
            fetcher,
            smtp,
            from,
        })
    }

    async fn deliver(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let to: Mailbox = to
            .parse()
            .map_err(|e| TransportError::Permanent(format!("recipient address: {e}")))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| TransportError::Permanent(format!("message build: {e}")))?;

        let smtp = self.smtp.clone();
        let sent = tokio::task::spawn_blocking(move || smtp.send(&message))
            .await
            .map_err(|e| TransportError::Transient(format!("smtp task: {e}")))?;

        match sent {
            Ok(_) => Ok(()),
            Err(e) if e.is_permanent() => Err(TransportError::Permanent(format!("smtp: {e}"))),
            Err(e) => Err(TransportError::Transient(format!("smtp: {e}"))),
        }
    }
}

/// Decode one raw RFC 5322 message into an envelope. Messages without a
/// parseable sender are dropped — there is nobody to reply to.
fn decode_mail(raw: &RawMail) -> Option<InboundEnvelope> {
    let message = MessageParser::default().parse(&raw.bytes)?;

    let sender = message
        .from()
        .and_then(|a| a.first())
        .and_then(|addr| addr.address())
        .map(str::to_string)?;

    let subject = message.subject().map(str::to_string);
    let body = message
        .body_text(0)
        .map(|c| c.into_owned())
        .unwrap_or_default();

    Some(InboundEnvelope {
        transport: TransportKind::Mail,
        sender,
        subject,
        body,
        group: None,
        reply_handle: None,
        received_at: Utc::now(),
    })
}

#[async_trait]
impl InboundTransport for MailTransport {
    fn name(&self) -> &str {
        "mail"
    }

    async fn poll(&self, cursor: Option<&str>) -> Result<PollBatch> {
        let (mails, new_cursor) = self.fetcher.fetch_since(cursor).await?;

        let mut envelopes = Vec::with_capacity(mails.len());
        for raw in &mails {
            match decode_mail(raw) {
                Some(env) => envelopes.push(env),
                None => warn!(uid = %raw.uid, "undecodable message skipped"),
            }
        }

        debug!(count = envelopes.len(), "mail poll");
        Ok(PollBatch {
            envelopes,
            cursor: new_cursor,
        })
    }

    fn authenticate(&self, envelope: &InboundEnvelope) -> Result<()> {
        if allow::is_allowed(&self.config.allow_senders, &envelope.sender) {
            Ok(())
        } else {
            Err(TransportError::Unauthorized(envelope.sender.clone()))
        }
    }
}

#[async_trait]
impl OutboundTransport for MailTransport {
    fn name(&self) -> &str {
        "mail"
    }

    async fn send(&self, recipient: &str, payload: &NotificationPayload) -> Result<String> {
        self.deliver(recipient, &payload.subject, &payload.body)
            .await?;
        info!(recipient, token = %payload.token, "notification mailed");
        Ok(format!("smtp:{}", payload.session_id))
    }

    async fn reply(&self, envelope: &InboundEnvelope, text: &str) -> Result<()> {
        let subject = match envelope.subject.as_deref() {
            Some(s) if s.starts_with("Re:") => s.to_string(),
            Some(s) => format!("Re: {s}"),
            None => "Re: your command".to_string(),
        };
        self.deliver(&envelope.sender, &subject, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(bytes: &str) -> RawMail {
        RawMail {
            uid: "t".into(),
            bytes: bytes.as_bytes().to_vec(),
        }
    }

    #[test]
    fn decode_extracts_sender_subject_body() {
        let mail = raw(
            "From: Ops <ops@example.com>\r\n\
             To: bot@example.com\r\n\
             Subject: Re: [Teleclaw #ABCDEFGH] my-project\r\n\
             \r\n\
             fix the failing test\r\n",
        );
        let env = decode_mail(&mail).unwrap();
        assert_eq!(env.sender, "ops@example.com");
        assert_eq!(
            env.subject.as_deref(),
            Some("Re: [Teleclaw #ABCDEFGH] my-project")
        );
        assert_eq!(env.body.trim(), "fix the failing test");
        assert_eq!(env.transport, TransportKind::Mail);
    }

    #[test]
    fn decode_without_sender_is_dropped() {
        let mail = raw("Subject: hello\r\n\r\nbody\r\n");
        assert!(decode_mail(&mail).is_none());
    }
}
