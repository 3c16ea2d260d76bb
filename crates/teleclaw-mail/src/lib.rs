//! teleclaw-mail — the email transport adapter.
//!
//! Outbound notifications go through SMTP (`lettre`); inbound replies come
//! from a [`fetch::MailFetcher`] — the IMAP connection itself lives behind
//! that trait, with a maildir implementation shipped for local and degraded
//! operation. Raw RFC 5322 messages are decoded with `mail-parser` and
//! authenticated against a deny-by-default sender allowlist.

pub mod adapter;
pub mod allow;
pub mod fetch;
pub mod template;

pub use adapter::MailTransport;
pub use fetch::{MaildirFetcher, MailFetcher, RawMail};
