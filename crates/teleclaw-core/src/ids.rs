//! Time and identifier seams.
//!
//! Every expiry, retry, and GC decision in the relay takes a [`Clock`] so
//! tests can pin time instead of sleeping. Token and command-id minting take
//! the RNG as an argument for the same reason.

use chrono::{DateTime, Utc};
use rand::Rng;
use uuid::Uuid;

use crate::config::TOKEN_LEN;

/// Symbols a token may contain — upper-case alphanumerics only, so tokens
/// survive phone keyboards and case-folding mail clients.
pub const TOKEN_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock — `Utc::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed clock for tests; `advance` pushes it forward.
#[derive(Debug, Clone)]
pub struct FixedClock(pub std::sync::Arc<std::sync::Mutex<DateTime<Utc>>>);

impl FixedClock {
    pub fn at(t: DateTime<Utc>) -> Self {
        Self(std::sync::Arc::new(std::sync::Mutex::new(t)))
    }

    pub fn advance(&self, d: chrono::Duration) {
        let mut guard = self.0.lock().unwrap();
        *guard += d;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

/// Mint one 8-character token candidate. Uniqueness among live sessions is
/// the session store's job — it retries on collision.
pub fn mint_token<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..TOKEN_LEN)
        .map(|_| {
            let idx = rng.random_range(0..TOKEN_CHARSET.len());
            TOKEN_CHARSET[idx] as char
        })
        .collect()
}

/// Time-prefixed queue id: `{unix_millis}-{4 hex}`. Lexicographic order on
/// ids of the same width follows enqueue order down to the millisecond.
pub fn command_id<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> String {
    let suffix: u16 = rng.random();
    format!("{}-{:04x}", now.timestamp_millis(), suffix)
}

/// UUID v4 session id.
pub fn session_id() -> String {
    Uuid::new_v4().to_string()
}
