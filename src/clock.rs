//! Time and identifier sources, injectable for tests.

use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::Mutex;
use uuid::Uuid;

/// Source of wall-clock time. Production uses [`SystemClock`]; tests inject
/// a [`FixedClock`] to exercise expiry and window boundaries deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Real wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually-advanced clock for tests.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Advance the clock by the given number of seconds.
    pub fn advance_secs(&self, secs: i64) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::seconds(secs);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Generate a cryptographically random 32-byte hex token.
///
/// Used for both session bearers and verification tokens; 256 bits of
/// entropy, well above the minimum the opaque-token contract requires.
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Generate a fresh UUID v4 string (request ids, anonymous ids, event ids).
pub fn generate_uuid() -> String {
    Uuid::new_v4().to_string()
}
