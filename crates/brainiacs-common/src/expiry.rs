//! The one expiry rule shared by pins and polls.
//!
//! Stored flags (`Poll::is_active`, a message's pin fields) can lag behind the
//! clock. Every read path asks this module instead of trusting the flag.

use chrono::{DateTime, Utc};

/// A deadline has passed once `now` reaches it. A zero-length window is
/// therefore expired immediately.
pub fn has_expired(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    expires_at <= now
}

/// Milliseconds left until `expires_at`, zero if already expired.
pub fn remaining_ms(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    (expires_at - now).num_milliseconds().max(0) as u64
}
