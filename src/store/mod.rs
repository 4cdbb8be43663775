//! Credential store abstraction.
//!
//! The store holds one [`CredentialRecord`] per user, keyed by the identity
//! provider's user id. Only point lookups and update-by-key are required; no
//! cross-record transactions. Concurrent writers follow last-write-wins,
//! which the workflows accept (two resend calls in flight produce two emails
//! and only the later-persisted code validates).
//!
//! The OTP pair invariant lives at this boundary: `set_otp`, `mark_verified`,
//! and `clear_otp` each touch `otp` and `otp_expires` in a single update so
//! the pair is never half-written.

mod memory;
mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::otp::models::CredentialRecord;

pub use memory::MemoryCredentialStore;
pub use postgres::PgCredentialStore;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Point lookup by user id.
    async fn fetch(&self, user_id: &str) -> Result<Option<CredentialRecord>>;

    /// Insert a freshly built record. Fails if the user id already exists.
    async fn create(&self, record: &CredentialRecord) -> Result<()>;

    /// Overwrite the OTP pair in one update.
    async fn set_otp(&self, user_id: &str, code: &str, expires: DateTime<Utc>) -> Result<()>;

    /// Flip `email_verified` to true and clear the OTP pair in one update.
    ///
    /// Implementations must never unset `email_verified`.
    async fn mark_verified(&self, user_id: &str) -> Result<()>;

    /// Clear the OTP pair in one update, leaving verification state alone.
    async fn clear_otp(&self, user_id: &str) -> Result<()>;

    /// Record a successful sign-in.
    async fn touch_last_login(&self, user_id: &str) -> Result<()>;
}
