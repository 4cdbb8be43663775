//! OTP lifecycle manager: issue, validate, invalidate.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{error, info};

use super::code::{check_code, generate_code};
use super::models::{CredentialRecord, OtpError};
use crate::email::{password_reset_message, resend_verification_message, EmailSender};
use crate::store::CredentialStore;

/// Which workflow a code is being issued or validated for.
///
/// Signup verification refuses to touch already-verified records; password
/// reset overwrites the pair regardless of verification state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OtpPurpose {
    Signup,
    PasswordReset,
}

/// Outcome of a read-only validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Validation {
    Valid,
    /// Signup-context short circuit: re-verifying a verified account is a
    /// success and consumes nothing.
    AlreadyVerified,
}

/// A freshly issued code, already persisted and emailed.
#[derive(Clone, Debug)]
pub struct IssuedOtp {
    pub code: String,
    pub expires: DateTime<Utc>,
}

/// Generates, persists, validates, and expires one-time codes.
///
/// Validation is read-only; callers apply the follow-up mutation
/// (`mark_verified` or `clear_otp`) so the signup and reset workflows share
/// one code-checking algorithm while applying different post-conditions.
#[derive(Clone)]
pub struct OtpLifecycle {
    store: Arc<dyn CredentialStore>,
    mailer: Arc<dyn EmailSender>,
    ttl: Duration,
}

impl OtpLifecycle {
    #[must_use]
    pub fn new(
        store: Arc<dyn CredentialStore>,
        mailer: Arc<dyn EmailSender>,
        ttl_seconds: i64,
    ) -> Self {
        Self {
            store,
            mailer,
            ttl: Duration::seconds(ttl_seconds),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    #[must_use]
    pub fn mailer(&self) -> &Arc<dyn EmailSender> {
        &self.mailer
    }

    /// Expiry for a code issued at `now`.
    #[must_use]
    pub fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.ttl
    }

    /// Issue a fresh code: generate, persist the pair, then email it.
    ///
    /// The persist-before-send ordering is a correctness requirement: a user
    /// must never receive a code that failed to save. The reverse failure is
    /// accepted: when the email fails after the write, the stored code stays
    /// valid and the error propagates so the caller can suggest a resend.
    ///
    /// # Errors
    /// `UserNotFound` when the record is absent, `AlreadyVerified` for the
    /// signup purpose on a verified record, `Internal` on store or delivery
    /// failures.
    pub async fn issue(&self, user_id: &str, purpose: OtpPurpose) -> Result<IssuedOtp, OtpError> {
        let record = self
            .store
            .fetch(user_id)
            .await?
            .ok_or(OtpError::UserNotFound)?;

        if purpose == OtpPurpose::Signup && record.email_verified {
            return Err(OtpError::AlreadyVerified);
        }

        let code = generate_code();
        let expires = self.expiry_from(Utc::now());
        self.store.set_otp(user_id, &code, expires).await?;

        let message = match purpose {
            OtpPurpose::Signup => {
                resend_verification_message(&record.email, &record.display_name, &code)
            }
            OtpPurpose::PasswordReset => {
                password_reset_message(&record.email, &record.display_name, &code)
            }
        };
        if let Err(err) = self.mailer.send(&message).await {
            error!(user_id = %user_id, "failed to deliver OTP email: {err:#}");
            return Err(OtpError::Internal(err));
        }

        info!(user_id = %user_id, purpose = ?purpose, "issued OTP");
        Ok(IssuedOtp { code, expires })
    }

    /// Read-only validation of a submitted code against the stored record.
    ///
    /// # Errors
    /// `UserNotFound`, `InvalidCode`, or `Expired`; the error message never
    /// reveals the stored code.
    pub async fn validate(
        &self,
        user_id: &str,
        submitted: &str,
        purpose: OtpPurpose,
    ) -> Result<Validation, OtpError> {
        let record = self
            .store
            .fetch(user_id)
            .await?
            .ok_or(OtpError::UserNotFound)?;
        self.validate_record(&record, submitted, purpose)
    }

    /// Validation against an already-loaded record.
    ///
    /// # Errors
    /// Same as [`Self::validate`].
    pub fn validate_record(
        &self,
        record: &CredentialRecord,
        submitted: &str,
        purpose: OtpPurpose,
    ) -> Result<Validation, OtpError> {
        if purpose == OtpPurpose::Signup && record.email_verified {
            return Ok(Validation::AlreadyVerified);
        }
        check_code(record, submitted, Utc::now())?;
        Ok(Validation::Valid)
    }
}
