//! Credential record and error taxonomy for the OTP workflows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subscription tier stored on the credential record.
///
/// The account service only stores the plan; credit accounting lives in the
/// feature services.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Plan {
    #[default]
    Free,
    Premium,
}

impl Plan {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "Free",
            Self::Premium => "Premium",
        }
    }

    #[must_use]
    pub fn from_str_or_free(value: &str) -> Self {
        match value {
            "Premium" => Self::Premium,
            _ => Self::Free,
        }
    }
}

/// Per-user credential record, keyed by the identity provider's user id.
///
/// The password itself never lives here; the identity provider owns it. This
/// record tracks verification state, the outstanding OTP pair, and the plan
/// and usage counters captured at signup.
///
/// Invariants:
/// - `otp` and `otp_expires` are set and cleared together, each in a single
///   store update.
/// - `email_verified` never transitions back to `false`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    pub country: String,
    pub email_verified: bool,
    pub otp: Option<String>,
    pub otp_expires: Option<DateTime<Utc>>,
    pub plan: Plan,
    pub preparation_credits_used: i32,
    pub saved_remedies_credits_used: i32,
    pub social_post_download_credits_used: i32,
    pub sign_up_date: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
}

impl CredentialRecord {
    /// Fresh unverified record with the first OTP pair populated.
    #[must_use]
    pub fn new_unverified(
        user_id: String,
        email: String,
        display_name: String,
        country: String,
        otp: String,
        otp_expires: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            email,
            display_name,
            country,
            email_verified: false,
            otp: Some(otp),
            otp_expires: Some(otp_expires),
            plan: Plan::Free,
            preparation_credits_used: 0,
            saved_remedies_credits_used: 0,
            social_post_download_credits_used: 0,
            sign_up_date: now,
            last_login: now,
        }
    }

    /// True when an OTP is stored and `now` is at or before its expiry.
    #[must_use]
    pub fn has_live_otp(&self, now: DateTime<Utc>) -> bool {
        match (&self.otp, self.otp_expires) {
            (Some(_), Some(expires)) => now <= expires,
            _ => false,
        }
    }
}

/// Failure taxonomy for OTP issuance and validation.
///
/// `UserNotFound` and `ProfileMissing` must not leak through the anonymous
/// recovery endpoints; handlers map them to one generic message.
#[derive(Debug, thiserror::Error)]
pub enum OtpError {
    #[error("user not found")]
    UserNotFound,
    #[error("user profile not found")]
    ProfileMissing,
    #[error("invalid code")]
    InvalidCode,
    #[error("code expired")]
    Expired,
    #[error("account already verified")]
    AlreadyVerified,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl OtpError {
    /// User-facing message for callers that already hold a session.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::UserNotFound => "User not found.".to_string(),
            Self::ProfileMissing => {
                "User profile not found. Please contact support.".to_string()
            }
            Self::InvalidCode => {
                "Invalid code. Please check the code and try again.".to_string()
            }
            Self::Expired => "Your code has expired. Please request a new one.".to_string(),
            Self::AlreadyVerified => "This account has already been verified.".to_string(),
            Self::Internal(_) => "An unexpected error occurred. Please try again.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn plan_round_trips_through_str() {
        assert_eq!(Plan::from_str_or_free(Plan::Free.as_str()), Plan::Free);
        assert_eq!(
            Plan::from_str_or_free(Plan::Premium.as_str()),
            Plan::Premium
        );
        assert_eq!(Plan::from_str_or_free("bogus"), Plan::Free);
    }

    #[test]
    fn new_unverified_starts_with_otp_pair() {
        let now = Utc::now();
        let record = CredentialRecord::new_unverified(
            "uid-1".to_string(),
            "alice@example.com".to_string(),
            "Alice".to_string(),
            "NL".to_string(),
            "482913".to_string(),
            now + Duration::minutes(10),
            now,
        );
        assert!(!record.email_verified);
        assert_eq!(record.plan, Plan::Free);
        assert_eq!(record.otp.as_deref(), Some("482913"));
        assert!(record.otp_expires.is_some());
        assert!(record.has_live_otp(now));
    }

    #[test]
    fn has_live_otp_is_false_for_cleared_pair() {
        let now = Utc::now();
        let mut record = CredentialRecord::new_unverified(
            "uid-1".to_string(),
            "alice@example.com".to_string(),
            "Alice".to_string(),
            "NL".to_string(),
            "482913".to_string(),
            now + Duration::minutes(10),
            now,
        );
        record.otp = None;
        record.otp_expires = None;
        assert!(!record.has_live_otp(now));
    }

    #[test]
    fn has_live_otp_expiry_is_inclusive() {
        let now = Utc::now();
        let mut record = CredentialRecord::new_unverified(
            "uid-1".to_string(),
            "alice@example.com".to_string(),
            "Alice".to_string(),
            "NL".to_string(),
            "482913".to_string(),
            now,
            now,
        );
        assert!(record.has_live_otp(now));
        record.otp_expires = Some(now - Duration::milliseconds(1));
        assert!(!record.has_live_otp(now));
    }
}
