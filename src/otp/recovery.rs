//! Password recovery workflow: OTP issuance and reset completion.
//!
//! Anonymous entry points never reveal whether an email is registered:
//! unknown emails and internal faults collapse into one generic response,
//! with the real cause only in the server logs. The one distinct failure is
//! a registered account whose credential record is missing; the requester
//! already controls that email, so the support-contact message leaks nothing.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use utoipa::ToSchema;

use super::lifecycle::{OtpLifecycle, OtpPurpose};
use super::models::OtpError;
use crate::identity::{IdentityError, IdentityProvider};

/// Minimum accepted password length for resets.
pub const MIN_PASSWORD_LENGTH: usize = 6;

const GENERIC_FAILURE: &str = "Unable to process the request. Please try again.";

/// Result shape for the anonymous recovery endpoints.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct FlowResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl FlowResponse {
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }

    /// Shared opaque failure for anything that must not leak account state.
    #[must_use]
    pub fn generic_failure() -> Self {
        Self::failure(GENERIC_FAILURE)
    }
}

/// Orchestrates the password-reset path end to end:
/// lookup → issue code → validate submission → mutate password → clear pair.
#[derive(Clone)]
pub struct RecoveryFlow {
    identity: Arc<dyn IdentityProvider>,
    lifecycle: OtpLifecycle,
}

impl RecoveryFlow {
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityProvider>, lifecycle: OtpLifecycle) -> Self {
        Self {
            identity,
            lifecycle,
        }
    }

    /// Issue a reset code to the account behind `email`, opaquely.
    pub async fn send_reset_code(&self, email: &str) -> FlowResponse {
        let account = match self.identity.lookup_by_email(email).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                // Anti-enumeration: same response as any other failure.
                info!("password reset requested for unknown email");
                return FlowResponse::generic_failure();
            }
            Err(err) => {
                error!("identity lookup failed during reset issuance: {err:#}");
                return FlowResponse::generic_failure();
            }
        };

        match self
            .lifecycle
            .issue(&account.user_id, OtpPurpose::PasswordReset)
            .await
        {
            Ok(_) => FlowResponse::ok(),
            Err(OtpError::UserNotFound) => {
                // Auth account exists but the credential record is missing.
                error!(user_id = %account.user_id, "credential record missing for reset");
                FlowResponse::failure(OtpError::ProfileMissing.user_message())
            }
            Err(err) => {
                error!(user_id = %account.user_id, "reset issuance failed: {err:#}");
                FlowResponse::generic_failure()
            }
        }
    }

    /// Complete a reset: validate the code, set the new password, clear the
    /// pair.
    ///
    /// The password mutation and the OTP clear are two separate external
    /// calls. A failed clear after a successful mutation leaves a stale code
    /// behind; that residual risk is logged and accepted rather than papered
    /// over with a partial rollback.
    pub async fn reset_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> FlowResponse {
        if new_password.len() < MIN_PASSWORD_LENGTH {
            return FlowResponse::failure("New password must be at least 6 characters.");
        }

        let account = match self.identity.lookup_by_email(email).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                info!("password reset completion for unknown email");
                return FlowResponse::generic_failure();
            }
            Err(err) => {
                error!("identity lookup failed during reset completion: {err:#}");
                return FlowResponse::generic_failure();
            }
        };

        match self
            .lifecycle
            .validate(&account.user_id, code, OtpPurpose::PasswordReset)
            .await
        {
            Ok(_) => {}
            Err(OtpError::UserNotFound) => {
                error!(user_id = %account.user_id, "credential record missing for reset");
                return FlowResponse::failure(OtpError::ProfileMissing.user_message());
            }
            Err(err @ (OtpError::InvalidCode | OtpError::Expired)) => {
                return FlowResponse::failure(err.user_message());
            }
            Err(err) => {
                error!(user_id = %account.user_id, "reset validation failed: {err:#}");
                return FlowResponse::generic_failure();
            }
        }

        if let Err(err) = self
            .identity
            .set_password(&account.user_id, new_password)
            .await
        {
            let message = match err {
                IdentityError::NotFound => {
                    // The account vanished between lookup and mutation.
                    FlowResponse::generic_failure()
                }
                _ => {
                    error!(user_id = %account.user_id, "password mutation failed: {err:#}");
                    FlowResponse::generic_failure()
                }
            };
            return message;
        }

        if let Err(err) = self.lifecycle.store().clear_otp(&account.user_id).await {
            // Accepted residual risk: the password changed but the stale code
            // survives until the next issuance overwrites it.
            warn!(user_id = %account.user_id, "failed to clear OTP after reset: {err:#}");
        }

        info!(user_id = %account.user_id, "password reset completed");
        FlowResponse::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::{EmailMessage, EmailSender};
    use crate::identity::IdentityAccount;
    use crate::otp::models::CredentialRecord;
    use crate::store::{CredentialStore, MemoryCredentialStore};
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct FakeIdentity {
        accounts: HashMap<String, IdentityAccount>,
        passwords_set: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl FakeIdentity {
        fn with_account(user_id: &str, email: &str) -> Self {
            let mut accounts = HashMap::new();
            accounts.insert(
                email.to_string(),
                IdentityAccount {
                    user_id: user_id.to_string(),
                    email: email.to_string(),
                    display_name: Some("Alice".to_string()),
                },
            );
            Self {
                accounts,
                passwords_set: Arc::default(),
            }
        }
    }

    #[async_trait]
    impl IdentityProvider for FakeIdentity {
        async fn lookup_by_email(
            &self,
            email: &str,
        ) -> Result<Option<IdentityAccount>, IdentityError> {
            Ok(self.accounts.get(email).cloned())
        }

        async fn create_account(
            &self,
            _email: &str,
            _password: &str,
            _display_name: &str,
        ) -> Result<IdentityAccount, IdentityError> {
            Err(IdentityError::Other(anyhow!("not used")))
        }

        async fn verify_password(
            &self,
            _email: &str,
            _password: &str,
        ) -> Result<IdentityAccount, IdentityError> {
            Err(IdentityError::InvalidCredentials)
        }

        async fn set_password(
            &self,
            user_id: &str,
            new_password: &str,
        ) -> Result<(), IdentityError> {
            self.passwords_set
                .lock()
                .await
                .push((user_id.to_string(), new_password.to_string()));
            Ok(())
        }

        async fn generate_reset_link(&self, _email: &str) -> Result<String, IdentityError> {
            Err(IdentityError::Other(anyhow!("not used")))
        }

        async fn delete_account(&self, _user_id: &str) -> Result<(), IdentityError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<EmailMessage>>,
    }

    #[async_trait]
    impl EmailSender for RecordingMailer {
        async fn send(&self, message: &EmailMessage) -> Result<()> {
            self.sent.lock().await.push(message.clone());
            Ok(())
        }
    }

    fn record(user_id: &str, email: &str) -> CredentialRecord {
        let now = Utc::now();
        CredentialRecord::new_unverified(
            user_id.to_string(),
            email.to_string(),
            "Alice".to_string(),
            "NL".to_string(),
            "482913".to_string(),
            now + Duration::minutes(10),
            now,
        )
    }

    fn flow(
        identity: FakeIdentity,
        store: Arc<MemoryCredentialStore>,
        mailer: Arc<RecordingMailer>,
    ) -> RecoveryFlow {
        let lifecycle = OtpLifecycle::new(store, mailer, 600);
        RecoveryFlow::new(Arc::new(identity), lifecycle)
    }

    #[tokio::test]
    async fn unknown_email_gets_the_generic_failure_and_no_email() {
        let store = Arc::new(MemoryCredentialStore::new());
        let mailer = Arc::new(RecordingMailer::default());
        let flow = flow(FakeIdentity::default(), store, mailer.clone());

        let response = flow.send_reset_code("ghost@nowhere.test").await;
        assert!(!response.success);
        assert_eq!(response.message.as_deref(), Some(GENERIC_FAILURE));
        assert!(mailer.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn missing_credential_record_surfaces_support_message() {
        let store = Arc::new(MemoryCredentialStore::new());
        let mailer = Arc::new(RecordingMailer::default());
        let flow = flow(
            FakeIdentity::with_account("uid-1", "alice@example.com"),
            store,
            mailer,
        );

        let response = flow.send_reset_code("alice@example.com").await;
        assert!(!response.success);
        assert!(response
            .message
            .as_deref()
            .is_some_and(|message| message.contains("contact support")));
    }

    #[tokio::test]
    async fn issued_reset_code_completes_a_reset() -> Result<()> {
        let store = Arc::new(MemoryCredentialStore::new());
        store.insert(record("uid-1", "alice@example.com")).await;
        let mailer = Arc::new(RecordingMailer::default());
        let identity = FakeIdentity::with_account("uid-1", "alice@example.com");
        let flow = flow(identity, store.clone(), mailer.clone());

        let response = flow.send_reset_code("alice@example.com").await;
        assert!(response.success);
        let code = store
            .fetch("uid-1")
            .await?
            .and_then(|record| record.otp)
            .expect("stored code");

        let response = flow
            .reset_password("alice@example.com", &code, "brand-new-password")
            .await;
        assert!(response.success);

        // Pair cleared: the consumed code is rejected afterwards.
        let record = store.fetch("uid-1").await?.expect("record");
        assert!(record.otp.is_none());
        assert!(record.otp_expires.is_none());
        let response = flow
            .reset_password("alice@example.com", &code, "another-password")
            .await;
        assert!(!response.success);
        assert!(response
            .message
            .as_deref()
            .is_some_and(|message| message.contains("Invalid code")));
        Ok(())
    }

    #[tokio::test]
    async fn wrong_code_does_not_mutate_the_password() {
        let store = Arc::new(MemoryCredentialStore::new());
        store.insert(record("uid-1", "alice@example.com")).await;
        let identity = FakeIdentity::with_account("uid-1", "alice@example.com");
        let passwords_set = identity.passwords_set.clone();
        let flow = RecoveryFlow::new(
            Arc::new(identity),
            OtpLifecycle::new(store, Arc::new(RecordingMailer::default()), 600),
        );

        let response = flow
            .reset_password("alice@example.com", "000000", "brand-new-password")
            .await;
        assert!(!response.success);
        assert!(passwords_set.lock().await.is_empty());
    }

    #[tokio::test]
    async fn short_password_is_rejected_before_any_lookup() {
        let flow = flow(
            FakeIdentity::default(),
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(RecordingMailer::default()),
        );
        let response = flow
            .reset_password("alice@example.com", "482913", "short")
            .await;
        assert!(!response.success);
        assert!(response
            .message
            .as_deref()
            .is_some_and(|message| message.contains("at least 6 characters")));
    }
}
