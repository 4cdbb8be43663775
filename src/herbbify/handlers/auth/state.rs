//! Auth state and configuration shared by the account handlers.

use std::sync::Arc;

use crate::email::EmailSender;
use crate::identity::IdentityProvider;
use crate::otp::{OtpLifecycle, RecoveryFlow};
use crate::store::CredentialStore;

const DEFAULT_OTP_TTL_SECONDS: i64 = 10 * 60;
const DEFAULT_FRONTEND_BASE_URL: &str = "https://herbbify.app";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    otp_ttl_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            otp_ttl_seconds: DEFAULT_OTP_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_otp_ttl_seconds(mut self, seconds: i64) -> Self {
        self.otp_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn otp_ttl_seconds(&self) -> i64 {
        self.otp_ttl_seconds
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new(DEFAULT_FRONTEND_BASE_URL.to_string())
    }
}

/// Explicitly constructed collaborator bundle handed to every handler.
///
/// Nothing here is process-global; tests swap in doubles per instance.
pub struct AuthState {
    config: AuthConfig,
    identity: Arc<dyn IdentityProvider>,
    lifecycle: OtpLifecycle,
    recovery: RecoveryFlow,
}

impl AuthState {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        store: Arc<dyn CredentialStore>,
        identity: Arc<dyn IdentityProvider>,
        mailer: Arc<dyn EmailSender>,
    ) -> Self {
        let lifecycle = OtpLifecycle::new(store, mailer, config.otp_ttl_seconds());
        let recovery = RecoveryFlow::new(identity.clone(), lifecycle.clone());
        Self {
            config,
            identity,
            lifecycle,
            recovery,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.identity
    }

    #[must_use]
    pub fn lifecycle(&self) -> &OtpLifecycle {
        &self.lifecycle
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        self.lifecycle.store()
    }

    #[must_use]
    pub fn mailer(&self) -> &Arc<dyn EmailSender> {
        self.lifecycle.mailer()
    }

    #[must_use]
    pub fn recovery(&self) -> &RecoveryFlow {
        &self.recovery
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::default();
        assert_eq!(config.frontend_base_url(), DEFAULT_FRONTEND_BASE_URL);
        assert_eq!(config.otp_ttl_seconds(), DEFAULT_OTP_TTL_SECONDS);

        let config = AuthConfig::new("https://staging.herbbify.app".to_string())
            .with_otp_ttl_seconds(120);
        assert_eq!(config.frontend_base_url(), "https://staging.herbbify.app");
        assert_eq!(config.otp_ttl_seconds(), 120);
    }
}
