//! Identity provider client.
//!
//! The identity provider owns account lookup, password storage and
//! verification, password mutation, and reset-link generation. This service
//! only talks to it; it never stores passwords itself.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::APP_USER_AGENT;

/// Account data as the identity provider reports it.
#[derive(Clone, Debug, Deserialize)]
pub struct IdentityAccount {
    pub user_id: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("email already in use")]
    EmailTaken,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account not found")]
    NotFound,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve an email to an account, if one exists.
    async fn lookup_by_email(&self, email: &str)
        -> Result<Option<IdentityAccount>, IdentityError>;

    /// Create an account; the provider enforces email uniqueness.
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<IdentityAccount, IdentityError>;

    /// Check a password for sign-in.
    async fn verify_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<IdentityAccount, IdentityError>;

    /// Replace the stored password.
    async fn set_password(&self, user_id: &str, new_password: &str)
        -> Result<(), IdentityError>;

    /// Produce a one-shot password reset link for the link-based flow.
    async fn generate_reset_link(&self, email: &str) -> Result<String, IdentityError>;

    /// Remove an account. Used as the signup compensating action.
    async fn delete_account(&self, user_id: &str) -> Result<(), IdentityError>;
}

/// HTTP client against the hosted identity API.
#[derive(Clone, Debug)]
pub struct HttpIdentityProvider {
    client: Client,
    base_url: Url,
    api_key: SecretString,
}

impl HttpIdentityProvider {
    /// # Errors
    /// Fails when the base URL cannot be parsed or the client cannot build.
    pub fn new(base_url: &str, api_key: SecretString) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url).context("invalid identity provider URL")?;
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .build()
            .context("failed to build identity HTTP client")?;
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, IdentityError> {
        self.base_url
            .join(path)
            .map_err(|err| IdentityError::Other(anyhow!("invalid identity endpoint: {err}")))
    }

    async fn error_from_response(response: reqwest::Response) -> IdentityError {
        let status = response.status();
        if let Some(mapped) = classify_status(status) {
            return mapped;
        }
        let detail = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|body| body["error"].as_str().map(str::to_string))
            .unwrap_or_default();
        IdentityError::Other(anyhow!("identity provider returned {status}: {detail}"))
    }
}

/// Map well-known provider statuses onto the typed taxonomy.
fn classify_status(status: StatusCode) -> Option<IdentityError> {
    match status {
        StatusCode::NOT_FOUND => Some(IdentityError::NotFound),
        StatusCode::CONFLICT => Some(IdentityError::EmailTaken),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Some(IdentityError::InvalidCredentials)
        }
        _ => None,
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn lookup_by_email(
        &self,
        email: &str,
    ) -> Result<Option<IdentityAccount>, IdentityError> {
        let mut url = self.endpoint("/v1/accounts/lookup")?;
        url.query_pairs_mut().append_pair("email", email);

        debug!(%url, "identity lookup");
        let response = self
            .client
            .get(url)
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await
            .context("identity lookup request failed")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        let account = response
            .json::<IdentityAccount>()
            .await
            .context("failed to decode identity lookup response")?;
        Ok(Some(account))
    }

    async fn create_account(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<IdentityAccount, IdentityError> {
        let url = self.endpoint("/v1/accounts")?;
        let response = self
            .client
            .post(url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&json!({
                "email": email,
                "password": password,
                "display_name": display_name,
            }))
            .send()
            .await
            .context("identity create request failed")?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        let account = response
            .json::<IdentityAccount>()
            .await
            .context("failed to decode identity create response")?;
        Ok(account)
    }

    async fn verify_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<IdentityAccount, IdentityError> {
        let url = self.endpoint("/v1/accounts/verify-password")?;
        let response = self
            .client
            .post(url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .context("identity verify-password request failed")?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        let account = response
            .json::<IdentityAccount>()
            .await
            .context("failed to decode verify-password response")?;
        Ok(account)
    }

    async fn set_password(
        &self,
        user_id: &str,
        new_password: &str,
    ) -> Result<(), IdentityError> {
        let url = self.endpoint(&format!("/v1/accounts/{user_id}/password"))?;
        let response = self
            .client
            .put(url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&json!({ "password": new_password }))
            .send()
            .await
            .context("identity set-password request failed")?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        Ok(())
    }

    async fn generate_reset_link(&self, email: &str) -> Result<String, IdentityError> {
        let url = self.endpoint("/v1/accounts/reset-link")?;
        let response = self
            .client
            .post(url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&json!({ "email": email }))
            .send()
            .await
            .context("identity reset-link request failed")?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        let body = response
            .json::<Value>()
            .await
            .context("failed to decode reset-link response")?;
        body["link"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| IdentityError::Other(anyhow!("reset-link response missing link")))
    }

    async fn delete_account(&self, user_id: &str) -> Result<(), IdentityError> {
        let url = self.endpoint(&format!("/v1/accounts/{user_id}"))?;
        let response = self
            .client
            .delete(url)
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await
            .context("identity delete request failed")?;

        // Deleting an already-gone account is fine for the compensating path.
        if response.status() == StatusCode::NOT_FOUND || response.status().is_success() {
            return Ok(());
        }
        Err(Self::error_from_response(response).await)
    }
}
