//! Email delivery abstractions and message templates.
//!
//! Workflows hand a fully rendered [`EmailMessage`] to an [`EmailSender`].
//! The sender decides how to deliver (transactional HTTP API, logging for
//! local dev) and returns `Ok`/`Err`. Delivery is fire-and-forget beyond the
//! provider's own retry policy; the OTP workflows persist codes before
//! sending, so a lost email is recovered by resend rather than rollback.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};
use url::Url;

use crate::APP_USER_AGENT;

#[derive(Clone, Debug, Serialize)]
pub struct Recipient {
    pub email: String,
    pub name: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct EmailMessage {
    pub to: Vec<Recipient>,
    pub subject: String,
    pub html_content: String,
}

/// Email delivery abstraction used by the OTP workflows.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error for the caller to log.
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs the message instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let to = message
            .to
            .iter()
            .map(|recipient| recipient.email.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        info!(to = %to, subject = %message.subject, "email send stub");
        Ok(())
    }
}

/// Transactional email API client (Brevo-style `POST /v3/smtp/email`).
#[derive(Clone, Debug)]
pub struct HttpEmailSender {
    client: Client,
    endpoint: Url,
    api_key: SecretString,
    sender_name: String,
    sender_email: String,
}

impl HttpEmailSender {
    /// # Errors
    /// Fails when the base URL cannot be parsed or the client cannot build.
    pub fn new(
        base_url: &str,
        api_key: SecretString,
        sender_name: String,
        sender_email: String,
    ) -> Result<Self> {
        let endpoint = Url::parse(base_url)
            .and_then(|base| base.join("/v3/smtp/email"))
            .context("invalid email API URL")?;
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .build()
            .context("failed to build email HTTP client")?;
        Ok(Self {
            client,
            endpoint,
            api_key,
            sender_name,
            sender_email,
        })
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let body = json!({
            "sender": { "name": self.sender_name, "email": self.sender_email },
            "to": message.to,
            "subject": message.subject,
            "htmlContent": message.html_content,
        });

        debug!(endpoint = %self.endpoint, "sending transactional email");
        let response = self
            .client
            .post(self.endpoint.clone())
            .header("api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .context("email API request failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("email API returned {status}: {detail}"));
        }
        Ok(())
    }
}

/// First verification code, sent right after signup.
#[must_use]
pub fn signup_verification_message(email: &str, name: &str, code: &str) -> EmailMessage {
    EmailMessage {
        to: vec![Recipient {
            email: email.to_string(),
            name: name.to_string(),
        }],
        subject: "Your Herbbify Verification Code".to_string(),
        html_content: format!(
            "<h1>Welcome to Herbbify!</h1>\
             <p>Hello {name},</p>\
             <p>Thank you for signing up. Please use the following One-Time \
             Password (OTP) to verify your email address:</p>\
             <h2>{code}</h2>\
             <p>This code will expire in 10 minutes.</p>\
             <p>If you did not sign up for an account, you can safely ignore \
             this email.</p>"
        ),
    }
}

/// Replacement verification code for resend and unverified sign-in.
#[must_use]
pub fn resend_verification_message(email: &str, name: &str, code: &str) -> EmailMessage {
    EmailMessage {
        to: vec![Recipient {
            email: email.to_string(),
            name: name.to_string(),
        }],
        subject: "Your New Herbbify Verification Code".to_string(),
        html_content: format!(
            "<h1>Here is your new code</h1>\
             <p>Hello {name},</p>\
             <p>Please use the following One-Time Password (OTP) to verify \
             your email address for Herbbify:</p>\
             <h2>{code}</h2>\
             <p>This code will expire in 10 minutes.</p>"
        ),
    }
}

/// Password reset code for the recovery workflow.
#[must_use]
pub fn password_reset_message(email: &str, name: &str, code: &str) -> EmailMessage {
    EmailMessage {
        to: vec![Recipient {
            email: email.to_string(),
            name: name.to_string(),
        }],
        subject: "Your Password Reset Code for Herbbify".to_string(),
        html_content: format!(
            "<h1>Password Reset Request</h1>\
             <p>Hello {name},</p>\
             <p>Please use the following One-Time Password (OTP) to reset \
             your password for Herbbify:</p>\
             <h2>{code}</h2>\
             <p>This code will expire in 10 minutes. If you did not request \
             this, you can safely ignore this email.</p>"
        ),
    }
}
