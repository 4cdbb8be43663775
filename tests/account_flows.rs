//! End-to-end account flows over in-memory doubles: signup, verification,
//! sign-in, and password recovery through the real handlers.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use chrono::{Duration, Utc};
use tokio::sync::Mutex;

use herbbify::email::{EmailMessage, EmailSender};
use herbbify::herbbify::handlers::auth::types::{
    ForgotPasswordRequest, ResendOtpRequest, ResetPasswordRequest, SigninRequest, SigninResponse,
    SignupRequest, SignupResponse, VerifyOtpRequest,
};
use herbbify::herbbify::handlers::auth::{recovery, session, verification, AuthConfig, AuthState};
use herbbify::identity::{IdentityAccount, IdentityError, IdentityProvider};
use herbbify::otp::FlowResponse;
use herbbify::store::{CredentialStore, MemoryCredentialStore};

/// Identity provider double with real create/verify/set-password semantics.
#[derive(Default)]
struct FakeIdentity {
    accounts: Mutex<HashMap<String, (IdentityAccount, String)>>,
    next_id: Mutex<u32>,
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn lookup_by_email(&self, email: &str) -> Result<Option<IdentityAccount>, IdentityError> {
        Ok(self
            .accounts
            .lock()
            .await
            .get(email)
            .map(|(account, _)| account.clone()))
    }

    async fn create_account(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<IdentityAccount, IdentityError> {
        let mut accounts = self.accounts.lock().await;
        if accounts.contains_key(email) {
            return Err(IdentityError::EmailTaken);
        }
        let mut next_id = self.next_id.lock().await;
        *next_id += 1;
        let account = IdentityAccount {
            user_id: format!("uid-{next_id}"),
            email: email.to_string(),
            display_name: Some(display_name.to_string()),
        };
        accounts.insert(email.to_string(), (account.clone(), password.to_string()));
        Ok(account)
    }

    async fn verify_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<IdentityAccount, IdentityError> {
        match self.accounts.lock().await.get(email) {
            Some((account, stored)) if stored == password => Ok(account.clone()),
            _ => Err(IdentityError::InvalidCredentials),
        }
    }

    async fn set_password(&self, user_id: &str, new_password: &str) -> Result<(), IdentityError> {
        let mut accounts = self.accounts.lock().await;
        let entry = accounts
            .values_mut()
            .find(|(account, _)| account.user_id == user_id)
            .ok_or(IdentityError::NotFound)?;
        entry.1 = new_password.to_string();
        Ok(())
    }

    async fn generate_reset_link(&self, email: &str) -> Result<String, IdentityError> {
        Ok(format!("https://herbbify.test/reset?email={email}"))
    }

    async fn delete_account(&self, user_id: &str) -> Result<(), IdentityError> {
        self.accounts
            .lock()
            .await
            .retain(|_, (account, _)| account.user_id != user_id);
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

fn state() -> (
    Extension<Arc<AuthState>>,
    Arc<MemoryCredentialStore>,
    Arc<RecordingMailer>,
) {
    let store = Arc::new(MemoryCredentialStore::new());
    let mailer = Arc::new(RecordingMailer::default());
    let state = Arc::new(AuthState::new(
        AuthConfig::default(),
        store.clone(),
        Arc::new(FakeIdentity::default()),
        mailer.clone(),
    ));
    (Extension(state), store, mailer)
}

async fn json_body<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn signup_request(email: &str) -> SignupRequest {
    SignupRequest {
        email: email.to_string(),
        password: "hunter22".to_string(),
        display_name: "Alice".to_string(),
        country: "NL".to_string(),
    }
}

async fn stored_code(store: &MemoryCredentialStore, user_id: &str) -> String {
    store
        .fetch(user_id)
        .await
        .expect("fetch")
        .and_then(|record| record.otp)
        .expect("stored code")
}

#[tokio::test]
async fn signup_verify_signin_round_trip() {
    let (state, store, mailer) = state();

    let response = session::signup(state.clone(), Some(Json(signup_request("alice@example.com"))))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::CREATED);
    let signup: SignupResponse = json_body(response).await;
    assert_eq!(signup.user_id, "uid-1");
    assert_eq!(mailer.sent.lock().await.len(), 1);

    // Sign-in before verification flags the verification step without
    // replacing a still-live code.
    let response = session::signin(
        state.clone(),
        Some(Json(SigninRequest {
            email: "alice@example.com".to_string(),
            password: "hunter22".to_string(),
        })),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::OK);
    let signin: SigninResponse = json_body(response).await;
    assert!(signin.verification_required);
    assert!(!signin.email_verified);
    assert_eq!(mailer.sent.lock().await.len(), 1);

    let code = stored_code(&store, "uid-1").await;
    let response = verification::verify_otp(
        state.clone(),
        Some(Json(VerifyOtpRequest {
            user_id: "uid-1".to_string(),
            code,
        })),
    )
    .await
    .into_response();
    let flow: FlowResponse = json_body(response).await;
    assert!(flow.success);

    let response = session::signin(
        state,
        Some(Json(SigninRequest {
            email: "alice@example.com".to_string(),
            password: "hunter22".to_string(),
        })),
    )
    .await
    .into_response();
    let signin: SigninResponse = json_body(response).await;
    assert!(signin.email_verified);
    assert!(!signin.verification_required);

    let record = store.fetch("uid-1").await.expect("fetch").expect("record");
    assert!(record.last_login >= record.sign_up_date);
}

#[tokio::test]
async fn duplicate_signup_conflicts() {
    let (state, _store, _mailer) = state();

    let response = session::signup(state.clone(), Some(Json(signup_request("alice@example.com"))))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = session::signup(state, Some(Json(signup_request("alice@example.com"))))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn stale_code_is_replaced_at_signin() {
    let (state, store, mailer) = state();

    session::signup(state.clone(), Some(Json(signup_request("alice@example.com"))))
        .await
        .into_response();

    // Age the stored pair past its expiry.
    let mut record = store.fetch("uid-1").await.expect("fetch").expect("record");
    record.otp_expires = Some(Utc::now() - Duration::seconds(1));
    let stale = record.otp.clone().expect("stored code");
    store.insert(record).await;

    let response = session::signin(
        state,
        Some(Json(SigninRequest {
            email: "alice@example.com".to_string(),
            password: "hunter22".to_string(),
        })),
    )
    .await
    .into_response();
    let signin: SigninResponse = json_body(response).await;
    assert!(signin.verification_required);

    let fresh = stored_code(&store, "uid-1").await;
    assert_ne!(fresh, stale);
    let record = store.fetch("uid-1").await.expect("fetch").expect("record");
    assert!(record.otp_expires.is_some_and(|expires| expires > Utc::now()));
    assert_eq!(mailer.sent.lock().await.len(), 2);
}

#[tokio::test]
async fn repeated_resend_keeps_only_the_last_code() {
    let (state, store, mailer) = state();

    session::signup(state.clone(), Some(Json(signup_request("alice@example.com"))))
        .await
        .into_response();

    for _ in 0..2 {
        let response = verification::resend_otp(
            state.clone(),
            Some(Json(ResendOtpRequest {
                user_id: "uid-1".to_string(),
            })),
        )
        .await
        .into_response();
        let flow: FlowResponse = json_body(response).await;
        assert!(flow.success);
    }

    // Three emails went out; only the last code is stored.
    let sent = mailer.sent.lock().await;
    assert_eq!(sent.len(), 3);
    let last_code = stored_code(&store, "uid-1").await;
    assert!(sent[2].html_content.contains(&last_code));
    drop(sent);

    let response = verification::verify_otp(
        state,
        Some(Json(VerifyOtpRequest {
            user_id: "uid-1".to_string(),
            code: last_code,
        })),
    )
    .await
    .into_response();
    let flow: FlowResponse = json_body(response).await;
    assert!(flow.success);
}

#[tokio::test]
async fn password_reset_end_to_end() {
    let (state, store, _mailer) = state();

    session::signup(state.clone(), Some(Json(signup_request("alice@example.com"))))
        .await
        .into_response();

    let response = recovery::forgot_password(
        state.clone(),
        Some(Json(ForgotPasswordRequest {
            email: "alice@example.com".to_string(),
        })),
    )
    .await
    .into_response();
    let flow: FlowResponse = json_body(response).await;
    assert!(flow.success);

    let code = stored_code(&store, "uid-1").await;
    let response = recovery::reset_password(
        state.clone(),
        Some(Json(ResetPasswordRequest {
            email: "alice@example.com".to_string(),
            code,
            new_password: "brand-new-password".to_string(),
        })),
    )
    .await
    .into_response();
    let flow: FlowResponse = json_body(response).await;
    assert!(flow.success);

    // The old password is gone, the new one signs in.
    let response = session::signin(
        state.clone(),
        Some(Json(SigninRequest {
            email: "alice@example.com".to_string(),
            password: "hunter22".to_string(),
        })),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = session::signin(
        state,
        Some(Json(SigninRequest {
            email: "alice@example.com".to_string(),
            password: "brand-new-password".to_string(),
        })),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn recovery_stays_opaque_for_unknown_emails() {
    let (state, _store, mailer) = state();

    let response = recovery::forgot_password(
        state.clone(),
        Some(Json(ForgotPasswordRequest {
            email: "ghost@nowhere.test".to_string(),
        })),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::OK);
    let flow: FlowResponse = json_body(response).await;
    assert!(!flow.success);

    let response = recovery::reset_password(
        state,
        Some(Json(ResetPasswordRequest {
            email: "ghost@nowhere.test".to_string(),
            code: "482913".to_string(),
            new_password: "brand-new-password".to_string(),
        })),
    )
    .await
    .into_response();
    let other: FlowResponse = json_body(response).await;
    assert_eq!(flow.message, other.message);
    assert!(mailer.sent.lock().await.is_empty());
}
