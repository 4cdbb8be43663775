//! Signup and sign-in: the session flow around the OTP lifecycle.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};

use super::state::AuthState;
use super::types::{SigninRequest, SigninResponse, SignupRequest, SignupResponse};
use super::utils::{normalize_email, valid_email};
use crate::email::signup_verification_message;
use crate::identity::IdentityError;
use crate::otp::code::generate_code;
use crate::otp::{CredentialRecord, OtpPurpose};

const MIN_PASSWORD_LENGTH: usize = 6;

/// Create an account and issue the first verification code.
///
/// The credential record write must succeed before success is reported; when
/// it fails, the just-created identity account is deleted again so no
/// unverifiable orphan is left behind. An email delivery failure after the
/// write is not compensated: the account stands and the caller is pointed at
/// resend.
#[utoipa::path(
    post,
    path = "/v1/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created, verification code sent", body = SignupResponse),
        (status = 400, description = "Validation error", body = String),
        (status = 409, description = "Email already registered", body = String),
        (status = 500, description = "Account could not be created", body = String)
    ),
    tag = "auth"
)]
pub async fn signup(
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<SignupRequest>>,
) -> impl IntoResponse {
    let request: SignupRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email address".to_string()).into_response();
    }
    if request.password.len() < MIN_PASSWORD_LENGTH {
        return (
            StatusCode::BAD_REQUEST,
            "Password must be at least 6 characters.".to_string(),
        )
            .into_response();
    }
    let display_name = request.display_name.trim().to_string();
    if display_name.is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing display name".to_string()).into_response();
    }

    let account = match state
        .identity()
        .create_account(&email, &request.password, &display_name)
        .await
    {
        Ok(account) => account,
        Err(IdentityError::EmailTaken) => {
            return (
                StatusCode::CONFLICT,
                "An account with this email already exists.".to_string(),
            )
                .into_response();
        }
        Err(err) => {
            error!("failed to create identity account: {err:#}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Could not create account.".to_string(),
            )
                .into_response();
        }
    };

    let now = Utc::now();
    let code = generate_code();
    let record = CredentialRecord::new_unverified(
        account.user_id.clone(),
        email.clone(),
        display_name.clone(),
        request.country.trim().to_string(),
        code.clone(),
        state.lifecycle().expiry_from(now),
        now,
    );

    if let Err(err) = state.store().create(&record).await {
        error!(user_id = %account.user_id, "failed to persist credential record: {err:#}");
        // Compensating action: drop the identity account so the user can
        // retry signup instead of being stuck unverifiable.
        if let Err(delete_err) = state.identity().delete_account(&account.user_id).await {
            error!(
                user_id = %account.user_id,
                "compensating account delete failed: {delete_err:#}"
            );
        }
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Could not save user profile. Please try again.".to_string(),
        )
            .into_response();
    }

    let message = signup_verification_message(&email, &display_name, &code);
    let body = match state.mailer().send(&message).await {
        Ok(()) => "A verification code has been sent to your email.".to_string(),
        Err(err) => {
            // The persisted code stays valid; resend covers delivery loss.
            error!(user_id = %account.user_id, "verification email failed: {err:#}");
            "Account created, but the verification email failed to send. Please request a new code."
                .to_string()
        }
    };

    info!(user_id = %account.user_id, "account created");
    (
        StatusCode::CREATED,
        Json(SignupResponse {
            user_id: account.user_id,
            message: body,
        }),
    )
        .into_response()
}

/// Sign in, re-issuing a verification code when the outstanding one is gone
/// or stale.
///
/// An unverified account still signs in; `verification_required` tells the
/// caller to route to the verification step before unlocking features.
#[utoipa::path(
    post,
    path = "/v1/auth/signin",
    request_body = SigninRequest,
    responses(
        (status = 200, description = "Signed in", body = SigninResponse),
        (status = 400, description = "Validation error", body = String),
        (status = 401, description = "Invalid email or password", body = String),
        (status = 500, description = "Sign-in failed", body = String)
    ),
    tag = "auth"
)]
pub async fn signin(
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<SigninRequest>>,
) -> impl IntoResponse {
    let request: SigninRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    let account = match state
        .identity()
        .verify_password(&email, &request.password)
        .await
    {
        Ok(account) => account,
        Err(IdentityError::InvalidCredentials | IdentityError::NotFound) => {
            return (
                StatusCode::UNAUTHORIZED,
                "Invalid email or password.".to_string(),
            )
                .into_response();
        }
        Err(err) => {
            error!("password verification failed: {err:#}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An unexpected error occurred. Please try again.".to_string(),
            )
                .into_response();
        }
    };

    let record = match state.store().fetch(&account.user_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            error!(user_id = %account.user_id, "credential record missing at sign-in");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "User profile not found. Please contact support.".to_string(),
            )
                .into_response();
        }
        Err(err) => {
            error!(user_id = %account.user_id, "credential lookup failed: {err:#}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An unexpected error occurred. Please try again.".to_string(),
            )
                .into_response();
        }
    };

    if record.email_verified {
        if let Err(err) = state.store().touch_last_login(&account.user_id).await {
            error!(user_id = %account.user_id, "failed to update last_login: {err:#}");
        }
        return Json(SigninResponse {
            user_id: record.user_id,
            email: record.email,
            display_name: record.display_name,
            email_verified: true,
            verification_required: false,
        })
        .into_response();
    }

    // Unverified: refresh the code only when the stored one is absent or
    // stale, so an in-flight code keeps working.
    if !record.has_live_otp(Utc::now()) {
        if let Err(err) = state
            .lifecycle()
            .issue(&account.user_id, OtpPurpose::Signup)
            .await
        {
            // Sign-in still succeeds; resend covers the gap.
            error!(user_id = %account.user_id, "auto reissue at sign-in failed: {err:#}");
        }
    }

    Json(SigninResponse {
        user_id: record.user_id,
        email: record.email,
        display_name: record.display_name,
        email_verified: false,
        verification_required: true,
    })
    .into_response()
}
