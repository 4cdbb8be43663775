//! Anonymous password-recovery endpoints.
//!
//! Both endpoints answer 200 with a [`FlowResponse`] body no matter what
//! happened, except for a missing payload. Anything that would reveal whether
//! an email is registered collapses into the generic failure.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::info;

use super::state::AuthState;
use super::types::{ForgotPasswordRequest, ResetPasswordRequest};
use super::utils::{normalize_email, valid_email};
use crate::otp::FlowResponse;

/// Start a password reset by emailing a code to the account, if any.
#[utoipa::path(
    post,
    path = "/v1/auth/password/forgot",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Opaque outcome", body = FlowResponse),
        (status = 400, description = "Missing payload", body = String)
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<ForgotPasswordRequest>>,
) -> impl IntoResponse {
    let request: ForgotPasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        // Malformed input gets the same opaque answer as an unknown account.
        info!("password reset requested with malformed email");
        return Json(FlowResponse::generic_failure()).into_response();
    }

    Json(state.recovery().send_reset_code(&email).await).into_response()
}

/// Complete a password reset with the emailed code.
#[utoipa::path(
    post,
    path = "/v1/auth/password/reset",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Opaque outcome", body = FlowResponse),
        (status = 400, description = "Missing payload", body = String)
    ),
    tag = "auth"
)]
pub async fn reset_password(
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> impl IntoResponse {
    let request: ResetPasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    Json(
        state
            .recovery()
            .reset_password(&email, &request.code, &request.new_password)
            .await,
    )
    .into_response()
}
