//! Email verification: resend a code, verify a submitted one.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::{error, info};

use super::state::AuthState;
use super::types::{ResendOtpRequest, VerifyOtpRequest};
use crate::otp::{FlowResponse, OtpError, OtpPurpose, Validation};

/// Replace the outstanding verification code and email the new one.
///
/// Resending for an already-verified account is reported as success so a
/// stale client retrying the button lands in a sane place.
#[utoipa::path(
    post,
    path = "/v1/auth/otp/resend",
    request_body = ResendOtpRequest,
    responses(
        (status = 200, description = "Resend outcome", body = FlowResponse),
        (status = 400, description = "Missing payload", body = String)
    ),
    tag = "auth"
)]
pub async fn resend_otp(
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<ResendOtpRequest>>,
) -> impl IntoResponse {
    let request: ResendOtpRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let response = match state
        .lifecycle()
        .issue(&request.user_id, OtpPurpose::Signup)
        .await
    {
        Ok(_) => FlowResponse {
            success: true,
            message: Some("A new verification code has been sent to your email.".to_string()),
        },
        Err(OtpError::AlreadyVerified) => FlowResponse {
            success: true,
            message: Some(OtpError::AlreadyVerified.user_message()),
        },
        Err(err @ OtpError::UserNotFound) => FlowResponse::failure(err.user_message()),
        Err(err) => {
            error!(user_id = %request.user_id, "resend failed: {err:#}");
            FlowResponse::generic_failure()
        }
    };
    Json(response).into_response()
}

/// Verify a submitted code and flip the account to verified.
///
/// Verification is monotone: once flipped, re-submitting any code succeeds
/// without touching the record again.
#[utoipa::path(
    post,
    path = "/v1/auth/otp/verify",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Verification outcome", body = FlowResponse),
        (status = 400, description = "Missing payload", body = String)
    ),
    tag = "auth"
)]
pub async fn verify_otp(
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<VerifyOtpRequest>>,
) -> impl IntoResponse {
    let request: VerifyOtpRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let validation = match state
        .lifecycle()
        .validate(&request.user_id, &request.code, OtpPurpose::Signup)
        .await
    {
        Ok(validation) => validation,
        Err(err @ (OtpError::InvalidCode | OtpError::Expired | OtpError::UserNotFound)) => {
            return Json(FlowResponse::failure(err.user_message())).into_response();
        }
        Err(err) => {
            error!(user_id = %request.user_id, "verification failed: {err:#}");
            return Json(FlowResponse::generic_failure()).into_response();
        }
    };

    let response = match validation {
        Validation::AlreadyVerified => FlowResponse {
            success: true,
            message: Some(OtpError::AlreadyVerified.user_message()),
        },
        Validation::Valid => match state.store().mark_verified(&request.user_id).await {
            Ok(()) => {
                info!(user_id = %request.user_id, "account verified");
                FlowResponse {
                    success: true,
                    message: Some("Account verified successfully.".to_string()),
                }
            }
            Err(err) => {
                error!(user_id = %request.user_id, "failed to persist verification: {err:#}");
                FlowResponse::generic_failure()
            }
        },
    };
    Json(response).into_response()
}
