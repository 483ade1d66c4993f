// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::extract::State;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::extract::ValidatedJson;
use crate::{
    auth::AuthResponse,
    error::ApiError,
    models::{ApiResponse, LoginRequest, OtpRequest, VerifyOtpRequest},
    state::AppState,
};

/// Acknowledgement of a passcode request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OtpIssued {
    pub email: String,
    /// Seconds the code stays valid
    pub expires_in: i64,
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    tag = "Auth",
    responses(
        (status = 200, body = ApiResponse<AuthResponse>),
        (status = 400, description = "Wrong password or invalid body"),
        (status = 404, description = "No credential for this email")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<ApiResponse<AuthResponse>, ApiError> {
    let session = state.auth.login(&request.email, &request.password).await?;
    Ok(ApiResponse::ok("Login successful", session))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/otp",
    request_body = OtpRequest,
    tag = "Auth",
    responses(
        (status = 200, body = ApiResponse<OtpIssued>),
        (status = 404, description = "No credential for this email")
    )
)]
pub async fn issue_otp(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<OtpRequest>,
) -> Result<ApiResponse<OtpIssued>, ApiError> {
    state.auth.issue_otp(&request.email)?;
    Ok(ApiResponse::ok(
        "Verification code sent",
        OtpIssued {
            email: request.email,
            expires_in: state.config.otp_ttl.num_seconds(),
        },
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/verify-otp",
    request_body = VerifyOtpRequest,
    tag = "Auth",
    responses(
        (status = 200, body = ApiResponse<AuthResponse>),
        (status = 400, description = "Code mismatch or expired"),
        (status = 404, description = "No credential or code for this email")
    )
)]
pub async fn verify_otp(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<VerifyOtpRequest>,
) -> Result<ApiResponse<AuthResponse>, ApiError> {
    let session = state.auth.verify_otp(&request.email, &request.code)?;
    Ok(ApiResponse::ok("Verification successful", session))
}
