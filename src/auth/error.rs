// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::token::TokenError;
use crate::storage::StoreError;

/// Authentication error type.
///
/// Covers both the session middleware (header and token failures) and the
/// authentication service (credential, password and OTP failures).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No authorization header present
    MissingAuthHeader,
    /// Invalid authorization header format
    InvalidAuthHeader,
    /// Token is malformed
    MalformedToken,
    /// Token signature is invalid
    InvalidSignature,
    /// Token has expired
    TokenExpired,
    /// Session tag matches none of the route's roles
    InsufficientPermissions,
    /// No credential or passcode for the given email
    NotFound(String),
    /// Password does not match the stored hash
    BadCredentials,
    /// Presented OTP differs from the most recent one
    CodeMismatch,
    /// Most recent OTP is past its expiry
    CodeExpired,
    /// Most recent OTP was guessed wrong too many times
    TooManyAttempts,
    /// Internal error
    InternalError(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    code: u16,
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::MalformedToken => "malformed_token",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::InsufficientPermissions => "insufficient_permissions",
            AuthError::NotFound(_) => "not_found",
            AuthError::BadCredentials => "bad_credentials",
            AuthError::CodeMismatch => "code_mismatch",
            AuthError::CodeExpired => "code_expired",
            AuthError::TooManyAttempts => "too_many_attempts",
            AuthError::InternalError(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader
            | AuthError::MalformedToken
            | AuthError::InvalidSignature
            | AuthError::TokenExpired => StatusCode::UNAUTHORIZED,
            AuthError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AuthError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthError::BadCredentials
            | AuthError::CodeMismatch
            | AuthError::CodeExpired
            | AuthError::TooManyAttempts => StatusCode::BAD_REQUEST,
            AuthError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingAuthHeader => write!(f, "Authorization header is required"),
            AuthError::InvalidAuthHeader => {
                write!(f, "Invalid authorization header format (expected 'Bearer <token>')")
            }
            AuthError::MalformedToken => write!(f, "Token is malformed"),
            AuthError::InvalidSignature => write!(f, "Token signature is invalid"),
            AuthError::TokenExpired => write!(f, "Token has expired"),
            AuthError::InsufficientPermissions => {
                write!(f, "Insufficient permissions for this operation")
            }
            AuthError::NotFound(what) => write!(f, "{what} not found"),
            AuthError::BadCredentials => write!(f, "Email or password is incorrect"),
            AuthError::CodeMismatch => write!(f, "Verification code does not match"),
            AuthError::CodeExpired => write!(f, "Verification code has expired"),
            AuthError::TooManyAttempts => {
                write!(f, "Too many wrong attempts, request a new verification code")
            }
            AuthError::InternalError(msg) => write!(f, "Internal authentication error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Malformed => AuthError::MalformedToken,
            TokenError::InvalidSignature => AuthError::InvalidSignature,
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::Signing(msg) => AuthError::InternalError(msg),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AuthError::NotFound(what),
            other => AuthError::InternalError(other.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let AuthError::InternalError(msg) = &self {
            tracing::error!(error = %msg, "Authentication internal error");
        }
        let body = Json(AuthErrorBody {
            code: status.as_u16(),
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn missing_auth_returns_401() {
        let response = AuthError::MissingAuthHeader.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error_code"], "missing_auth_header");
        assert_eq!(body["code"], 401);
    }

    #[tokio::test]
    async fn insufficient_permissions_returns_403() {
        let response = AuthError::InsufficientPermissions.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn otp_and_password_failures_are_bad_requests() {
        for err in [
            AuthError::BadCredentials,
            AuthError::CodeMismatch,
            AuthError::CodeExpired,
            AuthError::TooManyAttempts,
        ] {
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        }
        assert_eq!(
            AuthError::NotFound("Credential".into()).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn token_errors_map_to_unauthorized() {
        assert_eq!(AuthError::from(TokenError::Expired), AuthError::TokenExpired);
        assert_eq!(
            AuthError::from(TokenError::InvalidSignature),
            AuthError::InvalidSignature
        );
        assert_eq!(AuthError::from(TokenError::Malformed), AuthError::MalformedToken);
        assert_eq!(
            AuthError::from(TokenError::Signing("boom".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
