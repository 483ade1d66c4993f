// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session middleware.
//!
//! Applied per route group with [`axum::middleware::from_fn_with_state`] and a
//! [`RoleGate`] naming the roles allowed on that group:
//!
//! ```rust,ignore
//! let gate = RoleGate::new(codec.clone(), &[Role::SuperAdmin]);
//! let router = Router::new()
//!     .route("/approval/{id}", put(approve))
//!     .route_layer(middleware::from_fn_with_state(gate, require_roles));
//! ```
//!
//! On success the request carries an [`AuthenticatedUser`] extension and the
//! response carries an `Authorization` header: the presented one, or a
//! reissued token when the presented one was close to expiry.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use super::{AuthError, AuthenticatedUser, Role, TokenCodec};

/// Roles accepted on a route group, with the codec used to check them.
#[derive(Clone)]
pub struct RoleGate {
    codec: Arc<TokenCodec>,
    allowed: &'static [Role],
}

impl RoleGate {
    pub fn new(codec: Arc<TokenCodec>, allowed: &'static [Role]) -> Self {
        Self { codec, allowed }
    }
}

/// Authenticate the bearer token and enforce the gate's role allow-list.
pub async fn require_roles(
    State(gate): State<RoleGate>,
    mut request: Request,
    next: Next,
) -> Response {
    let (user, authorization) = match authorize(&gate, request.headers()) {
        Ok(granted) => granted,
        Err(e) => {
            tracing::debug!(
                path = %request.uri().path(),
                error_code = e.error_code(),
                "Request rejected by session middleware"
            );
            return e.into_response();
        }
    };

    request.extensions_mut().insert(user);
    let mut response = next.run(request).await;
    response.headers_mut().insert(AUTHORIZATION, authorization);
    response
}

fn bearer_token(raw: &str) -> Result<&str, AuthError> {
    let token = raw
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidAuthHeader)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::InvalidAuthHeader);
    }
    Ok(token)
}

/// Validate the request's token and resolve the caller.
///
/// Returns the user and the `Authorization` value to send back.
fn authorize(
    gate: &RoleGate,
    headers: &HeaderMap,
) -> Result<(AuthenticatedUser, HeaderValue), AuthError> {
    let presented = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?;
    let raw = presented
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;
    let token = bearer_token(raw)?;

    let claims = gate.codec.parse(token)?;
    let user_id = claims.subject_id().ok_or(AuthError::MalformedToken)?;

    let (authorization, expires_at) = if gate.codec.needs_refresh(&claims, Utc::now()) {
        let issued = gate.codec.refresh(&claims)?;
        let value = HeaderValue::from_str(&issued.bearer())
            .map_err(|e| AuthError::InternalError(e.to_string()))?;
        tracing::debug!(user_id, "Session token refreshed");
        (value, issued.expires_at.timestamp())
    } else {
        (presented.clone(), claims.exp)
    };

    let role = gate
        .codec
        .match_role(&claims.session, gate.allowed)
        .ok_or(AuthError::InsufficientPermissions)?;

    Ok((
        AuthenticatedUser {
            user_id,
            role,
            expires_at,
        },
        authorization,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Auth;
    use axum::{
        body::{to_bytes, Body},
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Json, Router,
    };
    use chrono::Duration;
    use tower::ServiceExt;

    fn codec() -> Arc<TokenCodec> {
        Arc::new(TokenCodec::new(
            b"middleware-secret",
            Duration::hours(1),
            Duration::minutes(10),
        ))
    }

    async fn whoami(Auth(user): Auth) -> Json<AuthenticatedUser> {
        Json(user)
    }

    fn app(codec: Arc<TokenCodec>, allowed: &'static [Role]) -> Router {
        Router::new()
            .route("/probe", get(whoami))
            .route_layer(middleware::from_fn_with_state(
                RoleGate::new(codec, allowed),
                require_roles,
            ))
    }

    async fn call(router: Router, authorization: Option<&str>) -> Response {
        let mut builder = HttpRequest::builder().uri("/probe");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        router
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn missing_or_malformed_header_is_unauthorized() {
        let codec = codec();
        for header in [None, Some("Token abc"), Some("Bearer "), Some("Bearer garbage")] {
            let response = call(app(codec.clone(), &[Role::Merchant]), header).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{header:?}");
        }
    }

    #[tokio::test]
    async fn expired_and_foreign_tokens_are_unauthorized() {
        let codec = codec();
        let tag = codec.session_tag(Role::Merchant);
        let expired = codec
            .issue(1, &tag, Utc::now() - Duration::seconds(1))
            .unwrap();
        let response = call(app(codec.clone(), &[Role::Merchant]), Some(&expired.bearer())).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let foreign = TokenCodec::new(b"other", Duration::hours(1), Duration::minutes(10))
            .issue_for_role(1, Role::Merchant)
            .unwrap();
        let response = call(app(codec, &[Role::Merchant]), Some(&foreign.bearer())).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn role_outside_allow_list_is_forbidden() {
        let codec = codec();
        let issued = codec.issue_for_role(4, Role::Merchant).unwrap();

        let response = call(app(codec.clone(), &[Role::Detonator]), Some(&issued.bearer())).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = call(
            app(codec, &[Role::Detonator, Role::Merchant]),
            Some(&issued.bearer()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn fresh_token_is_echoed_and_user_attached() {
        let codec = codec();
        let issued = codec.issue_for_role(11, Role::Detonator).unwrap();
        let bearer = issued.bearer();

        let response = call(app(codec, &[Role::Detonator]), Some(&bearer)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[AUTHORIZATION], bearer.as_str());

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let user: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(user["user_id"], 11);
        assert_eq!(user["role"], "detonator");
    }

    #[tokio::test]
    async fn token_near_expiry_is_reissued() {
        let codec = codec();
        let tag = codec.session_tag(Role::SuperAdmin);
        let short = codec
            .issue(2, &tag, Utc::now() + Duration::minutes(3))
            .unwrap();

        let response = call(app(codec.clone(), &[Role::SuperAdmin]), Some(&short.bearer())).await;
        assert_eq!(response.status(), StatusCode::OK);

        let returned = response.headers()[AUTHORIZATION].to_str().unwrap();
        assert_ne!(returned, short.bearer());
        let token = returned.strip_prefix("Bearer ").unwrap();
        let claims = codec.parse(token).unwrap();
        assert!(claims.exp > short.expires_at.timestamp());
        assert_eq!(claims.sub, "2");
        assert_eq!(claims.session, tag);
    }

    #[tokio::test]
    async fn non_numeric_subject_is_malformed() {
        let codec = codec();
        let claims = crate::auth::SessionClaims {
            sub: "someone".into(),
            session: codec.session_tag(Role::Merchant),
            iat: Utc::now().timestamp(),
            exp: (Utc::now() + Duration::hours(1)).timestamp(),
        };
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(b"middleware-secret"),
        )
        .unwrap();

        let response = call(app(codec, &[Role::Merchant]), Some(&format!("Bearer {token}"))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
