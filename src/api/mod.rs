// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{
        require_roles, AuthResponse, AuthenticatedUser, Role, RoleExtension, RoleGate,
        TokenCodec, ALL_ROLES,
    },
    models::{
        ApprovalRequest, CampaignProductRef, CampaignRequest, ImageRef, LoginRequest,
        MediaResponse, OtpRequest, PaginationMeta, ProductRequest, VerifyOtpRequest,
    },
    state::AppState,
    storage::{
        repository::{
            CampaignDetails, CredentialProfile, DetonatorDetails, MerchantDetails, ProductImage,
            StoredCampaign, StoredDetonator, StoredMerchant, StoredOrder, StoredProduct,
        },
        ApprovalStatus, MediaDestination,
    },
};

pub mod access;
pub mod auth;
pub mod campaigns;
pub mod detonators;
pub mod extract;
pub mod form;
pub mod health;
pub mod media;
pub mod merchants;
pub mod products;

/// Largest accepted request body. Registration forms carry two photos.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

const ADMINS: &[Role] = &[Role::SuperAdmin];
const SUPPLIERS: &[Role] = &[Role::SuperAdmin, Role::Merchant];
const ORGANIZERS: &[Role] = &[Role::SuperAdmin, Role::Detonator];

/// Put `routes` behind the session middleware, accepting only `allowed` roles.
fn gated(
    routes: Router<AppState>,
    codec: &Arc<TokenCodec>,
    allowed: &'static [Role],
) -> Router<AppState> {
    routes.route_layer(middleware::from_fn_with_state(
        RoleGate::new(codec.clone(), allowed),
        require_roles,
    ))
}

pub fn router(state: AppState) -> Router {
    let codec = &state.codec;

    let public = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/otp", post(auth::issue_otp))
        .route("/auth/verify-otp", post(auth::verify_otp))
        .route("/detonator/registration", post(detonators::register))
        .route("/merchant/registration", post(merchants::register))
        .route("/campaign/filter", get(campaigns::list));

    let signed_in = Router::new()
        .route("/detonator/filter", get(detonators::list))
        .route("/detonator/fetch/{id}", get(detonators::fetch))
        .route("/detonator/update/{id}", put(detonators::update))
        .route("/merchant/filter", get(merchants::list))
        .route("/merchant/fetch/{id}", get(merchants::fetch))
        .route("/merchant/update/{id}", put(merchants::update))
        .route("/merchant-product/filter", get(products::list))
        .route("/merchant-product/fetch/{id}", get(products::fetch))
        .route("/campaign/fetch/{id}", get(campaigns::fetch))
        .route("/media/upload", post(media::upload));

    let admin = Router::new()
        .route("/detonator/approval/{id}", put(detonators::approve))
        .route("/merchant/approval/{id}", put(merchants::approve));

    let suppliers = Router::new()
        .route("/merchant-product/create", post(products::create))
        .route("/merchant-product/update/{id}", put(products::update));

    let organizers = Router::new()
        .route("/campaign/create", post(campaigns::create))
        .route("/campaign/update/{id}", put(campaigns::update));

    let v1_routes = public
        .merge(gated(signed_in, codec, ALL_ROLES))
        .merge(gated(admin, codec, ADMINS))
        .merge(gated(suppliers, codec, SUPPLIERS))
        .merge(gated(organizers, codec, ORGANIZERS));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/api/v1", v1_routes)
        .nest_service("/storage", ServeDir::new(state.media.root()))
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        auth::login,
        auth::issue_otp,
        auth::verify_otp,
        detonators::register,
        detonators::list,
        detonators::fetch,
        detonators::approve,
        detonators::update,
        merchants::register,
        merchants::list,
        merchants::fetch,
        merchants::approve,
        merchants::update,
        products::create,
        products::list,
        products::fetch,
        products::update,
        campaigns::create,
        campaigns::list,
        campaigns::fetch,
        campaigns::update,
        media::upload
    ),
    components(
        schemas(
            AuthResponse,
            RoleExtension,
            AuthenticatedUser,
            Role,
            auth::OtpIssued,
            LoginRequest,
            OtpRequest,
            VerifyOtpRequest,
            ApprovalRequest,
            ApprovalStatus,
            ProductRequest,
            ImageRef,
            CampaignRequest,
            CampaignProductRef,
            MediaResponse,
            MediaDestination,
            PaginationMeta,
            CredentialProfile,
            StoredMerchant,
            MerchantDetails,
            StoredDetonator,
            DetonatorDetails,
            StoredProduct,
            ProductImage,
            StoredCampaign,
            StoredOrder,
            CampaignDetails,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Auth", description = "Password and one-time passcode login"),
        (name = "Detonators", description = "Campaign organizer accounts"),
        (name = "Merchants", description = "Product supplier accounts"),
        (name = "Products", description = "Merchant product catalogue"),
        (name = "Campaigns", description = "Donation campaigns and orders"),
        (name = "Media", description = "File uploads")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
pub(crate) mod test_support {
    //! Request builders and a one-shot sender against the full router.

    use axum::{
        body::{to_bytes, Body},
        http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::router;
    use crate::api::form::test_support::content_type;
    use crate::state::test_support::TestApp;

    pub(crate) fn json(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub(crate) fn get(uri: &str, bearer: Option<&str>) -> Request<Body> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        match bearer {
            Some(bearer) => request.with_bearer(bearer),
            None => request,
        }
    }

    pub(crate) fn multipart(
        method: Method,
        uri: &str,
        body: Vec<u8>,
        bearer: Option<&str>,
    ) -> Request<Body> {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, content_type())
            .body(Body::from(body))
            .unwrap();
        match bearer {
            Some(bearer) => request.with_bearer(bearer),
            None => request,
        }
    }

    pub(crate) trait WithBearer {
        /// Attach a full `Authorization` header value (`Bearer ...`).
        fn with_bearer(self, bearer: &str) -> Self;
    }

    impl WithBearer for Request<Body> {
        fn with_bearer(mut self, bearer: &str) -> Self {
            self.headers_mut().insert(
                header::AUTHORIZATION,
                HeaderValue::from_str(bearer).unwrap(),
            );
            self
        }
    }

    /// Run one request through a fresh router. Non-JSON bodies read as `Null`.
    pub(crate) async fn send(
        app: &TestApp,
        request: Request<Body>,
    ) -> (StatusCode, HeaderMap, Value) {
        let response = router(app.state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, body)
    }
}
