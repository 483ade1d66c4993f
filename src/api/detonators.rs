// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Detonator registration, approval, profile update and lookup.

use axum::extract::{Multipart, Path, Query, State};
use validator::Validate;

use super::{
    access::ensure_owner,
    extract::ValidatedJson,
    form::{discard_media, profile_changes, save_photo, Form},
};
use crate::{
    auth::{Auth, Role},
    error::ApiError,
    models::{ApiResponse, ApprovalRequest, PageQuery},
    state::AppState,
    storage::{
        repository::{
            CredentialRepository, DetonatorChanges, DetonatorDetails, DetonatorRepository,
            NewCredential, NewDetonator, ProfileChanges, StoredOtp,
        },
        MediaDestination,
    },
};

/// Text fields of the detonator registration form.
#[derive(Debug, Validate)]
pub struct DetonatorRegistration {
    #[validate(length(min = 1, message = "fullname is required"))]
    pub fullname: String,
    #[validate(length(min = 1, message = "phone is required"))]
    pub phone: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
    #[validate(length(min = 1, message = "ktp_number is required"))]
    pub ktp_number: String,
}

impl DetonatorRegistration {
    fn from_form(form: &mut Form) -> Self {
        Self {
            fullname: form.text("fullname"),
            phone: form.text("phone"),
            email: form.text("email"),
            password: form.text("password"),
            ktp_number: form.text("ktp_number"),
        }
    }
}

fn create_detonator(
    state: &AppState,
    registration: DetonatorRegistration,
    password_hash: String,
    self_photo: String,
    ktp_photo: String,
) -> Result<(DetonatorDetails, StoredOtp), ApiError> {
    let txn = state.db.begin_write()?;
    let credential = CredentialRepository::new(&txn).insert(NewCredential {
        fullname: registration.fullname,
        email: registration.email,
        phone: registration.phone,
        password_hash,
        role: Role::Detonator,
    })?;

    let detonators = DetonatorRepository::new(&txn);
    let detonator = detonators.insert(NewDetonator {
        user_id: credential.id,
        ktp_number: registration.ktp_number,
        self_photo,
        ktp_photo,
    })?;
    let otp = state.auth.stage_otp(&txn, &credential.email)?;
    let details = detonators.details(detonator.id)?;
    txn.commit()?;

    Ok((details, otp))
}

#[utoipa::path(
    post,
    path = "/api/v1/detonator/registration",
    request_body(content_type = "multipart/form-data", description = "Profile fields plus self_photo and ktp_photo files"),
    tag = "Detonators",
    responses(
        (status = 201, body = ApiResponse<DetonatorDetails>),
        (status = 400, description = "Missing field or photo"),
        (status = 409, description = "Email or phone already registered")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<ApiResponse<DetonatorDetails>, ApiError> {
    let mut form = Form::read(multipart).await?;
    let registration = DetonatorRegistration::from_form(&mut form);
    registration.validate()?;
    let self_photo_file = form.require_file("self_photo")?;
    let ktp_photo_file = form.require_file("ktp_photo")?;

    let password_hash = state.auth.hash_password(&registration.password).await?;

    let self_photo =
        save_photo(&state, MediaDestination::Detonator, &self_photo_file, &[]).await?;
    let ktp_photo = save_photo(
        &state,
        MediaDestination::Detonator,
        &ktp_photo_file,
        std::slice::from_ref(&self_photo),
    )
    .await?;
    let saved = [self_photo.clone(), ktp_photo.clone()];

    match create_detonator(&state, registration, password_hash, self_photo, ktp_photo) {
        Ok((details, otp)) => {
            state.auth.dispatch_otp(&otp);
            tracing::info!(detonator_id = details.detonator.id, "Detonator registered");
            Ok(ApiResponse::created("Detonator registered", details))
        }
        Err(e) => {
            discard_media(&state, &saved).await;
            Err(e)
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/detonator/filter",
    params(PageQuery),
    tag = "Detonators",
    security(("bearer_auth" = [])),
    responses((status = 200, body = ApiResponse<Vec<DetonatorDetails>>))
)]
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<ApiResponse<Vec<DetonatorDetails>>, ApiError> {
    let page = query.page();
    let read = state.db.begin_read()?;
    let paged = DetonatorRepository::new(&read).list(page)?;
    Ok(ApiResponse::page("Detonators listed", page, paged))
}

#[utoipa::path(
    get,
    path = "/api/v1/detonator/fetch/{id}",
    params(("id" = u64, Path, description = "Detonator ID")),
    tag = "Detonators",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, body = ApiResponse<DetonatorDetails>),
        (status = 404, description = "No such detonator")
    )
)]
pub async fn fetch(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<ApiResponse<DetonatorDetails>, ApiError> {
    let read = state.db.begin_read()?;
    let details = DetonatorRepository::new(&read).details(id)?;
    Ok(ApiResponse::ok("Detonator fetched", details))
}

#[utoipa::path(
    put,
    path = "/api/v1/detonator/approval/{id}",
    params(("id" = u64, Path, description = "Detonator ID")),
    request_body = ApprovalRequest,
    tag = "Detonators",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, body = ApiResponse<DetonatorDetails>),
        (status = 403, description = "Superadmin only"),
        (status = 404, description = "No such detonator")
    )
)]
pub async fn approve(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<u64>,
    ValidatedJson(request): ValidatedJson<ApprovalRequest>,
) -> Result<ApiResponse<DetonatorDetails>, ApiError> {
    let txn = state.db.begin_write()?;
    let detonators = DetonatorRepository::new(&txn);
    detonators.set_approval(id, request.status, request.note)?;
    let details = detonators.details(id)?;
    txn.commit()?;

    tracing::info!(detonator_id = id, status = ?request.status, by = user.user_id, "Detonator reviewed");
    Ok(ApiResponse::ok("Detonator approval updated", details))
}

fn persist_update(
    state: &AppState,
    credential_id: u64,
    id: u64,
    profile: ProfileChanges,
    changes: DetonatorChanges,
) -> Result<DetonatorDetails, ApiError> {
    let txn = state.db.begin_write()?;
    CredentialRepository::new(&txn).update_profile(credential_id, profile)?;
    let detonators = DetonatorRepository::new(&txn);
    detonators.update(id, changes)?;
    let details = detonators.details(id)?;
    txn.commit()?;
    Ok(details)
}

#[utoipa::path(
    put,
    path = "/api/v1/detonator/update/{id}",
    params(("id" = u64, Path, description = "Detonator ID")),
    request_body(content_type = "multipart/form-data", description = "Any profile field; blank fields are left unchanged"),
    tag = "Detonators",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, body = ApiResponse<DetonatorDetails>),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "No such detonator"),
        (status = 409, description = "Email or phone already registered")
    )
)]
pub async fn update(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<u64>,
    multipart: Multipart,
) -> Result<ApiResponse<DetonatorDetails>, ApiError> {
    let current = DetonatorRepository::new(&state.db.begin_read()?).get(id)?;
    ensure_owner(&user, current.user_id)?;

    let mut form = Form::read(multipart).await?;
    let profile = profile_changes(&state, &mut form).await?;
    let mut changes = DetonatorChanges {
        ktp_number: form.optional("ktp_number"),
        ..Default::default()
    };

    let mut saved = Vec::new();
    let mut replaced = Vec::new();
    if let Some(file) = form.file("self_photo") {
        let path = save_photo(&state, MediaDestination::Detonator, &file, &saved).await?;
        saved.push(path.clone());
        changes.self_photo = Some(path);
        replaced.push(current.self_photo.clone());
    }
    if let Some(file) = form.file("ktp_photo") {
        let path = save_photo(&state, MediaDestination::Detonator, &file, &saved).await?;
        saved.push(path.clone());
        changes.ktp_photo = Some(path);
        replaced.push(current.ktp_photo.clone());
    }
    replaced.retain(|p| !p.is_empty());

    match persist_update(&state, current.user_id, id, profile, changes) {
        Ok(details) => {
            discard_media(&state, &replaced).await;
            Ok(ApiResponse::ok("Detonator updated", details))
        }
        Err(e) => {
            discard_media(&state, &saved).await;
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::api::form::test_support::multipart_body;
    use crate::api::test_support::{get, json, multipart, send, WithBearer};
    use crate::auth::Role;
    use crate::state::test_support::{test_app, TestApp};
    use axum::http::{Method, StatusCode};
    use serde_json::{json, Value};

    const FIELDS: &[(&str, &str)] = &[
        ("fullname", "Budi"),
        ("phone", "0821"),
        ("email", "budi@x.com"),
        ("password", "secret"),
        ("ktp_number", "3201"),
    ];

    async fn register(app: &TestApp, fields: &[(&str, &str)]) -> (StatusCode, Value) {
        let body = multipart_body(
            fields,
            &[("self_photo", "me.jpg", &b"jpg"[..]), ("ktp_photo", "ktp.jpg", &b"ktp"[..])],
        );
        let (status, _, body) =
            send(app, multipart(Method::POST, "/api/v1/detonator/registration", body, None)).await;
        (status, body)
    }

    #[tokio::test]
    async fn registration_then_login_reports_waiting_status() {
        let app = test_app().await;
        let (status, body) = register(&app, FIELDS).await;
        assert_eq!(status, StatusCode::CREATED);
        let detonator_id = body["body"]["id"].as_u64().unwrap();
        assert!(body["body"]["self_photo"]
            .as_str()
            .unwrap()
            .starts_with("detonator/"));

        let (status, _, body) = send(
            &app,
            json(
                Method::POST,
                "/api/v1/auth/login",
                json!({"email": "budi@x.com", "password": "secret"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["body"]["user"]["id"], detonator_id);
        assert_eq!(body["body"]["user"]["status"], "waiting");
    }

    #[tokio::test]
    async fn duplicate_phone_is_conflict() {
        let app = test_app().await;
        register(&app, FIELDS).await;

        let mut second: Vec<(&str, &str)> = FIELDS.to_vec();
        second[2] = ("email", "other@x.com");
        let (status, _) = register(&app, &second).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn approval_and_listing() {
        let app = test_app().await;
        let (_, body) = register(&app, FIELDS).await;
        let id = body["body"]["id"].as_u64().unwrap();
        let admin = app.bearer(1, Role::SuperAdmin);

        let (status, _, body) = send(
            &app,
            json(
                Method::PUT,
                &format!("/api/v1/detonator/approval/{id}"),
                json!({"status": "rejected", "note": "blurry KTP"}),
            )
            .with_bearer(&admin),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["body"]["status"], "rejected");

        let (status, _, body) = send(&app, get("/api/v1/detonator/filter", Some(&admin))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["meta"]["total"], 1);
        assert_eq!(body["body"][0]["note"], "blurry KTP");
        assert_eq!(body["body"][0]["oauth"]["email"], "budi@x.com");
    }

    #[tokio::test]
    async fn update_changes_only_given_fields() {
        let app = test_app().await;
        let (_, body) = register(&app, FIELDS).await;
        let id = body["body"]["id"].as_u64().unwrap();
        let owner = body["body"]["user_id"].as_u64().unwrap();

        let form = multipart_body(&[("ktp_number", "9999"), ("email", "")], &[]);
        let (status, _, body) = send(
            &app,
            multipart(
                Method::PUT,
                &format!("/api/v1/detonator/update/{id}"),
                form,
                Some(&app.bearer(owner, Role::Detonator)),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["body"]["ktp_number"], "9999");
        assert_eq!(body["body"]["oauth"]["email"], "budi@x.com");
    }

    #[tokio::test]
    async fn update_rejects_invalid_email() {
        let app = test_app().await;
        let (_, body) = register(&app, FIELDS).await;
        let id = body["body"]["id"].as_u64().unwrap();
        let owner = body["body"]["user_id"].as_u64().unwrap();

        let form = multipart_body(&[("email", "not-an-email")], &[]);
        let (status, _, _) = send(
            &app,
            multipart(
                Method::PUT,
                &format!("/api/v1/detonator/update/{id}"),
                form,
                Some(&app.bearer(owner, Role::Detonator)),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
