// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Merchant registration, approval, profile update and lookup.

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
            CredentialRepository, MerchantChanges, MerchantDetails, MerchantRepository,
            NewCredential, NewMerchant, ProfileChanges, StoredOtp,
        },
        MediaDestination,
    },
};

/// Text fields of the merchant registration form.
#[derive(Debug, Validate)]
pub struct MerchantRegistration {
    #[validate(length(min = 1, message = "fullname is required"))]
    pub fullname: String,
    #[validate(length(min = 1, message = "phone is required"))]
    pub phone: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
    #[validate(length(min = 1))]
    pub province: String,
    #[validate(length(min = 1))]
    pub city: String,
    #[validate(length(min = 1))]
    pub sub_district: String,
    #[validate(length(min = 1))]
    pub postal_code: String,
    #[validate(length(min = 1))]
    pub address: String,
    #[validate(length(min = 1))]
    pub latitude: String,
    #[validate(length(min = 1))]
    pub longitude: String,
    #[validate(length(min = 1))]
    pub no_link_aja: String,
    #[validate(length(min = 1))]
    pub ktp_number: String,
}

impl MerchantRegistration {
    fn from_form(form: &mut Form) -> Self {
        Self {
            fullname: form.text("fullname"),
            phone: form.text("phone"),
            email: form.text("email"),
            password: form.text("password"),
            province: form.text("province"),
            city: form.text("city"),
            sub_district: form.text("sub_district"),
            postal_code: form.text("postal_code"),
            address: form.text("address"),
            latitude: form.text("latitude"),
            longitude: form.text("longitude"),
            no_link_aja: form.text("no_link_aja"),
            ktp_number: form.text("ktp_number"),
        }
    }
}

fn create_merchant(
    state: &AppState,
    registration: MerchantRegistration,
    password_hash: String,
    self_photo: String,
    ktp_photo: String,
) -> Result<(MerchantDetails, StoredOtp), ApiError> {
    let txn = state.db.begin_write()?;
    let credential = CredentialRepository::new(&txn).insert(NewCredential {
        fullname: registration.fullname,
        email: registration.email,
        phone: registration.phone,
        password_hash,
        role: Role::Merchant,
    })?;

    let merchants = MerchantRepository::new(&txn);
    let merchant = merchants.insert(NewMerchant {
        user_id: credential.id,
        province: registration.province,
        city: registration.city,
        sub_district: registration.sub_district,
        postal_code: registration.postal_code,
        address: registration.address,
        latitude: registration.latitude,
        longitude: registration.longitude,
        no_link_aja: registration.no_link_aja,
        ktp_number: registration.ktp_number,
        self_photo,
        ktp_photo,
    })?;
    let otp = state.auth.stage_otp(&txn, &credential.email)?;
    let details = merchants.details(merchant.id)?;
    txn.commit()?;

    Ok((details, otp))
}

#[utoipa::path(
    post,
    path = "/api/v1/merchant/registration",
    request_body(content_type = "multipart/form-data", description = "Profile fields plus self_photo and ktp_photo files"),
    tag = "Merchants",
    responses(
        (status = 201, body = ApiResponse<MerchantDetails>),
        (status = 400, description = "Missing field or photo"),
        (status = 409, description = "Email or phone already registered")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<ApiResponse<MerchantDetails>, ApiError> {
    let mut form = Form::read(multipart).await?;
    let registration = MerchantRegistration::from_form(&mut form);
    registration.validate()?;
    let self_photo_file = form.require_file("self_photo")?;
    let ktp_photo_file = form.require_file("ktp_photo")?;

    let password_hash = state.auth.hash_password(&registration.password).await?;

    let self_photo = save_photo(&state, MediaDestination::Merchant, &self_photo_file, &[]).await?;
    let ktp_photo = save_photo(
        &state,
        MediaDestination::Merchant,
        &ktp_photo_file,
        std::slice::from_ref(&self_photo),
    )
    .await?;
    let saved = [self_photo.clone(), ktp_photo.clone()];

    match create_merchant(&state, registration, password_hash, self_photo, ktp_photo) {
        Ok((details, otp)) => {
            state.auth.dispatch_otp(&otp);
            tracing::info!(merchant_id = details.merchant.id, "Merchant registered");
            Ok(ApiResponse::created("Merchant registered", details))
        }
        Err(e) => {
            discard_media(&state, &saved).await;
            Err(e)
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/merchant/filter",
    params(PageQuery),
    tag = "Merchants",
    security(("bearer_auth" = [])),
    responses((status = 200, body = ApiResponse<Vec<MerchantDetails>>))
)]
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<ApiResponse<Vec<MerchantDetails>>, ApiError> {
    let page = query.page();
    let read = state.db.begin_read()?;
    let paged = MerchantRepository::new(&read).list(page)?;
    Ok(ApiResponse::page("Merchants listed", page, paged))
}

#[utoipa::path(
    get,
    path = "/api/v1/merchant/fetch/{id}",
    params(("id" = u64, Path, description = "Merchant ID")),
    tag = "Merchants",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, body = ApiResponse<MerchantDetails>),
        (status = 404, description = "No such merchant")
    )
)]
pub async fn fetch(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<ApiResponse<MerchantDetails>, ApiError> {
    let read = state.db.begin_read()?;
    let details = MerchantRepository::new(&read).details(id)?;
    Ok(ApiResponse::ok("Merchant fetched", details))
}

#[utoipa::path(
    put,
    path = "/api/v1/merchant/approval/{id}",
    params(("id" = u64, Path, description = "Merchant ID")),
    request_body = ApprovalRequest,
    tag = "Merchants",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, body = ApiResponse<MerchantDetails>),
        (status = 403, description = "Superadmin only"),
        (status = 404, description = "No such merchant")
    )
)]
pub async fn approve(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<u64>,
    ValidatedJson(request): ValidatedJson<ApprovalRequest>,
) -> Result<ApiResponse<MerchantDetails>, ApiError> {
    let txn = state.db.begin_write()?;
    let merchants = MerchantRepository::new(&txn);
    merchants.set_approval(id, request.status, request.note)?;
    let details = merchants.details(id)?;
    txn.commit()?;

    tracing::info!(merchant_id = id, status = ?request.status, by = user.user_id, "Merchant reviewed");
    Ok(ApiResponse::ok("Merchant approval updated", details))
}

#[utoipa::path(
    put,
    path = "/api/v1/merchant/update/{id}",
    params(("id" = u64, Path, description = "Merchant ID")),
    request_body(content_type = "multipart/form-data", description = "Any profile field; blank fields are left unchanged"),
    tag = "Merchants",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, body = ApiResponse<MerchantDetails>),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "No such merchant"),
        (status = 409, description = "Email or phone already registered")
    )
)]
pub async fn update(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<u64>,
    multipart: Multipart,
) -> Result<ApiResponse<MerchantDetails>, ApiError> {
    let current = MerchantRepository::new(&state.db.begin_read()?).get(id)?;
    ensure_owner(&user, current.user_id)?;

    let mut form = Form::read(multipart).await?;
    let profile = profile_changes(&state, &mut form).await?;
    let mut changes = MerchantChanges {
        province: form.optional("province"),
        city: form.optional("city"),
        sub_district: form.optional("sub_district"),
        postal_code: form.optional("postal_code"),
        address: form.optional("address"),
        latitude: form.optional("latitude"),
        longitude: form.optional("longitude"),
        no_link_aja: form.optional("no_link_aja"),
        ktp_number: form.optional("ktp_number"),
        ..Default::default()
    };

    let mut saved = Vec::new();
    if let Some(file) = form.file("self_photo") {
        let path = save_photo(&state, MediaDestination::Merchant, &file, &saved).await?;
        saved.push(path.clone());
        changes.self_photo = Some(path);
    }
    if let Some(file) = form.file("ktp_photo") {
        let path = save_photo(&state, MediaDestination::Merchant, &file, &saved).await?;
        saved.push(path.clone());
        changes.ktp_photo = Some(path);
    }
    let replaced: Vec<String> = [
        changes.self_photo.as_ref().map(|_| current.self_photo.clone()),
        changes.ktp_photo.as_ref().map(|_| current.ktp_photo.clone()),
    ]
    .into_iter()
    .flatten()
    .filter(|p| !p.is_empty())
    .collect();

    let result = persist_update(&state, current.user_id, id, profile, changes);

    match result {
        Ok(details) => {
            discard_media(&state, &replaced).await;
            Ok(ApiResponse::ok("Merchant updated", details))
        }
        Err(e) => {
            discard_media(&state, &saved).await;
            Err(e)
        }
    }
}

fn persist_update(
    state: &AppState,
    credential_id: u64,
    id: u64,
    profile: ProfileChanges,
    changes: MerchantChanges,
) -> Result<MerchantDetails, ApiError> {
    let txn = state.db.begin_write()?;
    CredentialRepository::new(&txn).update_profile(credential_id, profile)?;
    let merchants = MerchantRepository::new(&txn);
    merchants.update(id, changes)?;
    let details = merchants.details(id)?;
    txn.commit()?;
    Ok(details)
}

#[cfg(test)]
mod tests {
    use crate::api::form::test_support::multipart_body;
    use crate::api::test_support::{get, json, multipart, send, WithBearer};
    use crate::auth::Role;
    use crate::state::test_support::{test_app, TestApp};
    use crate::storage::repository::{MerchantRepository, OtpRepository};
    use axum::http::{Method, StatusCode};
    use serde_json::{json, Value};

    const FIELDS: &[(&str, &str)] = &[
        ("fullname", "Warung Ayu"),
        ("phone", "0812"),
        ("email", "shop@x.com"),
        ("password", "secret"),
        ("province", "Jawa Barat"),
        ("city", "Bandung"),
        ("sub_district", "Coblong"),
        ("postal_code", "40132"),
        ("address", "Jl. Dago 1"),
        ("latitude", "-6.88"),
        ("longitude", "107.61"),
        ("no_link_aja", "0812"),
        ("ktp_number", "3273"),
    ];

    async fn register(app: &TestApp, fields: &[(&str, &str)]) -> (StatusCode, Value) {
        let body = multipart_body(
            fields,
            &[("self_photo", "me.jpg", &b"jpg"[..]), ("ktp_photo", "ktp.png", &b"png"[..])],
        );
        let (status, _, body) =
            send(app, multipart(Method::POST, "/api/v1/merchant/registration", body, None)).await;
        (status, body)
    }

    #[tokio::test]
    async fn registration_creates_credential_merchant_and_code() {
        let app = test_app().await;
        let (status, body) = register(&app, FIELDS).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["body"]["status"], "waiting");
        assert_eq!(body["body"]["oauth"]["email"], "shop@x.com");
        assert_eq!(body["body"]["oauth"]["role"], "merchant");

        let self_photo = body["body"]["self_photo"].as_str().unwrap();
        assert!(self_photo.starts_with("merchant/"));
        assert!(self_photo.ends_with(".jpg"));
        assert!(app.state.media.root().join(self_photo).exists());

        let read = app.state.db.begin_read().unwrap();
        assert!(OtpRepository::new(&read).latest_for("shop@x.com").unwrap().is_some());
    }

    #[tokio::test]
    async fn duplicate_email_leaves_nothing_behind() {
        let app = test_app().await;
        let (status, _) = register(&app, FIELDS).await;
        assert_eq!(status, StatusCode::CREATED);

        let mut second: Vec<(&str, &str)> = FIELDS.to_vec();
        for field in second.iter_mut() {
            if field.0 == "phone" {
                field.1 = "0899";
            }
        }
        let (status, body) = register(&app, &second).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error_code"], "conflict");

        let files = std::fs::read_dir(app.state.media.root().join("merchant"))
            .unwrap()
            .count();
        assert_eq!(files, 2);

        let (_, _, listing) = send(
            &app,
            get("/api/v1/merchant/filter", Some(&app.bearer(1, Role::SuperAdmin))),
        )
        .await;
        assert_eq!(listing["meta"]["total"], 1);
    }

    #[tokio::test]
    async fn registration_requires_photos_and_fields() {
        let app = test_app().await;
        let body = multipart_body(FIELDS, &[("self_photo", "me.jpg", &b"jpg"[..])]);
        let (status, _, body) =
            send(&app, multipart(Method::POST, "/api/v1/merchant/registration", body, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "ktp_photo is required");

        let (status, body) = register(&app, &FIELDS[1..]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["details"].get("fullname").is_some());
    }

    #[tokio::test]
    async fn approval_is_superadmin_only() {
        let app = test_app().await;
        let (_, body) = register(&app, FIELDS).await;
        let id = body["body"]["id"].as_u64().unwrap();
        let owner = body["body"]["user_id"].as_u64().unwrap();
        let path = format!("/api/v1/merchant/approval/{id}");

        let (status, _, _) = send(
            &app,
            json(Method::PUT, &path, json!({"status": "approved"}))
                .with_bearer(&app.bearer(owner, Role::Merchant)),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _, body) = send(
            &app,
            json(Method::PUT, &path, json!({"status": "approved", "note": "looks good"}))
                .with_bearer(&app.bearer(99, Role::SuperAdmin)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["body"]["status"], "approved");
        assert_eq!(body["body"]["note"], "looks good");
    }

    #[tokio::test]
    async fn owner_updates_profile_and_address() {
        let app = test_app().await;
        let (_, body) = register(&app, FIELDS).await;
        let id = body["body"]["id"].as_u64().unwrap();
        let owner = body["body"]["user_id"].as_u64().unwrap();
        let old_photo = body["body"]["self_photo"].as_str().unwrap().to_string();

        let form = multipart_body(
            &[("fullname", "Warung Ayu Baru"), ("city", "Cimahi"), ("address", "")],
            &[("self_photo", "new.jpg", &b"new"[..])],
        );
        let (status, _, body) = send(
            &app,
            multipart(
                Method::PUT,
                &format!("/api/v1/merchant/update/{id}"),
                form,
                Some(&app.bearer(owner, Role::Merchant)),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["body"]["city"], "Cimahi");
        assert_eq!(body["body"]["address"], "Jl. Dago 1");
        assert_eq!(body["body"]["oauth"]["fullname"], "Warung Ayu Baru");
        assert_ne!(body["body"]["self_photo"], old_photo.as_str());
        assert!(!app.state.media.root().join(&old_photo).exists());
    }

    #[tokio::test]
    async fn other_accounts_cannot_update() {
        let app = test_app().await;
        let (_, body) = register(&app, FIELDS).await;
        let id = body["body"]["id"].as_u64().unwrap();
        let (_, bearer) = app.credential("other@x.com", "0833", Role::Merchant);

        let form = multipart_body(&[("city", "Cimahi")], &[]);
        let (status, _, _) = send(
            &app,
            multipart(Method::PUT, &format!("/api/v1/merchant/update/{id}"), form, Some(&bearer)),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let read = app.state.db.begin_read().unwrap();
        assert_eq!(MerchantRepository::new(&read).get(id).unwrap().city, "Bandung");
    }

    #[tokio::test]
    async fn fetch_and_list_require_a_session() {
        let app = test_app().await;
        let (_, body) = register(&app, FIELDS).await;
        let id = body["body"]["id"].as_u64().unwrap();

        let (status, _, _) = send(&app, get(&format!("/api/v1/merchant/fetch/{id}"), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let bearer = app.bearer(5, Role::Detonator);
        let (status, _, body) =
            send(&app, get(&format!("/api/v1/merchant/fetch/{id}"), Some(&bearer))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["body"]["products"], json!([]));

        let (status, _, _) = send(&app, get("/api/v1/merchant/fetch/999", Some(&bearer))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
