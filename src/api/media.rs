// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::extract::{Multipart, State};

use super::form::Form;
use crate::{
    auth::Auth,
    error::ApiError,
    models::{ApiResponse, MediaResponse},
    state::AppState,
    storage::MediaDestination,
};

/// Store one file under a destination folder.
///
/// The returned `file_url` is relative to `/storage/` and is what product,
/// campaign and profile records reference.
#[utoipa::path(
    post,
    path = "/api/v1/media/upload",
    request_body(content_type = "multipart/form-data", description = "`destination` (campaign, merchant, detonator, product) and `file`"),
    tag = "Media",
    security(("bearer_auth" = [])),
    responses(
        (status = 201, body = ApiResponse<MediaResponse>),
        (status = 400, description = "Unknown destination or missing file")
    )
)]
pub async fn upload(
    State(state): State<AppState>,
    Auth(user): Auth,
    multipart: Multipart,
) -> Result<ApiResponse<MediaResponse>, ApiError> {
    let mut form = Form::read(multipart).await?;
    let destination: MediaDestination = form.text("destination").parse()?;
    let file = form.require_file("file")?;

    let file_url = state
        .media
        .save(destination, &file.file_name, &file.bytes)
        .await?;

    tracing::info!(user_id = user.user_id, path = %file_url, "Media uploaded");
    Ok(ApiResponse::created(
        "File uploaded",
        MediaResponse {
            destination: destination.as_str().to_string(),
            file_url,
        },
    ))
}
