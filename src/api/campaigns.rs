// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Donation campaigns and their product orders.

use axum::extract::{Path, Query, State};

use super::{access::ensure_detonator_owner, extract::ValidatedJson};
use crate::{
    auth::Auth,
    error::ApiError,
    models::{ApiResponse, CampaignQuery, CampaignRequest},
    state::AppState,
    storage::repository::{CampaignDetails, CampaignInput, CampaignRepository},
};

/// Split a request into the campaign fields and the ordered product IDs.
fn into_parts(request: CampaignRequest) -> (CampaignInput, Vec<u64>) {
    let product_ids = request
        .products
        .iter()
        .map(|p| p.merchant_product_id)
        .collect();
    let input = CampaignInput {
        detonator_id: request.detonator_id,
        event_name: request.event_name,
        event_type: request.event_type,
        event_date: request.event_date,
        event_time: request.event_time,
        description: request.description,
        donation_target: request.donation_target,
        province: request.province,
        city: request.city,
        sub_district: request.sub_district,
        postal_code: request.postal_code,
        address: request.address,
        latitude: request.latitude,
        longitude: request.longitude,
        image_url: request.image_url,
    };
    (input, product_ids)
}

#[utoipa::path(
    post,
    path = "/api/v1/campaign/create",
    request_body = CampaignRequest,
    tag = "Campaigns",
    security(("bearer_auth" = [])),
    responses(
        (status = 201, body = ApiResponse<CampaignDetails>),
        (status = 403, description = "Detonator belongs to another account"),
        (status = 404, description = "No such detonator or product")
    )
)]
pub async fn create(
    State(state): State<AppState>,
    Auth(user): Auth,
    ValidatedJson(request): ValidatedJson<CampaignRequest>,
) -> Result<ApiResponse<CampaignDetails>, ApiError> {
    let (input, product_ids) = into_parts(request);

    let txn = state.db.begin_write()?;
    ensure_detonator_owner(&txn, &user, input.detonator_id)?;
    let campaigns = CampaignRepository::new(&txn);
    let (campaign, orders) = campaigns.insert(input, &product_ids)?;
    let details = campaigns.details(campaign.id)?;
    txn.commit()?;

    tracing::info!(
        campaign_id = campaign.id,
        detonator_id = campaign.detonator_id,
        orders = orders.len(),
        "Campaign created"
    );
    Ok(ApiResponse::created("Campaign created", details))
}

#[utoipa::path(
    get,
    path = "/api/v1/campaign/filter",
    params(CampaignQuery),
    tag = "Campaigns",
    responses((status = 200, body = ApiResponse<Vec<CampaignDetails>>))
)]
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<CampaignQuery>,
) -> Result<ApiResponse<Vec<CampaignDetails>>, ApiError> {
    let page = query.page();
    let read = state.db.begin_read()?;
    let paged = CampaignRepository::new(&read).list(query.detonator_id, page)?;
    Ok(ApiResponse::page("Campaigns listed", page, paged))
}

#[utoipa::path(
    get,
    path = "/api/v1/campaign/fetch/{id}",
    params(("id" = u64, Path, description = "Campaign ID")),
    tag = "Campaigns",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, body = ApiResponse<CampaignDetails>),
        (status = 404, description = "No such campaign")
    )
)]
pub async fn fetch(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<ApiResponse<CampaignDetails>, ApiError> {
    let read = state.db.begin_read()?;
    let details = CampaignRepository::new(&read).details(id)?;
    Ok(ApiResponse::ok("Campaign fetched", details))
}

/// Products are fixed at creation; `products` in an update body is ignored.
#[utoipa::path(
    put,
    path = "/api/v1/campaign/update/{id}",
    params(("id" = u64, Path, description = "Campaign ID")),
    request_body = CampaignRequest,
    tag = "Campaigns",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, body = ApiResponse<CampaignDetails>),
        (status = 403, description = "Campaign or target detonator belongs to another account"),
        (status = 404, description = "No such campaign or detonator")
    )
)]
pub async fn update(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<u64>,
    ValidatedJson(request): ValidatedJson<CampaignRequest>,
) -> Result<ApiResponse<CampaignDetails>, ApiError> {
    let (input, _) = into_parts(request);

    let txn = state.db.begin_write()?;
    let campaigns = CampaignRepository::new(&txn);
    let current = campaigns.get(id)?;
    ensure_detonator_owner(&txn, &user, current.detonator_id)?;
    if input.detonator_id != current.detonator_id {
        ensure_detonator_owner(&txn, &user, input.detonator_id)?;
    }
    campaigns.update(id, input)?;
    let details = campaigns.details(id)?;
    txn.commit()?;

    Ok(ApiResponse::ok("Campaign updated", details))
}
