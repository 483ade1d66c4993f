// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Merchant product catalogue.

use axum::extract::{Path, Query, State};

use super::{access::ensure_merchant_owner, extract::ValidatedJson};
use crate::{
    auth::Auth,
    error::ApiError,
    models::{ApiResponse, ProductQuery, ProductRequest},
    state::AppState,
    storage::repository::{ProductInput, ProductRepository, StoredProduct},
};

impl From<ProductRequest> for ProductInput {
    fn from(request: ProductRequest) -> Self {
        Self {
            merchant_id: request.merchant_id,
            name: request.name,
            description: request.description,
            price: request.price,
            qty: request.qty,
            images: request
                .images
                .into_iter()
                .map(|image| image.image_url)
                .filter(|url| !url.trim().is_empty())
                .collect(),
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/merchant-product/create",
    request_body = ProductRequest,
    tag = "Products",
    security(("bearer_auth" = [])),
    responses(
        (status = 201, body = ApiResponse<StoredProduct>),
        (status = 403, description = "Merchant belongs to another account"),
        (status = 404, description = "No such merchant")
    )
)]
pub async fn create(
    State(state): State<AppState>,
    Auth(user): Auth,
    ValidatedJson(request): ValidatedJson<ProductRequest>,
) -> Result<ApiResponse<StoredProduct>, ApiError> {
    let txn = state.db.begin_write()?;
    ensure_merchant_owner(&txn, &user, request.merchant_id)?;
    let product = ProductRepository::new(&txn).insert(request.into())?;
    txn.commit()?;

    tracing::info!(product_id = product.id, merchant_id = product.merchant_id, "Product created");
    Ok(ApiResponse::created("Product created", product))
}

#[utoipa::path(
    get,
    path = "/api/v1/merchant-product/filter",
    params(ProductQuery),
    tag = "Products",
    security(("bearer_auth" = [])),
    responses((status = 200, body = ApiResponse<Vec<StoredProduct>>))
)]
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<ApiResponse<Vec<StoredProduct>>, ApiError> {
    let page = query.page();
    let read = state.db.begin_read()?;
    let paged = ProductRepository::new(&read).list(query.merchant_id, page)?;
    Ok(ApiResponse::page("Products listed", page, paged))
}

#[utoipa::path(
    get,
    path = "/api/v1/merchant-product/fetch/{id}",
    params(("id" = u64, Path, description = "Product ID")),
    tag = "Products",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, body = ApiResponse<StoredProduct>),
        (status = 404, description = "No such product")
    )
)]
pub async fn fetch(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<ApiResponse<StoredProduct>, ApiError> {
    let read = state.db.begin_read()?;
    let product = ProductRepository::new(&read).get(id)?;
    Ok(ApiResponse::ok("Product fetched", product))
}

#[utoipa::path(
    put,
    path = "/api/v1/merchant-product/update/{id}",
    params(("id" = u64, Path, description = "Product ID")),
    request_body = ProductRequest,
    tag = "Products",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, body = ApiResponse<StoredProduct>),
        (status = 403, description = "Product or target merchant belongs to another account"),
        (status = 404, description = "No such product or merchant")
    )
)]
pub async fn update(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<u64>,
    ValidatedJson(request): ValidatedJson<ProductRequest>,
) -> Result<ApiResponse<StoredProduct>, ApiError> {
    let txn = state.db.begin_write()?;
    let products = ProductRepository::new(&txn);
    let current = products.get(id)?;
    ensure_merchant_owner(&txn, &user, current.merchant_id)?;
    if request.merchant_id != current.merchant_id {
        ensure_merchant_owner(&txn, &user, request.merchant_id)?;
    }
    let product = products.update(id, request.into())?;
    txn.commit()?;

    Ok(ApiResponse::ok("Product updated", product))
}
