// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response structures shared by the REST handlers. JSON bodies
//! are validated with `validator` before they reach a repository; multipart
//! bodies are parsed in [`crate::api::form`].
//!
//! ## Envelope
//!
//! Every successful response is wrapped in [`ApiResponse`]:
//!
//! ```json
//! { "code": 200, "message": "Merchant fetched", "body": { ... }, "meta": { ... } }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use crate::storage::{ApprovalStatus, Page, Paged};

// =============================================================================
// Envelope
// =============================================================================

/// Success envelope.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub message: String,
    pub body: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<PaginationMeta>,
}

impl<T> ApiResponse<T> {
    pub fn with_status(status: StatusCode, message: impl Into<String>, body: T) -> Self {
        Self {
            code: status.as_u16(),
            message: message.into(),
            body,
            meta: None,
        }
    }

    pub fn ok(message: impl Into<String>, body: T) -> Self {
        Self::with_status(StatusCode::OK, message, body)
    }

    pub fn created(message: impl Into<String>, body: T) -> Self {
        Self::with_status(StatusCode::CREATED, message, body)
    }
}

impl<T> ApiResponse<Vec<T>> {
    /// Envelope for one page of a listing.
    pub fn page(message: impl Into<String>, page: Page, paged: Paged<T>) -> Self {
        let meta = PaginationMeta::new(page, paged.total);
        Self {
            meta: Some(meta),
            ..Self::ok(message, paged.items)
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

// =============================================================================
// Pagination
// =============================================================================

/// Pagination metadata for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaginationMeta {
    pub page: u64,
    pub per_page: u64,
    pub page_count: u64,
    pub total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<u64>,
}

impl PaginationMeta {
    pub fn new(page: Page, total: u64) -> Self {
        let page_count = total.div_ceil(page.per_page);
        Self {
            page: page.page,
            per_page: page.per_page,
            page_count,
            total,
            next: (page.page < page_count).then(|| page.page + 1),
            previous: (page.page > 1).then(|| page.page - 1),
        }
    }
}

/// Plain `page` / `per_page` query.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct PageQuery {
    /// Page number, starting at 1
    pub page: Option<u64>,
    /// Page size (default 10, at most 100)
    pub per_page: Option<u64>,
}

impl PageQuery {
    pub fn page(&self) -> Page {
        Page::new(self.page, self.per_page)
    }
}

/// Product listing query.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ProductQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Only products of this merchant
    pub merchant_id: Option<u64>,
}

impl ProductQuery {
    pub fn page(&self) -> Page {
        Page::new(self.page, self.per_page)
    }
}

/// Campaign listing query.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct CampaignQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Only campaigns of this detonator
    pub detonator_id: Option<u64>,
}

impl CampaignQuery {
    pub fn page(&self) -> Page {
        Page::new(self.page, self.per_page)
    }
}

// =============================================================================
// Auth Models
// =============================================================================

/// Email and password login.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// Request a fresh passcode by email.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct OtpRequest {
    #[validate(email)]
    pub email: String,
}

fn numeric_code(code: &str) -> Result<(), ValidationError> {
    if !code.is_empty() && code.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::new("numeric"))
    }
}

/// Log in with an emailed passcode.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct VerifyOtpRequest {
    #[validate(email)]
    pub email: String,
    #[validate(custom(function = "numeric_code"))]
    pub code: String,
}

// =============================================================================
// Resource Models
// =============================================================================

/// Approval decision for a merchant or detonator.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct ApprovalRequest {
    pub status: ApprovalStatus,
    #[serde(default)]
    pub note: Option<String>,
}

/// Image reference in a product request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ImageRef {
    pub image_url: String,
}

/// Product create and update body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct ProductRequest {
    #[validate(range(min = 1, message = "merchant_id is required"))]
    pub merchant_id: u64,
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "description is required"))]
    pub description: String,
    #[validate(range(exclusive_min = 0.0, message = "price must be positive"))]
    pub price: f64,
    #[validate(range(min = 1, message = "qty is required"))]
    pub qty: u32,
    #[serde(default)]
    pub images: Vec<ImageRef>,
}

/// Product reference in a campaign request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CampaignProductRef {
    pub merchant_product_id: u64,
}

/// Campaign create and update body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct CampaignRequest {
    #[validate(range(min = 1, message = "detonator_id is required"))]
    pub detonator_id: u64,
    #[validate(length(min = 1))]
    pub event_name: String,
    #[validate(length(min = 1))]
    pub event_type: String,
    #[validate(length(min = 1))]
    pub event_date: String,
    #[validate(length(min = 1))]
    pub event_time: String,
    #[validate(length(min = 1))]
    pub description: String,
    #[validate(range(exclusive_min = 0.0, message = "donation_target must be positive"))]
    pub donation_target: f64,
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
    pub image_url: String,
    #[serde(default)]
    pub products: Vec<CampaignProductRef>,
}

/// Stored location of an uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct MediaResponse {
    pub destination: String,
    pub file_url: String,
}
