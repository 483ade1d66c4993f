// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the platform database.
//!
//! Each repository wraps a transaction. Lookups work over any
//! [`StoreRead`](super::StoreRead) transaction; mutations require a
//! [`WriteTxn`](super::WriteTxn) and become visible only once it commits.

pub mod campaigns;
pub mod credentials;
pub mod detonators;
pub mod merchants;
pub mod otps;
pub mod products;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use campaigns::{
    CampaignDetails, CampaignInput, CampaignRepository, StoredCampaign, StoredOrder,
};
pub use credentials::{
    normalize_email, CredentialProfile, CredentialRepository, NewCredential, ProfileChanges,
    StoredCredential,
};
pub use detonators::{
    DetonatorChanges, DetonatorDetails, DetonatorRepository, NewDetonator, StoredDetonator,
};
pub use merchants::{
    MerchantChanges, MerchantDetails, MerchantRepository, NewMerchant, StoredMerchant,
};
pub use otps::{OtpRepository, StoredOtp};
pub use products::{ProductImage, ProductInput, ProductRepository, StoredProduct};

/// Review state shared by merchants, detonators, products, campaigns and orders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    #[default]
    Waiting,
    Approved,
    Rejected,
}

/// One page of a listing request, already clamped to sane bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u64,
    pub per_page: u64,
}

impl Page {
    pub const DEFAULT_PER_PAGE: u64 = 10;
    pub const MAX_PER_PAGE: u64 = 100;

    /// Build a page from raw query values. Missing or zero values fall back
    /// to page 1 and the default page size.
    pub fn new(page: Option<u64>, per_page: Option<u64>) -> Self {
        let page = page.filter(|p| *p > 0).unwrap_or(1);
        let per_page = per_page
            .filter(|p| *p > 0)
            .unwrap_or(Self::DEFAULT_PER_PAGE)
            .min(Self::MAX_PER_PAGE);
        Self { page, per_page }
    }

    fn offset(&self) -> usize {
        ((self.page - 1).saturating_mul(self.per_page)) as usize
    }

    /// Cut this page out of the full ordered result set.
    pub fn slice<T>(&self, rows: Vec<T>) -> Paged<T> {
        let total = rows.len() as u64;
        let items = rows
            .into_iter()
            .skip(self.offset())
            .take(self.per_page as usize)
            .collect();
        Paged { items, total }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// A page of rows plus the size of the whole result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> Paged<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paged<U> {
        Paged {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
        }
    }
}

/// Treat blank strings as "not provided" for partial updates.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
