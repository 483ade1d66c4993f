// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Merchant repository.
//!
//! A merchant extends exactly one credential. Fetches eager-load the
//! credential profile and the merchant's products.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::credentials::{CredentialProfile, CredentialRepository};
use super::products::{ProductRepository, StoredProduct};
use super::{non_blank, ApprovalStatus, Page, Paged};
use crate::storage::database::{
    require, StoreError, StoreRead, StoreResult, WriteTxn, MERCHANTS, MERCHANT_BY_CREDENTIAL,
};

/// Merchant row.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct StoredMerchant {
    pub id: u64,
    /// Owning credential ID
    pub user_id: u64,
    pub province: String,
    pub city: String,
    pub sub_district: String,
    pub postal_code: String,
    pub address: String,
    pub latitude: String,
    pub longitude: String,
    pub no_link_aja: String,
    pub ktp_number: String,
    pub self_photo: String,
    pub ktp_photo: String,
    pub status: ApprovalStatus,
    pub note: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Merchant with its credential profile and products.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct MerchantDetails {
    #[serde(flatten)]
    pub merchant: StoredMerchant,
    pub oauth: Option<CredentialProfile>,
    pub products: Vec<StoredProduct>,
}

/// Fields for a new merchant.
#[derive(Debug, Clone, Default)]
pub struct NewMerchant {
    pub user_id: u64,
    pub province: String,
    pub city: String,
    pub sub_district: String,
    pub postal_code: String,
    pub address: String,
    pub latitude: String,
    pub longitude: String,
    pub no_link_aja: String,
    pub ktp_number: String,
    pub self_photo: String,
    pub ktp_photo: String,
}

/// Partial merchant update. `None` or blank leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct MerchantChanges {
    pub province: Option<String>,
    pub city: Option<String>,
    pub sub_district: Option<String>,
    pub postal_code: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub no_link_aja: Option<String>,
    pub ktp_number: Option<String>,
    pub self_photo: Option<String>,
    pub ktp_photo: Option<String>,
}

fn apply(target: &mut String, value: Option<String>) {
    if let Some(value) = non_blank(value) {
        *target = value;
    }
}

/// Repository for merchant operations.
pub struct MerchantRepository<'a, T> {
    txn: &'a T,
}

impl<'a, T: StoreRead> MerchantRepository<'a, T> {
    pub fn new(txn: &'a T) -> Self {
        Self { txn }
    }

    /// Get a merchant by ID.
    pub fn get(&self, id: u64) -> StoreResult<StoredMerchant> {
        require(self.txn.get_json(MERCHANTS, id)?, format!("Merchant {id}"))
    }

    /// Merchant record extending a credential, if any.
    pub fn find_by_credential(&self, credential_id: u64) -> StoreResult<Option<StoredMerchant>> {
        match self.txn.link_get(MERCHANT_BY_CREDENTIAL, credential_id)? {
            Some(id) => self.txn.get_json(MERCHANTS, id),
            None => Ok(None),
        }
    }

    fn expand(&self, merchant: StoredMerchant) -> StoreResult<MerchantDetails> {
        let oauth = CredentialRepository::new(self.txn)
            .find(merchant.user_id)?
            .map(CredentialProfile::from);
        let products = ProductRepository::new(self.txn).all_for_merchant(merchant.id)?;
        Ok(MerchantDetails {
            merchant,
            oauth,
            products,
        })
    }

    /// Fetch a merchant with its relations.
    pub fn details(&self, id: u64) -> StoreResult<MerchantDetails> {
        self.expand(self.get(id)?)
    }

    /// Paginated listing with relations, newest first.
    pub fn list(&self, page: Page) -> StoreResult<Paged<MerchantDetails>> {
        let merchants: Vec<StoredMerchant> = self.txn.scan_json(MERCHANTS)?;
        let paged = page.slice(merchants);
        let items = paged
            .items
            .into_iter()
            .map(|m| self.expand(m))
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(Paged {
            items,
            total: paged.total,
        })
    }
}

impl MerchantRepository<'_, WriteTxn> {
    /// Create the merchant extension of a credential.
    pub fn insert(&self, new: NewMerchant) -> StoreResult<StoredMerchant> {
        if self.txn.link_get(MERCHANT_BY_CREDENTIAL, new.user_id)?.is_some() {
            return Err(StoreError::Conflict(
                "credential already has a merchant profile".into(),
            ));
        }

        let now = Utc::now();
        let merchant = StoredMerchant {
            id: self.txn.next_id(MERCHANTS)?,
            user_id: new.user_id,
            province: new.province,
            city: new.city,
            sub_district: new.sub_district,
            postal_code: new.postal_code,
            address: new.address,
            latitude: new.latitude,
            longitude: new.longitude,
            no_link_aja: new.no_link_aja,
            ktp_number: new.ktp_number,
            self_photo: new.self_photo,
            ktp_photo: new.ktp_photo,
            status: ApprovalStatus::Waiting,
            note: String::new(),
            created_at: now,
            updated_at: now,
        };
        self.txn.put_json(MERCHANTS, merchant.id, &merchant)?;
        self.txn
            .link_put(MERCHANT_BY_CREDENTIAL, merchant.user_id, merchant.id)?;
        Ok(merchant)
    }

    /// Record an approval decision.
    pub fn set_approval(
        &self,
        id: u64,
        status: ApprovalStatus,
        note: Option<String>,
    ) -> StoreResult<StoredMerchant> {
        let mut merchant = self.get(id)?;
        merchant.status = status;
        merchant.note = note.unwrap_or_default();
        merchant.updated_at = Utc::now();
        self.txn.put_json(MERCHANTS, id, &merchant)?;
        Ok(merchant)
    }

    /// Apply a partial update.
    pub fn update(&self, id: u64, changes: MerchantChanges) -> StoreResult<StoredMerchant> {
        let mut merchant = self.get(id)?;
        apply(&mut merchant.province, changes.province);
        apply(&mut merchant.city, changes.city);
        apply(&mut merchant.sub_district, changes.sub_district);
        apply(&mut merchant.postal_code, changes.postal_code);
        apply(&mut merchant.address, changes.address);
        apply(&mut merchant.latitude, changes.latitude);
        apply(&mut merchant.longitude, changes.longitude);
        apply(&mut merchant.no_link_aja, changes.no_link_aja);
        apply(&mut merchant.ktp_number, changes.ktp_number);
        apply(&mut merchant.self_photo, changes.self_photo);
        apply(&mut merchant.ktp_photo, changes.ktp_photo);
        merchant.updated_at = Utc::now();
        self.txn.put_json(MERCHANTS, id, &merchant)?;
        Ok(merchant)
    }
}

#[cfg(test)]
pub(crate) fn new_merchant(user_id: u64) -> NewMerchant {
    NewMerchant {
        user_id,
        province: "DKI Jakarta".into(),
        city: "Jakarta Selatan".into(),
        ktp_number: "3171000000000001".into(),
        self_photo: "merchant/self.jpg".into(),
        ktp_photo: "merchant/ktp.jpg".into(),
        ..Default::default()
    }
}
