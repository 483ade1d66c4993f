// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Detonator repository.
//!
//! A detonator extends exactly one credential and organizes campaigns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::credentials::{CredentialProfile, CredentialRepository};
use super::{non_blank, ApprovalStatus, Page, Paged};
use crate::storage::database::{
    require, StoreError, StoreRead, StoreResult, WriteTxn, DETONATORS, DETONATOR_BY_CREDENTIAL,
};

/// Detonator row.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct StoredDetonator {
    pub id: u64,
    /// Owning credential ID
    pub user_id: u64,
    pub ktp_number: String,
    pub self_photo: String,
    pub ktp_photo: String,
    pub status: ApprovalStatus,
    pub note: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Detonator with its credential profile.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct DetonatorDetails {
    #[serde(flatten)]
    pub detonator: StoredDetonator,
    pub oauth: Option<CredentialProfile>,
}

/// Fields for a new detonator.
#[derive(Debug, Clone, Default)]
pub struct NewDetonator {
    pub user_id: u64,
    pub ktp_number: String,
    pub self_photo: String,
    pub ktp_photo: String,
}

/// Partial detonator update.
#[derive(Debug, Clone, Default)]
pub struct DetonatorChanges {
    pub ktp_number: Option<String>,
    pub self_photo: Option<String>,
    pub ktp_photo: Option<String>,
}

/// Repository for detonator operations.
pub struct DetonatorRepository<'a, T> {
    txn: &'a T,
}

impl<'a, T: StoreRead> DetonatorRepository<'a, T> {
    pub fn new(txn: &'a T) -> Self {
        Self { txn }
    }

    /// Get a detonator by ID.
    pub fn get(&self, id: u64) -> StoreResult<StoredDetonator> {
        require(self.txn.get_json(DETONATORS, id)?, format!("Detonator {id}"))
    }

    pub fn find(&self, id: u64) -> StoreResult<Option<StoredDetonator>> {
        self.txn.get_json(DETONATORS, id)
    }

    /// Detonator record extending a credential, if any.
    pub fn find_by_credential(&self, credential_id: u64) -> StoreResult<Option<StoredDetonator>> {
        match self.txn.link_get(DETONATOR_BY_CREDENTIAL, credential_id)? {
            Some(id) => self.find(id),
            None => Ok(None),
        }
    }

    pub(crate) fn expand(&self, detonator: StoredDetonator) -> StoreResult<DetonatorDetails> {
        let oauth = CredentialRepository::new(self.txn)
            .find(detonator.user_id)?
            .map(CredentialProfile::from);
        Ok(DetonatorDetails { detonator, oauth })
    }

    /// Fetch a detonator with its credential profile.
    pub fn details(&self, id: u64) -> StoreResult<DetonatorDetails> {
        self.expand(self.get(id)?)
    }

    /// Paginated listing with credential profiles, newest first.
    pub fn list(&self, page: Page) -> StoreResult<Paged<DetonatorDetails>> {
        let detonators: Vec<StoredDetonator> = self.txn.scan_json(DETONATORS)?;
        let paged = page.slice(detonators);
        let items = paged
            .items
            .into_iter()
            .map(|d| self.expand(d))
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(Paged {
            items,
            total: paged.total,
        })
    }
}

impl DetonatorRepository<'_, WriteTxn> {
    /// Create the detonator extension of a credential.
    pub fn insert(&self, new: NewDetonator) -> StoreResult<StoredDetonator> {
        if self.txn.link_get(DETONATOR_BY_CREDENTIAL, new.user_id)?.is_some() {
            return Err(StoreError::Conflict(
                "credential already has a detonator profile".into(),
            ));
        }

        let now = Utc::now();
        let detonator = StoredDetonator {
            id: self.txn.next_id(DETONATORS)?,
            user_id: new.user_id,
            ktp_number: new.ktp_number,
            self_photo: new.self_photo,
            ktp_photo: new.ktp_photo,
            status: ApprovalStatus::Waiting,
            note: String::new(),
            created_at: now,
            updated_at: now,
        };
        self.txn.put_json(DETONATORS, detonator.id, &detonator)?;
        self.txn
            .link_put(DETONATOR_BY_CREDENTIAL, detonator.user_id, detonator.id)?;
        Ok(detonator)
    }

    /// Record an approval decision.
    pub fn set_approval(
        &self,
        id: u64,
        status: ApprovalStatus,
        note: Option<String>,
    ) -> StoreResult<StoredDetonator> {
        let mut detonator = self.get(id)?;
        detonator.status = status;
        detonator.note = note.unwrap_or_default();
        detonator.updated_at = Utc::now();
        self.txn.put_json(DETONATORS, id, &detonator)?;
        Ok(detonator)
    }

    /// Apply a partial update.
    pub fn update(&self, id: u64, changes: DetonatorChanges) -> StoreResult<StoredDetonator> {
        let mut detonator = self.get(id)?;
        if let Some(ktp_number) = non_blank(changes.ktp_number) {
            detonator.ktp_number = ktp_number;
        }
        if let Some(self_photo) = non_blank(changes.self_photo) {
            detonator.self_photo = self_photo;
        }
        if let Some(ktp_photo) = non_blank(changes.ktp_photo) {
            detonator.ktp_photo = ktp_photo;
        }
        detonator.updated_at = Utc::now();
        self.txn.put_json(DETONATORS, id, &detonator)?;
        Ok(detonator)
    }
}

#[cfg(test)]
pub(crate) fn new_detonator(user_id: u64) -> NewDetonator {
    NewDetonator {
        user_id,
        ktp_number: "3171000000000002".into(),
        self_photo: "detonator/self.jpg".into(),
        ktp_photo: "detonator/ktp.jpg".into(),
    }
}
