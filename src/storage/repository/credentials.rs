// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential repository.
//!
//! A credential is the login identity behind every merchant, detonator and
//! administrator. Email and phone are unique across all credentials and are
//! enforced through index tables inside the same write transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use utoipa::ToSchema;
use uuid::Uuid;

use super::non_blank;
use crate::auth::Role;
use crate::storage::database::{
    require, StoreError, StoreRead, StoreResult, WriteTxn, CREDENTIALS, CREDENTIAL_EMAILS,
    CREDENTIAL_PHONES,
};

/// Canonical form of an email address used for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.nfkc().collect::<String>().trim().to_lowercase()
}

/// Credential row as persisted. Never serialized into responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredCredential {
    pub id: u64,
    pub uuid: Uuid,
    pub fullname: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub is_locked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public view of a credential.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct CredentialProfile {
    pub id: u64,
    pub uuid: Uuid,
    pub fullname: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    pub is_active: bool,
    pub is_locked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<StoredCredential> for CredentialProfile {
    fn from(c: StoredCredential) -> Self {
        Self {
            id: c.id,
            uuid: c.uuid,
            fullname: c.fullname,
            email: c.email,
            phone: c.phone,
            role: c.role,
            is_active: c.is_active,
            is_locked: c.is_locked,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// Fields for a new credential. The password must already be hashed.
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub fullname: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub role: Role,
}

/// Partial profile update. `None` or blank leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub fullname: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
}

/// Repository for credential operations.
pub struct CredentialRepository<'a, T> {
    txn: &'a T,
}

impl<'a, T: StoreRead> CredentialRepository<'a, T> {
    pub fn new(txn: &'a T) -> Self {
        Self { txn }
    }

    /// Get a credential by ID.
    pub fn get(&self, id: u64) -> StoreResult<StoredCredential> {
        require(self.txn.get_json(CREDENTIALS, id)?, format!("Credential {id}"))
    }

    pub fn find(&self, id: u64) -> StoreResult<Option<StoredCredential>> {
        self.txn.get_json(CREDENTIALS, id)
    }

    /// Look up a credential by email (normalized before lookup).
    pub fn find_by_email(&self, email: &str) -> StoreResult<Option<StoredCredential>> {
        match self.txn.index_get(CREDENTIAL_EMAILS, &normalize_email(email))? {
            Some(id) => self.find(id),
            None => Ok(None),
        }
    }

    fn ensure_unique(&self, email: &str, phone: &str, owner: Option<u64>) -> StoreResult<()> {
        if let Some(existing) = self.txn.index_get(CREDENTIAL_EMAILS, email)? {
            if Some(existing) != owner {
                return Err(StoreError::Conflict("email is already registered".into()));
            }
        }
        if !phone.is_empty() {
            if let Some(existing) = self.txn.index_get(CREDENTIAL_PHONES, phone)? {
                if Some(existing) != owner {
                    return Err(StoreError::Conflict("phone is already registered".into()));
                }
            }
        }
        Ok(())
    }
}

impl CredentialRepository<'_, WriteTxn> {
    /// Create a credential. Fails with a conflict on a duplicate email or phone.
    pub fn insert(&self, new: NewCredential) -> StoreResult<StoredCredential> {
        let email = normalize_email(&new.email);
        let phone = new.phone.trim().to_string();
        self.ensure_unique(&email, &phone, None)?;

        let now = Utc::now();
        let credential = StoredCredential {
            id: self.txn.next_id(CREDENTIALS)?,
            uuid: Uuid::new_v4(),
            fullname: new.fullname.trim().to_string(),
            email,
            phone,
            password_hash: new.password_hash,
            role: new.role,
            is_active: true,
            is_locked: false,
            created_at: now,
            updated_at: now,
        };

        self.txn.put_json(CREDENTIALS, credential.id, &credential)?;
        self.txn
            .index_put(CREDENTIAL_EMAILS, &credential.email, credential.id)?;
        if !credential.phone.is_empty() {
            self.txn
                .index_put(CREDENTIAL_PHONES, &credential.phone, credential.id)?;
        }
        Ok(credential)
    }

    /// Apply a partial profile update, re-checking email and phone uniqueness.
    pub fn update_profile(&self, id: u64, changes: ProfileChanges) -> StoreResult<StoredCredential> {
        let mut credential = self.get(id)?;

        let email = non_blank(changes.email).map(|e| normalize_email(&e));
        let phone = non_blank(changes.phone).map(|p| p.trim().to_string());
        self.ensure_unique(
            email.as_deref().unwrap_or(&credential.email),
            phone.as_deref().unwrap_or(""),
            Some(id),
        )?;

        if let Some(fullname) = non_blank(changes.fullname) {
            credential.fullname = fullname.trim().to_string();
        }
        if let Some(email) = email {
            if email != credential.email {
                self.txn.index_remove(CREDENTIAL_EMAILS, &credential.email)?;
                self.txn.index_put(CREDENTIAL_EMAILS, &email, id)?;
                credential.email = email;
            }
        }
        if let Some(phone) = phone {
            if phone != credential.phone {
                if !credential.phone.is_empty() {
                    self.txn.index_remove(CREDENTIAL_PHONES, &credential.phone)?;
                }
                self.txn.index_put(CREDENTIAL_PHONES, &phone, id)?;
                credential.phone = phone;
            }
        }
        if let Some(hash) = changes.password_hash {
            credential.password_hash = hash;
        }

        credential.updated_at = Utc::now();
        self.txn.put_json(CREDENTIALS, id, &credential)?;
        Ok(credential)
    }
}

#[cfg(test)]
pub(crate) fn new_credential(email: &str, phone: &str, role: Role) -> NewCredential {
    NewCredential {
        fullname: "Test User".into(),
        email: email.into(),
        phone: phone.into(),
        password_hash: "$2b$04$invalidinvalidinvalidinvalidinvalidinvalidinvalidinv".into(),
        role,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::open_temp;

    #[test]
    fn normalization_folds_case_width_and_whitespace() {
        assert_eq!(normalize_email("  A@X.com "), "a@x.com");
        // Fullwidth letters fold to ASCII under NFKC
        assert_eq!(normalize_email("ａ@x.com"), "a@x.com");
    }

    #[test]
    fn insert_and_lookup_by_email() {
        let (_dir, db) = open_temp();
        let txn = db.begin_write().unwrap();
        let created = CredentialRepository::new(&txn)
            .insert(new_credential("A@x.com", "0811", Role::Merchant))
            .unwrap();
        txn.commit().unwrap();

        assert_eq!(created.id, 1);
        assert_eq!(created.email, "a@x.com");
        assert!(created.is_active);

        let read = db.begin_read().unwrap();
        let repo = CredentialRepository::new(&read);
        assert_eq!(repo.find_by_email("a@X.COM").unwrap().unwrap().id, 1);
        assert!(repo.find_by_email("b@x.com").unwrap().is_none());
        assert!(matches!(repo.get(99), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn duplicate_email_or_phone_conflicts() {
        let (_dir, db) = open_temp();
        let txn = db.begin_write().unwrap();
        let repo = CredentialRepository::new(&txn);
        repo.insert(new_credential("a@x.com", "0811", Role::Merchant))
            .unwrap();

        assert!(matches!(
            repo.insert(new_credential("A@X.COM", "0812", Role::Detonator)),
            Err(StoreError::Conflict(_))
        ));
        assert!(matches!(
            repo.insert(new_credential("b@x.com", "0811", Role::Detonator)),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn profile_changes_move_indexes() {
        let (_dir, db) = open_temp();
        let txn = db.begin_write().unwrap();
        let repo = CredentialRepository::new(&txn);
        let a = repo
            .insert(new_credential("a@x.com", "0811", Role::Merchant))
            .unwrap();
        repo.insert(new_credential("b@x.com", "0812", Role::Merchant))
            .unwrap();

        let updated = repo
            .update_profile(
                a.id,
                ProfileChanges {
                    fullname: Some("Renamed".into()),
                    email: Some("c@x.com".into()),
                    phone: Some("".into()),
                    password_hash: None,
                },
            )
            .unwrap();
        assert_eq!(updated.fullname, "Renamed");
        assert_eq!(updated.email, "c@x.com");
        assert_eq!(updated.phone, "0811");
        assert!(repo.find_by_email("a@x.com").unwrap().is_none());
        assert_eq!(repo.find_by_email("c@x.com").unwrap().unwrap().id, a.id);

        let taken = repo.update_profile(
            a.id,
            ProfileChanges {
                phone: Some("0812".into()),
                ..Default::default()
            },
        );
        assert!(matches!(taken, Err(StoreError::Conflict(_))));
    }

    #[test]
    fn keeping_own_email_is_not_a_conflict() {
        let (_dir, db) = open_temp();
        let txn = db.begin_write().unwrap();
        let repo = CredentialRepository::new(&txn);
        let a = repo
            .insert(new_credential("a@x.com", "0811", Role::Detonator))
            .unwrap();

        let same = repo
            .update_profile(
                a.id,
                ProfileChanges {
                    email: Some("A@x.com".into()),
                    phone: Some("0811".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(same.email, "a@x.com");
    }

    #[test]
    fn profile_view_drops_password_hash() {
        let (_dir, db) = open_temp();
        let txn = db.begin_write().unwrap();
        let stored = CredentialRepository::new(&txn)
            .insert(new_credential("a@x.com", "0811", Role::Merchant))
            .unwrap();

        let json = serde_json::to_value(CredentialProfile::from(stored)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "merchant");
    }
}
