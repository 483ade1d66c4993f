// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ownership checks for mutations.
//!
//! A merchant or detonator may change only the records hanging off its own
//! credential. Superadmins may change anything.

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::storage::repository::{DetonatorRepository, MerchantRepository};
use crate::storage::StoreRead;

/// Allow `user` to act on a record owned by `owner_credential_id`.
pub fn ensure_owner(user: &AuthenticatedUser, owner_credential_id: u64) -> Result<(), ApiError> {
    if user.is_superadmin() || user.user_id == owner_credential_id {
        Ok(())
    } else {
        tracing::info!(
            user_id = user.user_id,
            owner = owner_credential_id,
            "Ownership check failed"
        );
        Err(ApiError::forbidden(
            "You may only modify records that belong to your account",
        ))
    }
}

/// Check that `user` may act for the merchant `merchant_id`.
pub fn ensure_merchant_owner<T: StoreRead>(
    txn: &T,
    user: &AuthenticatedUser,
    merchant_id: u64,
) -> Result<(), ApiError> {
    let merchant = MerchantRepository::new(txn).get(merchant_id)?;
    ensure_owner(user, merchant.user_id)
}

/// Check that `user` may act for the detonator `detonator_id`.
pub fn ensure_detonator_owner<T: StoreRead>(
    txn: &T,
    user: &AuthenticatedUser,
    detonator_id: u64,
) -> Result<(), ApiError> {
    let detonator = DetonatorRepository::new(txn).get(detonator_id)?;
    ensure_owner(user, detonator.user_id)
}
