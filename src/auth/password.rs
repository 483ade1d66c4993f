// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Password hashing with bcrypt.
//!
//! Hashing and verification are CPU bound; the async wrappers move them
//! onto the blocking pool so request tasks keep the runtime responsive.

use super::error::AuthError;

/// Lowest cost bcrypt accepts. Only suitable for tests.
pub const MIN_COST: u32 = 4;

/// Hash a password with the given bcrypt cost.
pub fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    bcrypt::hash(password, cost)
        .map_err(|e| AuthError::InternalError(format!("password hashing failed: {e}")))
}

/// Verify a password against a stored bcrypt hash.
///
/// An empty hash never verifies. A hash that bcrypt cannot parse is an
/// internal error, not a credential mismatch.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    if hash.is_empty() {
        return Ok(false);
    }
    bcrypt::verify(password, hash)
        .map_err(|e| AuthError::InternalError(format!("password verification failed: {e}")))
}

/// [`hash_password`] on the blocking pool.
pub async fn hash_password_blocking(password: String, cost: u32) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .map_err(|e| AuthError::InternalError(format!("hashing task failed: {e}")))?
}

/// [`verify_password`] on the blocking pool.
pub async fn verify_password_blocking(password: String, hash: String) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AuthError::InternalError(format!("verification task failed: {e}")))?
}
