// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session token claims and authenticated user representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roles::Role;

/// Claims carried by a session token.
///
/// The token never carries the plaintext role. `session` holds the keyed
/// hash of the role name, so only holders of the server secret can mint a
/// tag matching a given role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (credential ID, decimal string)
    pub sub: String,
    /// Session tag derived from the role
    pub session: String,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
}

impl SessionClaims {
    /// Numeric credential ID of the subject, if the claim is well formed.
    pub fn subject_id(&self) -> Option<u64> {
        self.sub.parse().ok()
    }
}

/// Authenticated user information extracted from a session token.
///
/// Inserted into the request extensions by the session middleware once the
/// token is verified and its tag matched one of the route's allowed roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Credential ID
    pub user_id: u64,

    /// Role whose session tag matched the route allow-list
    pub role: Role,

    /// Token expiration (Unix timestamp, after any refresh)
    #[serde(skip)]
    pub expires_at: i64,
}

impl AuthenticatedUser {
    /// Check if the user holds exactly the given role.
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }

    /// Check if this user is a platform administrator.
    pub fn is_superadmin(&self) -> bool {
        self.role == Role::SuperAdmin
    }
}
