// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User roles for authorization.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// User roles for authorization.
///
/// ## Roles
///
/// - `SuperAdmin` - Platform administrator, approves merchants and detonators
/// - `Merchant` - Product supplier, manages its own catalogue
/// - `Detonator` - Campaign organizer, manages its own campaigns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Platform administrator
    SuperAdmin,
    /// Product supplier
    Merchant,
    /// Campaign organizer
    Detonator,
}

/// Every role known to the platform.
pub const ALL_ROLES: &[Role] = &[Role::SuperAdmin, Role::Merchant, Role::Detonator];

impl Role {
    /// Wire name of the role, also the input of the session tag hash.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "superadmin",
            Role::Merchant => "merchant",
            Role::Detonator => "detonator",
        }
    }

    /// Which extension record carries this role's status and note.
    pub fn profile(&self) -> RoleProfile {
        match self {
            Role::Merchant => RoleProfile::Merchant,
            Role::Detonator => RoleProfile::Detonator,
            Role::SuperAdmin => RoleProfile::None,
        }
    }
}

/// Error returned when a string does not name a known role.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    /// Parse role from string (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "superadmin" => Ok(Role::SuperAdmin),
            "merchant" => Ok(Role::Merchant),
            "detonator" => Ok(Role::Detonator),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role-specific extension record attached to a credential.
///
/// Merchants and detonators carry an approval status and note in their own
/// records; administrators have none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleProfile {
    Merchant,
    Detonator,
    None,
}
