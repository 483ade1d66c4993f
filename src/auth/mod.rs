// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Session tokens, passcodes and role-based access control.
//!
//! ## Auth Flow
//!
//! 1. Client logs in with email and password, or with an emailed passcode
//! 2. Server returns an HS256 session token whose `session` claim is the
//!    keyed hash of the credential's role
//! 3. Client sends `Authorization: Bearer <token>` on protected routes
//! 4. Session middleware:
//!    - Verifies signature and expiry (no leeway)
//!    - Reissues the token when it is inside the refresh window
//!    - Matches the session tag against the route's allowed roles
//!
//! ## Security
//!
//! - Passwords are bcrypt hashed; verification runs on the blocking pool
//! - Passcodes come from the system CSPRNG and are compared in constant time
//! - Session tags are compared in constant time; plaintext roles never
//!   appear in tokens

pub mod claims;
pub mod error;
pub mod extractor;
pub mod middleware;
pub mod otp;
pub mod password;
pub mod roles;
pub mod service;
pub mod token;

pub use claims::{AuthenticatedUser, SessionClaims};
pub use error::AuthError;
pub use extractor::Auth;
pub use middleware::{require_roles, RoleGate};
pub use roles::{Role, RoleProfile, ALL_ROLES};
pub use service::{AuthResponse, AuthService, RoleExtension};
pub use token::{IssuedToken, TokenCodec, TokenError};
